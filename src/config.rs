//! Configuration for the coalescer and its command-line front end.
//!
//! Layered the usual way:
//! - Default values
//! - TOML configuration file (`.coalescer/settings.toml`)
//! - Environment variable overrides
//! - CLI argument overrides (applied by the command runners)
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `CO_` and use double underscores
//! to separate nested levels:
//! - `CO_COALESCER__HEARTBEAT_MS=2000` sets `coalescer.heartbeat_ms`
//! - `CO_LOGGING__DEFAULT=debug` sets `logging.default`
//! - `CO_WATCH__RECURSIVE=false` sets `watch.recursive`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::coalescer::CoalesceError;

/// Directory holding the settings file, relative to the workspace root.
pub const CONFIG_DIR: &str = ".coalescer";
/// Settings file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "settings.toml";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Timer periods
    #[serde(default)]
    pub coalescer: CoalescerConfig,

    /// Log levels
    #[serde(default)]
    pub logging: LoggingConfig,

    /// File-system watch used by `coalescer watch`
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CoalescerConfig {
    /// Minimum signal rate: one refresh every this many milliseconds
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,

    /// Burst ceiling: at most one change-driven refresh per window
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl CoalescerConfig {
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Default level for every target
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `coalescer = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WatchConfig {
    /// Watch subdirectories too
    #[serde(default = "default_true")]
    pub recursive: bool,

    /// Capacity of the raw event channel between notify and the coalescer
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_heartbeat_ms() -> u64 {
    5_000
}
fn default_debounce_ms() -> u64 {
    500
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_true() -> bool {
    true
}
fn default_event_buffer() -> usize {
    100
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            coalescer: CoalescerConfig::default(),
            logging: LoggingConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            heartbeat_ms: default_heartbeat_ms(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            event_buffer: default_event_buffer(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources, discovering the settings file
    /// from the current directory upwards.
    pub fn load() -> Result<Self, CoalesceError> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file plus the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, CoalesceError> {
        Ok(Self::figment(path.as_ref()).extract()?)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            // Double underscore becomes a dot, single underscores stay in field names
            .merge(
                Env::prefixed("CO_")
                    .map(|key| key.as_str().to_lowercase().replace("__", ".").into()),
            )
    }

    /// Find `.coalescer/settings.toml` by walking up from the current directory.
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Get the workspace root directory (where `.coalescer` is located).
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Save current configuration to file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CoalesceError> {
        let path = path.as_ref();
        let config_error = |reason: String| CoalesceError::ConfigError { reason };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| config_error(format!("{}: {e}", parent.display())))?;
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| config_error(e.to_string()))?;
        std::fs::write(path, toml_string)
            .map_err(|e| config_error(format!("{}: {e}", path.display())))?;

        Ok(())
    }

    /// Create a default settings file under `root`.
    ///
    /// Refuses to overwrite an existing file unless `force` is set.
    pub fn init_config_file(root: impl AsRef<Path>, force: bool) -> Result<PathBuf, CoalesceError> {
        let config_path = root.as_ref().join(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err(CoalesceError::ConfigError {
                reason: format!(
                    "Configuration file already exists at {}. Use --force to overwrite",
                    config_path.display()
                ),
            });
        }

        Settings::default().save(&config_path)?;
        Ok(config_path)
    }
}
