//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Refresh-signal coalescer
#[derive(Parser)]
#[command(
    name = "coalescer",
    version = env!("CARGO_PKG_VERSION"),
    about = "Turn bursty change events into bounded refresh signals",
    long_about = "Watch a path and print one refresh line per coalesced signal: \
                  at least one per heartbeat period, at most one per debounce window during bursts.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Initialize project
    #[command(about = "Set up .coalescer directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings from .coalescer/settings.toml")]
    Config,

    /// Watch a path and emit coalesced refresh signals
    #[command(
        about = "Print refresh signals driven by file-system changes",
        after_help = "Examples:\n  coalescer watch ./manifests\n  coalescer watch . --heartbeat-ms 10000\n  coalescer watch src --debounce-ms 250 --non-recursive"
    )]
    Watch {
        /// File or directory to watch
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Heartbeat period in milliseconds (overrides config)
        #[arg(long)]
        heartbeat_ms: Option<u64>,

        /// Debounce window in milliseconds (overrides config)
        #[arg(long)]
        debounce_ms: Option<u64>,

        /// Only watch the top level of PATH
        #[arg(long)]
        non_recursive: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_watch_overrides() {
        let cli = Cli::try_parse_from([
            "coalescer",
            "watch",
            "deploy",
            "--heartbeat-ms",
            "2000",
            "--non-recursive",
        ])
        .unwrap();

        match cli.command {
            Commands::Watch {
                path,
                heartbeat_ms,
                debounce_ms,
                non_recursive,
            } => {
                assert_eq!(path, PathBuf::from("deploy"));
                assert_eq!(heartbeat_ms, Some(2000));
                assert_eq!(debounce_ms, None);
                assert!(non_recursive);
            }
            _ => panic!("expected watch command"),
        }
    }
}
