use std::path::Path;

use clap::Parser;

use coalescer::Settings;
use coalescer::cli::commands::{init, watch};
use coalescer::cli::{Cli, Commands};

/// Load settings from an explicit file or by discovery.
fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    Ok(settings)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            coalescer::logging::init();
            init::run_init(force)
        }

        Commands::Config => {
            let config = load_settings(cli.config.as_deref())?;
            coalescer::logging::init_with_config(&config.logging);
            init::run_config(&config)
        }

        Commands::Watch {
            path,
            heartbeat_ms,
            debounce_ms,
            non_recursive,
        } => {
            let config = load_settings(cli.config.as_deref())?;
            coalescer::logging::init_with_config(&config.logging);

            let args = watch::WatchArgs {
                path,
                heartbeat_ms,
                debounce_ms,
                non_recursive,
            };
            watch::run(args, config).await
        }
    }
}
