//! sigdash - crypto trading-signal dashboard entry point.

use anyhow::Result;
use clap::Parser;
use sigdash_app::{cli, AppConfig, Application, Cli, Command, ConfigSource};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // TLS provider must be installed before the feed connects
    sigdash_ws::init_crypto();

    let args = Cli::parse();

    let (config, source) = AppConfig::load(&args.config)?;
    sigdash_telemetry::init_logging(&config.telemetry.log_level)?;
    if source == ConfigSource::Defaults {
        warn!(path = %args.config, "Config file not found, using defaults");
    }

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!("Starting sigdash v{}", env!("CARGO_PKG_VERSION"));
            info!(
                config_path = %args.config,
                api = %config.api_base_url,
                feed = %config.ws_url,
                "Configuration loaded"
            );
            Application::new(config)?.run().await?;
        }
        command => cli::execute(command, &config, args.json).await?,
    }

    Ok(())
}
