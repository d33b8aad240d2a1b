//! Extended market-making bot - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Extended perpetuals market maker
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via EXTMM_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // TLS provider must be installed before any stream connects
    extmm_ws::init_crypto();

    let args = Args::parse();

    // .env is optional
    let _ = dotenvy::dotenv();

    extmm_telemetry::init_logging()?;

    info!("Starting extmm-bot v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > EXTMM_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("EXTMM_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = extmm_bot::AppConfig::load(&config_path)?;
    let credentials = extmm_bot::Credentials::from_env()?;
    info!(mode = ?config.mode, can_sign = credentials.can_sign(), "Configuration loaded");

    let app = extmm_bot::Application::new(config, credentials)?;
    app.run().await?;

    Ok(())
}
