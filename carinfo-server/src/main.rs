//! CarInfo HTTP Server binary
//!
//! Configured from the TOML file named by `CARINFO_CONFIG` (optional) and
//! `CARINFO_*` environment variables.

use anyhow::Context;
use carinfo_core::Config;
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var_os("CARINFO_CONFIG").map(PathBuf::from);
    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;

    let telemetry = carinfo_server::telemetry::init(&config.logging, "carinfo-server")?;
    info!("Starting CarInfo server v{}", env!("CARGO_PKG_VERSION"));

    let result = carinfo_server::serve(config).await;
    telemetry.shutdown();
    result
}
