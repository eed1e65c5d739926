use clap::Parser;
use weld_manager::{AppConfig, app};

/// Main entry point for the weld manager web application
///
/// Reads configuration from flags and `WELD_*` environment variables, sets up
/// logging (`RUST_LOG`, default `info`) and serves until shut down.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::parse();
    log::info!(
        "settings: {}, master: {}",
        config.settings.display(),
        config.master.display()
    );
    app::run(config).await
}
