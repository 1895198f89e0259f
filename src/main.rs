//! Headless host for the monitoring engine: initializes logging, loads
//! configuration, starts the scheduler, and shuts down on Ctrl-C.

use statuswatch::config::{AppConfig, ConfigFile};
use statuswatch::Engine;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("statuswatch=info".parse()?),
        )
        .init();

    let app = AppConfig::load();
    tracing::info!("Starting StatusWatch...");
    tracing::info!("Using configuration at {}", app.config_path);
    tracing::info!("Using database at {}", app.db_path);

    let engine = Engine::new(ConfigFile::new(&app.config_path), &app.db_path)?;
    engine.start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    engine.stop();

    Ok(())
}
