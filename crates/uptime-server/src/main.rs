//! Uptime server binary

use uptime_server::{Config, UptimeServer, setup_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first (needed for logging settings)
    let yaml_config = match Config::load() {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            // Can't use tracing yet - not initialized
            eprintln!("Configuration error: {}", e);
            eprintln!("Using default configuration");
            None
        }
    };

    let config = yaml_config.unwrap_or_default();
    let _telemetry_guard = setup_tracing(&config.logging, &config.telemetry)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Uptime server starting");

    let server = UptimeServer::new(config.to_server_config());
    server.run().await?;

    // Telemetry guard will flush spans on drop
    Ok(())
}
