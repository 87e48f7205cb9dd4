//! NAADS server binary

use naads_server::{Config, NaadsServer, OtlpProtocol, setup_tracing_with_otel};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
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

    let defaults = Config::default();
    let cfg = yaml_config.as_ref().unwrap_or(&defaults);

    // Initialize tracing with OpenTelemetry (if enabled)
    let _telemetry_guard = setup_tracing_with_otel(
        &cfg.telemetry.service_name,
        &cfg.telemetry.otlp_endpoint,
        OtlpProtocol::from_setting(&cfg.telemetry.protocol),
        cfg.telemetry.enabled,
        cfg.log_level(),
        cfg.json_logs(),
    )
    .await?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "NAADS server starting");

    if yaml_config.is_none() {
        tracing::warn!("Using default configuration");
    }

    let server = NaadsServer::new(cfg.to_server_config());
    server.run().await?;

    // Telemetry guard will flush spans on drop

    Ok(())
}
