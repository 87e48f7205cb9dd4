//! OpenTelemetry integration for distributed tracing
//!
//! Feed and controller events are `tracing` events, so with OpenTelemetry
//! enabled they are exported alongside the HTTP request spans.

use opentelemetry::{KeyValue, trace::TracerProvider as _};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource, runtime,
    trace::{RandomIdGenerator, Sampler, TracerProvider},
};
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// OTLP transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtlpProtocol {
    Grpc,
    Http,
}

impl OtlpProtocol {
    /// Parse the `telemetry.protocol` setting; anything but "http" is gRPC
    pub fn from_setting(value: &str) -> Self {
        if value.eq_ignore_ascii_case("http") {
            OtlpProtocol::Http
        } else {
            OtlpProtocol::Grpc
        }
    }
}

/// OpenTelemetry tracer guard
///
/// When dropped, flushes all pending spans and shuts down the tracer
pub struct TelemetryGuard;

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        opentelemetry::global::shutdown_tracer_provider();
    }
}

fn resource(service_name: &str) -> Resource {
    Resource::new(vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION").to_string()),
    ])
}

fn install_provider(exporter: opentelemetry_otlp::SpanExporter, service_name: &str) {
    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(resource(service_name)),
        )
        .build();

    opentelemetry::global::set_tracer_provider(provider);
}

/// Initialize OpenTelemetry tracing with the gRPC OTLP exporter
///
/// Returns a guard that must be kept alive for the duration of the program.
pub async fn init_telemetry(
    service_name: &str,
    otlp_endpoint: &str,
    enabled: bool,
) -> Result<Option<TelemetryGuard>, Box<dyn std::error::Error>> {
    if !enabled {
        tracing::info!("OpenTelemetry tracing disabled");
        return Ok(None);
    }

    tracing::info!(service_name, otlp_endpoint, "Initializing OpenTelemetry tracing");

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(otlp_endpoint)
        .build()?;
    install_provider(exporter, service_name);

    Ok(Some(TelemetryGuard))
}

/// Initialize OpenTelemetry with the HTTP OTLP exporter
///
/// Use this when the collector only accepts OTLP over HTTP.
pub async fn init_telemetry_http(
    service_name: &str,
    otlp_http_endpoint: &str,
    enabled: bool,
) -> Result<Option<TelemetryGuard>, Box<dyn std::error::Error>> {
    if !enabled {
        tracing::info!("OpenTelemetry tracing disabled");
        return Ok(None);
    }

    tracing::info!(
        service_name,
        otlp_http_endpoint,
        "Initializing OpenTelemetry tracing with HTTP exporter"
    );

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(otlp_http_endpoint)
        .build()?;
    install_provider(exporter, service_name);

    Ok(Some(TelemetryGuard))
}

/// Setup tracing-subscriber, with an OpenTelemetry layer when enabled
pub async fn setup_tracing_with_otel(
    service_name: &str,
    otlp_endpoint: &str,
    protocol: OtlpProtocol,
    enabled: bool,
    log_level: &str,
    json: bool,
) -> Result<Option<TelemetryGuard>, Box<dyn std::error::Error>> {
    if !enabled {
        if json {
            common::logging::init_json(log_level);
        } else {
            common::logging::init(log_level);
        }
        tracing::info!("Tracing initialized without OpenTelemetry");
        return Ok(None);
    }

    let guard = match protocol {
        OtlpProtocol::Grpc => init_telemetry(service_name, otlp_endpoint, true).await?,
        OtlpProtocol::Http => init_telemetry_http(service_name, otlp_endpoint, true).await?,
    };

    let telemetry_layer = tracing_opentelemetry::layer()
        .with_tracer(opentelemetry::global::tracer("naads-server"));

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(common::logging::env_filter(log_level))
        .with(telemetry_layer)
        .init();

    tracing::info!("Tracing initialized with OpenTelemetry integration");
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_telemetry_disabled() {
        let result = init_telemetry("test-service", "http://localhost:4317", false).await;
        assert!(result.is_ok());
        assert!(result.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_telemetry_http_disabled() {
        let result =
            init_telemetry_http("test-service", "http://localhost:4318/v1/traces", false).await;
        assert!(result.is_ok());
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_protocol_setting() {
        assert_eq!(OtlpProtocol::from_setting("http"), OtlpProtocol::Http);
        assert_eq!(OtlpProtocol::from_setting("HTTP"), OtlpProtocol::Http);
        assert_eq!(OtlpProtocol::from_setting("grpc"), OtlpProtocol::Grpc);
        assert_eq!(OtlpProtocol::from_setting("other"), OtlpProtocol::Grpc);
    }
}
