//! NAADS server
//!
//! Runs the [`naads`] failover client against the public NAADS streaming
//! hosts (or any configured feeds) and publishes the merged alert stream.
//!
//! # Components
//!
//! - **Controller**: feed readers plus the failover controller from `naads`
//! - **Publisher**: writes every forwarded alert as a log line or JSON line
//! - **Status server**: HTML dashboard, JSON status and Prometheus metrics
//! - **Metrics refresher**: copies cluster snapshots into the registry

pub mod config;
pub mod dashboard;
pub mod http_server;
pub mod metrics;
pub mod output;
pub mod server;
pub mod telemetry;
pub mod types;

pub use config::{Config, ConfigError};
pub use http_server::StatusServer;
pub use metrics::{MetricsRegistry, SnapshotObserver};
pub use output::AlertPublisher;
pub use server::NaadsServer;
pub use telemetry::{
    OtlpProtocol, TelemetryGuard, init_telemetry, init_telemetry_http, setup_tracing_with_otel,
};
pub use types::{OutputFormat, ServerConfig};
