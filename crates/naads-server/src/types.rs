//! Runtime configuration of the NAADS server.

use naads::{ControllerConfig, FeedConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Public NAADS streaming hosts, in priority order
pub const DEFAULT_FEED_HOSTS: [(&str, &str); 2] = [
    ("NAAD-1", "streaming1.naad-adna.pelmorexmedia.com"),
    ("NAAD-2", "streaming2.naad-adna.pelmorexmedia.com"),
];

/// How published alerts are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One structured log line per alert
    #[default]
    Log,
    /// One JSON document per line on stdout, including the raw CAP XML
    Json,
    /// Discard (dashboard/metrics only)
    None,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Feeds in priority order
    pub feeds: Vec<FeedConfig>,

    /// Failover controller settings
    pub controller: ControllerConfig,

    /// Status dashboard listen address (None disables it)
    pub status_listen_addr: Option<String>,

    /// Collect Prometheus metrics
    pub metrics_enabled: bool,

    /// Interval between metric refreshes
    pub metrics_refresh_interval: Duration,

    /// Output of the merged alert stream
    pub output: OutputFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            feeds: DEFAULT_FEED_HOSTS
                .iter()
                .map(|(name, host)| FeedConfig::new(*name, *host))
                .collect(),
            controller: ControllerConfig::default(),
            status_listen_addr: Some("0.0.0.0:8000".to_string()),
            metrics_enabled: true,
            metrics_refresh_interval: Duration::from_secs(1),
            output: OutputFormat::Log,
        }
    }
}
