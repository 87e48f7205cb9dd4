//! Main NAADS server implementation.

use crate::http_server::StatusServer;
use crate::metrics::{MetricsRegistry, SnapshotObserver};
use crate::output::AlertPublisher;
use crate::types::ServerConfig;
use naads::{AlertParser, CapParser, EventSink, FailoverController, FeedReader, TracingSink};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

/// NAADS server: failover client, alert output, status page and metrics
pub struct NaadsServer {
    config: ServerConfig,
}

impl NaadsServer {
    /// Create a new NAADS server
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Build the failover controller for the configured feeds
    pub fn build_controller(
        config: &ServerConfig,
        sink: Arc<dyn EventSink>,
    ) -> common::Result<FailoverController> {
        let parser: Arc<dyn AlertParser> = Arc::new(CapParser::new());
        let feeds = config
            .feeds
            .iter()
            .map(|feed| Arc::new(FeedReader::new(feed.clone(), parser.clone(), sink.clone())))
            .collect();

        FailoverController::new(feeds, config.controller.clone(), sink)
    }

    /// Run the server until ctrl-c or until the alert stream ends
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!(feeds = self.config.feeds.len(), "Starting NAADS server");

        let controller = Arc::new(Self::build_controller(&self.config, Arc::new(TracingSink))?);

        let metrics = if self.config.metrics_enabled {
            info!("Metrics enabled");
            Some(Arc::new(MetricsRegistry::new()))
        } else {
            info!("Metrics disabled");
            None
        };

        let alerts = controller.start()?;

        // Spawn HTTP status server (if enabled)
        let status_handle = self.config.status_listen_addr.clone().map(|addr| {
            let server = StatusServer::new(controller.clone(), metrics.clone(), addr);
            tokio::spawn(async move {
                if let Err(e) = server.run().await {
                    warn!(error = %e, "Status server error");
                }
            })
        });

        // Spawn metrics refresher
        let refresh_handle = metrics.clone().map(|registry| {
            let controller = controller.clone();
            let period = self.config.metrics_refresh_interval;
            tokio::spawn(async move {
                refresh_metrics(controller, registry, period).await;
            })
        });

        let publisher = AlertPublisher::stdout(self.config.output, metrics.clone());
        let mut publisher_handle = tokio::spawn(async move {
            publisher.run(alerts).await;
        });

        info!("All tasks spawned, server running");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
            }
            _ = &mut publisher_handle => {
                info!("Publisher task completed");
            }
        }

        controller.stop();
        if let Some(handle) = status_handle {
            handle.abort();
        }
        if let Some(handle) = refresh_handle {
            handle.abort();
        }
        // Drain whatever the controller already forwarded
        let _ = publisher_handle.await;

        info!("NAADS server stopped");
        Ok(())
    }
}

/// Periodically copy cluster snapshots into the metrics registry
pub async fn refresh_metrics(
    controller: Arc<FailoverController>,
    metrics: Arc<MetricsRegistry>,
    period: Duration,
) {
    let mut observer = SnapshotObserver::new();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let start = Instant::now();
        let snapshot = controller.snapshot().await;
        observer.observe(&metrics, &snapshot);
        metrics.record_refresh_duration(start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use naads::{ControllerConfig, FeedConfig, NullSink};

    #[test]
    fn test_build_controller_with_default_feeds() {
        let config = ServerConfig::default();
        let controller = NaadsServer::build_controller(&config, Arc::new(NullSink)).unwrap();
        assert_eq!(controller.feeds().len(), 2);
        assert_eq!(controller.feeds()[0].name(), "NAAD-1");
        assert!(controller.active_index().is_none());
    }

    #[test]
    fn test_build_controller_rejects_empty_feeds() {
        let config = ServerConfig {
            feeds: Vec::new(),
            ..ServerConfig::default()
        };
        assert!(NaadsServer::build_controller(&config, Arc::new(NullSink)).is_err());
    }

    #[test]
    fn test_build_controller_rejects_invalid_feed() {
        let mut feed = FeedConfig::new("NAAD-1", "localhost");
        feed.connect_timeout = Duration::ZERO;
        let config = ServerConfig {
            feeds: vec![feed],
            controller: ControllerConfig::default(),
            ..ServerConfig::default()
        };
        assert!(NaadsServer::build_controller(&config, Arc::new(NullSink)).is_err());
    }
}
