//! Prometheus metrics for the NAADS server.

use naads::{ClusterSnapshot, FeedCounters, MessageKind};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::collections::HashMap;
use std::time::Duration;

/// Labels for per-feed metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct FeedLabels {
    /// Feed name
    pub feed: String,
}

/// Labels for message counters
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct MessageLabels {
    /// Feed name
    pub feed: String,
    /// Message kind (alert, heartbeat, test, unknown)
    pub kind: String,
}

/// Metrics registry with all NAADS server metrics
pub struct MetricsRegistry {
    /// Prometheus registry
    pub registry: Registry,

    // Per-feed metrics
    /// Connection state (1=connected, 0=down)
    feed_connected: Family<FeedLabels, Gauge>,
    /// Messages received, by kind
    feed_messages_total: Family<MessageLabels, Counter>,
    /// Established connections lost
    feed_disconnects_total: Family<FeedLabels, Counter>,

    // Cluster metrics
    /// Index of the elected feed, -1 when unlocked
    active_feed: Gauge,
    /// Successful elections
    elections_total: Counter,
    /// Alerts handed to the output
    alerts_published_total: Counter,
    /// Seconds since start
    uptime_seconds: Gauge,
    /// Duration of one metrics refresh
    refresh_duration_seconds: Histogram,
}

impl MetricsRegistry {
    /// Create a new metrics registry
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let feed_connected = Family::<FeedLabels, Gauge>::default();
        registry.register(
            "naads_feed_connected",
            "Feed connection state (1=connected, 0=down)",
            feed_connected.clone(),
        );

        let feed_messages_total = Family::<MessageLabels, Counter>::default();
        registry.register(
            "naads_feed_messages",
            "Messages received per feed and kind",
            feed_messages_total.clone(),
        );

        let feed_disconnects_total = Family::<FeedLabels, Counter>::default();
        registry.register(
            "naads_feed_disconnects",
            "Established feed connections lost",
            feed_disconnects_total.clone(),
        );

        let active_feed = Gauge::default();
        active_feed.set(-1);
        registry.register(
            "naads_active_feed",
            "Index of the elected feed (-1=unlocked)",
            active_feed.clone(),
        );

        let elections_total = Counter::default();
        registry.register(
            "naads_elections",
            "Successful feed elections",
            elections_total.clone(),
        );

        let alerts_published_total = Counter::default();
        registry.register(
            "naads_alerts_published",
            "Alerts delivered to the output",
            alerts_published_total.clone(),
        );

        let uptime_seconds = Gauge::default();
        registry.register(
            "naads_uptime_seconds",
            "Seconds since the server started",
            uptime_seconds.clone(),
        );

        // 100µs to ~200ms
        let refresh_duration_seconds = Histogram::new(exponential_buckets(0.0001, 2.0, 12));
        registry.register(
            "naads_refresh_duration_seconds",
            "Metrics refresh duration",
            refresh_duration_seconds.clone(),
        );

        Self {
            registry,
            feed_connected,
            feed_messages_total,
            feed_disconnects_total,
            active_feed,
            elections_total,
            alerts_published_total,
            uptime_seconds,
            refresh_duration_seconds,
        }
    }

    /// Set feed connection state
    pub fn set_feed_connected(&self, feed: &str, connected: bool) {
        self.feed_connected
            .get_or_create(&FeedLabels {
                feed: feed.to_string(),
            })
            .set(if connected { 1 } else { 0 });
    }

    /// Add received messages of one kind
    pub fn record_messages(&self, feed: &str, kind: &str, count: u64) {
        self.feed_messages_total
            .get_or_create(&MessageLabels {
                feed: feed.to_string(),
                kind: kind.to_string(),
            })
            .inc_by(count);
    }

    /// Add lost connections
    pub fn record_disconnects(&self, feed: &str, count: u64) {
        self.feed_disconnects_total
            .get_or_create(&FeedLabels {
                feed: feed.to_string(),
            })
            .inc_by(count);
    }

    /// Set the elected feed index
    pub fn set_active_feed(&self, index: Option<usize>) {
        self.active_feed
            .set(index.map_or(-1, |i| i64::try_from(i).unwrap_or(i64::MAX)));
    }

    /// Add elections
    pub fn record_elections(&self, count: u64) {
        self.elections_total.inc_by(count);
    }

    /// Record one alert delivered to the output
    pub fn record_alert_published(&self) {
        self.alerts_published_total.inc();
    }

    /// Update uptime
    pub fn set_uptime(&self, uptime: Duration) {
        self.uptime_seconds
            .set(i64::try_from(uptime.as_secs()).unwrap_or(i64::MAX));
    }

    /// Record refresh duration
    pub fn record_refresh_duration(&self, duration: Duration) {
        self.refresh_duration_seconds.observe(duration.as_secs_f64());
    }

    /// Encode the registry in Prometheus text format
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns successive cluster snapshots into metric updates.
///
/// Feed counters are monotonic, so each refresh adds the difference to the
/// previous observation.
#[derive(Debug, Default)]
pub struct SnapshotObserver {
    previous: HashMap<String, FeedCounters>,
    elections: u64,
}

impl SnapshotObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one snapshot to the registry
    pub fn observe(&mut self, metrics: &MetricsRegistry, snapshot: &ClusterSnapshot) {
        for feed in &snapshot.feeds {
            metrics.set_feed_connected(&feed.name, feed.connected);

            let previous = self.previous.get(&feed.name).copied().unwrap_or_default();
            let current = feed.counters;

            for kind in [MessageKind::Alert, MessageKind::Heartbeat, MessageKind::Test] {
                let delta = current.messages(kind).saturating_sub(previous.messages(kind));
                if delta > 0 {
                    metrics.record_messages(&feed.name, kind.as_str(), delta);
                }
            }

            let unknown = current.unknown.saturating_sub(previous.unknown);
            if unknown > 0 {
                metrics.record_messages(&feed.name, "unknown", unknown);
            }

            let disconnects = current.disconnects.saturating_sub(previous.disconnects);
            if disconnects > 0 {
                metrics.record_disconnects(&feed.name, disconnects);
            }

            self.previous.insert(feed.name.clone(), current);
        }

        let elections = snapshot.elections.saturating_sub(self.elections);
        if elections > 0 {
            metrics.record_elections(elections);
        }
        self.elections = snapshot.elections;

        metrics.set_active_feed(snapshot.active_index);
        metrics.set_uptime(snapshot.uptime);
    }
}
