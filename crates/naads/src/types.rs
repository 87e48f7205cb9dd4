//! Feed and cluster configuration, runtime state and status snapshots.

use crate::alert::{Alert, AlertStatus, HEARTBEAT_SENDER};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

/// TCP port the upstream feed servers stream on
pub const DEFAULT_PORT: u16 = 8080;

/// Minimum capacity of every alert channel
pub const CHANNEL_CAPACITY: usize = 16;

/// Configuration of a single upstream feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Display name
    pub name: String,

    /// Hostname of the feed server
    pub host: String,

    /// Port of the feed server
    #[serde(default = "default_port")]
    pub port: u16,

    /// Forward heartbeats to the output channel
    #[serde(default)]
    pub forward_heartbeats: bool,

    /// Timeout on connection/reconnection
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Silence allowed on a connection before it is considered dead
    #[serde(with = "humantime_serde")]
    pub liveness_timeout: Duration,

    /// Delay before retrying a failed connection attempt
    #[serde(with = "humantime_serde")]
    pub reconnect_delay: Duration,

    /// Emit feed events
    #[serde(default = "default_true")]
    pub logging: bool,

    /// Emit heartbeat events (requires `logging`)
    #[serde(default)]
    pub log_heartbeats: bool,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_true() -> bool {
    true
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            host: String::new(),
            port: DEFAULT_PORT,
            forward_heartbeats: false,
            connect_timeout: Duration::from_secs(5),
            liveness_timeout: Duration::from_secs(75),
            reconnect_delay: Duration::from_secs(10),
            logging: true,
            log_heartbeats: false,
        }
    }
}

impl FeedConfig {
    /// Create a config with default timeouts
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            ..Self::default()
        }
    }

    /// `host:port` string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check the invariants every reader relies on
    pub fn validate(&self) -> common::Result<()> {
        if self.name.trim().is_empty() {
            return Err(common::Error::config("feed name must not be empty"));
        }
        if self.host.trim().is_empty() {
            return Err(common::Error::config(format!(
                "feed {}: host must not be empty",
                self.name
            )));
        }
        for (field, value) in [
            ("connect_timeout", self.connect_timeout),
            ("liveness_timeout", self.liveness_timeout),
            ("reconnect_delay", self.reconnect_delay),
        ] {
            if value.is_zero() {
                return Err(common::Error::config(format!(
                    "feed {}: {} must be greater than zero",
                    self.name, field
                )));
            }
        }
        Ok(())
    }
}

/// Failover controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Interval between health checks
    #[serde(with = "humantime_serde")]
    pub check_interval: Duration,

    /// Capacity of the merged output channel
    pub channel_capacity: usize,

    /// Emit controller events
    pub logging: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(1),
            channel_capacity: CHANNEL_CAPACITY,
            logging: true,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> common::Result<()> {
        if self.check_interval.is_zero() {
            return Err(common::Error::config("check_interval must be greater than zero"));
        }
        if self.channel_capacity < CHANNEL_CAPACITY {
            return Err(common::Error::config(format!(
                "channel_capacity must be at least {}",
                CHANNEL_CAPACITY
            )));
        }
        Ok(())
    }
}

/// Classification of a parsed message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Alert,
    Heartbeat,
    Test,
}

impl MessageKind {
    /// Classify an alert by its status and sender
    pub fn classify(alert: &Alert) -> Self {
        match alert.status {
            AlertStatus::System if alert.sender == HEARTBEAT_SENDER => MessageKind::Heartbeat,
            AlertStatus::Test => MessageKind::Test,
            _ => MessageKind::Alert,
        }
    }

    /// Lowercase label, used for metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Alert => "alert",
            MessageKind::Heartbeat => "heartbeat",
            MessageKind::Test => "test",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Alert => write!(f, "ALERT"),
            MessageKind::Heartbeat => write!(f, "HEARTBEAT"),
            MessageKind::Test => write!(f, "TEST"),
        }
    }
}

/// Descriptor of the last message a feed received
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastMessage {
    pub kind: MessageKind,
    pub identifier: String,
    pub received_at: SystemTime,
}

impl LastMessage {
    /// Whole seconds since the message was received
    pub fn age(&self) -> Duration {
        self.received_at.elapsed().unwrap_or_default()
    }
}

impl fmt::Display for LastMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.identifier)
    }
}

/// Per-feed message and connection counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedCounters {
    pub disconnects: u64,
    pub alerts: u64,
    pub heartbeats: u64,
    pub tests: u64,
    pub unknown: u64,
}

impl FeedCounters {
    /// Count of a message kind
    pub fn messages(&self, kind: MessageKind) -> u64 {
        match kind {
            MessageKind::Alert => self.alerts,
            MessageKind::Heartbeat => self.heartbeats,
            MessageKind::Test => self.tests,
        }
    }
}

/// Runtime state of one feed.
///
/// Written only by the feed's own reader task; read by the controller, the
/// forwarding tasks and the status reporter.
#[derive(Debug, Default)]
pub struct FeedState {
    connected: AtomicBool,
    disconnects: AtomicU64,
    alerts: AtomicU64,
    heartbeats: AtomicU64,
    tests: AtomicU64,
    unknown: AtomicU64,
    last_message: RwLock<Option<LastMessage>>,
}

impl FeedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    pub(crate) fn record_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unknown(&self) {
        self.unknown.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) async fn record_message(&self, kind: MessageKind, identifier: &str) {
        let counter = match kind {
            MessageKind::Alert => &self.alerts,
            MessageKind::Heartbeat => &self.heartbeats,
            MessageKind::Test => &self.tests,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        *self.last_message.write().await = Some(LastMessage {
            kind,
            identifier: identifier.to_string(),
            received_at: SystemTime::now(),
        });
    }

    /// Current counter values
    pub fn counters(&self) -> FeedCounters {
        FeedCounters {
            disconnects: self.disconnects.load(Ordering::Relaxed),
            alerts: self.alerts.load(Ordering::Relaxed),
            heartbeats: self.heartbeats.load(Ordering::Relaxed),
            tests: self.tests.load(Ordering::Relaxed),
            unknown: self.unknown.load(Ordering::Relaxed),
        }
    }

    pub async fn last_message(&self) -> Option<LastMessage> {
        self.last_message.read().await.clone()
    }
}

/// Dashboard status of a feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedStatus {
    /// Connected and elected
    Locked,
    /// Connected, standing by
    Active,
    /// Not connected
    Down,
}

impl fmt::Display for FeedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedStatus::Locked => write!(f, "LOCKED"),
            FeedStatus::Active => write!(f, "ACTIVE"),
            FeedStatus::Down => write!(f, "DOWN"),
        }
    }
}

/// Point-in-time view of one feed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedSnapshot {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub status: FeedStatus,
    pub connected: bool,
    pub last_message: Option<LastMessage>,
    pub last_message_age_secs: Option<u64>,
    pub counters: FeedCounters,
    pub config: FeedConfig,
}

/// Point-in-time view of the whole cluster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSnapshot {
    pub started_at: SystemTime,
    #[serde(with = "humantime_serde")]
    pub uptime: Duration,
    pub active_index: Option<usize>,
    pub active_feed: Option<String>,
    pub elections: u64,
    pub feeds: Vec<FeedSnapshot>,
}
