//! Structured events emitted by feed readers and the failover controller.

use serde::Serialize;
use std::fmt;
use tracing::{debug, error, info, warn};

/// Source name used for controller events
pub const CONTROL_SOURCE: &str = "CONTROL";

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Connection established
    Connected,
    /// Connection attempt failed or timed out
    ConnectFailed,
    /// Established connection dropped or went silent
    ConnectionLost,
    /// Alert received
    Alert,
    /// Heartbeat received
    Heartbeat,
    /// Test message received
    Test,
    /// Message could not be framed or parsed
    Malformed,
    /// Controller elected a feed
    Locked,
    /// Controller released a feed that went down
    Unlocked,
    /// No feed is connected
    AllFeedsDown,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Connected => "connected",
            EventKind::ConnectFailed => "connect_failed",
            EventKind::ConnectionLost => "connection_lost",
            EventKind::Alert => "alert",
            EventKind::Heartbeat => "heartbeat",
            EventKind::Test => "test",
            EventKind::Malformed => "malformed",
            EventKind::Locked => "locked",
            EventKind::Unlocked => "unlocked",
            EventKind::AllFeedsDown => "all_feeds_down",
        };
        f.write_str(s)
    }
}

/// A single observable event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub severity: Severity,
    /// Feed name, or [`CONTROL_SOURCE`]
    pub source: String,
    pub kind: EventKind,
    pub detail: String,
}

impl Event {
    pub fn new(
        severity: Severity,
        source: impl Into<String>,
        kind: EventKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            source: source.into(),
            kind,
            detail: detail.into(),
        }
    }
}

/// Destination for events.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &Event);
}

/// Sink forwarding every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &Event) {
        let source = event.source.as_str();
        let detail = event.detail.as_str();
        match event.severity {
            Severity::Debug => debug!(source, kind = %event.kind, detail, "naads event"),
            Severity::Info => info!(source, kind = %event.kind, detail, "naads event"),
            Severity::Warn => warn!(source, kind = %event.kind, detail, "naads event"),
            Severity::Error => error!(source, kind = %event.kind, detail, "naads event"),
        }
    }
}

/// Sink discarding every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &Event) {}
}

/// Sink keeping every event in memory, for status pages and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: std::sync::Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything emitted so far
    pub fn events(&self) -> Vec<Event> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Events of one kind
    pub fn of_kind(&self, kind: EventKind) -> Vec<Event> {
        self.events().into_iter().filter(|e| e.kind == kind).collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &Event) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
