//! Highly available client for the National Alert Aggregation & Dissemination
//! System (NAADS).
//!
//! The upstream system streams CAP/XML alerts over plain TCP from several
//! independent feed servers. This crate connects to all of them, keeps
//! exactly one feed elected at a time and republishes a single alert stream:
//!
//! - [`FeedReader`]: one connection per feed, framing, parsing and
//!   reconnect-forever logic
//! - [`FailoverController`]: periodic health checks, priority-ordered
//!   election, and forwarding of the elected feed only
//! - [`EventSink`]: structured events for logging and dashboards
//!
//! # Example
//!
//! ```no_run
//! use naads::{CapParser, ControllerConfig, FailoverController, FeedConfig, FeedReader, TracingSink};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let parser = Arc::new(CapParser::new());
//! let sink = Arc::new(TracingSink);
//!
//! let feeds = ["streaming1.naad-adna.pelmorexmedia.com", "streaming2.naad-adna.pelmorexmedia.com"]
//!     .iter()
//!     .enumerate()
//!     .map(|(i, host)| {
//!         let config = FeedConfig::new(format!("NAAD-{}", i + 1), *host);
//!         Arc::new(FeedReader::new(config, parser.clone(), sink.clone()))
//!     })
//!     .collect();
//!
//! let controller = FailoverController::new(feeds, ControllerConfig::default(), sink)?;
//! let mut alerts = controller.start()?;
//!
//! while let Some(alert) = alerts.recv().await {
//!     println!("{} from {}", alert.identifier, alert.sender);
//! }
//! # Ok(())
//! # }
//! ```

pub mod alert;
pub mod controller;
pub mod events;
pub mod feed;
pub mod framer;
pub mod types;

pub use alert::{Alert, AlertParser, AlertStatus, CapParser, HEARTBEAT_SENDER, ParseError};
pub use controller::{FailoverController, UNLOCKED};
pub use events::{Event, EventKind, EventSink, MemorySink, NullSink, Severity, TracingSink};
pub use feed::FeedReader;
pub use framer::{Frame, Framer, Message};
pub use types::{
    ClusterSnapshot, ControllerConfig, FeedConfig, FeedCounters, FeedSnapshot, FeedState,
    FeedStatus, LastMessage, MessageKind,
};
