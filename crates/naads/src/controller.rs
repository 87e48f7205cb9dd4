//! Failover controller: keeps exactly one feed "hot" and merges its output.

use crate::alert::Alert;
use crate::events::{CONTROL_SOURCE, Event, EventKind, EventSink, Severity};
use crate::feed::FeedReader;
use crate::types::{ClusterSnapshot, ControllerConfig, FeedStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Instant, SystemTime};
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Sentinel stored in the active index while no feed is elected
pub const UNLOCKED: usize = usize::MAX;

/// Owns an ordered list of feeds (first = most preferred), elects the
/// active one on every health check and forwards only its alerts.
pub struct FailoverController {
    inner: Arc<Cluster>,
    config: ControllerConfig,
    cancel: CancellationToken,
    started: AtomicBool,
}

/// State shared between the controller's tasks
struct Cluster {
    feeds: Vec<Arc<FeedReader>>,
    active: AtomicUsize,
    elections: AtomicU64,
    all_down_reported: AtomicBool,
    started_at: SystemTime,
    started_instant: Instant,
    sink: Arc<dyn EventSink>,
    logging: bool,
}

impl FailoverController {
    /// Create a controller over `feeds` in priority order
    pub fn new(
        feeds: Vec<Arc<FeedReader>>,
        config: ControllerConfig,
        sink: Arc<dyn EventSink>,
    ) -> common::Result<Self> {
        if feeds.is_empty() {
            return Err(common::Error::config("at least one feed is required"));
        }
        config.validate()?;
        for feed in &feeds {
            feed.config().validate()?;
        }

        Ok(Self {
            inner: Arc::new(Cluster {
                feeds,
                active: AtomicUsize::new(UNLOCKED),
                elections: AtomicU64::new(0),
                all_down_reported: AtomicBool::new(false),
                started_at: SystemTime::now(),
                started_instant: Instant::now(),
                sink,
                logging: config.logging,
            }),
            config,
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
        })
    }

    /// Start every feed, the forwarding tasks and the health-check loop.
    ///
    /// Returns the merged output channel immediately.
    pub fn start(&self) -> common::Result<mpsc::Receiver<Alert>> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(common::Error::feed("controller already started"));
        }

        let (tx, rx) = mpsc::channel(self.config.channel_capacity);

        for (index, feed) in self.inner.feeds.iter().enumerate() {
            let feed_rx = feed.start()?;
            let cluster = self.inner.clone();
            let cancel = self.cancel.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                cluster.forward(index, feed_rx, tx, cancel).await;
            });
        }

        let cluster = self.inner.clone();
        let cancel = self.cancel.clone();
        let check_interval = self.config.check_interval;
        tokio::spawn(async move {
            let mut ticker = interval(check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // Skip first immediate tick

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        cluster.check_health();
                    }
                    _ = cancel.cancelled() => {
                        debug!("Health check loop stopping");
                        break;
                    }
                }
            }
        });

        info!(feeds = self.inner.feeds.len(), "Failover controller started");
        Ok(rx)
    }

    /// Stop the health loop, the forwarding tasks and every feed.
    pub fn stop(&self) {
        self.cancel.cancel();
        for feed in &self.inner.feeds {
            feed.stop();
        }
    }

    /// Run one health check now. Returns the elected index, if any.
    pub fn check_health(&self) -> Option<usize> {
        self.inner.check_health()
    }

    /// Currently elected feed
    pub fn active_index(&self) -> Option<usize> {
        self.inner.active_index()
    }

    pub fn feeds(&self) -> &[Arc<FeedReader>] {
        &self.inner.feeds
    }

    /// Snapshot of the cluster for status reporting
    pub async fn snapshot(&self) -> ClusterSnapshot {
        let active_index = self.active_index();
        let mut feeds = Vec::with_capacity(self.inner.feeds.len());
        for (index, feed) in self.inner.feeds.iter().enumerate() {
            let mut snapshot = feed.snapshot().await;
            if snapshot.connected && active_index == Some(index) {
                snapshot.status = FeedStatus::Locked;
            }
            feeds.push(snapshot);
        }

        ClusterSnapshot {
            started_at: self.inner.started_at,
            uptime: self.inner.started_instant.elapsed(),
            active_index,
            active_feed: active_index.map(|i| self.inner.feeds[i].name().to_string()),
            elections: self.inner.elections.load(Ordering::Relaxed),
            feeds,
        }
    }
}

impl Drop for FailoverController {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Cluster {
    fn active_index(&self) -> Option<usize> {
        match self.active.load(Ordering::Acquire) {
            UNLOCKED => None,
            index => Some(index),
        }
    }

    /// One health-check tick.
    fn check_health(&self) -> Option<usize> {
        if let Some(current) = self.active_index() {
            let feed = &self.feeds[current];
            if feed.is_connected() {
                return Some(current);
            }

            self.active.store(UNLOCKED, Ordering::Release);
            self.emit(
                Severity::Warn,
                EventKind::Unlocked,
                format!("{} is down; unlocking", feed.name()),
            );
        }

        match self.feeds.iter().position(|feed| feed.is_connected()) {
            Some(index) => {
                self.active.store(index, Ordering::Release);
                self.elections.fetch_add(1, Ordering::Relaxed);
                self.all_down_reported.store(false, Ordering::Relaxed);
                self.emit(
                    Severity::Info,
                    EventKind::Locked,
                    format!("successfully locked feed to {}", self.feeds[index].name()),
                );
                Some(index)
            }
            None => {
                if !self.all_down_reported.swap(true, Ordering::Relaxed) {
                    self.emit(
                        Severity::Error,
                        EventKind::AllFeedsDown,
                        "all feeds are down; waiting for a feed to reconnect",
                    );
                }
                None
            }
        }
    }

    /// Drain one feed's channel, forwarding only while that feed is active.
    async fn forward(
        &self,
        index: usize,
        mut feed_rx: mpsc::Receiver<Alert>,
        tx: mpsc::Sender<Alert>,
        cancel: CancellationToken,
    ) {
        loop {
            let alert = tokio::select! {
                _ = cancel.cancelled() => break,
                alert = feed_rx.recv() => match alert {
                    Some(alert) => alert,
                    None => break,
                },
            };

            if self.active.load(Ordering::Acquire) != index {
                debug!(
                    feed = %self.feeds[index].name(),
                    identifier = %alert.identifier,
                    "Discarding alert from standby feed"
                );
                continue;
            }

            let sent = tokio::select! {
                _ = cancel.cancelled() => break,
                sent = tx.send(alert) => sent,
            };
            if sent.is_err() {
                break;
            }
        }
    }

    fn emit(&self, severity: Severity, kind: EventKind, detail: impl Into<String>) {
        if self.logging {
            self.sink
                .emit(&Event::new(severity, CONTROL_SOURCE, kind, detail));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::CapParser;
    use crate::events::{MemorySink, MockEventSink, NullSink};
    use crate::types::FeedConfig;

    fn feeds(count: usize) -> Vec<Arc<FeedReader>> {
        (0..count)
            .map(|i| {
                Arc::new(FeedReader::new(
                    FeedConfig::new(format!("feed-{}", i), "127.0.0.1"),
                    Arc::new(CapParser::new()),
                    Arc::new(NullSink),
                ))
            })
            .collect()
    }

    fn controller(feeds: Vec<Arc<FeedReader>>, sink: Arc<dyn EventSink>) -> FailoverController {
        FailoverController::new(feeds, ControllerConfig::default(), sink).unwrap()
    }

    #[test]
    fn test_rejects_empty_feed_list() {
        let result = FailoverController::new(vec![], ControllerConfig::default(), Arc::new(NullSink));
        assert!(result.is_err());
    }

    #[test]
    fn test_starts_unlocked() {
        let ctl = controller(feeds(2), Arc::new(NullSink));
        assert_eq!(ctl.active_index(), None);
    }

    #[test]
    fn test_elects_only_connected_feed() {
        let feeds = feeds(2);
        feeds[0].state().set_connected(true);
        let ctl = controller(feeds, Arc::new(NullSink));

        assert_eq!(ctl.check_health(), Some(0));
        assert_eq!(ctl.active_index(), Some(0));
    }

    #[test]
    fn test_failover_to_next_connected_feed_in_same_tick() {
        let feeds = feeds(2);
        feeds[0].state().set_connected(true);
        feeds[1].state().set_connected(true);
        let sink = Arc::new(MemorySink::new());
        let ctl = controller(feeds.clone(), sink.clone());

        assert_eq!(ctl.check_health(), Some(0));

        feeds[0].state().set_connected(false);
        assert_eq!(ctl.check_health(), Some(1));
        assert_eq!(sink.of_kind(EventKind::Unlocked).len(), 1);
        assert_eq!(sink.of_kind(EventKind::Locked).len(), 2);
    }

    #[test]
    fn test_all_down_stays_unlocked_and_reports_once() {
        let feeds = feeds(2);
        feeds[0].state().set_connected(true);
        let sink = Arc::new(MemorySink::new());
        let ctl = controller(feeds.clone(), sink.clone());

        assert_eq!(ctl.check_health(), Some(0));
        feeds[0].state().set_connected(false);

        assert_eq!(ctl.check_health(), None);
        assert_eq!(ctl.check_health(), None);
        assert_eq!(ctl.active_index(), None);
        assert_eq!(sink.of_kind(EventKind::AllFeedsDown).len(), 1);

        // self-heals once any feed comes back
        feeds[1].state().set_connected(true);
        assert_eq!(ctl.check_health(), Some(1));

        feeds[1].state().set_connected(false);
        assert_eq!(ctl.check_health(), None);
        assert_eq!(sink.of_kind(EventKind::AllFeedsDown).len(), 2);
    }

    #[test]
    fn test_lowest_connected_index_wins() {
        let feeds = feeds(4);
        feeds[2].state().set_connected(true);
        feeds[3].state().set_connected(true);
        let ctl = controller(feeds, Arc::new(NullSink));

        assert_eq!(ctl.check_health(), Some(2));
    }

    #[test]
    fn test_no_preemption_while_active_feed_is_healthy() {
        let feeds = feeds(2);
        feeds[1].state().set_connected(true);
        let ctl = controller(feeds.clone(), Arc::new(NullSink));
        assert_eq!(ctl.check_health(), Some(1));

        feeds[0].state().set_connected(true);
        assert_eq!(ctl.check_health(), Some(1));
    }

    #[test]
    fn test_election_matches_lowest_connected_for_all_patterns() {
        for mask in 0u32..16 {
            let feeds = feeds(4);
            for (i, feed) in feeds.iter().enumerate() {
                feed.state().set_connected(mask & (1 << i) != 0);
            }
            let ctl = controller(feeds, Arc::new(NullSink));
            let expected = (0..4).find(|i| mask & (1 << i) != 0);
            assert_eq!(ctl.check_health(), expected, "mask {:04b}", mask);
        }
    }

    #[test]
    fn test_repeated_ticks_emit_single_lock() {
        let feeds = feeds(2);
        feeds[0].state().set_connected(true);

        let mut sink = MockEventSink::new();
        sink.expect_emit()
            .withf(|e| e.kind == EventKind::Locked && e.source == CONTROL_SOURCE)
            .times(1)
            .return_const(());

        let ctl = controller(feeds, Arc::new(sink));
        for _ in 0..5 {
            assert_eq!(ctl.check_health(), Some(0));
        }
        assert_eq!(ctl.inner.elections.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_logging_disabled_emits_nothing() {
        let feeds = feeds(1);
        let sink = Arc::new(MemorySink::new());
        let config = ControllerConfig {
            logging: false,
            ..ControllerConfig::default()
        };
        let ctl = FailoverController::new(feeds, config, sink.clone()).unwrap();

        assert_eq!(ctl.check_health(), None);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_marks_locked_feed() {
        let feeds = feeds(2);
        feeds[0].state().set_connected(true);
        feeds[1].state().set_connected(true);
        let ctl = controller(feeds, Arc::new(NullSink));
        ctl.check_health();

        let snapshot = ctl.snapshot().await;
        assert_eq!(snapshot.active_index, Some(0));
        assert_eq!(snapshot.active_feed.as_deref(), Some("feed-0"));
        assert_eq!(snapshot.feeds[0].status, FeedStatus::Locked);
        assert_eq!(snapshot.feeds[1].status, FeedStatus::Active);
        assert_eq!(snapshot.elections, 1);
    }
}
