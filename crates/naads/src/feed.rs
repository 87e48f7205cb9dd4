//! Feed reader: one TCP connection to one upstream feed server.

use crate::alert::{Alert, AlertParser};
use crate::events::{Event, EventKind, EventSink, Severity};
use crate::framer::{CHUNK_SIZE, Frame, Framer};
use crate::types::{
    CHANNEL_CAPACITY, FeedConfig, FeedSnapshot, FeedState, FeedStatus, MessageKind,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Client for a single NAADS feed server.
///
/// [`FeedReader::start`] spawns one long-lived task that connects, frames
/// the byte stream into CAP messages, parses them and publishes the result
/// on a bounded channel. Connection failures are retried forever.
pub struct FeedReader {
    config: Arc<FeedConfig>,
    state: Arc<FeedState>,
    parser: Arc<dyn AlertParser>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
    started: AtomicBool,
}

/// Why a connected session ended
enum SessionEnd {
    /// Read error, EOF or liveness deadline
    Lost(String),
    /// Cancelled or the consumer dropped the channel
    Shutdown,
}

/// Everything the reader task owns
struct Session {
    config: Arc<FeedConfig>,
    state: Arc<FeedState>,
    parser: Arc<dyn AlertParser>,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
    tx: mpsc::Sender<Alert>,
}

impl FeedReader {
    /// Create a new feed reader
    pub fn new(
        config: FeedConfig,
        parser: Arc<dyn AlertParser>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(FeedState::new()),
            parser,
            sink,
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Start the reader and return its alert channel.
    ///
    /// Returns immediately; must be called from within a tokio runtime.
    pub fn start(&self) -> common::Result<mpsc::Receiver<Alert>> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(common::Error::feed(format!(
                "feed {} already started",
                self.config.name
            )));
        }

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let session = Session {
            config: self.config.clone(),
            state: self.state.clone(),
            parser: self.parser.clone(),
            sink: self.sink.clone(),
            cancel: self.cancel.clone(),
            tx,
        };

        tokio::spawn(session.run());
        Ok(rx)
    }

    /// Stop the reader task. The connection is closed and the channel ends.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Snapshot for status reporting. `Locked` is decided by the controller.
    pub async fn snapshot(&self) -> FeedSnapshot {
        let connected = self.state.is_connected();
        let last_message = self.state.last_message().await;
        FeedSnapshot {
            name: self.config.name.clone(),
            host: self.config.host.clone(),
            port: self.config.port,
            status: if connected {
                FeedStatus::Active
            } else {
                FeedStatus::Down
            },
            connected,
            last_message_age_secs: last_message.as_ref().map(|m| m.age().as_secs()),
            last_message,
            counters: self.state.counters(),
            config: (*self.config).clone(),
        }
    }
}

impl Drop for FeedReader {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Session {
    /// Connection loop: Connecting -> Reading -> Disconnected -> Connecting.
    async fn run(self) {
        let mut chunk = vec![0u8; CHUNK_SIZE];
        let mut framer = Framer::new();

        loop {
            let connect = timeout(
                self.config.connect_timeout,
                TcpStream::connect((self.config.host.as_str(), self.config.port)),
            );
            let result = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = connect => result,
            };

            let mut stream = match result {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    self.connect_failed(&e.to_string());
                    if !self.pause(self.config.reconnect_delay).await {
                        break;
                    }
                    continue;
                }
                Err(_) => {
                    self.connect_failed("connection attempt timed out");
                    if !self.pause(self.config.reconnect_delay).await {
                        break;
                    }
                    continue;
                }
            };

            self.state.set_connected(true);
            self.emit(
                Severity::Info,
                EventKind::Connected,
                format!("established connection with {}", self.config.address()),
            );

            framer.reset();
            let end = self.read_session(&mut stream, &mut chunk, &mut framer).await;
            self.state.set_connected(false);
            drop(stream);

            match end {
                SessionEnd::Shutdown => break,
                SessionEnd::Lost(reason) => {
                    self.state.record_disconnect();
                    self.emit(
                        Severity::Error,
                        EventKind::ConnectionLost,
                        format!(
                            "lost connection with {} ({}); reconnecting",
                            self.config.address(),
                            reason
                        ),
                    );
                    if !self.pause(self.config.connect_timeout).await {
                        break;
                    }
                }
            }
        }

        self.state.set_connected(false);
        debug!(feed = %self.config.name, "Feed reader stopped");
    }

    /// Read until the connection fails, goes silent, or the task is shut down.
    async fn read_session(
        &self,
        stream: &mut TcpStream,
        chunk: &mut [u8],
        framer: &mut Framer,
    ) -> SessionEnd {
        loop {
            let read = timeout(self.config.liveness_timeout, stream.read(chunk));
            let result = tokio::select! {
                _ = self.cancel.cancelled() => return SessionEnd::Shutdown,
                result = read => result,
            };

            let n = match result {
                Ok(Ok(0)) => return SessionEnd::Lost("connection closed by peer".to_string()),
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return SessionEnd::Lost(e.to_string()),
                Err(_) => {
                    return SessionEnd::Lost(format!(
                        "no data within liveness timeout of {:?}",
                        self.config.liveness_timeout
                    ));
                }
            };

            for frame in framer.push(&chunk[..n]) {
                if !self.handle_frame(frame).await {
                    return SessionEnd::Shutdown;
                }
            }
        }
    }

    /// Parse, classify, count and forward one frame. Returns false when the
    /// reader should shut down.
    async fn handle_frame(&self, frame: Frame) -> bool {
        let message = match frame {
            Frame::Complete(message) => message,
            Frame::Truncated { discarded } => {
                self.state.record_unknown();
                self.emit(
                    Severity::Error,
                    EventKind::Malformed,
                    format!("truncated message ({} bytes discarded)", discarded),
                );
                return true;
            }
        };

        let alert = match self.parser.parse(message.as_bytes()) {
            Ok(alert) => alert,
            Err(e) => {
                self.state.record_unknown();
                self.emit(Severity::Error, EventKind::Malformed, e.to_string());
                return true;
            }
        };

        let kind = MessageKind::classify(&alert);
        self.state.record_message(kind, &alert.identifier).await;

        match kind {
            MessageKind::Heartbeat => {
                if self.config.log_heartbeats {
                    self.emit(Severity::Debug, EventKind::Heartbeat, alert.identifier.clone());
                }
                if !self.config.forward_heartbeats {
                    return true;
                }
            }
            MessageKind::Test => {
                self.emit(Severity::Info, EventKind::Test, alert.identifier.clone());
            }
            MessageKind::Alert => {
                self.emit(Severity::Info, EventKind::Alert, alert.identifier.clone());
            }
        }

        tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(alert) => sent.is_ok(),
        }
    }

    fn connect_failed(&self, reason: &str) {
        self.state.set_connected(false);
        self.emit(
            Severity::Error,
            EventKind::ConnectFailed,
            format!(
                "cannot establish connection with {} ({}); retrying in {:?}",
                self.config.address(),
                reason,
                self.config.reconnect_delay
            ),
        );
    }

    /// Sleep unless cancelled. Returns false if cancelled.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = sleep(delay) => true,
        }
    }

    fn emit(&self, severity: Severity, kind: EventKind, detail: String) {
        if self.config.logging {
            self.sink
                .emit(&Event::new(severity, self.config.name.clone(), kind, detail));
        }
    }
}
