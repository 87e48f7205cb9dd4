//! Shared helpers for the feed and controller integration tests.

#![allow(dead_code)]

use naads::{FeedConfig, HEARTBEAT_SENDER};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Build a CAP document with the given header values
pub fn cap(identifier: &str, sender: &str, status: &str) -> String {
    format!(
        "<?xml version='1.0' encoding='UTF-8' standalone='no'?>\n\
         <alert xmlns=\"urn:oasis:names:tc:emergency:cap:1.2\">\
         <identifier>{}</identifier><sender>{}</sender>\
         <sent>2019-03-02T19:00:00-00:00</sent><status>{}</status>\
         <msgType>Alert</msgType><scope>Public</scope></alert>\n",
        identifier, sender, status
    )
}

pub fn alert(identifier: &str) -> String {
    cap(identifier, "cap-pac@canada.ca", "Actual")
}

pub fn heartbeat(identifier: &str) -> String {
    cap(identifier, HEARTBEAT_SENDER, "System")
}

/// Route reader and controller events to the test output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("naads=debug")
        .with_test_writer()
        .try_init();
}

/// Feed config pointing at a local port with short timeouts
pub fn feed_config(name: &str, port: u16) -> FeedConfig {
    init_tracing();
    FeedConfig {
        port,
        connect_timeout: Duration::from_millis(200),
        liveness_timeout: Duration::from_millis(500),
        reconnect_delay: Duration::from_millis(100),
        ..FeedConfig::new(name, "127.0.0.1")
    }
}

/// Port with nothing listening on it
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Poll `check` until it holds or `limit` elapses
pub async fn wait_for(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Minimal upstream feed server. Keeps the most recent connection.
pub struct FakeFeed {
    pub port: u16,
    conn: Arc<Mutex<Option<TcpStream>>>,
    accepts: Arc<std::sync::atomic::AtomicUsize>,
    accept_task: JoinHandle<()>,
}

impl FakeFeed {
    pub async fn start() -> Self {
        Self::bind(0).await
    }

    pub async fn bind(port: u16) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let conn = Arc::new(Mutex::new(None));
        let accepts = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let conn_clone = conn.clone();
        let accepts_clone = accepts.clone();
        let accept_task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                *conn_clone.lock().await = Some(stream);
                accepts_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        });

        Self {
            port,
            conn,
            accepts,
            accept_task,
        }
    }

    /// Number of connections accepted so far
    pub fn accepts(&self) -> usize {
        self.accepts.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub async fn wait_connected(&self) {
        assert!(
            wait_for(Duration::from_secs(3), || self.accepts() > 0).await,
            "reader never connected"
        );
    }

    pub async fn send(&self, bytes: &[u8]) {
        let mut guard = self.conn.lock().await;
        let stream = guard.as_mut().expect("no reader connected");
        stream.write_all(bytes).await.unwrap();
        stream.flush().await.unwrap();
    }

    /// Close the current connection but keep accepting new ones
    pub async fn drop_connection(&self) {
        self.conn.lock().await.take();
    }

    /// Stop listening and close the current connection
    pub async fn shutdown(self) {
        self.accept_task.abort();
        let _ = self.accept_task.await;
        self.conn.lock().await.take();
    }
}
