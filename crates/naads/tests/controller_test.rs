//! Integration tests for FailoverController across several loopback feeds

mod common;

use common::{FakeFeed, alert, feed_config, heartbeat, wait_for};
use naads::{
    CapParser, ControllerConfig, EventKind, EventSink, FailoverController, FeedReader, FeedStatus,
    MemorySink,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn controller(ports: &[u16]) -> (FailoverController, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let parser = Arc::new(CapParser::new());
    let feeds = ports
        .iter()
        .enumerate()
        .map(|(i, port)| {
            Arc::new(FeedReader::new(
                feed_config(&format!("feed-{}", i), *port),
                parser.clone(),
                sink.clone() as Arc<dyn EventSink>,
            ))
        })
        .collect();

    let config = ControllerConfig {
        check_interval: Duration::from_millis(50),
        ..ControllerConfig::default()
    };
    let controller = FailoverController::new(feeds, config, sink.clone()).unwrap();
    (controller, sink)
}

#[tokio::test]
async fn test_forwards_only_elected_feed() {
    let primary = FakeFeed::start().await;
    let backup = FakeFeed::start().await;
    let (ctl, _sink) = controller(&[primary.port, backup.port]);
    let mut rx = ctl.start().unwrap();

    primary.wait_connected().await;
    backup.wait_connected().await;
    assert!(wait_for(Duration::from_secs(2), || ctl.active_index() == Some(0)).await);

    primary.send(alert("from-primary").as_bytes()).await;
    backup.send(alert("from-backup").as_bytes()).await;

    let received = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("Timeout waiting for alert")
        .expect("Channel closed");
    assert_eq!(received.identifier, "from-primary");

    // the standby feed still parses and counts its copy
    assert!(wait_for(Duration::from_secs(2), || ctl.feeds()[1].state().counters().alerts == 1).await);
    assert!(timeout(Duration::from_millis(200), rx.recv()).await.is_err());
    ctl.stop();
}

#[tokio::test]
async fn test_fails_over_when_elected_feed_drops() {
    let primary = FakeFeed::start().await;
    let backup = FakeFeed::start().await;
    let (ctl, sink) = controller(&[primary.port, backup.port]);
    let mut rx = ctl.start().unwrap();

    primary.wait_connected().await;
    backup.wait_connected().await;
    assert!(wait_for(Duration::from_secs(2), || ctl.active_index() == Some(0)).await);

    primary.shutdown().await;
    assert!(wait_for(Duration::from_secs(2), || ctl.active_index() == Some(1)).await);
    assert!(!sink.of_kind(EventKind::Unlocked).is_empty());

    backup.send(alert("after-failover").as_bytes()).await;
    let received = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("Timeout waiting for alert")
        .expect("Channel closed");
    assert_eq!(received.identifier, "after-failover");

    let snapshot = ctl.snapshot().await;
    assert_eq!(snapshot.active_feed.as_deref(), Some("feed-1"));
    assert_eq!(snapshot.feeds[0].status, FeedStatus::Down);
    assert_eq!(snapshot.feeds[1].status, FeedStatus::Locked);
    assert!(snapshot.feeds[0].counters.disconnects >= 1);
    assert!(snapshot.elections >= 2);
    ctl.stop();
}

#[tokio::test]
async fn test_all_feeds_down_then_recovers() {
    let server = FakeFeed::start().await;
    let port = server.port;
    let (ctl, sink) = controller(&[port]);
    let _rx = ctl.start().unwrap();

    server.wait_connected().await;
    assert!(wait_for(Duration::from_secs(2), || ctl.active_index() == Some(0)).await);

    server.shutdown().await;
    assert!(wait_for(Duration::from_secs(2), || ctl.active_index().is_none()).await);
    assert!(
        wait_for(Duration::from_secs(1), || sink.of_kind(EventKind::AllFeedsDown).len() == 1).await
    );

    // stays reported once while the outage lasts
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(sink.of_kind(EventKind::AllFeedsDown).len(), 1);

    let server = FakeFeed::bind(port).await;
    server.wait_connected().await;
    assert!(wait_for(Duration::from_secs(3), || ctl.active_index() == Some(0)).await);
    ctl.stop();
}

#[tokio::test]
async fn test_heartbeats_never_reach_merged_channel_when_disabled() {
    let server = FakeFeed::start().await;
    let (ctl, _sink) = controller(&[server.port]);
    let mut rx = ctl.start().unwrap();

    server.wait_connected().await;
    assert!(wait_for(Duration::from_secs(2), || ctl.active_index() == Some(0)).await);

    server.send(heartbeat("hb-1").as_bytes()).await;
    server.send(heartbeat("hb-2").as_bytes()).await;
    server.send(alert("real-alert").as_bytes()).await;

    let received = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("Timeout waiting for alert")
        .expect("Channel closed");
    assert_eq!(received.identifier, "real-alert");
    assert_eq!(ctl.feeds()[0].state().counters().heartbeats, 2);
    ctl.stop();
}

#[tokio::test]
async fn test_stop_ends_merged_channel() {
    let server = FakeFeed::start().await;
    let (ctl, _sink) = controller(&[server.port]);
    let mut rx = ctl.start().unwrap();
    server.wait_connected().await;

    ctl.stop();
    let end = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("Timeout waiting for channel close");
    assert!(end.is_none());
}

#[tokio::test]
async fn test_start_twice_fails() {
    let server = FakeFeed::start().await;
    let (ctl, _sink) = controller(&[server.port]);
    let _rx = ctl.start().unwrap();
    assert!(ctl.start().is_err());
    ctl.stop();
}
