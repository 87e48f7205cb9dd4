//! HTML status page.

use naads::{ClusterSnapshot, FeedSnapshot, FeedStatus};
use std::fmt::Write;
use std::time::{Duration, SystemTime};

const STYLE: &str = "body{font-family:monospace;margin:2em}\
table{border-collapse:collapse;margin-bottom:2em}\
td,th{border:1px solid #999;padding:4px 10px;text-align:left}\
.status-locked{background:#4caf50;color:#fff}\
.status-active{background:#2196f3;color:#fff}\
.status-down{background:#f44336;color:#fff}";

/// Render the status page for one snapshot
pub fn render(snapshot: &ClusterSnapshot, now: SystemTime) -> String {
    let mut page = String::with_capacity(4096);
    // Writing to a String cannot fail
    let _ = write_page(&mut page, snapshot, now);
    page
}

fn write_page(out: &mut String, snapshot: &ClusterSnapshot, now: SystemTime) -> std::fmt::Result {
    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(
        out,
        "<html><head><meta charset=\"utf-8\"><title>NAADS Status</title><style>{}</style></head><body>",
        STYLE
    )?;
    writeln!(out, "<h1>NAADS Status</h1>")?;
    writeln!(out, "<table>")?;
    writeln!(out, "<tr><th>Version</th><td>{}</td></tr>", env!("CARGO_PKG_VERSION"))?;
    writeln!(out, "<tr><th>Uptime</th><td>{}</td></tr>", format_uptime(snapshot.uptime))?;
    writeln!(
        out,
        "<tr><th>Time (UTC)</th><td>{}</td></tr>",
        humantime::format_rfc3339_seconds(now)
    )?;
    writeln!(out, "<tr><th>Elections</th><td>{}</td></tr>", snapshot.elections)?;
    writeln!(out, "</table>")?;

    writeln!(out, "<h2>Feeds</h2>")?;
    writeln!(
        out,
        "<table><tr><th>Status</th><th>Name</th><th>Host</th><th>Last Message</th>\
         <th>Received</th><th>Alerts</th><th>Heartbeats</th><th>Tests</th>\
         <th>Unknown</th><th>Disconnections</th></tr>"
    )?;
    for feed in &snapshot.feeds {
        write_feed_status(out, feed)?;
    }
    writeln!(out, "</table>")?;

    writeln!(out, "<h2>Configuration</h2>")?;
    writeln!(
        out,
        "<table><tr><th>Name</th><th>Host</th><th>Send Heartbeat</th>\
         <th>Connect Timeout</th><th>Liveness Timeout</th><th>Reconnect Delay</th>\
         <th>Logging</th><th>Log Heartbeat</th></tr>"
    )?;
    for feed in &snapshot.feeds {
        write_feed_config(out, feed)?;
    }
    writeln!(out, "</table>")?;
    writeln!(out, "</body></html>")
}

fn write_feed_status(out: &mut String, feed: &FeedSnapshot) -> std::fmt::Result {
    let last_message = feed
        .last_message
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_default();
    let counters = &feed.counters;

    writeln!(
        out,
        "<tr><td class=\"{}\">{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
         <td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
        status_class(feed.status),
        feed.status,
        escape(&feed.name),
        escape(&feed.config.address()),
        escape(&last_message),
        format_age(feed.last_message_age_secs),
        counters.alerts,
        counters.heartbeats,
        counters.tests,
        counters.unknown,
        counters.disconnects,
    )
}

fn write_feed_config(out: &mut String, feed: &FeedSnapshot) -> std::fmt::Result {
    let config = &feed.config;
    writeln!(
        out,
        "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
         <td>{}</td><td>{}</td></tr>",
        escape(&config.name),
        escape(&config.address()),
        yes_no(config.forward_heartbeats),
        format_seconds(config.connect_timeout),
        format_seconds(config.liveness_timeout),
        format_seconds(config.reconnect_delay),
        yes_no(config.logging),
        yes_no(config.log_heartbeats),
    )
}

fn status_class(status: FeedStatus) -> &'static str {
    match status {
        FeedStatus::Locked => "status-locked",
        FeedStatus::Active => "status-active",
        FeedStatus::Down => "status-down",
    }
}

/// "D days H hours M minutes S seconds"
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!(
        "{} days {} hours {} minutes {} seconds",
        secs / 86_400,
        (secs / 3_600) % 24,
        (secs / 60) % 60,
        secs % 60
    )
}

/// "(N seconds ago)", or "N/A" when nothing was received yet
pub fn format_age(age_secs: Option<u64>) -> String {
    match age_secs {
        Some(secs) => format!("({} seconds ago)", secs),
        None => "N/A".to_string(),
    }
}

fn format_seconds(duration: Duration) -> String {
    format!("{}s", duration.as_secs())
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "YES" } else { "NO" }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
