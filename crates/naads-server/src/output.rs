//! Consumer of the merged alert stream.

use crate::metrics::MetricsRegistry;
use crate::types::OutputFormat;
use naads::{Alert, MessageKind};
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// One line of `json` output
#[derive(Debug, Serialize)]
struct AlertRecord<'a> {
    kind: MessageKind,
    #[serde(flatten)]
    alert: &'a Alert,
    raw: &'a str,
}

/// Publishes every alert delivered by the failover controller
pub struct AlertPublisher<W> {
    format: OutputFormat,
    writer: W,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl AlertPublisher<std::io::Stdout> {
    /// Publisher writing to stdout
    pub fn stdout(format: OutputFormat, metrics: Option<Arc<MetricsRegistry>>) -> Self {
        Self::new(format, std::io::stdout(), metrics)
    }
}

impl<W: Write> AlertPublisher<W> {
    pub fn new(format: OutputFormat, writer: W, metrics: Option<Arc<MetricsRegistry>>) -> Self {
        Self {
            format,
            writer,
            metrics,
        }
    }

    /// Consume alerts until the channel closes
    pub async fn run(mut self, mut alerts: mpsc::Receiver<Alert>) {
        while let Some(alert) = alerts.recv().await {
            if let Err(e) = self.publish(&alert) {
                warn!(identifier = %alert.identifier, error = %e, "Failed to publish alert");
            }
        }
        info!("Alert stream closed");
    }

    /// Publish one alert
    pub fn publish(&mut self, alert: &Alert) -> common::Result<()> {
        match self.format {
            OutputFormat::Log => {
                info!(
                    kind = %MessageKind::classify(alert),
                    identifier = %alert.identifier,
                    sender = %alert.sender,
                    sent = %alert.sent,
                    status = %alert.status,
                    msg_type = %alert.msg_type,
                    "Alert received"
                );
            }
            OutputFormat::Json => {
                let record = AlertRecord {
                    kind: MessageKind::classify(alert),
                    alert,
                    raw: alert.raw_str().unwrap_or_default(),
                };
                serde_json::to_writer(&mut self.writer, &record)?;
                self.writer.write_all(b"\n")?;
                self.writer.flush()?;
            }
            OutputFormat::None => {}
        }

        if let Some(ref m) = self.metrics {
            m.record_alert_published();
        }
        Ok(())
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}
