//! CAP alert model and parser.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sender used by the upstream system for keep-alive messages.
pub const HEARTBEAT_SENDER: &str = "NAADS-Heartbeat";

/// CAP 1.2 `<status>` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertStatus {
    /// Actionable by all targeted recipients
    Actual,
    /// Actionable only by designated exercise participants
    Exercise,
    /// Messages supporting alert network internal functions
    System,
    /// Technical testing only
    Test,
    /// Preliminary template or draft
    Draft,
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertStatus::Actual => "Actual",
            AlertStatus::Exercise => "Exercise",
            AlertStatus::System => "System",
            AlertStatus::Test => "Test",
            AlertStatus::Draft => "Draft",
        };
        f.write_str(s)
    }
}

impl FromStr for AlertStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Actual" => Ok(AlertStatus::Actual),
            "Exercise" => Ok(AlertStatus::Exercise),
            "System" => Ok(AlertStatus::System),
            "Test" => Ok(AlertStatus::Test),
            "Draft" => Ok(AlertStatus::Draft),
            other => Err(ParseError::InvalidStatus(other.to_string())),
        }
    }
}

/// A parsed CAP alert.
///
/// Only the header elements needed for routing are decoded; the complete
/// framed document is kept in `raw` so downstream consumers receive the
/// payload untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub identifier: String,
    pub sender: String,
    pub sent: String,
    pub status: AlertStatus,
    pub msg_type: String,
    pub scope: String,
    pub references: Option<String>,
    #[serde(skip)]
    pub raw: Bytes,
}

impl Alert {
    /// Raw document as text, if it is valid UTF-8.
    pub fn raw_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.raw).ok()
    }
}

/// Errors produced while parsing a framed message.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("message is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("invalid CAP document: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("unknown alert status: {0:?}")]
    InvalidStatus(String),
}

/// Turns one complete framed message into an [`Alert`].
pub trait AlertParser: Send + Sync {
    /// Parse a complete message. Errors are final.
    fn parse(&self, raw: &[u8]) -> Result<Alert, ParseError>;
}

/// Parser for CAP 1.2 documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct CapParser;

impl CapParser {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Deserialize)]
struct CapDocument {
    identifier: String,
    sender: String,
    sent: String,
    status: String,
    #[serde(rename = "msgType")]
    msg_type: String,
    scope: String,
    #[serde(default)]
    references: Option<String>,
}

impl AlertParser for CapParser {
    fn parse(&self, raw: &[u8]) -> Result<Alert, ParseError> {
        let text = std::str::from_utf8(raw)?;
        let doc: CapDocument = quick_xml::de::from_str(text)?;
        let status = doc.status.parse()?;

        Ok(Alert {
            identifier: doc.identifier.trim().to_string(),
            sender: doc.sender.trim().to_string(),
            sent: doc.sent.trim().to_string(),
            status,
            msg_type: doc.msg_type.trim().to_string(),
            scope: doc.scope.trim().to_string(),
            references: doc.references.map(|r| r.trim().to_string()),
            raw: Bytes::copy_from_slice(raw),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEARTBEAT: &str = r#"<alert xmlns="urn:oasis:names:tc:emergency:cap:1.2"><identifier>urn:oid:2.49.0.1.124.2734127003.2019</identifier><sender>NAADS-Heartbeat</sender><sent>2019-03-02T18:52:00-00:00</sent><status>System</status><msgType>Alert</msgType><source>Heartbeat</source><scope>Public</scope><code>IMPROVED_HEARTBEAT</code><note>Heartbeat</note><references>NAADS-Heartbeat,urn:oid:2.49.0.1.124.1.2019,2019-03-02T18:51:00-00:00</references></alert>"#;

    const ALERT: &str = r#"<alert xmlns="urn:oasis:names:tc:emergency:cap:1.2">
  <identifier>urn:oid:2.49.0.1.124.0001.2019</identifier>
  <sender>cap-pac@canada.ca</sender>
  <sent>2019-03-02T19:00:00-00:00</sent>
  <status>Actual</status>
  <msgType>Alert</msgType>
  <scope>Public</scope>
  <code>profile:CAP-CP:0.4</code>
  <info>
    <language>en-CA</language>
    <category>Met</category>
    <event>snowfall</event>
    <urgency>Future</urgency>
    <severity>Moderate</severity>
    <certainty>Likely</certainty>
    <area><areaDesc>Ottawa</areaDesc></area>
  </info>
</alert>"#;

    #[test]
    fn test_parse_heartbeat() {
        let alert = CapParser::new().parse(HEARTBEAT.as_bytes()).unwrap();
        assert_eq!(alert.sender, HEARTBEAT_SENDER);
        assert_eq!(alert.status, AlertStatus::System);
        assert_eq!(alert.identifier, "urn:oid:2.49.0.1.124.2734127003.2019");
        assert!(alert.references.is_some());
        assert_eq!(alert.raw_str(), Some(HEARTBEAT));
    }

    #[test]
    fn test_parse_alert_with_info_blocks() {
        let alert = CapParser::new().parse(ALERT.as_bytes()).unwrap();
        assert_eq!(alert.status, AlertStatus::Actual);
        assert_eq!(alert.sender, "cap-pac@canada.ca");
        assert_eq!(alert.msg_type, "Alert");
        assert_eq!(alert.scope, "Public");
        assert!(alert.references.is_none());
    }

    #[test]
    fn test_parse_rejects_missing_identifier() {
        let doc = r#"<alert><sender>x</sender><sent>t</sent><status>Actual</status><msgType>Alert</msgType><scope>Public</scope></alert>"#;
        let err = CapParser::new().parse(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::Xml(_)));
    }

    #[test]
    fn test_parse_rejects_unknown_status() {
        let doc = r#"<alert><identifier>a</identifier><sender>x</sender><sent>t</sent><status>Bogus</status><msgType>Alert</msgType><scope>Public</scope></alert>"#;
        let err = CapParser::new().parse(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidStatus(ref s) if s == "Bogus"));
    }

    #[test]
    fn test_parse_rejects_invalid_utf8() {
        let err = CapParser::new().parse(&[0x3c, 0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, ParseError::Encoding(_)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(CapParser::new().parse(b"<alert>not cap at all</alert>").is_err());
    }

    #[test]
    fn test_status_round_trip_display() {
        for status in [
            AlertStatus::Actual,
            AlertStatus::Exercise,
            AlertStatus::System,
            AlertStatus::Test,
            AlertStatus::Draft,
        ] {
            assert_eq!(status.to_string().parse::<AlertStatus>().unwrap(), status);
        }
    }
}
