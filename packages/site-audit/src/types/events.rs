//! Progress events emitted while a run executes.
//!
//! The orchestrator writes to a typed sink; the transport layer drains the
//! paired receiver and frames events however it likes (NDJSON, SSE). The
//! event set is closed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::finding::Finding;
use super::report::AuditReport;
use crate::error::ErrorCode;

/// Lifecycle status of one probe or audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Started,
    Completed,
    Failed,
}

/// One progress event: a stamped payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,

    #[serde(flatten)]
    pub payload: EventPayload,
}

/// The closed set of event payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPayload {
    #[serde(rename = "audit:start")]
    AuditStart { url: String },

    /// Terminal success event, carrying the final report.
    #[serde(rename = "audit:complete")]
    AuditComplete { report: Box<AuditReport> },

    /// Terminal failure event (programming faults and hard errors only).
    #[serde(rename = "audit:error")]
    AuditError { code: ErrorCode, message: String },

    #[serde(rename = "layer1:start")]
    Layer1Start,

    #[serde(rename = "layer1:collector")]
    Layer1Collector {
        collector: String,
        status: ProbeStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    #[serde(rename = "layer1:complete")]
    Layer1Complete,

    #[serde(rename = "layer2:start")]
    Layer2Start,

    #[serde(rename = "layer2:complete")]
    Layer2Complete,

    #[serde(rename = "layer3:start")]
    Layer3Start,

    #[serde(rename = "layer3:audit")]
    Layer3Audit {
        audit: String,
        status: ProbeStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    #[serde(rename = "layer3:finding")]
    Layer3Finding { finding: Box<Finding> },

    #[serde(rename = "layer3:complete")]
    Layer3Complete,

    #[serde(rename = "layer4:start")]
    Layer4Start,

    #[serde(rename = "layer4:complete")]
    Layer4Complete,
}

/// Write half of the event stream.
///
/// Sending never blocks and never fails: if the receiver is gone the event
/// is dropped, which is fine - progress is advisory.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<AuditEvent>,
}

impl EventSink {
    /// Create a sink and its paired receiver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AuditEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Stamp and emit an event.
    pub fn emit(&self, payload: EventPayload) {
        let _ = self.tx.send(AuditEvent {
            timestamp: Utc::now(),
            payload,
        });
    }

    /// Emit a collector lifecycle event.
    pub fn collector(&self, name: &str, status: ProbeStatus, message: Option<String>) {
        self.emit(EventPayload::Layer1Collector {
            collector: name.to_string(),
            status,
            message,
        });
    }

    /// Emit an audit lifecycle event.
    pub fn audit(&self, name: &str, status: ProbeStatus, message: Option<String>) {
        self.emit(EventPayload::Layer3Audit {
            audit: name.to_string(),
            status,
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let (sink, mut rx) = EventSink::channel();
        sink.emit(EventPayload::Layer1Collector {
            collector: "dns_facts".into(),
            status: ProbeStatus::Completed,
            message: None,
        });

        let event = rx.try_recv().unwrap();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "layer1:collector");
        assert_eq!(json["collector"], "dns_facts");
        assert_eq!(json["status"], "completed");
        assert!(json["timestamp"].is_string());
        assert!(json.get("message").is_none());
    }

    #[test]
    fn test_sink_survives_dropped_receiver() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        // Must not panic or error
        sink.emit(EventPayload::Layer1Start);
    }

    #[test]
    fn test_terminal_error_event() {
        let event = AuditEvent {
            timestamp: Utc::now(),
            payload: EventPayload::AuditError {
                code: ErrorCode::InvalidUrl,
                message: "not a URL".into(),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "audit:error");
        assert_eq!(json["code"], "INVALID_URL");
    }
}
