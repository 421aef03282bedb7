//! The partial-failure contract every collector obeys.

use serde::{Deserialize, Serialize};

/// Result of one probe: either data or a soft error, never both.
///
/// Collectors never raise; the orchestrator never catches. A failed probe
/// is ordinary data that downstream audits turn into `Unknown` signals or
/// explicit gaps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorOutput<T> {
    /// The probe's payload, when it succeeded.
    pub data: Option<T>,

    /// Human-readable failure description, when it did not.
    pub error: Option<String>,
}

impl<T> CollectorOutput<T> {
    /// A successful probe.
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    /// A failed probe.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(error.into()),
        }
    }

    /// Build from a `Result`, stringifying the error.
    pub fn from_result<E: std::fmt::Display>(result: std::result::Result<T, E>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(e.to_string()),
        }
    }

    /// True iff the probe produced data.
    pub fn is_ok(&self) -> bool {
        self.data.is_some()
    }

    /// The payload, if any.
    pub fn as_data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// The error, if any.
    pub fn as_error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

impl<T> Default for CollectorOutput<T> {
    /// A probe that never ran.
    fn default() -> Self {
        Self::err("probe did not run")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exactly_one_side_set() {
        let ok = CollectorOutput::ok(1u32);
        assert!(ok.data.is_some() && ok.error.is_none());

        let err: CollectorOutput<u32> = CollectorOutput::err("timeout");
        assert!(err.data.is_none() && err.error.is_some());
    }

    #[test]
    fn test_from_result() {
        let ok: CollectorOutput<u32> = CollectorOutput::from_result(Ok::<u32, String>(7));
        assert_eq!(ok.as_data(), Some(&7));

        let err: CollectorOutput<u32> =
            CollectorOutput::from_result(Err::<u32, _>("dns failed".to_string()));
        assert_eq!(err.as_error(), Some("dns failed"));
    }

    #[test]
    fn test_serde_shape() {
        let err: CollectorOutput<u32> = CollectorOutput::err("no sitemap");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["data"], serde_json::Value::Null);
        assert_eq!(json["error"], "no sitemap");
    }
}
