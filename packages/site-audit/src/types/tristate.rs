//! Three-valued signal type.
//!
//! Every signal that can be absent distinguishes "observed as present",
//! "observed as missing", and "not observed". Audits must never treat an
//! unchecked signal as a missing one.

use serde::{Deserialize, Serialize};

/// A signal that is present, absent, or was never observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TriState<T> {
    /// The signal was observed and has a value.
    Present { value: T },

    /// The signal was checked and is definitively missing.
    Absent,

    /// The signal could not be checked.
    Unknown { reason: String },
}

impl<T> TriState<T> {
    /// Wrap a value as present.
    pub fn present(value: T) -> Self {
        TriState::Present { value }
    }

    /// Mark as unchecked with a reason.
    pub fn unknown(reason: impl Into<String>) -> Self {
        TriState::Unknown {
            reason: reason.into(),
        }
    }

    /// True iff the signal was observed with a value.
    pub fn is_present(&self) -> bool {
        matches!(self, TriState::Present { .. })
    }

    /// True iff the signal was checked and found missing.
    pub fn is_absent(&self) -> bool {
        matches!(self, TriState::Absent)
    }

    /// True iff the signal was never checked.
    pub fn is_unknown(&self) -> bool {
        matches!(self, TriState::Unknown { .. })
    }

    /// The value, if present.
    pub fn as_present(&self) -> Option<&T> {
        match self {
            TriState::Present { value } => Some(value),
            _ => None,
        }
    }

    /// Map the present value, preserving absent/unknown.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TriState<U> {
        match self {
            TriState::Present { value } => TriState::Present { value: f(value) },
            TriState::Absent => TriState::Absent,
            TriState::Unknown { reason } => TriState::Unknown { reason },
        }
    }

    /// Build from an `Option` where `None` means observed-as-missing.
    pub fn from_observation(value: Option<T>) -> Self {
        match value {
            Some(value) => TriState::Present { value },
            None => TriState::Absent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_are_distinct() {
        let present = TriState::present("hsts");
        let absent: TriState<&str> = TriState::Absent;
        let unknown: TriState<&str> = TriState::unknown("headers not fetched");

        assert!(present.is_present());
        assert!(absent.is_absent());
        assert!(unknown.is_unknown());
        assert!(!unknown.is_absent());
    }

    #[test]
    fn test_map_preserves_unknown_reason() {
        let unknown: TriState<u32> = TriState::unknown("probe failed");
        let mapped = unknown.map(|v| v * 2);
        match mapped {
            TriState::Unknown { reason } => assert_eq!(reason, "probe failed"),
            _ => panic!("expected unknown"),
        }
    }

    #[test]
    fn test_serde_round_trip() {
        let value = TriState::present(42u32);
        let json = serde_json::to_string(&value).unwrap();
        let back: TriState<u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(value, back);

        let unknown: TriState<u32> = TriState::unknown("dns timeout");
        let json = serde_json::to_string(&unknown).unwrap();
        assert!(json.contains("dns timeout"));
    }

    #[test]
    fn test_from_observation() {
        assert!(TriState::from_observation(Some(1)).is_present());
        assert!(TriState::<u32>::from_observation(None).is_absent());
    }
}
