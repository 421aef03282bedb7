//! Security header extraction.

use indexmap::IndexMap;
use std::collections::HashMap;

use crate::types::tristate::TriState;

/// The headers the security audit cares about, in report order.
pub const KNOWN_SECURITY_HEADERS: [&str; 7] = [
    "strict-transport-security",
    "content-security-policy",
    "x-content-type-options",
    "x-frame-options",
    "referrer-policy",
    "permissions-policy",
    "x-xss-protection",
];

/// Map each known header to its observed state. `headers` is the
/// lowercased map from the root fetch; `None` means the root fetch failed
/// and every header is unknown.
pub fn security_headers(
    headers: Option<&HashMap<String, String>>,
) -> IndexMap<String, TriState<String>> {
    let mut out = IndexMap::new();

    for name in KNOWN_SECURITY_HEADERS {
        let state = match headers {
            Some(map) => TriState::from_observation(map.get(name).cloned()),
            None => TriState::unknown("root fetch failed; headers not observed"),
        };
        out.insert(name.to_string(), state);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_and_absent() {
        let mut headers = HashMap::new();
        headers.insert(
            "strict-transport-security".to_string(),
            "max-age=31536000".to_string(),
        );

        let map = security_headers(Some(&headers));
        assert!(map["strict-transport-security"].is_present());
        assert!(map["content-security-policy"].is_absent());
        assert_eq!(map.len(), KNOWN_SECURITY_HEADERS.len());
    }

    #[test]
    fn test_unknown_when_not_observed() {
        let map = security_headers(None);
        assert!(map.values().all(|state| state.is_unknown()));
    }

    #[test]
    fn test_order_is_stable() {
        let map = security_headers(None);
        let names: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(names, KNOWN_SECURITY_HEADERS);
    }
}
