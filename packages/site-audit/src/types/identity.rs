//! Audit identity - the key under which a run is cached and replayable.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{AuditError, Result};

/// The identity of one audit run.
///
/// Two runs with the same identity hit the same cache entries: the identity
/// covers the normalized target URL plus the versions of every tool and
/// prompt that shaped the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditIdentity {
    /// Canonical form of the target URL.
    pub normalized_url: String,

    /// Optional product-detail page URL (also normalized).
    pub pdp_url: Option<String>,

    /// Semicolon-joined tool version string, e.g. `collector=3;extract=2`.
    pub tool_versions: String,

    /// Semicolon-joined prompt version string.
    pub prompt_versions: String,

    /// SHA-256 hex of `normalized_url|tool_versions|prompt_versions`.
    pub cache_key: String,
}

impl AuditIdentity {
    /// Build an identity from a raw URL and version strings.
    pub fn new(
        url: &str,
        pdp_url: Option<&str>,
        tool_versions: impl Into<String>,
        prompt_versions: impl Into<String>,
    ) -> Result<Self> {
        let normalized_url = normalize_url(url)?;
        let pdp_url = match pdp_url {
            Some(u) => Some(normalize_url(u)?),
            None => None,
        };
        let tool_versions = tool_versions.into();
        let prompt_versions = prompt_versions.into();
        let cache_key = cache_key(&normalized_url, &tool_versions, &prompt_versions);

        Ok(Self {
            normalized_url,
            pdp_url,
            tool_versions,
            prompt_versions,
            cache_key,
        })
    }

    /// The origin (scheme + host + port) of the normalized URL.
    pub fn origin(&self) -> String {
        // normalized_url always parses: it came out of normalize_url
        let parsed = Url::parse(&self.normalized_url).expect("normalized URL parses");
        parsed.origin().ascii_serialization()
    }

    /// The hostname of the normalized URL.
    pub fn host(&self) -> String {
        let parsed = Url::parse(&self.normalized_url).expect("normalized URL parses");
        parsed.host_str().unwrap_or_default().to_string()
    }
}

/// Canonicalize a URL for identity and lookup purposes.
///
/// Lowercases the host, strips default ports and fragments, sorts query
/// pairs by key, and trims a trailing slash on non-root paths. Idempotent:
/// `normalize_url(normalize_url(u)) == normalize_url(u)`.
pub fn normalize_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let mut url = Url::parse(&candidate).map_err(|_| AuditError::InvalidUrl {
        url: raw.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AuditError::InvalidUrl {
            url: raw.to_string(),
        });
    }

    let host = url
        .host_str()
        .ok_or_else(|| AuditError::InvalidUrl {
            url: raw.to_string(),
        })?
        .to_lowercase();
    url.set_host(Some(&host)).map_err(|_| AuditError::InvalidUrl {
        url: raw.to_string(),
    })?;

    // Url::parse already drops default ports; clear explicit defaults too
    let default_port = match url.scheme() {
        "https" => 443,
        _ => 80,
    };
    if url.port() == Some(default_port) {
        let _ = url.set_port(None);
    }

    url.set_fragment(None);

    // Sort query pairs by key for a stable form
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        pairs.sort();
        let query = pairs
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    k.clone()
                } else {
                    format!("{}={}", k, v)
                }
            })
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&query));
    }

    // Trim trailing slash unless the path is the root
    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    Ok(url.to_string())
}

/// SHA-256 hex fingerprint of `normalized_url|tool_versions|prompt_versions`.
pub fn cache_key(normalized_url: &str, tool_versions: &str, prompt_versions: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_url.as_bytes());
    hasher.update(b"|");
    hasher.update(tool_versions.as_bytes());
    hasher.update(b"|");
    hasher.update(prompt_versions.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_canonical_form() {
        let normalized = normalize_url(" HTTPS://Example.COM:443/Path/?b=2&a=1#x ").unwrap();
        assert_eq!(normalized, "https://example.com/Path?a=1&b=2");
    }

    #[test]
    fn test_normalize_idempotent() {
        let once = normalize_url("http://WWW.Example.com:80/a/b/?z=1&y=2#frag").unwrap();
        let twice = normalize_url(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_root_keeps_slash() {
        assert_eq!(
            normalize_url("https://example.com/").unwrap(),
            "https://example.com/"
        );
        assert_eq!(
            normalize_url("example.com").unwrap(),
            "https://example.com/"
        );
    }

    #[test]
    fn test_normalize_rejects_bad_schemes() {
        assert!(normalize_url("ftp://example.com").is_err());
        assert!(normalize_url("javascript:alert(1)").is_err());
    }

    #[test]
    fn test_cache_key_deterministic() {
        let a = cache_key("https://example.com/", "t=1", "p=1");
        let b = cache_key("https://example.com/", "t=1", "p=1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64); // SHA-256 hex

        let c = cache_key("https://example.com/", "t=2", "p=1");
        assert_ne!(a, c);
    }

    #[test]
    fn test_identity_origin_and_host() {
        let identity =
            AuditIdentity::new("https://Shop.Example.com/products", None, "t=1", "p=1").unwrap();
        assert_eq!(identity.origin(), "https://shop.example.com");
        assert_eq!(identity.host(), "shop.example.com");
    }

    #[test]
    fn test_pdp_url_normalized() {
        let identity = AuditIdentity::new(
            "https://example.com",
            Some("HTTPS://EXAMPLE.COM/product/1/"),
            "t=1",
            "p=1",
        )
        .unwrap();
        assert_eq!(
            identity.pdp_url.as_deref(),
            Some("https://example.com/product/1")
        );
    }
}
