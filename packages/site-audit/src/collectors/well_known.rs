//! Well-known endpoint probe.

use tracing::debug;

use crate::fetch::FetchOptions;
use crate::types::collector::CollectorOutput;
use crate::types::raw::{WellKnownEntry, WellKnownFacts};

use super::CollectorContext;

/// The fixed paths this probe visits.
pub const WELL_KNOWN_PATHS: [&str; 5] = [
    "/.well-known/security.txt",
    "/.well-known/assetlinks.json",
    "/.well-known/apple-app-site-association",
    "/humans.txt",
    "/.well-known/dnt-policy.txt",
];

/// Body snippet cap per endpoint.
const SNIPPET_BYTES: usize = 2048;

/// Fetch the five fixed well-known paths; bodies are truncated to short
/// snippets. A path that errors at the transport level is simply omitted.
pub async fn collect(ctx: &CollectorContext) -> CollectorOutput<WellKnownFacts> {
    let origin = ctx.identity.origin();
    let mut entries = Vec::new();
    let mut transport_errors = 0usize;

    for path in WELL_KNOWN_PATHS {
        let url = format!("{}{}", origin, path);
        debug!(url = %url, "well-known probe");

        let options = FetchOptions::default()
            .with_timeout(ctx.config.timeouts.well_known())
            .with_max_bytes(64 * 1024);

        match ctx.fetch.fetch(&url, options).await.data {
            Some(fetched) => {
                entries.push(WellKnownEntry {
                    path: path.to_string(),
                    status: fetched.status,
                    snippet: truncate_snippet(&fetched.body),
                });
            }
            None => transport_errors += 1,
        }
    }

    if entries.is_empty() && transport_errors == WELL_KNOWN_PATHS.len() {
        return CollectorOutput::err("all well-known fetches failed");
    }

    CollectorOutput::ok(WellKnownFacts { entries })
}

fn truncate_snippet(body: &str) -> String {
    if body.len() <= SNIPPET_BYTES {
        return body.to_string();
    }
    let mut end = SNIPPET_BYTES;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_body() {
        assert_eq!(truncate_snippet("Contact: a@b.c"), "Contact: a@b.c");
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "x".repeat(5000);
        assert_eq!(truncate_snippet(&body).len(), SNIPPET_BYTES);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let body = "é".repeat(2000); // 2 bytes each
        let snippet = truncate_snippet(&body);
        assert!(snippet.len() <= SNIPPET_BYTES);
        assert!(snippet.chars().all(|c| c == 'é'));
    }
}
