//! Redirect mapping probe.
//!
//! Probes the four root variants (`http://host/`, `https://host/`, and both
//! `www` forms) hop by hop, recording every response. Loops are detected by
//! URL revisit within one chain.

use std::collections::HashSet;
use tracing::debug;

use crate::fetch::FetchOptions;
use crate::types::collector::CollectorOutput;
use crate::types::raw::{RedirectHop, RedirectMap, RedirectProbe};

use super::CollectorContext;

const MAX_HOPS: usize = 10;

/// Probe all four root variants in parallel.
pub async fn collect(ctx: &CollectorContext) -> CollectorOutput<RedirectMap> {
    let host = ctx.identity.host();
    let (bare, www) = host_variants(&host);

    let (http_root, https_root, http_www, https_www) = tokio::join!(
        probe_chain(ctx, format!("http://{}/", bare)),
        probe_chain(ctx, format!("https://{}/", bare)),
        probe_chain(ctx, format!("http://{}/", www)),
        probe_chain(ctx, format!("https://{}/", www)),
    );

    CollectorOutput::ok(RedirectMap {
        http_root,
        https_root,
        http_www,
        https_www,
    })
}

/// The bare and www forms of a host.
pub fn host_variants(host: &str) -> (String, String) {
    if let Some(stripped) = host.strip_prefix("www.") {
        (stripped.to_string(), host.to_string())
    } else {
        (host.to_string(), format!("www.{}", host))
    }
}

/// Follow one chain hop by hop, never raising.
async fn probe_chain(ctx: &CollectorContext, start_url: String) -> RedirectProbe {
    debug!(url = %start_url, "redirect probe");

    let mut probe = RedirectProbe {
        start_url: start_url.clone(),
        final_url: None,
        final_status: None,
        chain: Vec::new(),
        error: None,
    };

    let mut visited: HashSet<String> = HashSet::new();
    let mut current = start_url;

    loop {
        if probe.chain.len() >= MAX_HOPS {
            probe.error = Some("Exceeded maximum redirect hops".to_string());
            return probe;
        }

        let revisit = !visited.insert(current.clone());

        let options = FetchOptions::default()
            .with_timeout(ctx.config.timeouts.root_fetch())
            .no_redirects();

        let fetched = match ctx.fetch.fetch(&current, options).await.data {
            Some(f) => f,
            None => {
                if probe.error.is_none() {
                    probe.error = Some(format!("fetch failed for {}", current));
                }
                return probe;
            }
        };

        probe.chain.push(RedirectHop {
            url: current.clone(),
            status: fetched.status,
        });

        if revisit {
            probe.error = Some("redirect loop detected".to_string());
            return probe;
        }

        if (300..400).contains(&fetched.status) {
            match fetched.headers.get("location") {
                Some(location) => {
                    let next = resolve_location(&current, location);
                    match next {
                        Some(next) => {
                            current = next;
                            continue;
                        }
                        None => {
                            probe.error =
                                Some(format!("unparseable redirect location: {}", location));
                            return probe;
                        }
                    }
                }
                None => {
                    probe.error = Some("redirect without Location header".to_string());
                    return probe;
                }
            }
        }

        probe.final_url = Some(fetched.final_url);
        probe.final_status = Some(fetched.status);
        return probe;
    }
}

fn resolve_location(base: &str, location: &str) -> Option<String> {
    let base = url::Url::parse(base).ok()?;
    base.join(location).ok().map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_variants_bare() {
        let (bare, www) = host_variants("example.com");
        assert_eq!(bare, "example.com");
        assert_eq!(www, "www.example.com");
    }

    #[test]
    fn test_host_variants_www() {
        let (bare, www) = host_variants("www.example.com");
        assert_eq!(bare, "example.com");
        assert_eq!(www, "www.example.com");
    }

    #[test]
    fn test_resolve_relative_location() {
        assert_eq!(
            resolve_location("https://example.com/a", "/b").as_deref(),
            Some("https://example.com/b")
        );
        assert_eq!(
            resolve_location("https://example.com/a", "https://other.com/").as_deref(),
            Some("https://other.com/")
        );
    }
}
