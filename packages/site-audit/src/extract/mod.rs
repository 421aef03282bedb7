//! Layer 2: pure, deterministic transformation of the raw snapshot.
//!
//! No network, no clock, no randomness: the same `RawSnapshot` always
//! produces the same `SiteSnapshot`. A panic while extracting one page is
//! trapped and yields zeroed signals for that page only.

pub mod headers;
pub mod html;
pub mod infra;
pub mod links;
pub mod perf;
pub mod schema;

use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

use crate::types::identity::normalize_url;
use crate::types::raw::{FetchedPage, RawSnapshot};
use crate::types::snapshot::{PageSignals, SiteSnapshot, SiteWideFacts, UrlSet};

/// Transform the raw snapshot into the normalized site snapshot.
pub fn build_snapshot(raw: &RawSnapshot) -> SiteSnapshot {
    let mut pages = extract_pages(raw);
    links::mark_broken(&mut pages);

    let mut url_set = UrlSet::new();
    for page in &pages {
        url_set.insert(page.url.clone());
        for link in &page.links.internal {
            url_set.insert(link.clone());
        }
        for link in &page.links.external {
            url_set.insert(link.clone());
        }
    }
    if let Some(sitemaps) = raw.sitemaps.as_data() {
        for url in &sitemaps.urls {
            if let Ok(normalized) = normalize_url(url) {
                url_set.insert(normalized);
            }
        }
    }
    url_set.insert(raw.identity.normalized_url.clone());

    let root_headers = raw.root_fetch.as_data().map(|root| &root.headers);
    let site_wide = SiteWideFacts {
        security_headers: headers::security_headers(root_headers),
        https_enforced: infra::https_enforced(raw.redirect_map.as_data()),
        infra: infra::infra_facts(
            raw.redirect_map.as_data(),
            raw.dns_facts.as_data(),
            raw.tls_facts.as_data(),
            raw.html_samples.as_data().map(Vec::as_slice),
        ),
    };

    let perf = raw.lighthouse.as_data().map(perf::perf_facts);

    SiteSnapshot {
        identity: raw.identity.clone(),
        pages,
        site_wide,
        url_set,
        perf,
    }
}

/// One `PageSignals` per sampled page; the root fetch stands in when
/// sampling produced nothing.
fn extract_pages(raw: &RawSnapshot) -> Vec<PageSignals> {
    let mut samples: Vec<&FetchedPage> = Vec::new();

    match raw.html_samples.as_data() {
        Some(fetched) => samples.extend(fetched.iter()),
        None => {
            if let Some(root) = raw.root_fetch.as_data() {
                samples.push(root);
            }
        }
    }

    let mut pages = Vec::with_capacity(samples.len());
    let mut seen = std::collections::HashSet::new();

    for sample in samples {
        let url = normalize_url(&sample.requested_url)
            .unwrap_or_else(|_| sample.requested_url.clone());
        if !seen.insert(url.clone()) {
            continue;
        }
        pages.push(extract_one(&url, sample));
    }

    pages
}

fn extract_one(url: &str, sample: &FetchedPage) -> PageSignals {
    let body = match &sample.body {
        Some(body) => body,
        None => return PageSignals::zeroed(url, sample.status),
    };

    // Extraction must not take the run down with a malformed page
    match catch_unwind(AssertUnwindSafe(|| {
        html::page_signals(url, sample.status, body)
    })) {
        Ok(page) => page,
        Err(_) => {
            warn!(url = %url, "page signal extraction panicked; zeroing");
            PageSignals::zeroed(url, sample.status)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::collector::CollectorOutput;
    use crate::types::identity::AuditIdentity;
    use crate::types::raw::{RawSnapshot, RobotsFacts, SitemapFacts};
    use chrono::Utc;
    use std::collections::HashMap;

    fn identity() -> AuditIdentity {
        AuditIdentity::new("https://example.com", None, "t=1", "p=1").unwrap()
    }

    fn html_page(url: &str, status: u16, body: &str) -> FetchedPage {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "text/html".to_string());
        FetchedPage {
            requested_url: url.to_string(),
            final_url: url.to_string(),
            status,
            headers,
            body: Some(body.to_string()),
            redirect_chain: vec![],
            fetched_at: Utc::now(),
        }
    }

    fn raw_with_samples(samples: Vec<FetchedPage>) -> RawSnapshot {
        let mut raw = RawSnapshot::empty(identity());
        raw.html_samples = CollectorOutput::ok(samples);
        raw
    }

    #[test]
    fn test_deterministic_bit_for_bit() {
        let raw = raw_with_samples(vec![html_page(
            "https://example.com/",
            200,
            "<html><head><title>T</title></head><body><p>one two</p></body></html>",
        )]);

        let a = serde_json::to_string(&build_snapshot(&raw)).unwrap();
        let b = serde_json::to_string(&build_snapshot(&raw)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_url_set_covers_samples_sitemaps_and_links() {
        let mut raw = raw_with_samples(vec![html_page(
            "https://example.com/",
            200,
            r#"<html><body><a href="/about">A</a></body></html>"#,
        )]);
        raw.sitemaps = CollectorOutput::ok(SitemapFacts {
            documents: vec![],
            urls: vec!["https://example.com/from-sitemap".to_string()],
            truncated: false,
        });

        let snapshot = build_snapshot(&raw);
        assert!(snapshot.url_set.contains("https://example.com/"));
        assert!(snapshot.url_set.contains("https://example.com/about"));
        assert!(snapshot.url_set.contains("https://example.com/from-sitemap"));
    }

    #[test]
    fn test_non_html_sample_zeroed() {
        let mut sample = html_page("https://example.com/feed", 200, "");
        sample.body = None;
        let raw = raw_with_samples(vec![sample]);

        let snapshot = build_snapshot(&raw);
        assert_eq!(snapshot.pages.len(), 1);
        assert_eq!(snapshot.pages[0].word_count, 0);
    }

    #[test]
    fn test_root_fetch_fallback_when_samples_missing() {
        let mut raw = RawSnapshot::empty(identity());
        raw.root_fetch = CollectorOutput::ok(html_page(
            "https://example.com/",
            200,
            "<html><head><title>Root</title></head><body></body></html>",
        ));

        let snapshot = build_snapshot(&raw);
        assert_eq!(snapshot.pages.len(), 1);
        assert_eq!(snapshot.pages[0].title.as_deref(), Some("Root"));
    }

    #[test]
    fn test_headers_unknown_when_root_failed() {
        let raw = RawSnapshot::empty(identity());
        let snapshot = build_snapshot(&raw);
        assert!(snapshot
            .site_wide
            .security_headers
            .values()
            .all(|s| s.is_unknown()));
        assert!(snapshot.site_wide.https_enforced.is_unknown());
    }

    #[test]
    fn test_broken_links_marked_across_pages() {
        let raw = raw_with_samples(vec![
            html_page(
                "https://example.com/",
                200,
                r#"<html><body><a href="/gone">Gone</a></body></html>"#,
            ),
            html_page("https://example.com/gone", 404, "<html></html>"),
        ]);

        let snapshot = build_snapshot(&raw);
        let root = snapshot.page("https://example.com/").unwrap();
        assert_eq!(root.links.broken, vec!["https://example.com/gone"]);
    }

    #[test]
    fn test_robots_data_unused_but_harmless() {
        // Extraction reads only the slots it needs
        let mut raw = raw_with_samples(vec![]);
        raw.robots_txt = CollectorOutput::ok(RobotsFacts {
            status: 200,
            body: String::new(),
            sitemap_refs: vec![],
            disallows_all: true,
        });
        let snapshot = build_snapshot(&raw);
        assert!(snapshot.pages.is_empty());
    }
}
