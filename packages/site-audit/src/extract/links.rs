//! Link classification and broken-link marking.
//!
//! Links reference normalized URLs (stable arena keys), never page
//! objects. Broken-link detection is a set intersection between internal
//! link targets and sampled URLs that answered 404.

use scraper::{Html, Selector};
use std::collections::HashMap;
use url::Url;

use crate::types::identity::normalize_url;
use crate::types::snapshot::{LinkSet, PageSignals};

/// Classify every anchor in a document against the page's own host.
pub fn classify_links(document: &Html, base_url: &Url) -> LinkSet {
    let sel = Selector::parse("a[href]").expect("static selector parses");
    let base_host = base_url.host_str().unwrap_or("");

    let mut links = LinkSet::default();

    for el in document.select(&sel) {
        let href = match el.value().attr("href") {
            Some(h) => h,
            None => continue,
        };

        if href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
        {
            continue;
        }

        let resolved = match base_url.join(href) {
            Ok(u) => u,
            Err(_) => continue,
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }

        let normalized = match normalize_url(resolved.as_str()) {
            Ok(u) => u,
            Err(_) => continue,
        };

        let nofollow = el
            .value()
            .attr("rel")
            .map(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("nofollow")))
            .unwrap_or(false);
        if nofollow && !links.nofollow.contains(&normalized) {
            links.nofollow.push(normalized.clone());
        }

        let same_host = resolved
            .host_str()
            .map(|h| h == base_host || h.strip_prefix("www.") == Some(base_host)
                || base_host.strip_prefix("www.") == Some(h))
            .unwrap_or(false);

        let bucket = if same_host {
            &mut links.internal
        } else {
            &mut links.external
        };
        if !bucket.contains(&normalized) {
            bucket.push(normalized);
        }
    }

    links
}

/// Mark broken internal links: targets that match a sampled URL whose
/// status was 404. Depends on every URL being normalized identically.
pub fn mark_broken(pages: &mut [PageSignals]) {
    let statuses: HashMap<String, u16> =
        pages.iter().map(|p| (p.url.clone(), p.status)).collect();

    for page in pages.iter_mut() {
        page.links.broken = page
            .links
            .internal
            .iter()
            .filter(|target| statuses.get(*target) == Some(&404))
            .cloned()
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(html: &str, base: &str) -> LinkSet {
        let document = Html::parse_document(html);
        let base = Url::parse(base).unwrap();
        classify_links(&document, &base)
    }

    #[test]
    fn test_internal_external_split() {
        let html = r##"
            <a href="/about">About</a>
            <a href="https://example.com/contact">Contact</a>
            <a href="https://other.org/page">Other</a>
            <a href="#section">Anchor</a>
            <a href="javascript:void(0)">JS</a>
            <a href="mailto:hi@example.com">Mail</a>
        "##;

        let links = classify(html, "https://example.com/");
        assert_eq!(links.internal.len(), 2);
        assert_eq!(links.external, vec!["https://other.org/page"]);
    }

    #[test]
    fn test_www_counts_as_internal() {
        let html = r#"<a href="https://www.example.com/page">Page</a>"#;
        let links = classify(html, "https://example.com/");
        assert_eq!(links.internal.len(), 1);
        assert!(links.external.is_empty());
    }

    #[test]
    fn test_nofollow_tracked() {
        let html = r#"<a href="https://spam.example.org/x" rel="sponsored nofollow">X</a>"#;
        let links = classify(html, "https://example.com/");
        assert_eq!(links.nofollow.len(), 1);
        assert_eq!(links.external.len(), 1);
    }

    #[test]
    fn test_links_are_normalized() {
        let html = r#"<a href="/About/?b=1&a=2#frag">About</a>"#;
        let links = classify(html, "https://example.com/");
        assert_eq!(links.internal, vec!["https://example.com/About?a=2&b=1"]);
    }

    #[test]
    fn test_mark_broken_set_intersection() {
        let mut pages = vec![
            {
                let mut p = PageSignals::zeroed("https://example.com/", 200);
                p.links.internal = vec![
                    "https://example.com/gone".to_string(),
                    "https://example.com/ok".to_string(),
                    "https://example.com/unsampled".to_string(),
                ];
                p
            },
            PageSignals::zeroed("https://example.com/gone", 404),
            PageSignals::zeroed("https://example.com/ok", 200),
        ];

        mark_broken(&mut pages);

        assert_eq!(pages[0].links.broken, vec!["https://example.com/gone"]);
    }
}
