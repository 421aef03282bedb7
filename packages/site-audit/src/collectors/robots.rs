//! robots.txt probe and parser.

use tracing::debug;

use crate::fetch::FetchOptions;
use crate::types::collector::CollectorOutput;
use crate::types::raw::RobotsFacts;

use super::CollectorContext;

/// Fetch and parse `/robots.txt`. A 404 is data, not a failure: the facts
/// record the status and an empty rule set.
pub async fn collect(ctx: &CollectorContext) -> CollectorOutput<RobotsFacts> {
    let url = format!("{}/robots.txt", ctx.identity.origin());
    debug!(url = %url, "robots probe");

    let options = FetchOptions::default().with_timeout(ctx.config.timeouts.robots());
    let result = ctx.fetch.fetch(&url, options).await;

    let fetched = match result.data {
        Some(f) => f,
        None => return CollectorOutput::err(result.error.unwrap_or_default()),
    };

    if fetched.status != 200 {
        return CollectorOutput::ok(RobotsFacts {
            status: fetched.status,
            body: String::new(),
            sitemap_refs: Vec::new(),
            disallows_all: false,
        });
    }

    let sitemap_refs = parse_sitemap_refs(&fetched.body);
    let disallows_all = parse_disallows_all(&fetched.body);

    CollectorOutput::ok(RobotsFacts {
        status: fetched.status,
        body: fetched.body,
        sitemap_refs,
        disallows_all,
    })
}

/// Extract `Sitemap:` references, case-insensitive.
pub fn parse_sitemap_refs(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| {
            let line = line.trim();
            let (directive, value) = line.split_once(':')?;
            if directive.trim().eq_ignore_ascii_case("sitemap") {
                let value = value.trim();
                (!value.is_empty()).then(|| value.to_string())
            } else {
                None
            }
        })
        .collect()
}

/// Whether `User-agent: *` carries `Disallow: /`.
pub fn parse_disallows_all(body: &str) -> bool {
    let mut in_wildcard_group = false;

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((directive, value)) = line.split_once(':') {
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => in_wildcard_group = value == "*",
                "disallow" if in_wildcard_group && value == "/" => return true,
                _ => {}
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sitemap_refs_case_insensitive() {
        let body = "User-agent: *\nDisallow: /admin/\nSitemap: https://example.com/sitemap.xml\nSITEMAP: https://example.com/news.xml\n";
        let refs = parse_sitemap_refs(body);
        assert_eq!(
            refs,
            vec![
                "https://example.com/sitemap.xml",
                "https://example.com/news.xml"
            ]
        );
    }

    #[test]
    fn test_sitemap_url_keeps_scheme_colon() {
        let refs = parse_sitemap_refs("sitemap: https://example.com/s.xml");
        assert_eq!(refs, vec!["https://example.com/s.xml"]);
    }

    #[test]
    fn test_disallow_all_detection() {
        assert!(parse_disallows_all("User-agent: *\nDisallow: /"));
        assert!(!parse_disallows_all("User-agent: *\nDisallow: /admin/"));
        assert!(!parse_disallows_all(
            "User-agent: badbot\nDisallow: /\n\nUser-agent: *\nDisallow: /tmp/"
        ));
    }

    #[test]
    fn test_empty_body() {
        assert!(parse_sitemap_refs("").is_empty());
        assert!(!parse_disallows_all(""));
    }
}
