//! Crawlability audit: robots, sitemaps, redirects, broken links.

use crate::types::finding::{
    AuditSource, Evidence, Finding, FindingKind, Priority, Severity,
};
use crate::types::raw::RawSnapshot;
use crate::types::snapshot::{RedirectChainHealth, SiteSnapshot};
use crate::types::tristate::TriState;

const SOURCE: AuditSource = AuditSource::Crawl;

/// Run every crawlability rule. Pure; at most one finding per pattern.
pub fn audit(snapshot: &SiteSnapshot, raw: &RawSnapshot) -> Vec<Finding> {
    let mut findings = Vec::new();

    robots_rules(raw, &mut findings);
    sitemap_rules(raw, &mut findings);
    redirect_rules(snapshot, &mut findings);
    link_rules(snapshot, &mut findings);

    findings
}

fn robots_rules(raw: &RawSnapshot, findings: &mut Vec<Finding>) {
    let robots = match raw.robots_txt.as_data() {
        Some(r) => r,
        None => return, // probe failed: unknown, not missing
    };

    if robots.status == 404 {
        findings.push(
            Finding::new(
                FindingKind::CrawlMissingRobots,
                Severity::Warning,
                SOURCE,
                "No robots.txt was found",
            )
            .with_evidence(Evidence::Metric {
                name: "robots.txt status".into(),
                value: 404.0,
                threshold: 200.0,
            })
            .with_fix("Publish a robots.txt at the site root, even a permissive one")
            .with_why("Crawlers fall back to guessing without robots.txt, and sitemap discovery loses its standard entry point"),
        );
    }

    if robots.disallows_all {
        findings.push(
            Finding::new(
                FindingKind::CrawlRobotsBlocksAll,
                Severity::Critical,
                SOURCE,
                "robots.txt disallows all crawling for every user agent",
            )
            .with_evidence(Evidence::TextSample {
                text: robots.body.chars().take(200).collect(),
            })
            .with_fix("Remove the blanket `Disallow: /` rule or scope it to specific agents")
            .with_why("Search engines cannot index a site that blocks all crawlers"),
        );
    }
}

fn sitemap_rules(raw: &RawSnapshot, findings: &mut Vec<Finding>) {
    match raw.sitemaps.as_data() {
        None => {
            // Distinguish "no sitemap found" from "probe never ran"
            if raw.sitemaps.as_error() == Some("no sitemap documents found") {
                findings.push(
                    Finding::new(
                        FindingKind::CrawlMissingSitemap,
                        Severity::Warning,
                        SOURCE,
                        "No XML sitemap was discovered",
                    )
                    .with_fix("Generate a sitemap.xml and reference it from robots.txt")
                    .with_why("Sitemaps are the fastest way for crawlers to discover deep and freshly-published URLs"),
                );
            }
        }
        Some(sitemaps) => {
            let empty_docs: Vec<&str> = sitemaps
                .documents
                .iter()
                .filter(|d| !d.is_index && d.entry_count == 0)
                .map(|d| d.url.as_str())
                .collect();
            if !empty_docs.is_empty() {
                findings.push(
                    Finding::new(
                        FindingKind::CrawlSitemapError,
                        Severity::Info,
                        SOURCE,
                        format!("{} sitemap document(s) contain no URLs", empty_docs.len()),
                    )
                    .with_evidence(Evidence::Urls {
                        urls: empty_docs.iter().map(|u| u.to_string()).collect(),
                    })
                    .with_fix("Regenerate the empty sitemap files or remove their references")
                    .with_why("Empty sitemaps waste crawl budget and usually signal a broken generator"),
                );
            }
        }
    }
}

fn redirect_rules(snapshot: &SiteSnapshot, findings: &mut Vec<Finding>) {
    let infra = &snapshot.site_wide.infra;

    if !infra.redirect_loops.is_empty() {
        findings.push(
            Finding::new(
                FindingKind::CrawlUnreachable,
                Severity::Critical,
                SOURCE,
                "A redirect loop makes the site root unreachable for crawlers",
            )
            .with_evidence(Evidence::Urls {
                urls: infra.redirect_loops.clone(),
            })
            .with_fix("Break the redirect cycle so every root variant settles on one final URL")
            .with_why("Crawlers abandon looping chains, which removes the affected pages from the index"),
        );
    } else {
        match infra.redirect_chain_health {
            RedirectChainHealth::Critical => findings.push(
                Finding::new(
                    FindingKind::CrawlRedirectChain,
                    Severity::Critical,
                    SOURCE,
                    format!(
                        "Root redirect chains run to {} hops",
                        infra.max_redirect_hops
                    ),
                )
                .with_evidence(Evidence::Metric {
                    name: "redirect hops".into(),
                    value: infra.max_redirect_hops as f64,
                    threshold: 5.0,
                })
                .with_fix("Collapse the chain so each variant redirects once, directly to the canonical origin")
                .with_why("Every extra hop costs latency and dilutes link equity"),
            ),
            RedirectChainHealth::Warning => findings.push(
                Finding::new(
                    FindingKind::CrawlRedirectChain,
                    Severity::Warning,
                    SOURCE,
                    format!(
                        "Root redirect chains run to {} hops",
                        infra.max_redirect_hops
                    ),
                )
                .with_evidence(Evidence::Metric {
                    name: "redirect hops".into(),
                    value: infra.max_redirect_hops as f64,
                    threshold: 2.0,
                })
                .with_fix("Redirect each root variant straight to the canonical origin")
                .with_why("Multi-hop chains slow first paint and waste crawl budget"),
            ),
            RedirectChainHealth::Healthy | RedirectChainHealth::Unknown => {}
        }
    }

    if infra.www_consistent == TriState::present(false) {
        findings.push(
            Finding::new(
                FindingKind::CrawlWwwInconsistent,
                Severity::Warning,
                SOURCE,
                "www and bare-domain variants resolve to different destinations",
            )
            .with_fix("Redirect one host variant to the other site-wide")
            .with_why("Split variants divide ranking signals between two duplicate origins"),
        );
    }

    if snapshot.site_wide.https_enforced == TriState::present(false) {
        findings.push(
            Finding::new(
                FindingKind::CrawlHttpNotRedirected,
                Severity::Warning,
                SOURCE,
                "Plain HTTP requests are served without redirecting to HTTPS",
            )
            .with_fix("301-redirect all http:// traffic to https://")
            .with_why("Serving both schemes creates duplicate URLs and keeps users on an insecure transport"),
        );
    }
}

fn link_rules(snapshot: &SiteSnapshot, findings: &mut Vec<Finding>) {
    let mut broken: Vec<String> = Vec::new();
    for page in &snapshot.pages {
        for target in &page.links.broken {
            if !broken.contains(target) {
                broken.push(target.clone());
            }
        }
    }

    if !broken.is_empty() {
        findings.push(
            Finding::new(
                FindingKind::CrawlBrokenLinks,
                Severity::Warning,
                SOURCE,
                format!("{} internal link target(s) return 404", broken.len()),
            )
            .with_evidence(Evidence::Urls {
                urls: broken.clone(),
            })
            .with_urls(broken)
            .with_priority(Priority::High)
            .with_fix("Update or remove links pointing at the 404 URLs")
            .with_why("Broken internal links leak crawl budget and strand users on error pages"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::snapshots::{empty_site_snapshot, raw_snapshot_with_loop};

    #[test]
    fn test_redirect_loop_yields_unreachable() {
        let raw = raw_snapshot_with_loop();
        let snapshot = crate::extract::build_snapshot(&raw);
        let findings = audit(&snapshot, &raw);

        let unreachable = findings
            .iter()
            .find(|f| f.kind == FindingKind::CrawlUnreachable)
            .expect("loop should produce crawl_unreachable");
        assert_eq!(unreachable.severity, Severity::Critical);
    }

    #[test]
    fn test_quiet_on_empty_snapshot() {
        // Every probe failed: everything is unknown, nothing is asserted
        let (snapshot, raw) = empty_site_snapshot();
        let findings = audit(&snapshot, &raw);
        assert!(findings.is_empty());
    }
}
