//! Infrastructure synthesis from the redirect, DNS, and TLS probes.

use crate::types::raw::{DnsFacts, FetchedPage, RedirectMap, RedirectProbe, TlsFacts};
use crate::types::snapshot::{InfraFacts, RedirectChainHealth};
use crate::types::tristate::TriState;

/// Build the infrastructure facts. Every absent probe degrades to Unknown,
/// never to a guess.
pub fn infra_facts(
    redirect_map: Option<&RedirectMap>,
    dns: Option<&DnsFacts>,
    tls: Option<&TlsFacts>,
    samples: Option<&[FetchedPage]>,
) -> InfraFacts {
    let mut infra = InfraFacts::default();

    if let Some(dns) = dns {
        infra.a_records = dns.a_records.iter().map(|r| r.ip.clone()).collect();
        infra.cname = dns.cname.clone();
        infra.ipv6 = TriState::present(!dns.aaaa_records.is_empty());
    }

    if let Some(tls) = tls {
        infra.tls_protocol = Some(tls.protocol.clone());
        infra.cert_expiry_days = tls.days_until_expiry;
    }

    if let Some(map) = redirect_map {
        infra.www_consistent = www_consistency(map);

        let (health, loops, max_hops) = chain_health(map);
        infra.redirect_chain_health = health;
        infra.redirect_loops = loops;
        infra.max_redirect_hops = max_hops;
    }

    if let Some(samples) = samples {
        infra.trailing_slash_consistent = trailing_slash_consistency(samples);
    }

    let issuer = tls.and_then(|t| t.issuer.as_deref());
    infra.cdn = detect_cdn(infra.cname.as_deref(), issuer);
    infra.hosting = detect_hosting(infra.cname.as_deref());

    infra
}

/// HTTPS enforcement: does the plain-http root land on https?
pub fn https_enforced(redirect_map: Option<&RedirectMap>) -> TriState<bool> {
    let map = match redirect_map {
        Some(m) => m,
        None => return TriState::unknown("redirect probes did not run"),
    };

    match &map.http_root.final_url {
        Some(final_url) => TriState::present(final_url.starts_with("https://")),
        None => TriState::unknown(
            map.http_root
                .error
                .clone()
                .unwrap_or_else(|| "http root probe produced no final URL".to_string()),
        ),
    }
}

fn final_host(probe: &RedirectProbe) -> Option<String> {
    probe
        .final_url
        .as_deref()
        .and_then(|u| url::Url::parse(u).ok())
        .and_then(|u| u.host_str().map(String::from))
}

/// Do the bare and www variants converge on one host?
fn www_consistency(map: &RedirectMap) -> TriState<bool> {
    let bare = final_host(&map.https_root).or_else(|| final_host(&map.http_root));
    let www = final_host(&map.https_www).or_else(|| final_host(&map.http_www));

    match (bare, www) {
        (Some(bare), Some(www)) => TriState::present(bare == www),
        _ => TriState::unknown("www variant probes did not complete"),
    }
}

/// Worst-chain classification: ≤2 hops healthy, 3-5 warning, >5 or any
/// loop critical.
fn chain_health(map: &RedirectMap) -> (RedirectChainHealth, Vec<String>, usize) {
    let mut loops: Vec<String> = Vec::new();
    let mut max_hops = 0usize;

    for probe in map.probes() {
        max_hops = max_hops.max(probe.chain.len().saturating_sub(1));

        let mut seen: Vec<&str> = Vec::new();
        for hop in &probe.chain {
            if seen.contains(&hop.url.as_str()) {
                if !loops.contains(&hop.url) {
                    loops.push(hop.url.clone());
                }
            } else {
                seen.push(&hop.url);
            }
        }
    }

    let health = if !loops.is_empty() || max_hops > 5 {
        RedirectChainHealth::Critical
    } else if max_hops >= 3 {
        RedirectChainHealth::Warning
    } else {
        RedirectChainHealth::Healthy
    };

    (health, loops, max_hops)
}

/// Trailing-slash policy, observed from sample redirect chains.
fn trailing_slash_consistency(samples: &[FetchedPage]) -> TriState<bool> {
    let mut saw_normalizing_redirect = false;

    // Two live finals differing only by a trailing slash = inconsistent
    let finals: Vec<&str> = samples
        .iter()
        .filter(|s| s.status == 200)
        .map(|s| s.final_url.as_str())
        .collect();
    for final_url in &finals {
        if final_url.ends_with('/') && final_url.len() > 1 {
            let without = final_url.trim_end_matches('/');
            if finals.iter().any(|other| *other == without) {
                return TriState::present(false);
            }
        }
    }

    for sample in samples {
        for pair in sample.redirect_chain.windows(2) {
            let from = pair[0].url.trim_end_matches('/');
            let to = pair[1].url.trim_end_matches('/');
            if from == to && pair[0].url != pair[1].url {
                saw_normalizing_redirect = true;
            }
        }
    }

    if saw_normalizing_redirect {
        TriState::present(true)
    } else {
        TriState::unknown("no trailing-slash redirects observed")
    }
}

fn detect_cdn(cname: Option<&str>, issuer: Option<&str>) -> Option<String> {
    let cname = cname.unwrap_or_default().to_lowercase();
    let issuer = issuer.unwrap_or_default().to_lowercase();

    let table = [
        ("cloudfront", "CloudFront"),
        ("cloudflare", "Cloudflare"),
        ("fastly", "Fastly"),
        ("akamai", "Akamai"),
        ("azureedge", "Azure CDN"),
    ];

    for (needle, name) in table {
        if cname.contains(needle) || issuer.contains(needle) {
            return Some(name.to_string());
        }
    }
    None
}

fn detect_hosting(cname: Option<&str>) -> Option<String> {
    let cname = cname.unwrap_or_default().to_lowercase();

    let table = [
        ("vercel", "Vercel"),
        ("netlify", "Netlify"),
        ("github.io", "GitHub Pages"),
        ("shopify", "Shopify"),
        ("squarespace", "Squarespace"),
        ("wpengine", "WP Engine"),
        ("amazonaws", "AWS"),
        ("herokuapp", "Heroku"),
    ];

    for (needle, name) in table {
        if cname.contains(needle) {
            return Some(name.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::raw::RedirectHop;

    fn probe(start: &str, chain: Vec<(&str, u16)>, final_url: Option<&str>) -> RedirectProbe {
        RedirectProbe {
            start_url: start.to_string(),
            final_url: final_url.map(String::from),
            final_status: final_url.map(|_| 200),
            chain: chain
                .into_iter()
                .map(|(url, status)| RedirectHop {
                    url: url.to_string(),
                    status,
                })
                .collect(),
            error: None,
        }
    }

    fn map_with(http_root: RedirectProbe) -> RedirectMap {
        RedirectMap {
            http_root,
            https_root: probe(
                "https://example.com/",
                vec![("https://example.com/", 200)],
                Some("https://example.com/"),
            ),
            http_www: probe(
                "http://www.example.com/",
                vec![("http://www.example.com/", 301), ("https://example.com/", 200)],
                Some("https://example.com/"),
            ),
            https_www: probe(
                "https://www.example.com/",
                vec![("https://www.example.com/", 301), ("https://example.com/", 200)],
                Some("https://example.com/"),
            ),
        }
    }

    #[test]
    fn test_https_enforced_present_true() {
        let map = map_with(probe(
            "http://example.com/",
            vec![("http://example.com/", 301), ("https://example.com/", 200)],
            Some("https://example.com/"),
        ));
        assert_eq!(https_enforced(Some(&map)), TriState::present(true));
    }

    #[test]
    fn test_https_enforced_false_when_http_serves() {
        let map = map_with(probe(
            "http://example.com/",
            vec![("http://example.com/", 200)],
            Some("http://example.com/"),
        ));
        assert_eq!(https_enforced(Some(&map)), TriState::present(false));
    }

    #[test]
    fn test_https_enforced_unknown_without_probes() {
        assert!(https_enforced(None).is_unknown());
    }

    #[test]
    fn test_loop_is_critical_and_recorded() {
        let mut map = map_with(probe(
            "http://example.com/",
            vec![("http://example.com/", 301), ("https://example.com/", 200)],
            Some("https://example.com/"),
        ));
        map.https_root = probe(
            "https://example.com/",
            vec![
                ("https://a.example.com/", 301),
                ("https://b.example.com/", 301),
                ("https://a.example.com/", 301),
            ],
            None,
        );

        let infra = infra_facts(Some(&map), None, None, None);
        assert_eq!(infra.redirect_chain_health, RedirectChainHealth::Critical);
        assert!(infra
            .redirect_loops
            .contains(&"https://a.example.com/".to_string()));
    }

    #[test]
    fn test_long_chain_is_warning() {
        let mut map = map_with(probe(
            "http://example.com/",
            vec![
                ("http://example.com/", 301),
                ("https://example.com/", 301),
                ("https://www.example.com/", 301),
                ("https://www.example.com/home", 200),
            ],
            Some("https://www.example.com/home"),
        ));
        map.https_root = probe(
            "https://example.com/",
            vec![("https://example.com/", 200)],
            Some("https://example.com/"),
        );

        let infra = infra_facts(Some(&map), None, None, None);
        assert_eq!(infra.redirect_chain_health, RedirectChainHealth::Warning);
        assert_eq!(infra.max_redirect_hops, 3);
    }

    #[test]
    fn test_www_consistency() {
        let map = map_with(probe(
            "http://example.com/",
            vec![("http://example.com/", 301), ("https://example.com/", 200)],
            Some("https://example.com/"),
        ));
        let infra = infra_facts(Some(&map), None, None, None);
        assert_eq!(infra.www_consistent, TriState::present(true));
    }

    #[test]
    fn test_cdn_detection_from_cname() {
        assert_eq!(
            detect_cdn(Some("d1234.cloudfront.net"), None).as_deref(),
            Some("CloudFront")
        );
        assert_eq!(
            detect_cdn(None, Some("CN=Cloudflare Inc ECC CA-3")).as_deref(),
            Some("Cloudflare")
        );
        assert!(detect_cdn(Some("origin.example.com"), None).is_none());
    }

    #[test]
    fn test_hosting_detection() {
        assert_eq!(
            detect_hosting(Some("cname.vercel-dns.com")).as_deref(),
            Some("Vercel")
        );
        assert!(detect_hosting(None).is_none());
    }
}
