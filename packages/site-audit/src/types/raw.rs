//! Raw probe payloads and the Layer-1 snapshot.
//!
//! `RawSnapshot` is the union of thirteen `CollectorOutput`s keyed by probe
//! name. It is immutable once built and serde round-trippable so it can be
//! cached under the run's cache key.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::collector::CollectorOutput;
use super::identity::AuditIdentity;

/// One hop in a redirect chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectHop {
    pub url: String,
    pub status: u16,
}

/// A fetched page: the safe-fetch result a collector retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedPage {
    /// URL the fetch was asked for.
    pub requested_url: String,

    /// URL after following redirects.
    pub final_url: String,

    /// Final HTTP status.
    pub status: u16,

    /// Lowercased response headers.
    pub headers: HashMap<String, String>,

    /// Body text; retained only for HTML content types.
    pub body: Option<String>,

    /// Full redirect chain, requested URL first.
    pub redirect_chain: Vec<RedirectHop>,

    pub fetched_at: DateTime<Utc>,
}

impl FetchedPage {
    /// Case-insensitive header lookup (headers are stored lowercased).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(|s| s.as_str())
    }

    /// Whether the response declared an HTML content type.
    pub fn is_html(&self) -> bool {
        self.header("content-type")
            .map(|ct| ct.contains("text/html") || ct.contains("application/xhtml"))
            .unwrap_or(false)
    }
}

/// Parsed robots.txt facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotsFacts {
    pub status: u16,
    pub body: String,

    /// `Sitemap:` references, case-insensitive parse.
    pub sitemap_refs: Vec<String>,

    /// Whether `User-agent: *` is disallowed from `/`.
    pub disallows_all: bool,
}

/// One sitemap document visited during the BFS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapDoc {
    pub url: String,
    pub status: u16,
    pub entry_count: usize,
    pub is_index: bool,
}

/// Sitemap discovery results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapFacts {
    pub documents: Vec<SitemapDoc>,

    /// Every `<loc>` URL extracted, capped.
    pub urls: Vec<String>,

    /// True when the URL cap cut off extraction.
    pub truncated: bool,
}

/// URLs selected for HTML sampling, grouped by first path segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingPlan {
    pub urls: Vec<String>,
    pub groups: IndexMap<String, Vec<String>>,
}

/// One redirect probe starting from a fixed root variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectProbe {
    pub start_url: String,
    pub final_url: Option<String>,
    pub final_status: Option<u16>,
    pub chain: Vec<RedirectHop>,
    pub error: Option<String>,
}

/// The four root-variant redirect probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectMap {
    pub http_root: RedirectProbe,
    pub https_root: RedirectProbe,
    pub http_www: RedirectProbe,
    pub https_www: RedirectProbe,
}

impl RedirectMap {
    pub fn probes(&self) -> [&RedirectProbe; 4] {
        [
            &self.http_root,
            &self.https_root,
            &self.http_www,
            &self.https_www,
        ]
    }
}

/// An address record with its TTL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub ip: String,
    pub ttl: u32,
}

/// DNS probe results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsFacts {
    pub a_records: Vec<AddressRecord>,
    pub aaaa_records: Vec<AddressRecord>,
    pub cname: Option<String>,
}

/// TLS handshake facts. No cipher probing; one handshake only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsFacts {
    /// Negotiated protocol, e.g. `TLSv1.3`.
    pub protocol: String,
    pub issuer: Option<String>,
    pub subject: Option<String>,
    pub not_after: Option<DateTime<Utc>>,
    pub days_until_expiry: Option<i64>,
    pub subject_alt_names: Vec<String>,
}

/// One fetched well-known endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WellKnownEntry {
    pub path: String,
    pub status: u16,

    /// Body truncated to a short snippet.
    pub snippet: String,
}

/// Well-known endpoint probe results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WellKnownFacts {
    pub entries: Vec<WellKnownEntry>,
}

/// A captured screenshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Screenshot {
    /// Base64 PNG payload.
    pub base64: String,
    pub width: u32,
    pub height: u32,
}

/// Desktop + mobile screenshot pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotSet {
    pub desktop: Option<Screenshot>,
    pub mobile: Option<Screenshot>,
}

/// Raw Lighthouse-style report. Metric extraction happens in Layer 2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LighthouseFacts {
    pub report: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
}

/// One organic SERP result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerpResult {
    pub position: u32,
    pub title: String,
    pub url: String,
    pub snippet: Option<String>,
}

/// SERP lookup results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerpFacts {
    pub backend: String,
    pub query: String,
    pub results: Vec<SerpResult>,
}

/// Output of the optional external security scanner CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityScanFacts {
    pub tool: String,
    pub output: serde_json::Value,
}

/// The union of all thirteen probe outputs for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSnapshot {
    pub identity: AuditIdentity,
    pub collected_at: DateTime<Utc>,

    pub root_fetch: CollectorOutput<FetchedPage>,
    pub robots_txt: CollectorOutput<RobotsFacts>,
    pub sitemaps: CollectorOutput<SitemapFacts>,
    pub url_sampling_plan: CollectorOutput<SamplingPlan>,
    pub html_samples: CollectorOutput<Vec<FetchedPage>>,
    pub redirect_map: CollectorOutput<RedirectMap>,
    pub dns_facts: CollectorOutput<DnsFacts>,
    pub tls_facts: CollectorOutput<TlsFacts>,
    pub well_known: CollectorOutput<WellKnownFacts>,
    pub screenshots: CollectorOutput<ScreenshotSet>,
    pub lighthouse: CollectorOutput<LighthouseFacts>,
    pub serp_raw: CollectorOutput<SerpFacts>,
    pub security_scan: CollectorOutput<SecurityScanFacts>,
}

impl RawSnapshot {
    /// An empty snapshot where every probe reports "did not run".
    pub fn empty(identity: AuditIdentity) -> Self {
        Self {
            identity,
            collected_at: Utc::now(),
            root_fetch: CollectorOutput::default(),
            robots_txt: CollectorOutput::default(),
            sitemaps: CollectorOutput::default(),
            url_sampling_plan: CollectorOutput::default(),
            html_samples: CollectorOutput::default(),
            redirect_map: CollectorOutput::default(),
            dns_facts: CollectorOutput::default(),
            tls_facts: CollectorOutput::default(),
            well_known: CollectorOutput::default(),
            screenshots: CollectorOutput::default(),
            lighthouse: CollectorOutput::default(),
            serp_raw: CollectorOutput::default(),
            security_scan: CollectorOutput::default(),
        }
    }

    /// Names of probes that failed, for gap reporting.
    pub fn failed_probes(&self) -> Vec<&'static str> {
        let mut failed = Vec::new();
        if !self.root_fetch.is_ok() {
            failed.push("root_fetch");
        }
        if !self.robots_txt.is_ok() {
            failed.push("robots_txt");
        }
        if !self.sitemaps.is_ok() {
            failed.push("sitemaps");
        }
        if !self.url_sampling_plan.is_ok() {
            failed.push("url_sampling_plan");
        }
        if !self.html_samples.is_ok() {
            failed.push("html_samples");
        }
        if !self.redirect_map.is_ok() {
            failed.push("redirect_map");
        }
        if !self.dns_facts.is_ok() {
            failed.push("dns_facts");
        }
        if !self.tls_facts.is_ok() {
            failed.push("tls_facts");
        }
        if !self.well_known.is_ok() {
            failed.push("well_known");
        }
        if !self.screenshots.is_ok() {
            failed.push("screenshots");
        }
        if !self.lighthouse.is_ok() {
            failed.push("lighthouse");
        }
        if !self.serp_raw.is_ok() {
            failed.push("serp_raw");
        }
        if !self.security_scan.is_ok() {
            failed.push("security_scan");
        }
        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> AuditIdentity {
        AuditIdentity::new("https://example.com", None, "t=1", "p=1").unwrap()
    }

    #[test]
    fn test_empty_snapshot_reports_all_failed() {
        let snapshot = RawSnapshot::empty(identity());
        assert_eq!(snapshot.failed_probes().len(), 13);
    }

    #[test]
    fn test_fetched_page_header_lookup() {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "text/html; charset=utf-8".to_string());
        let page = FetchedPage {
            requested_url: "https://example.com/".into(),
            final_url: "https://example.com/".into(),
            status: 200,
            headers,
            body: Some("<html></html>".into()),
            redirect_chain: vec![],
            fetched_at: Utc::now(),
        };

        assert!(page.is_html());
        assert!(page.header("Content-Type").is_some());
        assert!(page.header("x-missing").is_none());
    }

    #[test]
    fn test_raw_snapshot_serde_round_trip() {
        let mut snapshot = RawSnapshot::empty(identity());
        snapshot.robots_txt = CollectorOutput::ok(RobotsFacts {
            status: 200,
            body: "User-agent: *\nSitemap: https://example.com/sitemap.xml".into(),
            sitemap_refs: vec!["https://example.com/sitemap.xml".into()],
            disallows_all: false,
        });

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: RawSnapshot = serde_json::from_str(&json).unwrap();
        assert!(back.robots_txt.is_ok());
        assert_eq!(back.failed_probes().len(), 12);
    }
}
