//! Normalized site snapshot - the Layer-2 output all audits read.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::identity::AuditIdentity;
use super::tristate::TriState;

/// Heading counts below H1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingCounts {
    pub h2: usize,
    pub h3: usize,
    pub h4: usize,
    pub h5: usize,
    pub h6: usize,
}

/// One structured-data block found on a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaBlock {
    /// The `@type` value, e.g. `Product`.
    pub schema_type: String,

    /// The raw JSON-LD object.
    pub json_ld: serde_json::Value,

    pub valid: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// An image reference with its accessibility attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRef {
    pub src: String,
    pub alt: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Link classification for one page. Links reference normalized URLs,
/// never page objects, so broken-link detection is a set intersection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkSet {
    pub internal: Vec<String>,
    pub external: Vec<String>,
    pub broken: Vec<String>,
    pub nofollow: Vec<String>,
}

/// Per-page signals extracted from one HTML sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSignals {
    /// Normalized page URL - the arena key.
    pub url: String,

    pub status: u16,

    /// Whether an HTML body was actually parsed for this page. Zeroed
    /// entries (non-HTML or failed extraction) must not trip page rules.
    pub html_sampled: bool,

    pub title: Option<String>,
    pub title_length: usize,

    pub meta_description: Option<String>,
    pub meta_description_length: usize,

    pub canonical: Option<String>,

    /// Whether the canonical points back at this page.
    pub canonical_self: Option<bool>,

    pub h1: Option<String>,
    pub h1_count: usize,
    pub headings: HeadingCounts,

    pub schema: Vec<SchemaBlock>,
    pub images: Vec<ImageRef>,
    pub links: LinkSet,

    /// Insecure (http://) resources referenced from an https page.
    pub mixed_content: Vec<String>,

    pub has_viewport: bool,
    pub has_lang: bool,
    pub has_charset: bool,

    pub word_count: usize,
}

impl PageSignals {
    /// A zeroed signal set for a page whose extraction failed.
    pub fn zeroed(url: impl Into<String>, status: u16) -> Self {
        Self {
            url: url.into(),
            status,
            html_sampled: false,
            title: None,
            title_length: 0,
            meta_description: None,
            meta_description_length: 0,
            canonical: None,
            canonical_self: None,
            h1: None,
            h1_count: 0,
            headings: HeadingCounts::default(),
            schema: Vec::new(),
            images: Vec::new(),
            links: LinkSet::default(),
            mixed_content: Vec::new(),
            has_viewport: false,
            has_lang: false,
            has_charset: false,
            word_count: 0,
        }
    }
}

/// Health classification of the worst observed redirect chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectChainHealth {
    /// At most 2 hops.
    Healthy,
    /// 3 to 5 hops.
    Warning,
    /// More than 5 hops, or a loop.
    Critical,
    /// Redirect probes did not run.
    Unknown,
}

/// Infrastructure facts synthesized from DNS, TLS, and redirect probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfraFacts {
    pub cdn: Option<String>,
    pub hosting: Option<String>,
    pub a_records: Vec<String>,
    pub cname: Option<String>,
    pub ipv6: TriState<bool>,
    pub cert_expiry_days: Option<i64>,
    pub tls_protocol: Option<String>,
    pub www_consistent: TriState<bool>,
    pub trailing_slash_consistent: TriState<bool>,
    pub redirect_chain_health: RedirectChainHealth,

    /// URLs that appeared twice in one redirect chain.
    pub redirect_loops: Vec<String>,

    pub max_redirect_hops: usize,
}

impl Default for InfraFacts {
    fn default() -> Self {
        Self {
            cdn: None,
            hosting: None,
            a_records: Vec::new(),
            cname: None,
            ipv6: TriState::unknown("dns probe did not run"),
            cert_expiry_days: None,
            tls_protocol: None,
            www_consistent: TriState::unknown("redirect probes did not run"),
            trailing_slash_consistent: TriState::unknown("redirect probes did not run"),
            redirect_chain_health: RedirectChainHealth::Unknown,
            redirect_loops: Vec::new(),
            max_redirect_hops: 0,
        }
    }
}

/// Site-wide facts independent of any single page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteWideFacts {
    /// Known security headers mapped to their observed state. Insertion
    /// order is the canonical header order, so iteration is deterministic.
    pub security_headers: IndexMap<String, TriState<String>>,

    pub https_enforced: TriState<bool>,

    pub infra: InfraFacts,
}

/// Core Web Vitals rating against the standard thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CwvRating {
    Good,
    NeedsImprovement,
    Poor,
}

/// Performance metrics pulled from the Lighthouse report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerfMetrics {
    pub lcp_ms: Option<f64>,
    pub cls: Option<f64>,
    pub tbt_ms: Option<f64>,
    pub fcp_ms: Option<f64>,
    pub ttfb_ms: Option<f64>,
}

/// Ratings for each measured metric.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerfRatings {
    pub lcp: Option<CwvRating>,
    pub cls: Option<CwvRating>,
    pub tbt: Option<CwvRating>,
}

/// Lighthouse category scores on a 0-100 scale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryScores {
    pub performance: Option<f64>,
    pub accessibility: Option<f64>,
    pub best_practices: Option<f64>,
    pub seo: Option<f64>,
    pub pwa: Option<f64>,
}

/// Normalized performance facts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerfFacts {
    pub metrics: PerfMetrics,
    pub ratings: PerfRatings,
    pub categories: CategoryScores,
}

/// Every URL the run observed: samples, sitemap entries, internal links.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UrlSet {
    pub all: BTreeSet<String>,
}

impl UrlSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>) {
        self.all.insert(url.into());
    }

    pub fn contains(&self, url: &str) -> bool {
        self.all.contains(url)
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// The normalized, fully resolved snapshot all Layer-3 audits consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSnapshot {
    pub identity: AuditIdentity,

    /// Per-URL signals, arena-indexed by normalized URL.
    pub pages: Vec<PageSignals>,

    pub site_wide: SiteWideFacts,

    pub url_set: UrlSet,

    /// Present only when the performance probe produced a report.
    pub perf: Option<PerfFacts>,
}

impl SiteSnapshot {
    /// Look up a page by its normalized URL.
    pub fn page(&self, url: &str) -> Option<&PageSignals> {
        self.pages.iter().find(|p| p.url == url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_page_signals() {
        let page = PageSignals::zeroed("https://example.com/broken", 500);
        assert_eq!(page.word_count, 0);
        assert!(page.title.is_none());
        assert_eq!(page.status, 500);
    }

    #[test]
    fn test_url_set_membership() {
        let mut urls = UrlSet::new();
        urls.insert("https://example.com/");
        urls.insert("https://example.com/about");
        urls.insert("https://example.com/about"); // dedup

        assert_eq!(urls.len(), 2);
        assert!(urls.contains("https://example.com/about"));
        assert!(!urls.contains("https://example.com/missing"));
    }

    #[test]
    fn test_infra_defaults_are_unknown() {
        let infra = InfraFacts::default();
        assert!(infra.ipv6.is_unknown());
        assert!(infra.www_consistent.is_unknown());
        assert_eq!(infra.redirect_chain_health, RedirectChainHealth::Unknown);
    }
}
