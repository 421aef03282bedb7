//! Findings, private flags, and merged findings.
//!
//! `Finding` and `PrivateFlag` are deliberately unrelated types: no shared
//! supertype, no conversion in either direction. A public report literally
//! cannot reference a private flag.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Closed set of finding codes. The wire form is the snake_case name,
/// e.g. `tech_missing_title`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    // On-page / technical SEO
    TechMissingTitle,
    TechTitleTooLong,
    TechTitleTooShort,
    TechDuplicateTitle,
    TechMissingMetaDesc,
    TechMetaDescTooLong,
    TechMetaDescTooShort,
    TechDuplicateMetaDesc,
    TechMissingH1,
    TechMultipleH1,
    TechMissingCanonical,
    TechCanonicalMismatch,
    TechMissingViewport,
    TechMissingLang,
    TechMissingCharset,
    TechMissingAltText,
    TechInvalidSchema,
    TechMissingSchema,
    TechThinContent,
    TechMixedContent,

    // Crawlability
    CrawlMissingRobots,
    CrawlRobotsBlocksAll,
    CrawlMissingSitemap,
    CrawlSitemapError,
    CrawlRedirectChain,
    CrawlRedirectLoop,
    CrawlUnreachable,
    CrawlBrokenLinks,
    CrawlWwwInconsistent,
    CrawlHttpNotRedirected,

    // Security
    SecMissingHsts,
    SecMissingCsp,
    SecMissingXContentType,
    SecMissingXFrame,
    SecMissingReferrerPolicy,
    SecMissingPermissionsPolicy,
    SecHttpsNotEnforced,
    SecCertExpiring,
    SecLegacyTls,

    // Performance
    PerfPoorLcp,
    PerfPoorCls,
    PerfPoorFid,
    PerfPoorFcp,
    PerfSlowTtfb,
    PerfLowScore,

    // LLM audits
    VisualIssue,
    SerpIssue,
}

impl FindingKind {
    /// The default report category for this code.
    pub fn default_category(&self) -> Category {
        use FindingKind::*;
        match self {
            TechMissingTitle | TechTitleTooLong | TechTitleTooShort | TechDuplicateTitle
            | TechMissingMetaDesc | TechMetaDescTooLong | TechMetaDescTooShort
            | TechDuplicateMetaDesc | TechMissingH1 | TechMultipleH1 => Category::Seo,
            TechThinContent | TechMissingAltText => Category::Content,
            TechMissingCanonical | TechCanonicalMismatch | TechMissingViewport
            | TechMissingLang | TechMissingCharset | TechInvalidSchema | TechMissingSchema
            | TechMixedContent => Category::Technical,
            CrawlMissingRobots | CrawlRobotsBlocksAll | CrawlMissingSitemap
            | CrawlSitemapError | CrawlRedirectChain | CrawlRedirectLoop | CrawlUnreachable
            | CrawlBrokenLinks | CrawlWwwInconsistent | CrawlHttpNotRedirected => {
                Category::Technical
            }
            SecMissingHsts | SecMissingCsp | SecMissingXContentType | SecMissingXFrame
            | SecMissingReferrerPolicy | SecMissingPermissionsPolicy | SecHttpsNotEnforced
            | SecCertExpiring | SecLegacyTls => Category::Security,
            PerfPoorLcp | PerfPoorCls | PerfPoorFid | PerfPoorFcp | PerfSlowTtfb
            | PerfLowScore => Category::Technical,
            VisualIssue => Category::Design,
            SerpIssue => Category::Seo,
        }
    }
}

/// Finding severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Info,
    Pass,
}

/// Remediation priority. The string form is the source of truth; numeric
/// ranking is always derived, never stored back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Base ranking score: critical 5, high 4, medium 3, low 2.
    pub fn base_score(&self) -> f32 {
        match self {
            Priority::Critical => 5.0,
            Priority::High => 4.0,
            Priority::Medium => 3.0,
            Priority::Low => 2.0,
        }
    }

    /// The conventional priority for a severity.
    pub fn from_severity(severity: Severity) -> Self {
        match severity {
            Severity::Critical => Priority::Critical,
            Severity::Warning => Priority::High,
            Severity::Info => Priority::Medium,
            Severity::Pass => Priority::Low,
        }
    }
}

/// Report category a finding is scored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Seo,
    Technical,
    Content,
    Design,
    Conversion,
    Security,
}

/// Which audit produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditSource {
    Crawl,
    TechnicalSeo,
    OnPageSeo,
    Security,
    Performance,
    Visual,
    Serp,
}

/// Evidence backing a finding. One variant per known shape; the string map
/// is the last resort for evidence no variant fits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    /// An observed (or missing) HTTP header.
    Header {
        name: String,
        value: Option<String>,
    },

    /// A set of URLs exhibiting the pattern.
    Urls { urls: Vec<String> },

    /// A measured value against its threshold.
    Metric {
        name: String,
        value: f64,
        threshold: f64,
    },

    /// A short raw sample (HTML fragment, header value, SERP snippet).
    TextSample { text: String },

    /// Key/value evidence of last resort.
    Map { entries: BTreeMap<String, String> },

    /// No evidence beyond the rule itself.
    None,
}

impl Evidence {
    /// Rough size of the evidence in characters, used for confidence.
    pub fn char_len(&self) -> usize {
        match self {
            Evidence::Header { name, value } => {
                name.len() + value.as_ref().map(|v| v.len()).unwrap_or(0)
            }
            Evidence::Urls { urls } => urls.iter().map(|u| u.len()).sum(),
            Evidence::Metric { name, .. } => name.len() + 16,
            Evidence::TextSample { text } => text.len(),
            Evidence::Map { entries } => entries.iter().map(|(k, v)| k.len() + v.len()).sum(),
            Evidence::None => 0,
        }
    }
}

/// The atomic public output of a micro-audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: Uuid,
    pub kind: FindingKind,
    pub severity: Severity,
    pub message: String,
    pub evidence: Evidence,

    /// Only URLs the run actually observed; never inferred.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_urls: Vec<String>,

    pub priority: Priority,
    pub category: Category,
    pub source: AuditSource,
    pub fix: String,
    pub why_it_matters: String,
}

impl Finding {
    /// Create a finding with severity-derived priority and kind-derived
    /// category. Builders below override where a rule needs to.
    pub fn new(
        kind: FindingKind,
        severity: Severity,
        source: AuditSource,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            severity,
            message: message.into(),
            evidence: Evidence::None,
            affected_urls: Vec::new(),
            priority: Priority::from_severity(severity),
            category: kind.default_category(),
            source,
            fix: String::new(),
            why_it_matters: String::new(),
        }
    }

    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence = evidence;
        self
    }

    pub fn with_urls(mut self, urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.affected_urls = urls.into_iter().map(|u| u.into()).collect();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.fix = fix.into();
        self
    }

    pub fn with_why(mut self, why: impl Into<String>) -> Self {
        self.why_it_matters = why.into();
        self
    }
}

/// What kind of sensitive material a private flag covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivateFlagKind {
    ExposedSecret,
    InternalHostname,
    StackTrace,
    SourceMapExposed,
}

/// A sensitive observation that must never reach public output.
///
/// Lives in its own id space and has no relationship to [`Finding`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivateFlag {
    pub id: Uuid,
    pub kind: PrivateFlagKind,
    pub message: String,

    /// Where and how the material was observed. Redacted storage only.
    pub context: String,

    pub detected_at: chrono::DateTime<chrono::Utc>,
}

impl PrivateFlag {
    pub fn new(kind: PrivateFlagKind, message: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            message: message.into(),
            context: context.into(),
            detected_at: chrono::Utc::now(),
        }
    }
}

/// Confidence of a merged finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// A deduplicated finding with provenance and a derived ranking score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedFinding {
    #[serde(flatten)]
    pub finding: Finding,

    /// Every audit that agreed on this finding.
    pub sources: Vec<AuditSource>,

    pub confidence: Confidence,

    /// Derived ranking in [2, 5]. A view over priority, never authoritative.
    pub priority_score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names() {
        let json = serde_json::to_string(&FindingKind::TechMissingTitle).unwrap();
        assert_eq!(json, "\"tech_missing_title\"");

        let json = serde_json::to_string(&FindingKind::SecMissingXContentType).unwrap();
        assert_eq!(json, "\"sec_missing_x_content_type\"");

        let json = serde_json::to_string(&FindingKind::PerfPoorLcp).unwrap();
        assert_eq!(json, "\"perf_poor_lcp\"");
    }

    #[test]
    fn test_source_wire_names() {
        let json = serde_json::to_string(&AuditSource::TechnicalSeo).unwrap();
        assert_eq!(json, "\"technical-seo\"");
        let json = serde_json::to_string(&AuditSource::OnPageSeo).unwrap();
        assert_eq!(json, "\"on-page-seo\"");
    }

    #[test]
    fn test_priority_base_scores() {
        assert_eq!(Priority::Critical.base_score(), 5.0);
        assert_eq!(Priority::Low.base_score(), 2.0);
    }

    #[test]
    fn test_finding_builder_defaults() {
        let finding = Finding::new(
            FindingKind::SecMissingHsts,
            Severity::Critical,
            AuditSource::Security,
            "Missing Strict-Transport-Security header",
        );

        assert_eq!(finding.category, Category::Security);
        assert_eq!(finding.priority, Priority::Critical);
        assert!(finding.affected_urls.is_empty());
    }

    #[test]
    fn test_evidence_char_len() {
        let evidence = Evidence::TextSample {
            text: "0123456789".into(),
        };
        assert_eq!(evidence.char_len(), 10);
        assert_eq!(Evidence::None.char_len(), 0);
    }

    #[test]
    fn test_private_flag_distinct_id_space() {
        let finding = Finding::new(
            FindingKind::TechMissingTitle,
            Severity::Warning,
            AuditSource::OnPageSeo,
            "Missing title tag",
        );
        let flag = PrivateFlag::new(
            PrivateFlagKind::ExposedSecret,
            "API key in page source",
            "inline script on /checkout",
        );
        // v4 ids cannot collide in practice; the point is the types share
        // no conversion path, which the compiler enforces.
        assert_ne!(finding.id, flag.id);
    }
}
