//! Configuration for an audit run.
//!
//! One `AuditConfig` value object travels down the stack per run. Tuning
//! knobs the source surfaced without test evidence (merge threshold, plan
//! caps, score deductions) are plain fields with the source defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How far URL sampling reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlDepth {
    /// Root page only.
    Surface,
    /// Root plus the sampled URL set (default).
    Shallow,
    /// Larger sample, same mechanics.
    Deep,
}

impl CrawlDepth {
    /// Sample size for this depth.
    pub fn sample_limit(&self) -> usize {
        match self {
            CrawlDepth::Surface => 1,
            CrawlDepth::Shallow => 50,
            CrawlDepth::Deep => 150,
        }
    }
}

/// Which screenshots the visual audit sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualMode {
    /// Rendered screenshots (the only capture this core produces, so
    /// `url_context` behaves identically).
    UrlContext,
    Rendered,
    Both,
    /// Skip the visual audit entirely.
    None,
}

impl VisualMode {
    pub fn enabled(&self) -> bool {
        !matches!(self, VisualMode::None)
    }
}

/// Scope of the security probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityScope {
    /// Header analysis only; the external scanner is skipped.
    HeadersOnly,
    /// Headers plus the optional external CLI scan.
    Full,
}

/// Per-provider concurrency settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub max_concurrent: usize,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self { max_concurrent: 4 }
    }
}

/// Named timeouts for every suspension point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Timeouts {
    pub dns_secs: u64,
    pub tls_secs: u64,
    pub robots_secs: u64,
    pub root_fetch_secs: u64,
    pub html_sample_secs: u64,
    pub sitemap_secs: u64,
    pub well_known_secs: u64,
    pub screenshot_secs: u64,
    pub lighthouse_secs: u64,
    pub serp_secs: u64,
    pub llm_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            dns_secs: 5,
            tls_secs: 5,
            robots_secs: 5,
            root_fetch_secs: 10,
            html_sample_secs: 8,
            sitemap_secs: 15,
            well_known_secs: 5,
            screenshot_secs: 60,
            lighthouse_secs: 60,
            serp_secs: 15,
            llm_secs: 30,
        }
    }
}

impl Timeouts {
    pub fn dns(&self) -> Duration {
        Duration::from_secs(self.dns_secs)
    }
    pub fn tls(&self) -> Duration {
        Duration::from_secs(self.tls_secs)
    }
    pub fn robots(&self) -> Duration {
        Duration::from_secs(self.robots_secs)
    }
    pub fn root_fetch(&self) -> Duration {
        Duration::from_secs(self.root_fetch_secs)
    }
    pub fn html_sample(&self) -> Duration {
        Duration::from_secs(self.html_sample_secs)
    }
    pub fn sitemap(&self) -> Duration {
        Duration::from_secs(self.sitemap_secs)
    }
    pub fn well_known(&self) -> Duration {
        Duration::from_secs(self.well_known_secs)
    }
    pub fn screenshot(&self) -> Duration {
        Duration::from_secs(self.screenshot_secs)
    }
    pub fn lighthouse(&self) -> Duration {
        Duration::from_secs(self.lighthouse_secs)
    }
    pub fn serp(&self) -> Duration {
        Duration::from_secs(self.serp_secs)
    }
    pub fn llm(&self) -> Duration {
        Duration::from_secs(self.llm_secs)
    }
}

/// Merger tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Jaccard similarity threshold for merging.
    pub similarity_threshold: f64,

    /// Shared key phrases that boost similarity.
    pub key_phrases: Vec<String>,

    /// Boost added when both messages contain a shared key phrase.
    pub key_phrase_boost: f64,

    /// Evidence length (chars) considered substantive for confidence.
    pub substantive_evidence_chars: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.6,
            key_phrases: [
                "title",
                "meta description",
                "canonical",
                "h1",
                "lcp",
                "cls",
                "hsts",
                "https",
                "redirect",
                "sitemap",
                "robots",
                "alt text",
                "schema",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            key_phrase_boost: 0.2,
            substantive_evidence_chars: 20,
        }
    }
}

/// Scoring tuning: deductions per priority and category weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreConfig {
    pub critical_deduction: f64,
    pub high_deduction: f64,
    pub medium_deduction: f64,
    pub low_deduction: f64,

    pub technical_weight: f64,
    pub on_page_weight: f64,
    pub content_weight: f64,
    pub performance_weight: f64,
    pub security_weight: f64,
    pub visual_weight: f64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            critical_deduction: 25.0,
            high_deduction: 15.0,
            medium_deduction: 8.0,
            low_deduction: 3.0,
            technical_weight: 0.20,
            on_page_weight: 0.25,
            content_weight: 0.20,
            performance_weight: 0.15,
            security_weight: 0.10,
            visual_weight: 0.10,
        }
    }
}

/// Action plan bucket caps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlanCaps {
    pub immediate: usize,
    pub short_term: usize,
    pub long_term: usize,
}

impl Default for PlanCaps {
    fn default() -> Self {
        Self {
            immediate: 5,
            short_term: 7,
            long_term: 5,
        }
    }
}

/// Cache TTLs per artifact type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheTtls {
    pub raw_snapshot_secs: u64,
    pub site_snapshot_secs: u64,
    pub public_report_secs: u64,
    pub private_flags_secs: u64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            raw_snapshot_secs: 6 * 3600,
            site_snapshot_secs: 12 * 3600,
            public_report_secs: 24 * 3600,
            private_flags_secs: 3600,
        }
    }
}

/// Configuration for one audit run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub crawl_depth: CrawlDepth,
    pub visual_mode: VisualMode,
    pub psi_enabled: bool,
    pub security_scope: SecurityScope,

    pub gemini: ProviderSettings,
    pub openai: ProviderSettings,

    pub enable_codebase_peek: bool,
    pub enable_pdp: bool,

    /// Collector fan-out cap per run. Hard-capped at 6.
    pub collector_concurrency: usize,

    pub timeouts: Timeouts,
    pub merge: MergeConfig,
    pub score: ScoreConfig,
    pub plan_caps: PlanCaps,
    pub cache_ttls: CacheTtls,

    /// Sitemap BFS caps.
    pub max_sitemap_documents: usize,
    pub max_sitemap_urls: usize,

    /// External security scanner command, e.g. `observatory-cli`. Only
    /// consulted under `SecurityScope::Full`; absence is never fatal.
    pub security_scanner_cmd: Option<String>,

    /// Version strings folded into the cache key.
    pub tool_versions: String,
    pub prompt_versions: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            crawl_depth: CrawlDepth::Shallow,
            visual_mode: VisualMode::Rendered,
            psi_enabled: true,
            security_scope: SecurityScope::HeadersOnly,
            gemini: ProviderSettings::default(),
            openai: ProviderSettings::default(),
            enable_codebase_peek: false,
            enable_pdp: false,
            collector_concurrency: 6,
            timeouts: Timeouts::default(),
            merge: MergeConfig::default(),
            score: ScoreConfig::default(),
            plan_caps: PlanCaps::default(),
            cache_ttls: CacheTtls::default(),
            max_sitemap_documents: 50,
            max_sitemap_urls: 50_000,
            security_scanner_cmd: None,
            tool_versions: "collectors=1;extractors=1;audits=1".to_string(),
            prompt_versions: "visual=1;serp=1;synthesis=1".to_string(),
        }
    }
}

impl AuditConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_crawl_depth(mut self, depth: CrawlDepth) -> Self {
        self.crawl_depth = depth;
        self
    }

    pub fn with_visual_mode(mut self, mode: VisualMode) -> Self {
        self.visual_mode = mode;
        self
    }

    pub fn with_security_scope(mut self, scope: SecurityScope) -> Self {
        self.security_scope = scope;
        self
    }

    pub fn with_psi(mut self, enabled: bool) -> Self {
        self.psi_enabled = enabled;
        self
    }

    pub fn with_pdp(mut self, enabled: bool) -> Self {
        self.enable_pdp = enabled;
        self
    }

    /// Set collector fan-out; values above 6 are clamped.
    pub fn with_collector_concurrency(mut self, limit: usize) -> Self {
        self.collector_concurrency = limit.clamp(1, 6);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_source_values() {
        let config = AuditConfig::default();
        assert_eq!(config.merge.similarity_threshold, 0.6);
        assert_eq!(config.score.critical_deduction, 25.0);
        assert_eq!(config.plan_caps.immediate, 5);
        assert_eq!(config.plan_caps.short_term, 7);
        assert_eq!(config.plan_caps.long_term, 5);
        assert_eq!(config.collector_concurrency, 6);
        assert_eq!(config.cache_ttls.private_flags_secs, 3600);
    }

    #[test]
    fn test_concurrency_clamped() {
        let config = AuditConfig::new().with_collector_concurrency(32);
        assert_eq!(config.collector_concurrency, 6);

        let config = AuditConfig::new().with_collector_concurrency(0);
        assert_eq!(config.collector_concurrency, 1);
    }

    #[test]
    fn test_crawl_depth_sample_limits() {
        assert_eq!(CrawlDepth::Surface.sample_limit(), 1);
        assert_eq!(CrawlDepth::Shallow.sample_limit(), 50);
    }

    #[test]
    fn test_score_weights_sum_to_one() {
        let score = ScoreConfig::default();
        let sum = score.technical_weight
            + score.on_page_weight
            + score.content_weight
            + score.performance_weight
            + score.security_weight
            + score.visual_weight;
        assert!((sum - 1.0).abs() < 1e-9);
    }
}
