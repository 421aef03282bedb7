//! The terminal report artifact and its supporting types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::finding::{MergedFinding, PrivateFlag};
use super::identity::AuditIdentity;

/// Category scores plus the weighted overall, all in [0, 100].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Scores {
    pub overall: f64,
    pub technical: f64,
    pub on_page: f64,
    pub content: f64,
    pub performance: f64,
    pub security: f64,
    pub visual: f64,
}

/// Fix strings bucketed by urgency.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionPlan {
    pub immediate: Vec<String>,
    pub short_term: Vec<String>,
    pub long_term: Vec<String>,
}

/// A measurement gap the run acknowledges instead of guessing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplicitGap {
    /// Which probe or audit left the gap.
    pub source: String,
    pub reason: String,
}

impl ExplicitGap {
    pub fn new(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            reason: reason.into(),
        }
    }
}

/// Wall-clock duration of each pipeline layer, in milliseconds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LayerTimings {
    pub collection_ms: u64,
    pub extraction_ms: u64,
    pub audits_ms: u64,
    pub synthesis_ms: u64,
}

/// Run accounting attached to the report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetadata {
    pub timings: LayerTimings,

    /// Accumulated LLM spend in USD.
    pub total_cost_usd: f64,

    /// Providers that served (or were attempted for) LLM calls.
    pub providers_used: Vec<String>,

    pub completed_audits: Vec<String>,
    pub failed_audits: Vec<String>,
}

/// The terminal artifact of an audit run. Contains no private material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub identity: AuditIdentity,
    pub generated_at: DateTime<Utc>,

    pub scores: Scores,

    /// Merged findings, sorted by priority score descending.
    pub findings: Vec<MergedFinding>,

    pub top_issues: Vec<String>,
    pub action_plan: ActionPlan,

    pub executive_summary: String,

    /// Per-category narrative for the numbers. Narration only; the LLM
    /// never changes scores.
    pub score_justifications: BTreeMap<String, String>,

    pub explicit_gaps: Vec<ExplicitGap>,

    /// False when the deterministic fallback produced the summary.
    pub used_synthesis: bool,

    pub metadata: RunMetadata,
}

/// Private run artifacts: flags and the bounded trace log. Cached under a
/// short TTL, never embedded in [`AuditReport`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrivateArtifacts {
    pub flags: Vec<PrivateFlag>,

    /// Internal trace lines (provider failures, parse errors, panics).
    pub trace: Vec<String>,
}

impl PrivateArtifacts {
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty() && self.trace.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::finding::PrivateFlagKind;

    #[test]
    fn test_report_serializes_without_private_fields() {
        let identity = AuditIdentity::new("https://example.com", None, "t=1", "p=1").unwrap();
        let report = AuditReport {
            identity,
            generated_at: Utc::now(),
            scores: Scores {
                overall: 80.0,
                technical: 85.0,
                on_page: 75.0,
                content: 80.0,
                performance: 90.0,
                security: 70.0,
                visual: 80.0,
            },
            findings: vec![],
            top_issues: vec![],
            action_plan: ActionPlan::default(),
            executive_summary: "Summary".into(),
            score_justifications: BTreeMap::new(),
            explicit_gaps: vec![ExplicitGap::new("serp", "no SERP backend configured")],
            used_synthesis: false,
            metadata: RunMetadata::default(),
        };

        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("private"));
        assert!(json.contains("no SERP backend configured"));
    }

    #[test]
    fn test_private_artifacts_emptiness() {
        let mut artifacts = PrivateArtifacts::default();
        assert!(artifacts.is_empty());

        artifacts.flags.push(PrivateFlag::new(
            PrivateFlagKind::StackTrace,
            "stack trace in 500 page",
            "GET /missing",
        ));
        assert!(!artifacts.is_empty());
    }
}
