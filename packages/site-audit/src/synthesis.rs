//! Layer 4 synthesis: one LLM call to narrate the findings, with a
//! deterministic fallback that can never fail.
//!
//! The synthesis narrates; it cannot change a single score.

use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::providers::{AuditTask, GenerateRequest, ProviderRegistry};
use crate::types::config::AuditConfig;
use crate::types::finding::MergedFinding;
use crate::types::report::{ExplicitGap, Scores};

const SYSTEM_INSTRUCTION: &str = "You are the lead consultant writing the executive section of \
a website audit report. You receive the category scores (already computed - do not dispute or \
restate different numbers), the top merged findings, and the list of measurement gaps. Write \
for a business owner: concrete, direct, no filler.";

/// How many findings the synthesis prompt sees.
const PROMPT_FINDING_LIMIT: usize = 20;

/// What the synthesis stage hands back to the orchestrator.
#[derive(Debug, Clone)]
pub struct SynthesisOutcome {
    pub executive_summary: String,
    pub top_issues: Vec<String>,
    pub next_steps: Vec<String>,
    pub score_justifications: BTreeMap<String, String>,

    /// False when the deterministic fallback produced this outcome.
    pub used_synthesis: bool,
}

#[derive(Debug, Deserialize)]
struct LlmSynthesis {
    #[serde(rename = "executiveSummary")]
    executive_summary: String,
    #[serde(rename = "topIssues", default)]
    top_issues: Vec<String>,
    #[serde(rename = "nextSteps", default)]
    next_steps: Vec<String>,
    #[serde(rename = "scoreJustifications", default)]
    score_justifications: BTreeMap<String, String>,
}

fn response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "executiveSummary": {"type": "string"},
            "topIssues": {"type": "array", "items": {"type": "string"}},
            "nextSteps": {"type": "array", "items": {"type": "string"}},
            "scoreJustifications": {
                "type": "object",
                "additionalProperties": {"type": "string"}
            }
        },
        "required": ["executiveSummary", "topIssues", "nextSteps", "scoreJustifications"],
        "additionalProperties": false
    })
}

/// Run the synthesis. Provider or parse failures fall back to the
/// deterministic path; this function cannot error.
pub async fn synthesize(
    registry: Option<&ProviderRegistry>,
    config: &AuditConfig,
    url: &str,
    scores: &Scores,
    findings: &[MergedFinding],
    gaps: &[ExplicitGap],
) -> SynthesisOutcome {
    if let Some(registry) = registry {
        match llm_synthesis(registry, config, url, scores, findings, gaps).await {
            Ok(outcome) => return outcome,
            Err(reason) => {
                warn!(reason = %reason, "LLM synthesis failed; using deterministic fallback");
            }
        }
    }

    fallback_synthesis(scores, findings, gaps)
}

/// Walk the synthesis route manually: a provider that answers with
/// malformed JSON is just as failed as one that errors, so the fallback
/// must be attempted in both cases.
async fn llm_synthesis(
    registry: &ProviderRegistry,
    config: &AuditConfig,
    url: &str,
    scores: &Scores,
    findings: &[MergedFinding],
    gaps: &[ExplicitGap],
) -> Result<SynthesisOutcome, String> {
    let prompt = build_prompt(url, scores, findings, gaps);
    let schema = response_schema();

    let base = GenerateRequest::new("", prompt)
        .with_system(SYSTEM_INSTRUCTION)
        .with_temperature(0.3)
        .with_max_tokens(2048)
        .with_timeout(config.timeouts.llm());

    let routes = registry.routes(AuditTask::Synthesis);
    if routes.is_empty() {
        return Err("no synthesis route configured".to_string());
    }

    let mut last_error = String::new();
    for (provider, model) in routes {
        debug!(url = %url, provider = provider, model = %model, "synthesis call");
        let request = base.for_model(&model);

        let text = match registry.call_structured(provider, &request, &schema).await {
            Ok(response) => response.text,
            Err(e) => {
                last_error = format!("{}: {}", provider, e);
                warn!(provider = provider, error = %e, "synthesis provider failed");
                continue;
            }
        };

        match serde_json::from_str::<LlmSynthesis>(text.trim()) {
            Ok(parsed) if !parsed.executive_summary.trim().is_empty() => {
                return Ok(SynthesisOutcome {
                    executive_summary: parsed.executive_summary,
                    top_issues: parsed.top_issues,
                    next_steps: parsed.next_steps,
                    score_justifications: parsed.score_justifications,
                    used_synthesis: true,
                });
            }
            Ok(_) => {
                last_error = format!("{}: empty executive summary", provider);
            }
            Err(e) => {
                last_error = format!("{}: synthesis JSON parse failed: {}", provider, e);
            }
        }
        warn!(provider = provider, error = %last_error, "synthesis response unusable");
    }

    Err(last_error)
}

/// Format the long-form synthesis prompt.
pub fn build_prompt(
    url: &str,
    scores: &Scores,
    findings: &[MergedFinding],
    gaps: &[ExplicitGap],
) -> String {
    let mut prompt = format!(
        "Site audited: {}\n\nScores (0-100):\n\
         - overall: {:.0}\n- technical: {:.0}\n- on-page: {:.0}\n- content: {:.0}\n\
         - performance: {:.0}\n- security: {:.0}\n- visual: {:.0}\n\nTop findings:\n",
        url,
        scores.overall,
        scores.technical,
        scores.on_page,
        scores.content,
        scores.performance,
        scores.security,
        scores.visual,
    );

    for (index, finding) in findings.iter().take(PROMPT_FINDING_LIMIT).enumerate() {
        prompt.push_str(&format!(
            "{}. [{:?}/{:?}] {} (sources: {}; fix: {})\n",
            index + 1,
            finding.finding.severity,
            finding.finding.category,
            finding.finding.message,
            finding.sources.len(),
            if finding.finding.fix.is_empty() {
                "-"
            } else {
                finding.finding.fix.as_str()
            },
        ));
    }

    if !gaps.is_empty() {
        prompt.push_str("\nMeasurement gaps (acknowledge, do not speculate):\n");
        for gap in gaps {
            prompt.push_str(&format!("- {}: {}\n", gap.source, gap.reason));
        }
    }

    prompt.push_str(
        "\nReturn strict JSON: {\"executiveSummary\": string, \"topIssues\": [string], \
         \"nextSteps\": [string], \"scoreJustifications\": {category: string}}.",
    );

    prompt
}

/// Deterministic synthesis from findings alone. Never errors.
pub fn fallback_synthesis(
    scores: &Scores,
    findings: &[MergedFinding],
    gaps: &[ExplicitGap],
) -> SynthesisOutcome {
    use crate::types::finding::Priority;

    let critical = findings
        .iter()
        .filter(|f| f.finding.priority == Priority::Critical)
        .count();
    let high = findings
        .iter()
        .filter(|f| f.finding.priority == Priority::High)
        .count();
    let other = findings.len().saturating_sub(critical + high);

    let categories = [
        ("technical", scores.technical),
        ("on-page", scores.on_page),
        ("content", scores.content),
        ("performance", scores.performance),
        ("security", scores.security),
        ("visual", scores.visual),
    ];
    let worst = categories
        .iter()
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .copied()
        .unwrap_or(("technical", 100.0));

    let mut summary = format!(
        "The audit scored the site {:.0}/100 overall. It surfaced {} critical, {} high, and {} \
         further issue(s). The weakest area is {} at {:.0}/100.",
        scores.overall, critical, high, other, worst.0, worst.1
    );
    if !gaps.is_empty() {
        summary.push_str(&format!(
            " {} measurement(s) could not be taken and are listed as gaps rather than guessed at.",
            gaps.len()
        ));
    }

    let top_issues = findings
        .iter()
        .take(5)
        .map(|f| f.finding.message.clone())
        .collect();

    let next_steps = findings
        .iter()
        .filter(|f| !f.finding.fix.is_empty())
        .take(5)
        .map(|f| f.finding.fix.clone())
        .collect();

    let mut score_justifications = BTreeMap::new();
    for (name, value) in categories {
        let issues_in = findings
            .iter()
            .filter(|f| category_bucket(f) == name)
            .count();
        score_justifications.insert(
            name.to_string(),
            format!("{:.0}/100 based on {} weighted finding(s)", value, issues_in),
        );
    }

    SynthesisOutcome {
        executive_summary: summary,
        top_issues,
        next_steps,
        score_justifications,
        used_synthesis: false,
    }
}

fn category_bucket(finding: &MergedFinding) -> &'static str {
    use crate::types::finding::{AuditSource, Category};
    if finding.finding.source == AuditSource::Performance {
        return "performance";
    }
    match finding.finding.category {
        Category::Seo => "on-page",
        Category::Technical => "technical",
        Category::Content => "content",
        Category::Design | Category::Conversion => "visual",
        Category::Security => "security",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge_findings;
    use crate::types::config::MergeConfig;
    use crate::types::finding::{AuditSource, Finding, FindingKind, Severity};

    fn scores() -> Scores {
        Scores {
            overall: 62.0,
            technical: 70.0,
            on_page: 55.0,
            content: 80.0,
            performance: 40.0,
            security: 75.0,
            visual: 85.0,
        }
    }

    fn some_findings() -> Vec<MergedFinding> {
        merge_findings(
            vec![
                Finding::new(
                    FindingKind::SecMissingHsts,
                    Severity::Critical,
                    AuditSource::Security,
                    "Missing strict-transport-security header",
                )
                .with_fix("Enable HSTS"),
                Finding::new(
                    FindingKind::TechMissingTitle,
                    Severity::Warning,
                    AuditSource::OnPageSeo,
                    "Pages without title tags",
                )
                .with_fix("Add titles"),
            ],
            &MergeConfig::default(),
        )
    }

    #[test]
    fn test_fallback_is_never_empty() {
        let outcome = fallback_synthesis(&scores(), &some_findings(), &[]);
        assert!(!outcome.executive_summary.is_empty());
        assert!(!outcome.used_synthesis);
        assert_eq!(outcome.score_justifications.len(), 6);
        assert!(!outcome.next_steps.is_empty());
    }

    #[test]
    fn test_fallback_names_worst_category() {
        let outcome = fallback_synthesis(&scores(), &some_findings(), &[]);
        assert!(outcome.executive_summary.contains("performance"));
    }

    #[test]
    fn test_fallback_mentions_gaps() {
        let gaps = vec![ExplicitGap::new("serp", "no backend configured")];
        let outcome = fallback_synthesis(&scores(), &[], &gaps);
        assert!(outcome.executive_summary.contains("gap"));
    }

    #[tokio::test]
    async fn test_synthesize_without_registry_uses_fallback() {
        let outcome = synthesize(
            None,
            &AuditConfig::default(),
            "https://example.com/",
            &scores(),
            &some_findings(),
            &[],
        )
        .await;
        assert!(!outcome.used_synthesis);
        assert!(!outcome.executive_summary.is_empty());
    }

    #[test]
    fn test_prompt_includes_scores_and_gaps() {
        let gaps = vec![ExplicitGap::new("visual", "screenshots failed")];
        let prompt = build_prompt("https://example.com/", &scores(), &some_findings(), &gaps);
        assert!(prompt.contains("security: 75"));
        assert!(prompt.contains("Missing strict-transport-security header"));
        assert!(prompt.contains("screenshots failed"));
    }
}
