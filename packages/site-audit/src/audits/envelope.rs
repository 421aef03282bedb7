//! The JSON envelope both LLM audits expect back.
//!
//! Responses must be `{"findings": [{category, severity, description,
//! recommendation, ...}]}`. Malformed JSON degrades to an empty finding
//! list plus a trace entry - never an error, never a panic.

use serde::Deserialize;

use crate::types::finding::{AuditSource, Category, Evidence, Finding, FindingKind, Severity};

/// One finding as the model reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmFinding {
    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub severity: Option<String>,

    pub description: String,

    #[serde(default)]
    pub recommendation: Option<String>,

    #[serde(default)]
    pub why_it_matters: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    findings: Vec<LlmFinding>,
}

/// Parse the model's reply. `Err` carries a trace line describing the
/// malformation; callers turn that into an empty list plus a trace entry.
pub fn parse_envelope(text: &str) -> Result<Vec<LlmFinding>, String> {
    let stripped = strip_code_fences(text);
    serde_json::from_str::<Envelope>(stripped)
        .map(|envelope| envelope.findings)
        .map_err(|e| format!("LLM envelope parse failed: {}", e))
}

/// Models love to wrap JSON in markdown fences; tolerate that.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// Convert a model finding into a typed one.
pub fn to_finding(
    raw: LlmFinding,
    kind: FindingKind,
    source: AuditSource,
    default_category: Category,
    affected_urls: Vec<String>,
) -> Finding {
    let severity = match raw.severity.as_deref().map(str::to_lowercase).as_deref() {
        Some("critical") => Severity::Critical,
        Some("warning") => Severity::Warning,
        Some("pass") => Severity::Pass,
        _ => Severity::Info,
    };

    let category = match raw.category.as_deref().map(str::to_lowercase).as_deref() {
        Some("seo") => Category::Seo,
        Some("technical") => Category::Technical,
        Some("content") => Category::Content,
        Some("design") => Category::Design,
        Some("conversion") => Category::Conversion,
        Some("security") => Category::Security,
        _ => default_category,
    };

    let mut finding = Finding::new(kind, severity, source, raw.description.clone())
        .with_category(category)
        .with_urls(affected_urls)
        .with_evidence(Evidence::TextSample {
            text: raw.description,
        });

    if let Some(recommendation) = raw.recommendation {
        finding = finding.with_fix(recommendation);
    }
    if let Some(why) = raw.why_it_matters {
        finding = finding.with_why(why);
    }

    finding
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_envelope() {
        let text = r#"{"findings": [{"category": "design", "severity": "warning",
            "description": "CTA is below the fold on mobile",
            "recommendation": "Move the primary CTA above the fold"}]}"#;

        let findings = parse_envelope(text).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category.as_deref(), Some("design"));
    }

    #[test]
    fn test_parse_fenced_envelope() {
        let text = "```json\n{\"findings\": []}\n```";
        assert!(parse_envelope(text).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_is_err_not_panic() {
        assert!(parse_envelope("Sure! Here are the issues I found:").is_err());
        assert!(parse_envelope("{\"findings\": [{}]}").is_err()); // missing description
    }

    #[test]
    fn test_to_finding_mapping() {
        let raw = LlmFinding {
            category: Some("Conversion".to_string()),
            severity: Some("CRITICAL".to_string()),
            description: "Checkout button invisible".to_string(),
            recommendation: Some("Raise contrast".to_string()),
            why_it_matters: None,
        };

        let finding = to_finding(
            raw,
            FindingKind::VisualIssue,
            AuditSource::Visual,
            Category::Design,
            vec!["https://example.com/".to_string()],
        );

        assert_eq!(finding.severity, Severity::Critical);
        assert_eq!(finding.category, Category::Conversion);
        assert_eq!(finding.fix, "Raise contrast");
        assert_eq!(finding.affected_urls.len(), 1);
    }

    #[test]
    fn test_unknown_severity_defaults_to_info() {
        let raw = LlmFinding {
            category: None,
            severity: Some("catastrophic".to_string()),
            description: "x".to_string(),
            recommendation: None,
            why_it_matters: None,
        };
        let finding = to_finding(
            raw,
            FindingKind::SerpIssue,
            AuditSource::Serp,
            Category::Seo,
            vec![],
        );
        assert_eq!(finding.severity, Severity::Info);
        assert_eq!(finding.category, Category::Seo);
    }
}
