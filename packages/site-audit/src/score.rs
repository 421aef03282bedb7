//! Layer 4 scoring and action-plan derivation.
//!
//! Scoring is pure arithmetic over merged findings plus two externally
//! measured numbers: the Lighthouse performance score and the security
//! header score. The LLM never touches these.

use crate::types::config::{PlanCaps, ScoreConfig};
use crate::types::finding::{AuditSource, Category, MergedFinding, Priority};
use crate::types::report::{ActionPlan, Scores};
use crate::types::snapshot::SiteSnapshot;

/// Compute all category scores and the weighted overall.
///
/// Measured values win where available: the Lighthouse performance score
/// and the header-analysis security score replace the deduction model for
/// their categories.
pub fn compute_scores(
    findings: &[MergedFinding],
    snapshot: &SiteSnapshot,
    config: &ScoreConfig,
) -> Scores {
    let technical = deduct(
        findings
            .iter()
            .filter(|f| f.finding.category == Category::Technical)
            .filter(|f| f.finding.source != AuditSource::Performance),
        config,
    );

    let on_page = deduct(
        findings
            .iter()
            .filter(|f| f.finding.category == Category::Seo),
        config,
    );

    let content = deduct(
        findings
            .iter()
            .filter(|f| f.finding.category == Category::Content),
        config,
    );

    let visual = deduct(
        findings.iter().filter(|f| {
            matches!(
                f.finding.category,
                Category::Design | Category::Conversion
            )
        }),
        config,
    );

    let measured_performance = snapshot
        .perf
        .as_ref()
        .and_then(|perf| perf.categories.performance);
    let performance = measured_performance.unwrap_or_else(|| {
        deduct(
            findings
                .iter()
                .filter(|f| f.finding.source == AuditSource::Performance),
            config,
        )
    });

    let measured_security = crate::audits::security::measured_security_score(snapshot);
    let security = measured_security.unwrap_or_else(|| {
        deduct(
            findings
                .iter()
                .filter(|f| f.finding.category == Category::Security),
            config,
        )
    });

    let overall = config.technical_weight * technical
        + config.on_page_weight * on_page
        + config.content_weight * content
        + config.performance_weight * performance
        + config.security_weight * security
        + config.visual_weight * visual;

    Scores {
        overall: clamp(overall),
        technical: clamp(technical),
        on_page: clamp(on_page),
        content: clamp(content),
        performance: clamp(performance),
        security: clamp(security),
        visual: clamp(visual),
    }
}

fn deduct<'a>(
    findings: impl Iterator<Item = &'a MergedFinding>,
    config: &ScoreConfig,
) -> f64 {
    let mut score = 100.0;
    for finding in findings {
        score -= match finding.finding.priority {
            Priority::Critical => config.critical_deduction,
            Priority::High => config.high_deduction,
            Priority::Medium => config.medium_deduction,
            Priority::Low => config.low_deduction,
        };
    }
    clamp(score)
}

fn clamp(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

/// Bucket fix strings by urgency, deduplicated, capped.
pub fn action_plan(findings: &[MergedFinding], caps: &PlanCaps) -> ActionPlan {
    let mut plan = ActionPlan::default();

    let mut push = |bucket: &mut Vec<String>, cap: usize, fix: &str| {
        if !fix.is_empty() && bucket.len() < cap && !bucket.iter().any(|f| f == fix) {
            bucket.push(fix.to_string());
        }
    };

    // Findings arrive sorted by priority score, so caps keep the top ones
    for finding in findings {
        match finding.finding.priority {
            Priority::Critical => push(&mut plan.immediate, caps.immediate, &finding.finding.fix),
            Priority::High => push(&mut plan.short_term, caps.short_term, &finding.finding.fix),
            Priority::Medium | Priority::Low => {
                push(&mut plan.long_term, caps.long_term, &finding.finding.fix)
            }
        }
    }

    plan
}

/// The top issue headlines for the report and the synthesis prompt.
pub fn top_issues(findings: &[MergedFinding], limit: usize) -> Vec<String> {
    findings
        .iter()
        .take(limit)
        .map(|f| f.finding.message.clone())
        .collect()
}
