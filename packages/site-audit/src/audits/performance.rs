//! Performance audit over the extracted Core Web Vitals.

use crate::extract::perf::{CLS_GOOD, LCP_GOOD_MS, TBT_GOOD_MS};
use crate::types::finding::{AuditSource, Evidence, Finding, FindingKind, Severity};
use crate::types::raw::RawSnapshot;
use crate::types::snapshot::{CwvRating, SiteSnapshot};

const SOURCE: AuditSource = AuditSource::Performance;

const TTFB_SLOW_MS: f64 = 600.0;
const FCP_POOR_MS: f64 = 3000.0;
const LOW_SCORE_THRESHOLD: f64 = 50.0;

/// Run the performance rules. No perf facts means the probe failed and
/// the runner records the gap; nothing is asserted here.
pub fn audit(snapshot: &SiteSnapshot, _raw: &RawSnapshot) -> Vec<Finding> {
    let perf = match &snapshot.perf {
        Some(perf) => perf,
        None => return Vec::new(),
    };

    let mut findings = Vec::new();

    cwv_rule(
        perf.ratings.lcp,
        perf.metrics.lcp_ms,
        FindingKind::PerfPoorLcp,
        "Largest Contentful Paint",
        "ms",
        LCP_GOOD_MS,
        "Optimize the hero resource: compress it, preload it, and cut render-blocking assets",
        "LCP is the loading half of Core Web Vitals and a direct ranking input",
        &mut findings,
    );

    cwv_rule(
        perf.ratings.cls,
        perf.metrics.cls,
        FindingKind::PerfPoorCls,
        "Cumulative Layout Shift",
        "",
        CLS_GOOD,
        "Reserve space for images, embeds, and ads so late loads stop moving the layout",
        "Layout shift makes users mis-click and counts against Core Web Vitals",
        &mut findings,
    );

    cwv_rule(
        perf.ratings.tbt,
        perf.metrics.tbt_ms,
        FindingKind::PerfPoorFid,
        "Total Blocking Time",
        "ms",
        TBT_GOOD_MS,
        "Split long main-thread tasks and defer non-critical JavaScript",
        "Main-thread blocking is what users feel as unresponsive taps",
        &mut findings,
    );

    if let Some(fcp) = perf.metrics.fcp_ms {
        if fcp >= FCP_POOR_MS {
            findings.push(
                Finding::new(
                    FindingKind::PerfPoorFcp,
                    Severity::Warning,
                    SOURCE,
                    format!("First Contentful Paint is {:.0}ms", fcp),
                )
                .with_evidence(Evidence::Metric {
                    name: "first-contentful-paint".into(),
                    value: fcp,
                    threshold: FCP_POOR_MS,
                })
                .with_fix("Inline critical CSS and cut render-blocking requests before first paint")
                .with_why("Slow first paint reads as a dead page and inflates bounce rates"),
            );
        }
    }

    if let Some(ttfb) = perf.metrics.ttfb_ms {
        if ttfb >= TTFB_SLOW_MS {
            findings.push(
                Finding::new(
                    FindingKind::PerfSlowTtfb,
                    Severity::Warning,
                    SOURCE,
                    format!("Server response time is {:.0}ms", ttfb),
                )
                .with_evidence(Evidence::Metric {
                    name: "server-response-time".into(),
                    value: ttfb,
                    threshold: TTFB_SLOW_MS,
                })
                .with_fix("Cache rendered responses or move compute off the request path")
                .with_why("Every metric downstream of TTFB inherits its delay"),
            );
        }
    }

    if let Some(score) = perf.categories.performance {
        if score < LOW_SCORE_THRESHOLD {
            findings.push(
                Finding::new(
                    FindingKind::PerfLowScore,
                    Severity::Warning,
                    SOURCE,
                    format!("Lighthouse performance score is {:.0}/100", score),
                )
                .with_evidence(Evidence::Metric {
                    name: "lighthouse performance".into(),
                    value: score,
                    threshold: LOW_SCORE_THRESHOLD,
                })
                .with_fix("Work through the failing Lighthouse performance audits in order of savings")
                .with_why("A failing composite score means multiple vitals are degraded at once"),
            );
        }
    }

    findings
}

/// One finding per degraded vital: Poor is critical, NeedsImprovement is a
/// warning, Good stays silent.
#[allow(clippy::too_many_arguments)]
fn cwv_rule(
    rating: Option<CwvRating>,
    value: Option<f64>,
    kind: FindingKind,
    label: &str,
    unit: &str,
    threshold: f64,
    fix: &str,
    why: &str,
    findings: &mut Vec<Finding>,
) {
    let (rating, value) = match (rating, value) {
        (Some(rating), Some(value)) => (rating, value),
        _ => return,
    };

    let severity = match rating {
        CwvRating::Poor => Severity::Critical,
        CwvRating::NeedsImprovement => Severity::Warning,
        CwvRating::Good => return,
    };

    let formatted = if unit.is_empty() {
        format!("{:.2}", value)
    } else {
        format!("{:.0}{}", value, unit)
    };

    findings.push(
        Finding::new(kind, severity, SOURCE, format!("{} is {}", label, formatted))
            .with_evidence(Evidence::Metric {
                name: label.to_lowercase(),
                value,
                threshold,
            })
            .with_fix(fix)
            .with_why(why),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::snapshots::{empty_site_snapshot, snapshot_with_lighthouse};

    #[test]
    fn test_poor_cwv_yields_three_criticals() {
        let (snapshot, raw) = snapshot_with_lighthouse(serde_json::json!({
            "audits": {
                "largest-contentful-paint": {"numericValue": 5200.0},
                "cumulative-layout-shift": {"numericValue": 0.30},
                "total-blocking-time": {"numericValue": 700.0},
            },
            "categories": {}
        }));

        let findings = audit(&snapshot, &raw);

        for kind in [
            FindingKind::PerfPoorLcp,
            FindingKind::PerfPoorCls,
            FindingKind::PerfPoorFid,
        ] {
            let finding = findings
                .iter()
                .find(|f| f.kind == kind)
                .unwrap_or_else(|| panic!("{:?} expected", kind));
            assert_eq!(finding.severity, Severity::Critical);
        }
    }

    #[test]
    fn test_good_vitals_stay_silent() {
        let (snapshot, raw) = snapshot_with_lighthouse(serde_json::json!({
            "audits": {
                "largest-contentful-paint": {"numericValue": 1200.0},
                "cumulative-layout-shift": {"numericValue": 0.02},
                "total-blocking-time": {"numericValue": 80.0},
            },
            "categories": {"performance": {"score": 0.97}}
        }));

        let findings = audit(&snapshot, &raw);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_no_perf_data_no_findings() {
        let (snapshot, raw) = empty_site_snapshot();
        assert!(audit(&snapshot, &raw).is_empty());
    }
}
