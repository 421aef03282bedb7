//! Performance extraction: Core Web Vitals and category scores from the
//! Lighthouse report, classified against the standard thresholds.

use crate::types::raw::LighthouseFacts;
use crate::types::snapshot::{CategoryScores, CwvRating, PerfFacts, PerfMetrics, PerfRatings};

/// LCP thresholds in milliseconds.
pub const LCP_GOOD_MS: f64 = 2500.0;
pub const LCP_POOR_MS: f64 = 4000.0;

/// CLS thresholds (unitless).
pub const CLS_GOOD: f64 = 0.1;
pub const CLS_POOR: f64 = 0.25;

/// TBT thresholds in milliseconds.
pub const TBT_GOOD_MS: f64 = 200.0;
pub const TBT_POOR_MS: f64 = 600.0;

/// Pull metrics and category scores out of the raw report.
pub fn perf_facts(lighthouse: &LighthouseFacts) -> PerfFacts {
    let report = &lighthouse.report;

    let metric = |name: &str| report["audits"][name]["numericValue"].as_f64();

    let metrics = PerfMetrics {
        lcp_ms: metric("largest-contentful-paint"),
        cls: metric("cumulative-layout-shift"),
        tbt_ms: metric("total-blocking-time"),
        fcp_ms: metric("first-contentful-paint"),
        ttfb_ms: metric("server-response-time"),
    };

    let ratings = PerfRatings {
        lcp: metrics.lcp_ms.map(|v| classify(v, LCP_GOOD_MS, LCP_POOR_MS)),
        cls: metrics.cls.map(|v| classify(v, CLS_GOOD, CLS_POOR)),
        tbt: metrics.tbt_ms.map(|v| classify(v, TBT_GOOD_MS, TBT_POOR_MS)),
    };

    // Category scores arrive on a 0-1 scale
    let category = |name: &str| {
        report["categories"][name]["score"]
            .as_f64()
            .map(|s| (s * 100.0).round())
    };

    let categories = CategoryScores {
        performance: category("performance"),
        accessibility: category("accessibility"),
        best_practices: category("best-practices"),
        seo: category("seo"),
        pwa: category("pwa"),
    };

    PerfFacts {
        metrics,
        ratings,
        categories,
    }
}

/// Standard three-way classification: good below the first threshold, poor
/// at or above the second.
pub fn classify(value: f64, good_below: f64, poor_at: f64) -> CwvRating {
    if value < good_below {
        CwvRating::Good
    } else if value >= poor_at {
        CwvRating::Poor
    } else {
        CwvRating::NeedsImprovement
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn facts(report: serde_json::Value) -> LighthouseFacts {
        LighthouseFacts {
            report,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_metric_extraction() {
        let report = serde_json::json!({
            "audits": {
                "largest-contentful-paint": {"numericValue": 5200.0},
                "cumulative-layout-shift": {"numericValue": 0.30},
                "total-blocking-time": {"numericValue": 700.0},
                "first-contentful-paint": {"numericValue": 1800.0},
                "server-response-time": {"numericValue": 450.0},
            },
            "categories": {
                "performance": {"score": 0.23},
                "seo": {"score": 0.91},
            }
        });

        let perf = perf_facts(&facts(report));

        assert_eq!(perf.metrics.lcp_ms, Some(5200.0));
        assert_eq!(perf.ratings.lcp, Some(CwvRating::Poor));
        assert_eq!(perf.ratings.cls, Some(CwvRating::Poor));
        assert_eq!(perf.ratings.tbt, Some(CwvRating::Poor));
        assert_eq!(perf.categories.performance, Some(23.0));
        assert_eq!(perf.categories.seo, Some(91.0));
        assert!(perf.categories.pwa.is_none());
    }

    #[test]
    fn test_classification_boundaries() {
        assert_eq!(classify(2499.0, LCP_GOOD_MS, LCP_POOR_MS), CwvRating::Good);
        assert_eq!(
            classify(2500.0, LCP_GOOD_MS, LCP_POOR_MS),
            CwvRating::NeedsImprovement
        );
        assert_eq!(classify(4000.0, LCP_GOOD_MS, LCP_POOR_MS), CwvRating::Poor);

        assert_eq!(classify(0.09, CLS_GOOD, CLS_POOR), CwvRating::Good);
        assert_eq!(classify(0.25, CLS_GOOD, CLS_POOR), CwvRating::Poor);
    }

    #[test]
    fn test_missing_metrics_stay_none() {
        let perf = perf_facts(&facts(serde_json::json!({})));
        assert!(perf.metrics.lcp_ms.is_none());
        assert!(perf.ratings.lcp.is_none());
        assert!(perf.categories.performance.is_none());
    }
}
