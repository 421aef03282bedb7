//! Layer 1: the thirteen probes and their orchestration.
//!
//! Independent probes fan out in parallel under the per-run limiter. The
//! dependent chain - robots → sitemaps → sampling plan → HTML samples -
//! runs in order afterwards. A failed probe is recorded, evented, and
//! never fatal.

pub mod dns;
pub mod html_samples;
pub mod lighthouse;
pub mod redirects;
pub mod robots;
pub mod root;
pub mod sampling;
pub mod screenshots;
pub mod security_scan;
pub mod serp;
pub mod sitemaps;
pub mod tls;
pub mod well_known;

pub use lighthouse::{LighthouseBackend, PsiBackend};
pub use screenshots::{ScreenshotBackend, ScreenshotOneBackend};
pub use serp::{DataForSeoBackend, SerpApiBackend, SerpBackend};

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::fetch::SafeFetch;
use crate::limit::ConcurrencyLimit;
use crate::types::collector::CollectorOutput;
use crate::types::config::AuditConfig;
use crate::types::events::{EventSink, ProbeStatus};
use crate::types::identity::AuditIdentity;
use crate::types::raw::RawSnapshot;

/// Everything a probe needs: the identity, config, shared fetch primitive,
/// the per-run limiter, and the pluggable external backends.
pub struct CollectorContext {
    pub identity: AuditIdentity,
    pub config: AuditConfig,
    pub fetch: SafeFetch,
    pub limiter: ConcurrencyLimit,
    pub screenshots: Option<Arc<dyn ScreenshotBackend>>,
    pub lighthouse: Option<Arc<dyn LighthouseBackend>>,
    pub serp: Option<Arc<dyn SerpBackend>>,
}

/// Wrap one probe with lifecycle events and cancellation. Does not apply
/// the limiter - callers decide, because probes that fan out internally
/// (HTML samples) take permits per URL, not per probe.
async fn tracked<T, F>(
    sink: &EventSink,
    cancel: &CancellationToken,
    name: &str,
    probe: F,
) -> CollectorOutput<T>
where
    F: Future<Output = CollectorOutput<T>>,
{
    sink.collector(name, ProbeStatus::Started, None);

    let output = tokio::select! {
        output = probe => output,
        _ = cancel.cancelled() => CollectorOutput::err("cancelled"),
    };

    match output.as_error() {
        None => sink.collector(name, ProbeStatus::Completed, None),
        Some(error) => sink.collector(name, ProbeStatus::Failed, Some(error.to_string())),
    }

    output
}

/// Run all thirteen probes and assemble the raw snapshot.
pub async fn run_collectors(
    ctx: &CollectorContext,
    sink: &EventSink,
    cancel: &CancellationToken,
) -> RawSnapshot {
    info!(
        url = %ctx.identity.normalized_url,
        concurrency = ctx.limiter.limit(),
        "layer 1 starting"
    );

    // Independent probes fan out under the limiter
    let (
        root_fetch,
        robots_txt,
        redirect_map,
        dns_facts,
        tls_facts,
        well_known,
        screenshots,
        lighthouse,
        serp_raw,
        security_scan,
    ) = tokio::join!(
        tracked(sink, cancel, "root_fetch", ctx.limiter.run(root::collect(ctx))),
        tracked(sink, cancel, "robots_txt", ctx.limiter.run(robots::collect(ctx))),
        tracked(sink, cancel, "redirect_map", ctx.limiter.run(redirects::collect(ctx))),
        tracked(sink, cancel, "dns_facts", ctx.limiter.run(dns::collect(ctx))),
        tracked(sink, cancel, "tls_facts", ctx.limiter.run(tls::collect(ctx))),
        tracked(sink, cancel, "well_known", ctx.limiter.run(well_known::collect(ctx))),
        tracked(sink, cancel, "screenshots", ctx.limiter.run(screenshots::collect(ctx))),
        tracked(sink, cancel, "lighthouse", ctx.limiter.run(lighthouse::collect(ctx))),
        tracked(sink, cancel, "serp_raw", ctx.limiter.run(serp::collect(ctx))),
        tracked(sink, cancel, "security_scan", ctx.limiter.run(security_scan::collect(ctx))),
    );

    // Dependent chain: sitemaps wait on robots, sampling on sitemaps,
    // samples on the plan
    let sitemaps = tracked(
        sink,
        cancel,
        "sitemaps",
        sitemaps::collect(ctx, robots_txt.as_data()),
    )
    .await;

    let url_sampling_plan = tracked(
        sink,
        cancel,
        "url_sampling_plan",
        sampling::collect(ctx, sitemaps.as_data()),
    )
    .await;

    let html_samples = tracked(
        sink,
        cancel,
        "html_samples",
        html_samples::collect(ctx, url_sampling_plan.as_data()),
    )
    .await;

    let snapshot = RawSnapshot {
        identity: ctx.identity.clone(),
        collected_at: Utc::now(),
        root_fetch,
        robots_txt,
        sitemaps,
        url_sampling_plan,
        html_samples,
        redirect_map,
        dns_facts,
        tls_facts,
        well_known,
        screenshots,
        lighthouse,
        serp_raw,
        security_scan,
    };

    info!(
        failed = snapshot.failed_probes().len(),
        "layer 1 complete"
    );

    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tracked_emits_start_and_terminal() {
        let (sink, mut rx) = EventSink::channel();
        let cancel = CancellationToken::new();

        let output = tracked(&sink, &cancel, "dns_facts", async {
            CollectorOutput::ok(1u32)
        })
        .await;
        assert!(output.is_ok());

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        let first = serde_json::to_value(&first).unwrap();
        let second = serde_json::to_value(&second).unwrap();
        assert_eq!(first["status"], "started");
        assert_eq!(second["status"], "completed");
    }

    #[tokio::test]
    async fn test_tracked_failure_event_carries_message() {
        let (sink, mut rx) = EventSink::channel();
        let cancel = CancellationToken::new();

        let _: CollectorOutput<u32> = tracked(&sink, &cancel, "tls_facts", async {
            CollectorOutput::err("handshake refused")
        })
        .await;

        let _started = rx.try_recv().unwrap();
        let failed = serde_json::to_value(rx.try_recv().unwrap()).unwrap();
        assert_eq!(failed["status"], "failed");
        assert_eq!(failed["message"], "handshake refused");
    }

    #[tokio::test]
    async fn test_tracked_cancellation_is_failure() {
        let (sink, mut rx) = EventSink::channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let output: CollectorOutput<u32> = tracked(&sink, &cancel, "serp_raw", async {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            CollectorOutput::ok(1)
        })
        .await;

        assert_eq!(output.as_error(), Some("cancelled"));
        let _started = rx.try_recv().unwrap();
        let failed = serde_json::to_value(rx.try_recv().unwrap()).unwrap();
        assert_eq!(failed["status"], "failed");
    }
}
