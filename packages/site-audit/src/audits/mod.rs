//! Layer 3: micro-audits over the normalized snapshot.
//!
//! The four deterministic audits are pure rule catalogs and run inline -
//! they are microseconds of CPU. The two LLM audits run in parallel under
//! the provider registry's rate limits, each behind a hard timeout.
//! Failures never propagate: they become explicit gaps.

pub mod crawl;
pub mod envelope;
pub mod performance;
pub mod security;
pub mod serp;
pub mod technical;
pub mod visual;

use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::providers::ProviderRegistry;
use crate::types::config::AuditConfig;
use crate::types::events::{EventPayload, EventSink, ProbeStatus};
use crate::types::finding::{Finding, PrivateFlag};
use crate::types::raw::RawSnapshot;
use crate::types::report::ExplicitGap;
use crate::types::snapshot::SiteSnapshot;

/// Everything Layer 3 produced.
#[derive(Default)]
pub struct Layer3Output {
    pub findings: Vec<Finding>,
    pub flags: Vec<PrivateFlag>,
    pub gaps: Vec<ExplicitGap>,
    pub trace: Vec<String>,
    pub completed: Vec<String>,
    pub failed: Vec<String>,
}

impl Layer3Output {
    fn absorb_findings(&mut self, sink: &EventSink, findings: Vec<Finding>) {
        for finding in findings {
            sink.emit(EventPayload::Layer3Finding {
                finding: Box::new(finding.clone()),
            });
            self.findings.push(finding);
        }
    }
}

/// Run every micro-audit.
pub async fn run_audits(
    snapshot: &SiteSnapshot,
    raw: &RawSnapshot,
    registry: Option<&ProviderRegistry>,
    config: &AuditConfig,
    sink: &EventSink,
    cancel: &CancellationToken,
) -> Layer3Output {
    let mut output = Layer3Output::default();

    run_deterministic(snapshot, raw, config, sink, &mut output);
    collect_data_gaps(snapshot, raw, &mut output);

    if cancel.is_cancelled() {
        return output;
    }

    run_llm_audits(snapshot, raw, registry, config, sink, cancel, &mut output).await;

    info!(
        findings = output.findings.len(),
        flags = output.flags.len(),
        gaps = output.gaps.len(),
        "layer 3 complete"
    );

    output
}

/// Run one deterministic audit behind a panic trap.
fn deterministic<T>(
    name: &str,
    sink: &EventSink,
    output: &mut Layer3Output,
    run: impl FnOnce() -> T + std::panic::UnwindSafe,
    absorb: impl FnOnce(T, &mut Layer3Output, &EventSink),
) {
    sink.audit(name, ProbeStatus::Started, None);
    match catch_unwind(run) {
        Ok(result) => {
            absorb(result, output, sink);
            output.completed.push(name.to_string());
            sink.audit(name, ProbeStatus::Completed, None);
        }
        Err(_) => {
            warn!(audit = name, "deterministic audit panicked");
            output.failed.push(name.to_string());
            output
                .gaps
                .push(ExplicitGap::new(name, "audit panicked; results discarded"));
            output
                .trace
                .push(format!("{} audit panicked; findings discarded", name));
            sink.audit(name, ProbeStatus::Failed, Some("audit panicked".into()));
        }
    }
}

fn run_deterministic(
    snapshot: &SiteSnapshot,
    raw: &RawSnapshot,
    config: &AuditConfig,
    sink: &EventSink,
    output: &mut Layer3Output,
) {
    deterministic(
        "crawl",
        sink,
        output,
        AssertUnwindSafe(|| crawl::audit(snapshot, raw)),
        |findings, out, sink| out.absorb_findings(sink, findings),
    );

    deterministic(
        "technical",
        sink,
        output,
        AssertUnwindSafe(|| technical::audit(snapshot, raw)),
        |findings, out, sink| out.absorb_findings(sink, findings),
    );

    deterministic(
        "security",
        sink,
        output,
        AssertUnwindSafe(|| security::audit(snapshot, raw, config.enable_codebase_peek)),
        |result, out, sink| {
            out.absorb_findings(sink, result.findings);
            out.flags.extend(result.flags);
        },
    );

    deterministic(
        "performance",
        sink,
        output,
        AssertUnwindSafe(|| performance::audit(snapshot, raw)),
        |findings, out, sink| out.absorb_findings(sink, findings),
    );
}

/// Record gaps for data the deterministic audits had to work without.
fn collect_data_gaps(snapshot: &SiteSnapshot, raw: &RawSnapshot, output: &mut Layer3Output) {
    if snapshot.perf.is_none() {
        output.gaps.push(ExplicitGap::new(
            "performance",
            raw.lighthouse
                .as_error()
                .unwrap_or("no performance report available"),
        ));
    }

    if snapshot
        .site_wide
        .security_headers
        .values()
        .all(|state| state.is_unknown())
    {
        output.gaps.push(ExplicitGap::new(
            "security",
            raw.root_fetch
                .as_error()
                .unwrap_or("response headers were not observed"),
        ));
    }
}

async fn run_llm_audits(
    snapshot: &SiteSnapshot,
    raw: &RawSnapshot,
    registry: Option<&ProviderRegistry>,
    config: &AuditConfig,
    sink: &EventSink,
    cancel: &CancellationToken,
    output: &mut Layer3Output,
) {
    let registry = match registry {
        Some(r) => r,
        None => {
            output
                .gaps
                .push(ExplicitGap::new("visual", "no LLM providers configured"));
            output
                .gaps
                .push(ExplicitGap::new("serp", "no LLM providers configured"));
            return;
        }
    };

    let visual_enabled = config.visual_mode.enabled();
    if !visual_enabled {
        output
            .gaps
            .push(ExplicitGap::new("visual", "visual mode disabled"));
    }

    let hard_timeout = config.timeouts.llm();

    let visual_task = async {
        if !visual_enabled {
            return None;
        }
        sink.audit("visual", ProbeStatus::Started, None);
        let result = tokio::select! {
            r = tokio::time::timeout(hard_timeout, visual::audit(raw, registry, config)) => match r {
                Ok(inner) => inner,
                Err(_) => Err(format!("visual audit timed out after {}s", hard_timeout.as_secs())),
            },
            _ = cancel.cancelled() => Err("cancelled".to_string()),
        };
        Some(result)
    };

    let serp_task = async {
        sink.audit("serp", ProbeStatus::Started, None);
        let result = tokio::select! {
            r = tokio::time::timeout(hard_timeout, serp::audit(raw, snapshot, registry, config)) => match r {
                Ok(inner) => inner,
                Err(_) => Err(format!("serp audit timed out after {}s", hard_timeout.as_secs())),
            },
            _ = cancel.cancelled() => Err("cancelled".to_string()),
        };
        Some(result)
    };

    let (visual_result, serp_result) = tokio::join!(visual_task, serp_task);

    for (name, result) in [("visual", visual_result), ("serp", serp_result)] {
        let result = match result {
            Some(r) => r,
            None => continue, // audit not attempted
        };
        match result {
            Ok(outcome) => {
                output.absorb_findings(sink, outcome.findings);
                output.trace.extend(outcome.trace);
                output.completed.push(name.to_string());
                sink.audit(name, ProbeStatus::Completed, None);
            }
            Err(reason) => {
                output.failed.push(name.to_string());
                output.gaps.push(ExplicitGap::new(name, reason.clone()));
                sink.audit(name, ProbeStatus::Failed, Some(reason));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::snapshots::{empty_site_snapshot, snapshot_with_headers};

    #[tokio::test]
    async fn test_deterministic_audits_always_complete() {
        let (snapshot, raw) = snapshot_with_headers(&[], true);
        let (sink, _rx) = EventSink::channel();
        let cancel = CancellationToken::new();

        let output = run_audits(&snapshot, &raw, None, &AuditConfig::default(), &sink, &cancel).await;

        for name in ["crawl", "technical", "security", "performance"] {
            assert!(output.completed.contains(&name.to_string()), "{} completed", name);
        }
        // No registry: both LLM audits appear as gaps
        assert!(output.gaps.iter().any(|g| g.source == "visual"));
        assert!(output.gaps.iter().any(|g| g.source == "serp"));
    }

    #[tokio::test]
    async fn test_gap_for_missing_performance_data() {
        let (snapshot, raw) = empty_site_snapshot();
        let (sink, _rx) = EventSink::channel();
        let cancel = CancellationToken::new();

        let output = run_audits(&snapshot, &raw, None, &AuditConfig::default(), &sink, &cancel).await;
        assert!(output.gaps.iter().any(|g| g.source == "performance"));
        assert!(output.gaps.iter().any(|g| g.source == "security"));
    }

    #[tokio::test]
    async fn test_audit_events_paired() {
        let (snapshot, raw) = snapshot_with_headers(&[], true);
        let (sink, mut rx) = EventSink::channel();
        let cancel = CancellationToken::new();

        run_audits(&snapshot, &raw, None, &AuditConfig::default(), &sink, &cancel).await;

        let mut started = 0;
        let mut terminal = 0;
        while let Ok(event) = rx.try_recv() {
            if let EventPayload::Layer3Audit { status, .. } = event.payload {
                match status {
                    ProbeStatus::Started => started += 1,
                    ProbeStatus::Completed | ProbeStatus::Failed => terminal += 1,
                }
            }
        }
        assert_eq!(started, terminal);
        assert_eq!(started, 4);
    }
}
