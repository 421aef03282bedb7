//! The orchestrator: threads the four layers, emits progress, owns the
//! run lifecycle.
//!
//! State machine per run: `Idle → Starting → Layer1 → Layer2 → Layer3 →
//! Layer4 → Complete`, with an absorbing `Error` state reachable only from
//! programming faults. Collector and audit failures are soft and never
//! reach `Error`. Transitions are one-way; there are no back-edges.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::audits;
use crate::cache::{Cache, CacheKind};
use crate::collectors::{
    self, CollectorContext, LighthouseBackend, ScreenshotBackend, SerpBackend,
};
use crate::error::{AuditError, Result};
use crate::extract;
use crate::fetch::SafeFetch;
use crate::limit::ConcurrencyLimit;
use crate::merge::merge_findings;
use crate::net_guard::UrlValidator;
use crate::providers::{GeminiProvider, OpenAiProvider, ProviderRegistry};
use crate::score::{action_plan, compute_scores, top_issues};
use crate::synthesis::synthesize;
use crate::types::config::AuditConfig;
use crate::types::events::{AuditEvent, EventPayload, EventSink};
use crate::types::identity::AuditIdentity;
use crate::types::raw::RawSnapshot;
use crate::types::report::{
    AuditReport, LayerTimings, PrivateArtifacts, RunMetadata,
};

/// Run phases, in order. Transitions only advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunState {
    Idle,
    Starting,
    Layer1,
    Layer2,
    Layer3,
    Layer4,
    Complete,
    Error,
}

impl RunState {
    /// The next phase on the happy path.
    pub fn next(self) -> RunState {
        match self {
            RunState::Idle => RunState::Starting,
            RunState::Starting => RunState::Layer1,
            RunState::Layer1 => RunState::Layer2,
            RunState::Layer2 => RunState::Layer3,
            RunState::Layer3 => RunState::Layer4,
            RunState::Layer4 => RunState::Complete,
            RunState::Complete => RunState::Complete,
            RunState::Error => RunState::Error,
        }
    }

    /// Whether moving to `target` is legal: strictly forward, or a jump to
    /// the absorbing error state.
    pub fn can_advance_to(self, target: RunState) -> bool {
        target == RunState::Error || target > self
    }
}

/// A request to audit one site.
#[derive(Debug, Clone)]
pub struct AuditRequest {
    pub url: String,
    pub pdp_url: Option<String>,
    pub config: AuditConfig,
}

impl AuditRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pdp_url: None,
            config: AuditConfig::default(),
        }
    }

    pub fn with_pdp_url(mut self, url: impl Into<String>) -> Self {
        self.pdp_url = Some(url.into());
        self.config.enable_pdp = true;
        self
    }

    pub fn with_config(mut self, config: AuditConfig) -> Self {
        self.config = config;
        self
    }
}

/// A running audit: the event stream plus the eventual report.
pub struct AuditHandle {
    pub identity: AuditIdentity,
    pub events: mpsc::UnboundedReceiver<AuditEvent>,
    report: JoinHandle<Result<AuditReport>>,
    cancel: CancellationToken,
}

impl AuditHandle {
    /// Ask the run to stop. In-flight probes and audits are interrupted,
    /// emitted findings are discarded, and no report is produced.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the final report.
    pub async fn wait(self) -> Result<AuditReport> {
        match self.report.await {
            Ok(result) => result,
            Err(join_err) => Err(AuditError::Internal(format!(
                "audit task failed: {}",
                join_err
            ))),
        }
    }
}

/// The audit engine entry point. Owns the cache, the provider registry,
/// and the external probe backends; cheap to clone per process.
pub struct Auditor {
    cache: Cache,
    registry: Option<Arc<ProviderRegistry>>,
    validator: UrlValidator,
    screenshots: Option<Arc<dyn ScreenshotBackend>>,
    lighthouse: Option<Arc<dyn LighthouseBackend>>,
    serp: Option<Arc<dyn SerpBackend>>,
}

impl Default for Auditor {
    fn default() -> Self {
        Self::new()
    }
}

impl Auditor {
    /// A bare auditor: in-memory cache, no providers, no external
    /// backends. Every LLM stage degrades to gaps and the deterministic
    /// fallback.
    pub fn new() -> Self {
        Self {
            cache: Cache::in_memory(),
            registry: None,
            validator: UrlValidator::new(),
            screenshots: None,
            lighthouse: None,
            serp: None,
        }
    }

    /// Wire up everything the environment provides: Gemini/OpenAI keys,
    /// ScreenshotOne, PSI, and a SERP backend. Missing keys silently
    /// degrade the dependent stages; they never abort a run.
    pub fn from_env(config: &AuditConfig) -> Self {
        let mut registry = ProviderRegistry::new();
        let mut any_provider = false;

        if let Some(gemini) = GeminiProvider::from_env() {
            registry.register(Arc::new(gemini), config.gemini.max_concurrent);
            any_provider = true;
        }
        if let Some(openai) = OpenAiProvider::from_env() {
            registry.register(Arc::new(openai), config.openai.max_concurrent);
            any_provider = true;
        }

        Self {
            cache: Cache::in_memory(),
            registry: any_provider.then(|| Arc::new(registry)),
            validator: UrlValidator::new(),
            screenshots: collectors::ScreenshotOneBackend::from_env()
                .map(|b| Arc::new(b) as Arc<dyn ScreenshotBackend>),
            lighthouse: Some(Arc::new(collectors::PsiBackend::new())),
            serp: collectors::serp::backend_from_env(),
        }
    }

    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_registry(mut self, registry: Arc<ProviderRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_validator(mut self, validator: UrlValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_screenshot_backend(mut self, backend: Arc<dyn ScreenshotBackend>) -> Self {
        self.screenshots = Some(backend);
        self
    }

    pub fn with_lighthouse_backend(mut self, backend: Arc<dyn LighthouseBackend>) -> Self {
        self.lighthouse = Some(backend);
        self
    }

    pub fn with_serp_backend(mut self, backend: Arc<dyn SerpBackend>) -> Self {
        self.serp = Some(backend);
        self
    }

    /// Validate and launch a run. Hard validation errors (a URL that does
    /// not parse) are reported synchronously; the run never starts.
    pub fn run(&self, request: AuditRequest) -> Result<AuditHandle> {
        let identity = AuditIdentity::new(
            &request.url,
            request.pdp_url.as_deref(),
            request.config.tool_versions.clone(),
            request.config.prompt_versions.clone(),
        )?;

        let (sink, events) = EventSink::channel();
        let cancel = CancellationToken::new();

        let pipeline = Pipeline {
            identity: identity.clone(),
            config: request.config,
            cache: self.cache.clone(),
            registry: self.registry.clone(),
            validator: self.validator.clone(),
            screenshots: self.screenshots.clone(),
            lighthouse: self.lighthouse.clone(),
            serp: self.serp.clone(),
            sink,
            cancel: cancel.clone(),
        };

        let report = tokio::spawn(pipeline.run());

        Ok(AuditHandle {
            identity,
            events,
            report,
            cancel,
        })
    }
}

struct Pipeline {
    identity: AuditIdentity,
    config: AuditConfig,
    cache: Cache,
    registry: Option<Arc<ProviderRegistry>>,
    validator: UrlValidator,
    screenshots: Option<Arc<dyn ScreenshotBackend>>,
    lighthouse: Option<Arc<dyn LighthouseBackend>>,
    serp: Option<Arc<dyn SerpBackend>>,
    sink: EventSink,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Drive the whole run. Panics anywhere in the layers are trapped
    /// here and become the absorbing error state.
    async fn run(self) -> Result<AuditReport> {
        let sink = self.sink.clone();

        let result = std::panic::AssertUnwindSafe(self.execute())
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(err)) => {
                sink.emit(EventPayload::AuditError {
                    code: err.code(),
                    message: err.to_string(),
                });
                Err(err)
            }
            Err(_) => {
                error!("audit pipeline panicked");
                let err = AuditError::Internal("audit pipeline panicked".to_string());
                sink.emit(EventPayload::AuditError {
                    code: err.code(),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn execute(self) -> Result<AuditReport> {
        let mut state = RunState::Idle;
        let mut timings = LayerTimings::default();

        advance(&mut state, RunState::Starting);
        self.sink.emit(EventPayload::AuditStart {
            url: self.identity.normalized_url.clone(),
        });

        // A fresh public report under this identity short-circuits the run
        if let Some(report) = self
            .cache
            .get::<AuditReport>(CacheKind::PublicReport, &self.identity)
            .await
        {
            info!(url = %self.identity.normalized_url, "serving cached report");
            self.sink.emit(EventPayload::AuditComplete {
                report: Box::new(report.clone()),
            });
            return Ok(report);
        }

        // Layer 1: collection
        advance(&mut state, RunState::Layer1);
        self.sink.emit(EventPayload::Layer1Start);
        let layer1_started = Instant::now();

        let raw = match self
            .cache
            .get::<RawSnapshot>(CacheKind::RawSnapshot, &self.identity)
            .await
        {
            Some(cached) => cached,
            None => {
                let ctx = CollectorContext {
                    identity: self.identity.clone(),
                    config: self.config.clone(),
                    fetch: SafeFetch::new(self.validator.clone()),
                    limiter: ConcurrencyLimit::new(self.config.collector_concurrency),
                    screenshots: self.screenshots.clone(),
                    lighthouse: self.lighthouse.clone(),
                    serp: self.serp.clone(),
                };
                let raw = collectors::run_collectors(&ctx, &self.sink, &self.cancel).await;
                self.cache
                    .put(
                        CacheKind::RawSnapshot,
                        &self.identity,
                        &raw,
                        Duration::from_secs(self.config.cache_ttls.raw_snapshot_secs),
                    )
                    .await;
                raw
            }
        };

        timings.collection_ms = layer1_started.elapsed().as_millis() as u64;
        self.sink.emit(EventPayload::Layer1Complete);
        self.check_cancelled()?;

        // Layer 2: extraction
        advance(&mut state, RunState::Layer2);
        self.sink.emit(EventPayload::Layer2Start);
        let layer2_started = Instant::now();

        let snapshot = extract::build_snapshot(&raw);
        self.cache
            .put(
                CacheKind::SiteSnapshot,
                &self.identity,
                &snapshot,
                Duration::from_secs(self.config.cache_ttls.site_snapshot_secs),
            )
            .await;

        timings.extraction_ms = layer2_started.elapsed().as_millis() as u64;
        self.sink.emit(EventPayload::Layer2Complete);
        self.check_cancelled()?;

        // Layer 3: micro-audits
        advance(&mut state, RunState::Layer3);
        self.sink.emit(EventPayload::Layer3Start);
        let layer3_started = Instant::now();

        let layer3 = audits::run_audits(
            &snapshot,
            &raw,
            self.registry.as_deref(),
            &self.config,
            &self.sink,
            &self.cancel,
        )
        .await;

        timings.audits_ms = layer3_started.elapsed().as_millis() as u64;
        self.sink.emit(EventPayload::Layer3Complete);
        self.check_cancelled()?;

        // Private flags and trace never touch the public report; they live
        // in their own short-TTL cache slot
        let artifacts = PrivateArtifacts {
            flags: layer3.flags,
            trace: layer3.trace,
        };
        if !artifacts.is_empty() {
            self.cache
                .put(
                    CacheKind::PrivateFlags,
                    &self.identity,
                    &artifacts,
                    Duration::from_secs(self.config.cache_ttls.private_flags_secs),
                )
                .await;
        }

        // Layer 4: merge, score, synthesize
        advance(&mut state, RunState::Layer4);
        self.sink.emit(EventPayload::Layer4Start);
        let layer4_started = Instant::now();

        let merged = merge_findings(layer3.findings, &self.config.merge);
        let scores = compute_scores(&merged, &snapshot, &self.config.score);
        let plan = action_plan(&merged, &self.config.plan_caps);
        let issues = top_issues(&merged, 10);

        let synthesis = synthesize(
            self.registry.as_deref(),
            &self.config,
            &self.identity.normalized_url,
            &scores,
            &merged,
            &layer3.gaps,
        )
        .await;

        timings.synthesis_ms = layer4_started.elapsed().as_millis() as u64;
        self.check_cancelled()?;

        let metadata = RunMetadata {
            timings,
            total_cost_usd: self
                .registry
                .as_deref()
                .map(|r| r.cost().total_usd())
                .unwrap_or(0.0),
            providers_used: self
                .registry
                .as_deref()
                .map(|r| r.cost().providers_used())
                .unwrap_or_default(),
            completed_audits: layer3.completed,
            failed_audits: layer3.failed,
        };

        let report = AuditReport {
            identity: self.identity.clone(),
            generated_at: chrono::Utc::now(),
            scores,
            findings: merged,
            top_issues: if synthesis.top_issues.is_empty() {
                issues
            } else {
                synthesis.top_issues.clone()
            },
            action_plan: plan,
            executive_summary: synthesis.executive_summary,
            score_justifications: synthesis.score_justifications,
            explicit_gaps: layer3.gaps,
            used_synthesis: synthesis.used_synthesis,
            metadata,
        };

        self.cache
            .put(
                CacheKind::PublicReport,
                &self.identity,
                &report,
                Duration::from_secs(self.config.cache_ttls.public_report_secs),
            )
            .await;

        self.sink.emit(EventPayload::Layer4Complete);
        advance(&mut state, RunState::Complete);
        self.sink.emit(EventPayload::AuditComplete {
            report: Box::new(report.clone()),
        });

        info!(
            url = %self.identity.normalized_url,
            findings = report.findings.len(),
            overall = report.scores.overall,
            "audit complete"
        );

        Ok(report)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(AuditError::Cancelled)
        } else {
            Ok(())
        }
    }
}

fn advance(state: &mut RunState, target: RunState) {
    debug_assert!(state.can_advance_to(target), "illegal transition");
    *state = target;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_machine_is_one_way() {
        assert!(RunState::Idle.can_advance_to(RunState::Starting));
        assert!(RunState::Layer1.can_advance_to(RunState::Layer2));
        assert!(!RunState::Layer3.can_advance_to(RunState::Layer1));
        assert!(!RunState::Complete.can_advance_to(RunState::Layer4));
        // Error is absorbing and reachable from anywhere
        assert!(RunState::Layer2.can_advance_to(RunState::Error));
        assert!(!RunState::Error.can_advance_to(RunState::Complete));
    }

    #[test]
    fn test_next_walks_the_happy_path() {
        let mut state = RunState::Idle;
        let expected = [
            RunState::Starting,
            RunState::Layer1,
            RunState::Layer2,
            RunState::Layer3,
            RunState::Layer4,
            RunState::Complete,
        ];
        for target in expected {
            state = state.next();
            assert_eq!(state, target);
        }
        assert_eq!(state.next(), RunState::Complete);
    }

    #[test]
    fn test_invalid_url_rejected_synchronously() {
        // No runtime needed: validation happens before any spawn
        let auditor = Auditor::new();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let _guard = runtime.enter();

        let result = auditor.run(AuditRequest::new("not a url at all"));
        assert!(matches!(result, Err(AuditError::InvalidUrl { .. })));
    }
}
