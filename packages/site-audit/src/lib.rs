//! # Site Audit Engine
//!
//! A four-layer website audit pipeline producing a scored report of
//! evidence-backed findings across technical SEO, on-page SEO, content,
//! performance, security, and visual dimensions.
//!
//! ## Architecture
//!
//! ```text
//! AuditIdentity → Collectors (L1) → RawSnapshot
//!                                      │
//!                                      ▼
//!                               Extractors (L2) → SiteSnapshot
//!                                                    │
//!                                    ┌───────────────┴──────────────┐
//!                                    ▼                              ▼
//!                          Deterministic audits (L3)         LLM audits (L3)
//!                                    │                              │
//!                                    └────────► Findings ◄──────────┘
//!                                                  │
//!                                                  ▼
//!                                        Merger + Scorer (L4)
//!                                                  │
//!                                                  ▼
//!                                         LLM Synthesis (L4)
//!                                                  │
//!                                                  ▼
//!                                             AuditReport
//! ```
//!
//! | Layer | Contract |
//! |-------|----------|
//! | **Collection** | 13 probes, bounded fan-out, `{data, error}` - never raises |
//! | **Extraction** | Pure and deterministic: same raw snapshot, same output |
//! | **Micro-audits** | Rule catalogs + two LLM audits, failures become gaps |
//! | **Synthesis** | Dedup, arithmetic scoring, one LLM narration with fallback |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use site_audit::{AuditConfig, AuditRequest, Auditor};
//!
//! let auditor = Auditor::from_env(&AuditConfig::default());
//! let mut handle = auditor.run(AuditRequest::new("https://example.com"))?;
//!
//! while let Some(event) = handle.events.recv().await {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//!
//! let report = handle.wait().await?;
//! println!("overall: {}", report.scores.overall);
//! ```
//!
//! ## Guarantees
//!
//! - Collectors and audits never raise; every failure is data (a
//!   `CollectorOutput::err` or an `explicit_gaps` entry).
//! - Signals that were never observed are `Unknown`, never `Absent`:
//!   an audit cannot report "missing" for something it did not check.
//! - Scores are pure arithmetic over findings plus two measured numbers;
//!   the synthesis LLM narrates and cannot change them.
//! - [`types::finding::PrivateFlag`] shares no types with the public
//!   report and is cached under its own short TTL.
//!
//! ## Modules
//!
//! - [`orchestrator`] - entry point ([`Auditor`]), run lifecycle, events
//! - [`collectors`] - the thirteen Layer-1 probes
//! - [`extract`] - the six pure Layer-2 transforms
//! - [`audits`] - deterministic and LLM micro-audits
//! - [`merge`] / [`score`] / [`synthesis`] - Layer 4
//! - [`providers`] - the LLM provider seam and rate-limited registry
//! - [`fetch`] / [`limit`] / [`cache`] / [`net_guard`] - shared primitives
//! - [`testing`] - mock provider and snapshot fixtures

pub mod audits;
pub mod cache;
pub mod collectors;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod limit;
pub mod merge;
pub mod net_guard;
pub mod orchestrator;
pub mod providers;
pub mod score;
pub mod synthesis;
pub mod testing;
pub mod types;

// Re-export the surface most callers need
pub use error::{AuditError, ErrorCode, ProviderError, Result, SecurityError};
pub use orchestrator::{AuditHandle, AuditRequest, Auditor, RunState};
pub use types::{
    collector::CollectorOutput,
    config::{AuditConfig, CrawlDepth, SecurityScope, VisualMode},
    events::{AuditEvent, EventPayload, EventSink, ProbeStatus},
    finding::{
        AuditSource, Category, Confidence, Evidence, Finding, FindingKind, MergedFinding,
        Priority, PrivateFlag, PrivateFlagKind, Severity,
    },
    identity::{normalize_url, AuditIdentity},
    raw::RawSnapshot,
    report::{ActionPlan, AuditReport, ExplicitGap, RunMetadata, Scores},
    snapshot::{PageSignals, SiteSnapshot},
    tristate::TriState,
};

// Shared primitives
pub use cache::{Cache, CacheKind, CacheStore, MemoryCache};
pub use fetch::{FetchOptions, FetchResult, SafeFetch};
pub use limit::ConcurrencyLimit;
pub use net_guard::UrlValidator;
pub use providers::{Provider, ProviderRegistry};
