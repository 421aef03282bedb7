//! Rate-limited provider registry with fallback routing.
//!
//! Each provider gets a `max_concurrent` semaphore; `generate` blocks until
//! a slot is free. Audit-task → {primary, fallback, model} is a static
//! assignment table. On primary failure the registry transparently retries
//! the fallback provider with the same prompt. Semaphores are
//! process-scoped: all concurrent runs share the provider budget.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::pricing::{CostTracker, PricingTable};
use super::{GenerateRequest, GenerateResponse, ImageInput, Provider};
use crate::error::{ProviderError, ProviderResult};

/// The LLM-backed pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditTask {
    Visual,
    Serp,
    Synthesis,
}

impl AuditTask {
    pub fn name(&self) -> &'static str {
        match self {
            AuditTask::Visual => "visual",
            AuditTask::Serp => "serp",
            AuditTask::Synthesis => "synthesis",
        }
    }
}

/// Primary/fallback routing for one task.
#[derive(Debug, Clone)]
pub struct TaskAssignment {
    pub primary: &'static str,
    pub primary_model: String,
    pub fallback: &'static str,
    pub fallback_model: String,
}

fn default_assignments() -> HashMap<AuditTask, TaskAssignment> {
    let mut assignments = HashMap::new();
    assignments.insert(
        AuditTask::Visual,
        TaskAssignment {
            primary: "gemini",
            primary_model: "gemini-2.5-flash".into(),
            fallback: "openai",
            fallback_model: "gpt-4o".into(),
        },
    );
    assignments.insert(
        AuditTask::Serp,
        TaskAssignment {
            primary: "gemini",
            primary_model: "gemini-2.5-flash".into(),
            fallback: "openai",
            fallback_model: "gpt-4o-mini".into(),
        },
    );
    assignments.insert(
        AuditTask::Synthesis,
        TaskAssignment {
            primary: "openai",
            primary_model: "gpt-4o".into(),
            fallback: "gemini",
            fallback_model: "gemini-2.5-flash".into(),
        },
    );
    assignments
}

struct Slot {
    provider: Arc<dyn Provider>,
    semaphore: Arc<Semaphore>,
}

/// What shape of call a task needs.
enum CallKind<'a> {
    Text,
    Vision(&'a [ImageInput]),
    Structured(&'a serde_json::Value),
}

/// The process-scoped provider registry.
pub struct ProviderRegistry {
    slots: HashMap<&'static str, Slot>,
    assignments: HashMap<AuditTask, TaskAssignment>,
    pricing: PricingTable,
    cost: CostTracker,
}

impl ProviderRegistry {
    /// Create an empty registry with the default assignment table.
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
            assignments: default_assignments(),
            pricing: PricingTable::default(),
            cost: CostTracker::new(),
        }
    }

    /// Register a provider with its concurrency budget.
    pub fn register(&mut self, provider: Arc<dyn Provider>, max_concurrent: usize) -> &mut Self {
        let name = provider.name();
        self.slots.insert(
            name,
            Slot {
                provider,
                semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            },
        );
        self
    }

    /// Override the routing for one task.
    pub fn assign(&mut self, task: AuditTask, assignment: TaskAssignment) -> &mut Self {
        self.assignments.insert(task, assignment);
        self
    }

    /// Replace the pricing table.
    pub fn with_pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn has_provider(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn cost(&self) -> &CostTracker {
        &self.cost
    }

    /// Text generation for a task, with fallback.
    pub async fn generate_text(
        &self,
        task: AuditTask,
        request: &GenerateRequest,
    ) -> ProviderResult<GenerateResponse> {
        self.generate(task, request, CallKind::Text).await
    }

    /// Vision generation for a task, with fallback.
    pub async fn generate_with_vision(
        &self,
        task: AuditTask,
        request: &GenerateRequest,
        images: &[ImageInput],
    ) -> ProviderResult<GenerateResponse> {
        self.generate(task, request, CallKind::Vision(images)).await
    }

    /// Structured generation for a task, with fallback.
    pub async fn generate_structured(
        &self,
        task: AuditTask,
        request: &GenerateRequest,
        schema: &serde_json::Value,
    ) -> ProviderResult<GenerateResponse> {
        self.generate(task, request, CallKind::Structured(schema))
            .await
    }

    /// The provider/model route for a task: primary first, fallback second.
    /// Callers that must retry on response-content failures (not just
    /// transport failures) walk this list themselves.
    pub fn routes(&self, task: AuditTask) -> Vec<(&'static str, String)> {
        self.assignments
            .get(&task)
            .map(|a| {
                vec![
                    (a.primary, a.primary_model.clone()),
                    (a.fallback, a.fallback_model.clone()),
                ]
            })
            .unwrap_or_default()
    }

    /// One structured call against a named provider, no fallback.
    pub async fn call_structured(
        &self,
        provider: &str,
        request: &GenerateRequest,
        schema: &serde_json::Value,
    ) -> ProviderResult<GenerateResponse> {
        self.call_one(provider, request, &CallKind::Structured(schema))
            .await
    }

    async fn generate(
        &self,
        task: AuditTask,
        request: &GenerateRequest,
        kind: CallKind<'_>,
    ) -> ProviderResult<GenerateResponse> {
        let assignment = self
            .assignments
            .get(&task)
            .ok_or_else(|| ProviderError::Unknown(task.name().to_string()))?;

        let primary = request.for_model(&assignment.primary_model);
        match self
            .call_one(assignment.primary, &primary, &kind)
            .await
        {
            Ok(response) => Ok(response),
            Err(primary_err) => {
                warn!(
                    task = task.name(),
                    provider = assignment.primary,
                    error = %primary_err,
                    "primary provider failed, trying fallback"
                );
                let fallback = request.for_model(&assignment.fallback_model);
                self.call_one(assignment.fallback, &fallback, &kind)
                    .await
                    .map_err(|fallback_err| {
                        ProviderError::Call(format!(
                            "{}: {}; {}: {}",
                            assignment.primary, primary_err, assignment.fallback, fallback_err
                        ))
                    })
            }
        }
    }

    /// One provider call: acquire the slot, enforce the deadline, account
    /// the cost.
    async fn call_one(
        &self,
        provider_name: &str,
        request: &GenerateRequest,
        kind: &CallKind<'_>,
    ) -> ProviderResult<GenerateResponse> {
        let slot = self
            .slots
            .get(provider_name)
            .ok_or_else(|| ProviderError::Unknown(provider_name.to_string()))?;

        self.cost.record_attempt(provider_name);

        let _permit = slot
            .semaphore
            .acquire()
            .await
            .map_err(|_| ProviderError::Call("provider semaphore closed".into()))?;

        debug!(provider = provider_name, model = %request.model, "provider call");

        let call = async {
            match kind {
                CallKind::Text => slot.provider.generate_text(request).await,
                CallKind::Vision(images) => {
                    slot.provider.generate_with_vision(request, images).await
                }
                CallKind::Structured(schema) => {
                    slot.provider.generate_structured(request, schema).await
                }
            }
        };

        let response = tokio::time::timeout(request.timeout, call)
            .await
            .map_err(|_| ProviderError::Timeout {
                seconds: request.timeout.as_secs(),
            })??;

        let pricing = self.pricing.pricing(provider_name, &response.model);
        self.cost.record(provider_name, pricing.cost(response.usage));

        Ok(response)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::providers::Usage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Provider that fails N times then succeeds.
    struct FlakyProvider {
        name: &'static str,
        failures: AtomicUsize,
        delay: Duration,
    }

    impl FlakyProvider {
        fn failing(name: &'static str, failures: usize) -> Self {
            Self {
                name,
                failures: AtomicUsize::new(failures),
                delay: Duration::ZERO,
            }
        }

        fn slow(name: &'static str, delay: Duration) -> Self {
            Self {
                name,
                failures: AtomicUsize::new(0),
                delay,
            }
        }

        fn respond(&self, model: &str) -> ProviderResult<GenerateResponse> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(ProviderError::Call("synthetic failure".into()));
            }
            Ok(GenerateResponse {
                text: format!("{} says ok", self.name),
                usage: Usage {
                    input: 1000,
                    output: 100,
                    total: 1100,
                },
                model: model.to_string(),
                duration_ms: 1,
            })
        }
    }

    #[async_trait]
    impl Provider for FlakyProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn generate_text(
            &self,
            request: &GenerateRequest,
        ) -> ProviderResult<GenerateResponse> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.respond(&request.model)
        }

        async fn generate_with_vision(
            &self,
            request: &GenerateRequest,
            _images: &[ImageInput],
        ) -> ProviderResult<GenerateResponse> {
            self.respond(&request.model)
        }

        async fn generate_structured(
            &self,
            request: &GenerateRequest,
            _schema: &serde_json::Value,
        ) -> ProviderResult<GenerateResponse> {
            self.respond(&request.model)
        }
    }

    fn registry_with(primary_failures: usize) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register(
            Arc::new(FlakyProvider::failing("openai", primary_failures)),
            4,
        );
        registry.register(Arc::new(FlakyProvider::failing("gemini", 0)), 4);
        registry
    }

    #[tokio::test]
    async fn test_primary_serves_when_healthy() {
        let registry = registry_with(0);
        let request = GenerateRequest::new("ignored", "summarize");
        let response = registry
            .generate_text(AuditTask::Synthesis, &request)
            .await
            .unwrap();
        assert_eq!(response.model, "gpt-4o");
        assert!(response.text.starts_with("openai"));
    }

    #[tokio::test]
    async fn test_fallback_on_primary_failure() {
        let registry = registry_with(1);
        let request = GenerateRequest::new("ignored", "summarize");
        let response = registry
            .generate_text(AuditTask::Synthesis, &request)
            .await
            .unwrap();
        // Synthesis falls back from openai to gemini
        assert_eq!(response.model, "gemini-2.5-flash");
        assert_eq!(
            registry.cost().providers_used(),
            vec!["gemini", "openai"]
        );
    }

    #[tokio::test]
    async fn test_both_failing_reports_both() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(FlakyProvider::failing("openai", 10)), 4);
        registry.register(Arc::new(FlakyProvider::failing("gemini", 10)), 4);

        let request = GenerateRequest::new("ignored", "summarize");
        let err = registry
            .generate_text(AuditTask::Synthesis, &request)
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("openai"));
        assert!(message.contains("gemini"));
    }

    #[tokio::test]
    async fn test_timeout_enforced() {
        let mut registry = ProviderRegistry::new();
        registry.register(
            Arc::new(FlakyProvider::slow("openai", Duration::from_secs(5))),
            4,
        );
        registry.register(
            Arc::new(FlakyProvider::slow("gemini", Duration::from_secs(5))),
            4,
        );

        let request =
            GenerateRequest::new("ignored", "summarize").with_timeout(Duration::from_millis(50));
        let err = registry
            .generate_text(AuditTask::Synthesis, &request)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_cost_accumulates_from_usage() {
        let registry = registry_with(0);
        let request = GenerateRequest::new("ignored", "summarize");
        registry
            .generate_text(AuditTask::Synthesis, &request)
            .await
            .unwrap();
        // gpt-4o: 1.0 * 0.0025 + 0.1 * 0.01
        assert!((registry.cost().total_usd() - 0.0035).abs() < 1e-9);
    }
}
