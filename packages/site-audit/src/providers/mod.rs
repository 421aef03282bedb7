//! LLM provider abstraction.
//!
//! The core talks to LLMs only through the [`Provider`] trait; concrete
//! adapters wrap the `llm-client` transport package. The
//! [`registry::ProviderRegistry`] owns per-provider concurrency slots,
//! fallback routing, and cost accounting.

pub mod gemini;
pub mod openai;
pub mod pricing;
pub mod registry;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use pricing::{CostTracker, PricingTable};
pub use registry::{AuditTask, ProviderRegistry, TaskAssignment};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ProviderResult;

/// A base64 image passed to a vision call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInput {
    pub base64: String,
    pub mime_type: String,
}

impl ImageInput {
    pub fn png(base64: impl Into<String>) -> Self {
        Self {
            base64: base64.into(),
            mime_type: "image/png".to_string(),
        }
    }
}

/// A unified generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub model: String,
    pub system_instruction: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            system_instruction: None,
            temperature: None,
            max_tokens: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system_instruction = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Same request pointed at a different model (fallback routing).
    pub fn for_model(&self, model: impl Into<String>) -> Self {
        let mut request = self.clone();
        request.model = model.into();
        request
    }
}

/// Token usage reported by a provider call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

/// A completed generation.
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub text: String,
    pub usage: Usage,
    pub model: String,
    pub duration_ms: u64,
}

/// The adapter interface the core consumes. Implementations wrap one
/// provider's transport and never leak its SDK types.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider name, e.g. `gemini` or `openai`.
    fn name(&self) -> &'static str;

    /// Plain text generation.
    async fn generate_text(&self, request: &GenerateRequest) -> ProviderResult<GenerateResponse>;

    /// Vision generation over base64 images.
    async fn generate_with_vision(
        &self,
        request: &GenerateRequest,
        images: &[ImageInput],
    ) -> ProviderResult<GenerateResponse>;

    /// Structured generation: the response text is strict JSON matching
    /// the schema.
    async fn generate_structured(
        &self,
        request: &GenerateRequest,
        schema: &serde_json::Value,
    ) -> ProviderResult<GenerateResponse>;
}
