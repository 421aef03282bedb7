//! Shared request/response vocabulary for both providers.

use serde::{Deserialize, Serialize};

/// A base64-encoded image attached to a vision request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageData {
    /// Base64 payload without a data-URI prefix.
    pub base64: String,

    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
}

impl ImageData {
    /// Create a PNG image from raw base64.
    pub fn png(base64: impl Into<String>) -> Self {
        Self {
            base64: base64.into(),
            mime_type: "image/png".to_string(),
        }
    }

    /// Render as a data URI (OpenAI image_url form).
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }
}

/// A provider-agnostic chat request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model identifier, e.g. `gpt-4o` or `gemini-2.5-flash`.
    pub model: String,

    /// Optional system instruction.
    pub system: Option<String>,

    /// The user prompt.
    pub prompt: String,

    /// Images for vision requests (empty for text-only).
    pub images: Vec<ImageData>,

    /// Sampling temperature.
    pub temperature: Option<f32>,

    /// Completion token cap.
    pub max_tokens: Option<u32>,

    /// When set, the provider is asked for strict JSON matching this schema.
    pub json_schema: Option<serde_json::Value>,
}

impl ChatRequest {
    /// Create a text-only request.
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            prompt: prompt.into(),
            images: Vec::new(),
            temperature: None,
            max_tokens: None,
            json_schema: None,
        }
    }

    /// Set the system instruction.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Attach images for a vision request.
    pub fn with_images(mut self, images: Vec<ImageData>) -> Self {
        self.images = images;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the completion token cap.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Request strict JSON output matching a schema.
    pub fn with_json_schema(mut self, schema: serde_json::Value) -> Self {
        self.json_schema = Some(schema);
        self
    }
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

impl TokenUsage {
    pub fn new(input: u64, output: u64) -> Self {
        Self {
            input,
            output,
            total: input + output,
        }
    }
}

/// A completed chat call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Concatenated text of the first candidate.
    pub text: String,

    /// Token usage as reported by the provider.
    pub usage: TokenUsage,

    /// Model that actually served the request.
    pub model: String,

    /// Wall-clock duration of the HTTP call.
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri() {
        let img = ImageData::png("aGVsbG8=");
        assert_eq!(img.data_uri(), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn test_usage_total() {
        let usage = TokenUsage::new(100, 25);
        assert_eq!(usage.total, 125);
    }

    #[test]
    fn test_request_builder() {
        let req = ChatRequest::new("gpt-4o", "hello")
            .with_system("be brief")
            .with_temperature(0.2)
            .with_max_tokens(512);

        assert_eq!(req.model, "gpt-4o");
        assert_eq!(req.system.as_deref(), Some("be brief"));
        assert_eq!(req.temperature, Some(0.2));
        assert_eq!(req.max_tokens, Some(512));
        assert!(req.images.is_empty());
    }
}
