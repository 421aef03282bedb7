//! Gemini adapter over the `llm-client` transport.

use async_trait::async_trait;
use llm_client::{ChatRequest, GeminiClient, ImageData};

use super::{GenerateRequest, GenerateResponse, ImageInput, Provider, Usage};
use crate::error::{ProviderError, ProviderResult};

/// Adapts [`GeminiClient`] to the core's [`Provider`] interface.
pub struct GeminiProvider {
    client: GeminiClient,
}

impl GeminiProvider {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }

    /// Build from `GEMINI_API_KEY`; `None` when the key is missing.
    pub fn from_env() -> Option<Self> {
        GeminiClient::from_env().map(Self::new)
    }

    fn to_chat_request(request: &GenerateRequest, images: &[ImageInput]) -> ChatRequest {
        let mut chat = ChatRequest::new(&request.model, &request.prompt);
        if let Some(system) = &request.system_instruction {
            chat = chat.with_system(system);
        }
        if let Some(temperature) = request.temperature {
            chat = chat.with_temperature(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            chat = chat.with_max_tokens(max_tokens);
        }
        if !images.is_empty() {
            chat = chat.with_images(
                images
                    .iter()
                    .map(|i| ImageData {
                        base64: i.base64.clone(),
                        mime_type: i.mime_type.clone(),
                    })
                    .collect(),
            );
        }
        chat
    }

    async fn run(&self, chat: ChatRequest) -> ProviderResult<GenerateResponse> {
        let response = self
            .client
            .chat(&chat)
            .await
            .map_err(|e| ProviderError::Call(e.to_string()))?;

        Ok(GenerateResponse {
            text: response.text,
            usage: Usage {
                input: response.usage.input,
                output: response.usage.output,
                total: response.usage.total,
            },
            model: response.model,
            duration_ms: response.duration_ms,
        })
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate_text(&self, request: &GenerateRequest) -> ProviderResult<GenerateResponse> {
        self.run(Self::to_chat_request(request, &[])).await
    }

    async fn generate_with_vision(
        &self,
        request: &GenerateRequest,
        images: &[ImageInput],
    ) -> ProviderResult<GenerateResponse> {
        self.run(Self::to_chat_request(request, images)).await
    }

    async fn generate_structured(
        &self,
        request: &GenerateRequest,
        schema: &serde_json::Value,
    ) -> ProviderResult<GenerateResponse> {
        let chat = Self::to_chat_request(request, &[]).with_json_schema(schema.clone());
        self.run(chat).await
    }
}
