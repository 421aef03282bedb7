//! # llm-client
//!
//! Thin HTTP clients for the Gemini and OpenAI chat APIs.
//!
//! This package is pure transport: request/response types, authentication,
//! and error mapping. It knows nothing about audits, prompts, or retry
//! policy — callers own all of that. Both clients speak the same
//! [`ChatRequest`]/[`ChatResponse`] vocabulary so a caller can swap
//! providers behind its own trait.
//!
//! ## Capabilities
//!
//! | Capability | OpenAI | Gemini |
//! |------------|--------|--------|
//! | Text generation | chat/completions | generateContent |
//! | Vision (base64 images) | image_url data URIs | inline_data parts |
//! | Structured JSON output | response_format json_schema | responseSchema |
//!
//! API keys are held in [`secrecy::SecretString`] and never appear in
//! `Debug` output or error messages.

pub mod error;
pub mod gemini;
pub mod openai;
pub mod types;

pub use error::{ClientError, Result};
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;
pub use types::{ChatRequest, ChatResponse, ImageData, TokenUsage};
