//! Provider trait: the abstraction over the language-model backend.
//!
//! A Provider knows how to send an ordered message list to a model and get
//! one complete reply back. The companion only ever issues non-streaming
//! requests, one per inbound message.
//!
//! Implementations: Ollama (`mercy-providers`), scripted mocks in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::Message;

/// Sampling parameters sent with every request.
///
/// Field names follow the backend's wire names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum output tokens
    #[serde(default = "default_num_predict")]
    pub num_predict: u32,

    /// Context window size
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,

    #[serde(default = "default_top_k")]
    pub top_k: u32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

fn default_temperature() -> f32 {
    0.8
}
fn default_num_predict() -> u32 {
    500
}
fn default_num_ctx() -> u32 {
    4096
}
fn default_top_k() -> u32 {
    40
}
fn default_top_p() -> f32 {
    0.9
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            num_predict: default_num_predict(),
            num_ctx: default_num_ctx(),
            top_k: default_top_k(),
            top_p: default_top_p(),
        }
    }
}

/// A single generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "qwen2.5")
    pub model: String,

    /// System prompt, history window, and current user message, in order
    pub messages: Vec<Message>,

    /// Whether to stream the response (always false for the companion)
    #[serde(default)]
    pub stream: bool,

    /// Sampling parameters
    #[serde(default)]
    pub options: GenerationOptions,
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated assistant message
    pub message: Message,

    /// Token usage statistics, when the backend reports them
    pub usage: Option<Usage>,

    /// Which model actually responded
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// The core Provider trait.
///
/// The companion calls `complete()` without knowing which backend is in use.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "ollama").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;

    /// List models installed on the backend.
    async fn list_models(&self) -> std::result::Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }

    /// Health check: can we reach the backend?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}
