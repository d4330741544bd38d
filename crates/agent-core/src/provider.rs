//! LLM Provider Strategy Pattern
//!
//! Defines the one contract the agent needs from a language model backend:
//! send an ordered transcript, get text back. Local GGUF servers, Ollama or
//! any remote model server plug in behind it without changing agent logic.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{LlmProvider, ResponseFormat};
//!
//! let text = provider.query(&messages, Some(ResponseFormat::Json)).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Message;

/// Output format hint passed along with a query
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Ask the backend to constrain output to a JSON object
    Json,
}

/// Sampling configuration used by concrete providers
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "llama3.2", "qwen2.5:7b")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

const fn default_temperature() -> f32 {
    0.2
}
const fn default_max_tokens() -> u32 {
    2048
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "llama3.2".into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The agent, the reasoner and the tool generator work exclusively through it.
/// An `Err` is treated as exceptional: the agent stops the run on it.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send the transcript and return the raw completion text
    async fn query(&self, messages: &[Message], format: Option<ResponseFormat>) -> Result<String>;

    /// Check if the provider is available and configured correctly
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Short provider name for logs
    fn name(&self) -> &str;
}
