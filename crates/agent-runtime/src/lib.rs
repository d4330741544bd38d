//! # agent-runtime
//!
//! LLM providers for the agent core.
//!
//! ## Providers
//!
//! - **Ollama** (default): Local LLM inference via `ollama-rs`
//! - **llama.cpp**: a local GGUF model behind `llama-server`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::provider_from_env;
//!
//! let provider = provider_from_env()?;
//! let registry = ToolRegistry::with_provider(provider.clone(), GeneratorConfig::from_env());
//! let mut agent = Agent::with_defaults(provider, registry);
//! ```

use std::sync::Arc;

mod http;

#[cfg(feature = "llamacpp")]
pub mod llamacpp;
#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "llamacpp")]
pub use llamacpp::{LlamaCppConfig, LlamaCppProvider};
#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};

// Re-export core types for convenience
pub use agent_core::{AgentError, LlmProvider, Message, Result, Role};

/// Build the provider named by `AGENT_PROVIDER` (`ollama` when unset)
pub fn provider_from_env() -> Result<Arc<dyn LlmProvider>> {
    let kind = std::env::var("AGENT_PROVIDER").unwrap_or_else(|_| "ollama".into());
    provider_by_name(&kind)
}

/// Build a provider from its short name, configured from the environment
pub fn provider_by_name(kind: &str) -> Result<Arc<dyn LlmProvider>> {
    match kind.trim().to_ascii_lowercase().as_str() {
        #[cfg(feature = "ollama")]
        "ollama" => Ok(Arc::new(OllamaProvider::from_env()?)),
        #[cfg(feature = "llamacpp")]
        "llamacpp" | "llama.cpp" | "llama-cpp" => Ok(Arc::new(LlamaCppProvider::from_env())),
        other => Err(AgentError::Config(format!("unknown provider '{other}'"))),
    }
}
