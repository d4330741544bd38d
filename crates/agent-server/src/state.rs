//! Application State

use std::sync::Arc;

use agent_core::{AgentConfig, GeneratorConfig, LlmProvider, PlanExecutorConfig, ToolRegistry};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// LLM provider (Ollama, llama.cpp, ...)
    pub provider: Arc<dyn LlmProvider>,

    /// Where generated tools live and how they run
    pub generator: GeneratorConfig,

    /// Persona and step budget for every agent the server builds
    pub agent: AgentConfig,
}

impl AppState {
    pub fn from_env(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            generator: GeneratorConfig::from_env(),
            agent: AgentConfig::from_env(),
        }
    }

    /// Built-ins, the tool generator and every tool generated so far
    pub async fn fresh_registry(&self) -> Arc<ToolRegistry> {
        let registry = ToolRegistry::with_provider(self.provider.clone(), self.generator.clone());
        if let Err(e) = registry
            .load_generated_tools(&self.generator.tools_dir, &self.generator)
            .await
        {
            tracing::warn!(error = %e, "Could not load generated tools");
        }
        registry
    }

    pub fn executor_config(&self) -> PlanExecutorConfig {
        PlanExecutorConfig {
            persona: self.agent.persona.clone(),
            generator: self.generator.clone(),
            reload_generated_tools: true,
        }
    }
}
