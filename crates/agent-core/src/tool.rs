//! Tool System
//!
//! Extensible tool framework for agent capabilities.
//! Tools are registered at runtime (including tools the agent writes for
//! itself) and invoked by the reasoning loop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use crate::builtin::{CalculatorTool, WebContentTool};
use crate::error::Result;
use crate::generator::{self, GeneratorConfig, ToolGenerator};
use crate::provider::LlmProvider;

/// Name and description of a tool, as shown to the model
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique snake_case identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,
}

/// Tool trait - implement to add new capabilities
///
/// `run` must not fail for expected problems (bad input, network errors,
/// ...). Those are returned as `Ok` text so the model can read them. An
/// `Err` is reserved for the unexpected; the agent turns it into an
/// observation as well.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool identifier
    fn name(&self) -> &str;

    /// What the tool does and what `args` it expects
    fn description(&self) -> &str;

    /// Execute the tool with the raw argument text
    async fn run(&self, args: &str) -> Result<String>;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
        }
    }
}

/// Registry for available tools
///
/// Keeps registration order so the rendered catalog is stable. Registering
/// a name that already exists replaces the old tool in place.
pub struct ToolRegistry {
    tools: RwLock<Vec<Arc<dyn Tool>>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(Vec::new()),
        }
    }

    /// Registry seeded with the web content and calculator tools
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(WebContentTool::new());
        registry.register(CalculatorTool);
        registry
    }

    /// Registry seeded with the built-ins plus a tool generator bound to
    /// `provider` that registers what it creates back into this registry.
    pub fn with_provider(provider: Arc<dyn LlmProvider>, config: GeneratorConfig) -> Arc<Self> {
        Arc::new_cyclic(|handle| {
            let registry = Self::with_builtins();
            registry.register(ToolGenerator::new(provider, handle.clone(), config));
            registry
        })
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register a shared tool
    pub fn register_arc(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        let name = tool.name().to_string();

        if let Some(slot) = tools.iter_mut().find(|t| t.name() == name) {
            tracing::debug!(tool = %name, "Replacing registered tool");
            *slot = tool;
        } else {
            tracing::debug!(tool = %name, "Registered tool");
            tools.push(tool);
        }
    }

    /// Get a tool by exact name
    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|t| t.name() == name)
            .cloned()
    }

    /// Catalog injected into prompts: one `- name: description` line per tool
    pub fn get_tool_descriptions(&self) -> String {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|t| format!("- {}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Descriptors in registration order
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|t| t.descriptor())
            .collect()
    }

    /// Get tool names
    pub fn names(&self) -> Vec<String> {
        self.tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|t| t.name().to_string())
            .collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register every previously generated tool found in `dir`.
    ///
    /// Files that no longer satisfy the tool contract are skipped with a
    /// warning. Returns how many tools were registered.
    pub async fn load_generated_tools(&self, dir: &Path, config: &GeneratorConfig) -> Result<usize> {
        let tools = generator::load_dir(dir, config).await?;
        let count = tools.len();
        for tool in tools {
            self.register(tool);
        }
        tracing::info!(dir = %dir.display(), count, "Loaded generated tools");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool {
        name: &'static str,
        description: &'static str,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            self.description
        }

        async fn run(&self, args: &str) -> Result<String> {
            Ok(args.to_string())
        }
    }

    #[test]
    fn test_tool_registry() {
        let registry = ToolRegistry::with_builtins();

        assert_eq!(registry.len(), 2);
        assert!(registry.get_tool("fetch_web_content").is_some());
        assert!(registry.get_tool("calculator").is_some());
        assert!(registry.get_tool("Calculator").is_none());
        assert!(registry.get_tool("unknown").is_none());
    }

    #[test]
    fn test_descriptions_follow_registration_order() {
        let registry = ToolRegistry::new();
        registry.register(EchoTool { name: "zeta", description: "last letter" });
        registry.register(EchoTool { name: "alpha", description: "first letter" });

        assert_eq!(
            registry.get_tool_descriptions(),
            "- zeta: last letter\n- alpha: first letter"
        );
    }

    #[test]
    fn test_descriptions_are_stable() {
        let registry = ToolRegistry::with_builtins();
        assert_eq!(registry.get_tool_descriptions(), registry.get_tool_descriptions());
    }

    #[tokio::test]
    async fn test_reregistering_replaces_in_place() {
        let registry = ToolRegistry::new();
        registry.register(EchoTool { name: "one", description: "old" });
        registry.register(EchoTool { name: "two", description: "second" });
        registry.register(EchoTool { name: "one", description: "new" });

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["one", "two"]);
        assert_eq!(registry.get_tool("one").unwrap().description(), "new");
        assert_eq!(registry.get_tool("one").unwrap().run("x").await.unwrap(), "x");
    }

    #[test]
    fn test_with_provider_seeds_generator() {
        struct Silent;

        #[async_trait]
        impl LlmProvider for Silent {
            async fn query(
                &self,
                _messages: &[crate::message::Message],
                _format: Option<crate::provider::ResponseFormat>,
            ) -> Result<String> {
                Ok(String::new())
            }

            fn name(&self) -> &str {
                "silent"
            }
        }

        let registry = ToolRegistry::with_provider(Arc::new(Silent), GeneratorConfig::default());
        assert_eq!(registry.names(), vec!["fetch_web_content", "calculator", "create_tool"]);
    }
}
