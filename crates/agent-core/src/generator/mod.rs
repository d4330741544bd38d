//! Tool Generator
//!
//! Lets the agent extend itself: a natural-language request becomes a
//! script plugin that is validated, written to the tools directory and
//! registered into the registry that owns the generator.
//!
//! ```text
//!  request ──► LLM ──► source ──► import gate ──► contract check ──► <tools_dir>/<name>.py
//!                                     │                 │                     │
//!                                     └── abort ◄───────┘          ScriptTool ──► registry
//! ```

mod script;
mod source;

pub use script::{ScriptOutput, ScriptRuntime, ScriptTool};
pub use source::{ALLOWED_MODULES, RESERVED_TOOL_NAMES, ToolSource, imported_roots, strip_code_fences, unlisted_imports};

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{GenerationError, Result};
use crate::message::Message;
use crate::provider::LlmProvider;
use crate::tool::{Tool, ToolDescriptor, ToolRegistry};

/// Where generated tools live and how they are run
#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    /// Directory holding one `<name>.py` file per generated tool
    pub tools_dir: PathBuf,

    /// Interpreter used for import checks and execution
    pub interpreter: String,

    /// Upper bound for a single import check or tool call
    pub timeout: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            tools_dir: PathBuf::from("generated_tools"),
            interpreter: "python3".into(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl GeneratorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let tools_dir = std::env::var("AGENT_TOOLS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.tools_dir);
        let interpreter = std::env::var("AGENT_TOOL_INTERPRETER").unwrap_or(defaults.interpreter);
        let timeout = std::env::var("AGENT_TOOL_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map_or(defaults.timeout, Duration::from_secs);

        Self {
            tools_dir,
            interpreter,
            timeout,
        }
    }

    pub fn runtime(&self) -> ScriptRuntime {
        ScriptRuntime::new(self.interpreter.clone(), self.timeout)
    }
}

const GENERATION_RULES: &str = r#"You write tools for an AI agent as Python 3 source code.

Rules:
- Output only Python source code. No explanations, no Markdown.
- Define exactly one class.
- The class has a class attribute `name`: a unique snake_case identifier.
- The class has a class attribute `description`: one sentence saying what the tool does and what `args` it expects.
- The class has a method `run(self, args: str) -> str` returning the result as text.
- `run` never raises: catch every exception and return an error message instead.
- Use only the Python standard library, `requests` or `bs4`.
- Put every import at the top of the file.

Example:
import json


class JsonKeysTool:
    name = "json_keys"
    description = "Lists the top-level keys of the JSON object given in args."

    def run(self, args: str) -> str:
        try:
            return ", ".join(json.loads(args).keys())
        except Exception as exc:
            return f"Error: {exc}""#;

/// Tool that writes, validates and registers new tools
pub struct ToolGenerator {
    provider: Arc<dyn LlmProvider>,
    registry: Weak<ToolRegistry>,
    config: GeneratorConfig,
    runtime: ScriptRuntime,
}

impl ToolGenerator {
    /// `registry` is the registry this generator belongs to; new tools go there.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        registry: Weak<ToolRegistry>,
        config: GeneratorConfig,
    ) -> Self {
        let runtime = config.runtime();
        Self {
            provider,
            registry,
            config,
            runtime,
        }
    }

    /// Generate a tool from `request` and register it.
    ///
    /// Nothing is written to disk unless every import resolves and the
    /// class and `name` attribute are present.
    pub async fn generate(&self, request: &str) -> Result<ToolDescriptor> {
        let messages = [
            Message::system(GENERATION_RULES),
            Message::user(format!("Write a tool that does the following:\n{request}")),
        ];

        let response = self.provider.query(&messages, None).await?;
        let code = strip_code_fences(&response);

        self.check_imports(&code).await?;
        let source = ToolSource::parse(&code)?;

        let path = self.persist(&source, &code).await?;
        let tool = ScriptTool::load(&path, self.runtime.clone()).await?;
        let descriptor = tool.descriptor();

        let registry = self.registry.upgrade().ok_or(GenerationError::RegistryGone)?;
        registry.register(tool);

        tracing::info!(tool = %descriptor.name, path = %path.display(), "Generated tool registered");
        Ok(descriptor)
    }

    async fn check_imports(&self, code: &str) -> std::result::Result<(), GenerationError> {
        let mut missing = Vec::new();
        for module in unlisted_imports(code) {
            if !self.runtime.can_import(&module).await {
                missing.push(module);
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            tracing::warn!(?missing, "Generated tool needs unavailable modules");
            Err(GenerationError::MissingModules(missing))
        }
    }

    async fn persist(
        &self,
        source: &ToolSource,
        code: &str,
    ) -> std::result::Result<PathBuf, GenerationError> {
        tokio::fs::create_dir_all(&self.config.tools_dir).await?;
        let path = self.config.tools_dir.join(format!("{}.py", source.name));
        tokio::fs::write(&path, format!("{code}\n")).await?;
        Ok(path)
    }
}

#[async_trait]
impl Tool for ToolGenerator {
    fn name(&self) -> &str {
        "create_tool"
    }

    fn description(&self) -> &str {
        "Creates a new tool when none of the available tools can do the job. \
         args: a precise description of what the new tool must do and what input it takes. \
         The new tool can be used from the next step on."
    }

    async fn run(&self, args: &str) -> Result<String> {
        let request = args.trim();
        if request.is_empty() {
            return Ok("Error: describe the tool to create in 'args'.".into());
        }

        match self.generate(request).await {
            Ok(tool) => Ok(format!(
                "Tool '{}' created successfully ({}). It is available from the next step.",
                tool.name, tool.description
            )),
            Err(e) => {
                tracing::warn!(error = %e, "Tool generation failed");
                Ok(format!("Error: {}", e.user_message()))
            }
        }
    }
}

/// Load every script plugin in `dir`, in file name order.
///
/// A missing directory yields no tools. Files that fail the contract or
/// whose stem differs from the tool name are skipped.
pub async fn load_dir(dir: &Path, config: &GeneratorConfig) -> Result<Vec<ScriptTool>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "py") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut tools = Vec::new();
    for path in paths {
        match ScriptTool::load(&path, config.runtime()).await {
            Ok(tool) if path.file_stem().is_some_and(|stem| stem == tool.name()) => tools.push(tool),
            Ok(tool) => {
                tracing::warn!(path = %path.display(), tool = %tool.name(), "File name does not match tool name, skipping");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping invalid generated tool");
            }
        }
    }

    Ok(tools)
}
