//! Reasoning Loop
//!
//! Implements the ReAct (Reason + Act) pattern for agent behavior.
//! Each step the model answers with a JSON envelope
//! `{"thought": ..., "action": {"tool_name": ..., "args": ...}}`; the agent
//! runs the action and feeds the result back as an observation until the
//! model finishes or the step budget runs out.
//!
//! Almost every fault (bad JSON, wrong shape, unknown tool, failing tool)
//! becomes an observation the model can react to. Only a failing provider
//! query ends a run early.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::message::{Conversation, Message};
use crate::provider::{LlmProvider, ResponseFormat};
use crate::tool::ToolRegistry;

/// Default step budget per run
pub const MAX_STEPS: usize = 10;

/// Prefix of every observation turn
pub const OBSERVATION_PREFIX: &str = "Observation: ";

/// Start of the observation for an unknown tool name
pub const UNKNOWN_TOOL_MARKER: &str = "Unknown tool";

/// Name of the sentinel action that ends a run
pub const FINISH_ACTION: &str = "finish";

const INVALID_JSON: &str = "Error: your response was not a valid JSON object. \
    Reply with only a JSON object of the form \
    {\"thought\": \"...\", \"action\": {\"tool_name\": \"...\", \"args\": \"...\"}}.";

const MISSING_TOOL_NAME: &str =
    "Error: the action has no 'tool_name'. Name a tool from the list or use 'finish'.";

const EMPTY_FINISH: &str =
    "Error: the 'finish' action needs the complete final answer in 'args'. It cannot be empty.";

const NO_THOUGHT: &str = "(no thought given)";

const DEFAULT_PERSONA: &str =
    "You are a meticulous assistant that solves tasks by reasoning and using tools.";

/// Called once per step with `(thought, tool_name, args)` before the action runs
pub type StepCallback = Box<dyn Fn(&str, &str, &str) + Send + Sync>;

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Opening of the system prompt
    pub persona: String,

    /// Maximum reasoning steps before giving up
    pub max_steps: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            persona: DEFAULT_PERSONA.into(),
            max_steps: MAX_STEPS,
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Self {
        let persona = std::env::var("AGENT_PERSONA")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PERSONA.into());

        Self {
            persona,
            ..Default::default()
        }
    }

    pub fn with_persona(persona: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
            ..Default::default()
        }
    }
}

/// How a run ended. Every variant carries user-visible text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AgentOutcome {
    /// The model used `finish` with a non-empty answer
    Finished(String),

    /// The step budget was used up
    StepLimit(String),

    /// The provider query failed
    ProviderFailed(String),
}

impl AgentOutcome {
    pub fn text(&self) -> &str {
        match self {
            Self::Finished(text) | Self::StepLimit(text) | Self::ProviderFailed(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Finished(text) | Self::StepLimit(text) | Self::ProviderFailed(text) => text,
        }
    }

    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Finished(_) => "finished",
            Self::StepLimit(_) => "step_limit",
            Self::ProviderFailed(_) => "provider_failed",
        }
    }
}

impl std::fmt::Display for AgentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

enum Decision {
    Finish(String),
    Observe(String),
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
    history: Conversation,
    on_step: Option<StepCallback>,
}

impl Agent {
    /// Create a new agent
    pub fn new(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>, config: AgentConfig) -> Self {
        Self {
            provider,
            tools,
            config,
            history: Conversation::new(),
            on_step: None,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(provider, tools, AgentConfig::default())
    }

    /// Attach a progress callback
    #[must_use]
    pub fn with_step_callback(
        mut self,
        callback: impl Fn(&str, &str, &str) + Send + Sync + 'static,
    ) -> Self {
        self.on_step = Some(Box::new(callback));
        self
    }

    /// Full system prompt, rendered from the registry as it is right now
    pub fn system_prompt(&self) -> String {
        format!(
            r#"{persona}

## Mission
Solve the user's objective step by step. At every step decide what to do next, then either use exactly one tool or finish with the final answer.

## Response format
Reply with a single JSON object and nothing else:
{{"thought": "<your reasoning>", "action": {{"tool_name": "<tool name or finish>", "args": "<input for the tool>"}}}}

## Rules
- One action per response.
- Only use tools from the list below, or "finish".
- After every action you receive a message starting with "Observation:" holding its result.
- When you know the answer, use "finish" with the complete final answer in "args".
- If no tool fits and "create_tool" is listed, create one; it can be used from the next step.
- Never invent observations.

## Available tools
{tools}
- finish: Ends the task. args: the final answer for the user.

## Examples
{{"thought": "I need to compute the total first.", "action": {{"tool_name": "calculator", "args": "12 * 7 + 3"}}}}
{{"thought": "The observation gave me the total.", "action": {{"tool_name": "finish", "args": "The total is 87."}}}}"#,
            persona = self.config.persona,
            tools = self.tools.get_tool_descriptions(),
        )
    }

    /// Run the agent on an objective
    pub async fn run(&mut self, objective: &str) -> AgentOutcome {
        tracing::info!(provider = %self.provider.name(), max_steps = self.config.max_steps, "Agent run started");
        self.history.push(Message::user(objective));

        for step in 1..=self.config.max_steps {
            let transcript = self.transcript();

            let response = match self
                .provider
                .query(&transcript, Some(ResponseFormat::Json))
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(step, error = %e, "Provider query failed, ending run");
                    return AgentOutcome::ProviderFailed(format!(
                        "Error communicating with the language model: {e}"
                    ));
                }
            };

            // the model has to see its own output, valid or not
            self.history.push(Message::assistant(&response));

            match self.decide(&response).await {
                Decision::Finish(answer) => {
                    tracing::info!(step, "Agent finished");
                    return AgentOutcome::Finished(answer);
                }
                Decision::Observe(observation) => {
                    tracing::debug!(step, %observation, "Observation");
                    if !observation.is_empty() {
                        self.history
                            .push(Message::system(format!("{OBSERVATION_PREFIX}{observation}")));
                    }
                }
            }
        }

        tracing::warn!(max_steps = self.config.max_steps, "Agent hit the step limit");
        AgentOutcome::StepLimit(format!(
            "I could not complete the task within the maximum number of steps ({}).",
            self.config.max_steps
        ))
    }

    /// Run one plan step as an independent objective
    pub async fn execute_task(&mut self, task: &str) -> AgentOutcome {
        self.run(task).await
    }

    /// Conversation so far, without the system prompt
    pub fn history(&self) -> &[Message] {
        self.history.messages()
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn transcript(&self) -> Vec<Message> {
        std::iter::once(Message::system(self.system_prompt()))
            .chain(self.history.messages().iter().cloned())
            .collect()
    }

    async fn decide(&self, response: &str) -> Decision {
        let Some(envelope) = parse_envelope(response) else {
            return Decision::Observe(INVALID_JSON.into());
        };

        let thought = envelope
            .get("thought")
            .and_then(Value::as_str)
            .unwrap_or(NO_THOUGHT);

        let empty = Map::new();
        let action = match envelope.get("action") {
            None => &empty,
            Some(Value::Object(action)) => action,
            Some(other) => {
                return Decision::Observe(format!(
                    "Error: 'action' must be a JSON object with 'tool_name' and 'args', got {}.",
                    json_type(other)
                ));
            }
        };

        let tool_name = action
            .get("tool_name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty());
        let raw_args = action.get("args").unwrap_or(&Value::Null);
        let args = args_text(raw_args);

        tracing::debug!(thought, tool = tool_name.unwrap_or_default(), "Step decided");
        if let Some(callback) = &self.on_step {
            callback(thought, tool_name.unwrap_or_default(), &args);
        }

        let Some(tool_name) = tool_name else {
            return Decision::Observe(MISSING_TOOL_NAME.into());
        };

        if tool_name == FINISH_ACTION {
            return if args_are_empty(raw_args) {
                Decision::Observe(EMPTY_FINISH.into())
            } else {
                Decision::Finish(args)
            };
        }

        let Some(tool) = self.tools.get_tool(tool_name) else {
            return Decision::Observe(format!(
                "{UNKNOWN_TOOL_MARKER}: '{tool_name}'. Available tools:\n{}",
                self.tools.get_tool_descriptions()
            ));
        };

        match tool.run(&args).await {
            Ok(output) => Decision::Observe(output),
            Err(e) => {
                tracing::warn!(tool = %tool_name, error = %e, "Tool failed");
                Decision::Observe(format!("Error executing tool '{tool_name}': {e}"))
            }
        }
    }
}

/// Remove a ```json fence around a model answer, if there is one
pub(crate) fn strip_json_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let fenced = trimmed
        .get(..7)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("```json"));
    if !fenced {
        return trimmed;
    }

    let inner = &trimmed[7..];
    inner.trim_end().strip_suffix("```").unwrap_or(inner).trim()
}

/// Parse a model answer into a JSON object
pub fn parse_envelope(raw: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(strip_json_fence(raw)) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Tool input as text: strings pass through, other JSON is serialized
fn args_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn args_are_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
