//! Plan-and-Execute
//!
//! The [`Reasoner`] turns an objective into an ordered list of tasks; the
//! [`PlanExecutor`] runs each task with its own fresh [`Agent`] and joins
//! the results. Steps run one after another and do not see each other's
//! results, only the plan text.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::generator::GeneratorConfig;
use crate::message::Message;
use crate::provider::{LlmProvider, ResponseFormat};
use crate::reasoning::{Agent, AgentConfig, strip_json_fence};
use crate::tool::ToolRegistry;

const PLANNING_FAILED: &str = "could not generate a plan";

/// Asks the model to decompose an objective into tasks
pub struct Reasoner {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
}

impl Reasoner {
    pub fn new(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self { provider, tools }
    }

    /// Planner prompt, grounded in the tools the executor will have
    pub fn system_prompt(&self) -> String {
        format!(
            r#"You are an expert planner. You break an objective into a short, ordered list of concrete tasks that an agent with the tools below can carry out one at a time. Every task is executed on its own, without the results of the other tasks, so each task must state every detail it needs.

## Available tools
{tools}

## Response format
Reply with only a JSON object: {{"plan": ["first task", "second task", "..."]}}

## Example
Objective: How many times larger is the population of Brazil than the population of Portugal?
{{"plan": ["Find the current population of Brazil by reading https://en.wikipedia.org/wiki/Brazil with fetch_web_content", "Find the current population of Portugal by reading https://en.wikipedia.org/wiki/Portugal with fetch_web_content", "Look up both populations again and divide the population of Brazil by the population of Portugal with the calculator"]}}"#,
            tools = self.tools.get_tool_descriptions(),
        )
    }

    /// Produce a plan, or `None` when the answer is not a usable plan
    pub async fn generate_plan(&self, objective: &str) -> Option<Vec<String>> {
        let messages = [
            Message::system(self.system_prompt()),
            Message::user(format!("Objective: {objective}")),
        ];

        let response = match self.provider.query(&messages, Some(ResponseFormat::Json)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Planner query failed");
                return None;
            }
        };

        let plan = parse_plan(&response);
        match &plan {
            Some(steps) => tracing::info!(steps = steps.len(), "Plan generated"),
            None => tracing::warn!(%response, "Planner answer is not a plan"),
        }
        plan
    }
}

/// Extract `{"plan": [...]}` from a model answer
pub fn parse_plan(raw: &str) -> Option<Vec<String>> {
    let value: Value = serde_json::from_str(strip_json_fence(raw)).ok()?;
    let Value::Array(items) = value.get("plan")? else {
        return None;
    };

    Some(
        items
            .iter()
            .map(|item| match item {
                Value::String(task) => task.clone(),
                other => other.to_string(),
            })
            .collect(),
    )
}

/// Progress notifications from a plan run. Every method defaults to a no-op.
///
/// Step numbers start at 1.
pub trait PlanObserver: Send + Sync {
    fn plan_ready(&self, _plan: &[String]) {}

    /// Forwarded agent step inside plan step `number`
    fn agent_step(&self, _number: usize, _thought: &str, _tool_name: &str, _args: &str) {}

    fn step_result(&self, _number: usize, _task: &str, _result: &str) {}

    fn final_result(&self, _transcript: &str) {}

    fn error(&self, _message: &str) {}
}

/// Observer that ignores everything
pub struct NoopObserver;

impl PlanObserver for NoopObserver {}

/// Result of one executed plan step
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepReport {
    pub number: usize,
    pub task: String,
    pub result: String,
    /// Whether the agent reached `finish` for this step
    pub finished: bool,
}

/// Everything a plan run produced
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanReport {
    pub plan: Vec<String>,
    pub steps: Vec<StepReport>,
    pub transcript: String,
}

/// Plan executor configuration
#[derive(Clone, Debug)]
pub struct PlanExecutorConfig {
    /// Persona shared by every step's agent
    pub persona: String,

    /// Generator settings for each step's registry
    pub generator: GeneratorConfig,

    /// Register previously generated tools in every fresh registry
    pub reload_generated_tools: bool,
}

impl Default for PlanExecutorConfig {
    fn default() -> Self {
        Self {
            persona: AgentConfig::default().persona,
            generator: GeneratorConfig::default(),
            reload_generated_tools: true,
        }
    }
}

/// Runs Reasoner + one Agent per planned task
pub struct PlanExecutor {
    provider: Arc<dyn LlmProvider>,
    config: PlanExecutorConfig,
}

impl PlanExecutor {
    pub fn new(provider: Arc<dyn LlmProvider>, config: PlanExecutorConfig) -> Self {
        Self { provider, config }
    }

    async fn fresh_registry(&self) -> Arc<ToolRegistry> {
        let registry = ToolRegistry::with_provider(self.provider.clone(), self.config.generator.clone());
        if self.config.reload_generated_tools {
            if let Err(e) = registry
                .load_generated_tools(&self.config.generator.tools_dir, &self.config.generator)
                .await
            {
                tracing::warn!(error = %e, "Could not load generated tools");
            }
        }
        registry
    }

    /// Plan `objective`, execute every task in order and aggregate the results.
    ///
    /// Fails with [`AgentError::Planning`] when no plan could be produced;
    /// nothing is executed in that case.
    pub async fn run(&self, objective: &str, observer: Arc<dyn PlanObserver>) -> Result<PlanReport> {
        tracing::info!(provider = %self.provider.name(), "Plan-and-execute run started");

        let reasoner = Reasoner::new(self.provider.clone(), self.fresh_registry().await);
        let Some(plan) = reasoner
            .generate_plan(objective)
            .await
            .filter(|plan| !plan.is_empty())
        else {
            observer.error(PLANNING_FAILED);
            return Err(AgentError::Planning(PLANNING_FAILED.into()));
        };
        observer.plan_ready(&plan);

        let mut steps = Vec::with_capacity(plan.len());
        for (index, task) in plan.iter().enumerate() {
            let number = index + 1;
            tracing::info!(step = number, total = plan.len(), %task, "Executing plan step");

            let forward = Arc::clone(&observer);
            let mut agent = Agent::new(
                self.provider.clone(),
                self.fresh_registry().await,
                AgentConfig::with_persona(self.config.persona.clone()),
            )
            .with_step_callback(move |thought, tool_name, args| {
                forward.agent_step(number, thought, tool_name, args);
            });

            let outcome = agent.execute_task(task).await;
            observer.step_result(number, task, outcome.text());

            steps.push(StepReport {
                number,
                task: task.clone(),
                finished: outcome.is_finished(),
                result: outcome.into_text(),
            });
        }

        let transcript = aggregate(&steps);
        observer.final_result(&transcript);

        Ok(PlanReport {
            plan,
            steps,
            transcript,
        })
    }
}

/// `Step n: task` followed by its result, blocks separated by a blank line
pub fn aggregate(steps: &[StepReport]) -> String {
    steps
        .iter()
        .map(|step| format!("Step {}: {}\n{}", step.number, step.task, step.result))
        .collect::<Vec<_>>()
        .join("\n\n")
}
