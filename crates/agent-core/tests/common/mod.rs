//! Test doubles shared by the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use agent_core::{AgentError, LlmProvider, Message, ResponseFormat, Result, Tool};
use async_trait::async_trait;

/// Provider that replays canned answers in order and records every query
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<String>>,
    repeat: Option<String>,
    queries: Mutex<Vec<(Vec<Message>, Option<ResponseFormat>)>>,
}

impl ScriptedProvider {
    pub fn new<S: Into<String>>(responses: impl IntoIterator<Item = S>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            repeat: None,
            queries: Mutex::new(Vec::new()),
        })
    }

    /// Answers every query with the same text
    pub fn repeating(response: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::new()),
            repeat: Some(response.into()),
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    /// Messages sent with query number `index` (0-based)
    pub fn query(&self, index: usize) -> Vec<Message> {
        self.queries.lock().unwrap()[index].0.clone()
    }

    pub fn format(&self, index: usize) -> Option<ResponseFormat> {
        self.queries.lock().unwrap()[index].1
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn query(&self, messages: &[Message], format: Option<ResponseFormat>) -> Result<String> {
        self.queries.lock().unwrap().push((messages.to_vec(), format));

        if let Some(next) = self.responses.lock().unwrap().pop_front() {
            return Ok(next);
        }
        self.repeat
            .clone()
            .ok_or_else(|| AgentError::Provider("script exhausted".into()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Provider whose every query fails
pub struct FailingProvider;

#[async_trait]
impl LlmProvider for FailingProvider {
    async fn query(&self, _messages: &[Message], _format: Option<ResponseFormat>) -> Result<String> {
        Err(AgentError::ProviderUnavailable("connection refused".into()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Tool that records its inputs and answers with a fixed text
pub struct RecordingTool {
    name: String,
    reply: String,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingTool {
    pub fn new(name: &str, reply: &str) -> Self {
        Self {
            name: name.into(),
            reply: reply.into(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Records its input."
    }

    async fn run(&self, args: &str) -> Result<String> {
        self.calls.lock().unwrap().push(args.to_string());
        Ok(self.reply.clone())
    }
}

/// Tool that always fails unexpectedly
pub struct BrokenTool;

#[async_trait]
impl Tool for BrokenTool {
    fn name(&self) -> &str {
        "broken"
    }

    fn description(&self) -> &str {
        "Always fails."
    }

    async fn run(&self, _args: &str) -> Result<String> {
        Err(AgentError::ToolExecution("disk on fire".into()))
    }
}

pub fn action(tool_name: &str, args: &str) -> String {
    serde_json::json!({
        "thought": format!("use {tool_name}"),
        "action": {"tool_name": tool_name, "args": args},
    })
    .to_string()
}
