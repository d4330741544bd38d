//! # agent-core
//!
//! ReAct agent loop, plan-and-execute orchestration and a tool registry the
//! agent can extend at runtime.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  PlanExecutor                                                    │
//! │  ┌────────────┐   plan    ┌──────────────────────────────────┐   │
//! │  │  Reasoner  │──────────►│ Agent (fresh per task)           │   │
//! │  └────────────┘           │  thought → action → observation  │   │
//! │        │                  └──────────────────────────────────┘   │
//! │        ▼                         │                  │            │
//! │  ┌─────────────────────────────────────┐   ┌─────────────────┐   │
//! │  │ ToolRegistry                        │   │  LlmProvider    │   │
//! │  │  web · calculator · create_tool ──┐ │   │  (Strategy)     │   │
//! │  │  generated script tools ◄─────────┘ │   └─────────────────┘   │
//! │  └─────────────────────────────────────┘                         │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait keeps the loop independent of the backend
//! (Ollama, a llama.cpp server, a test double, ...).

pub mod builtin;
pub mod error;
pub mod generator;
pub mod message;
pub mod planner;
pub mod provider;
pub mod reasoning;
pub mod tool;

pub use error::{AgentError, GenerationError, Result};
pub use generator::{GeneratorConfig, ScriptTool, ToolGenerator};
pub use message::{Conversation, Message, Role};
pub use planner::{NoopObserver, PlanExecutor, PlanExecutorConfig, PlanObserver, PlanReport, Reasoner};
pub use provider::{GenerationOptions, LlmProvider, ResponseFormat};
pub use reasoning::{Agent, AgentConfig, AgentOutcome};
pub use tool::{Tool, ToolDescriptor, ToolRegistry};
