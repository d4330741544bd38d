//! HTTP/WebSocket Handlers

use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    Json,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use agent_core::{
    Agent, AgentError, PlanExecutor, PlanObserver, PlanReport, ToolDescriptor,
};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub provider: String,
    pub provider_connected: bool,
}

#[derive(Debug, Deserialize)]
pub struct ObjectiveRequest {
    pub objective: String,
}

/// One agent step as reported to clients
#[derive(Clone, Debug, Serialize)]
pub struct StepEvent {
    pub thought: String,
    pub tool_name: String,
    pub args: String,
}

#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub run_id: String,
    pub answer: String,
    /// `finished`, `step_limit` or `provider_failed`
    pub outcome: &'static str,
    pub steps: Vec<StepEvent>,
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub run_id: String,
    #[serde(flatten)]
    pub report: PlanReport,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

fn require_objective(payload: &ObjectiveRequest) -> Result<&str, ApiError> {
    let objective = payload.objective.trim();
    if objective.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "objective must not be empty",
            "EMPTY_OBJECTIVE",
        ));
    }
    Ok(objective)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let provider_connected = state.provider.health_check().await.unwrap_or(false);

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        provider: state.provider.name().to_string(),
        provider_connected,
    })
}

/// Tools an agent started now would see
pub async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolDescriptor>> {
    Json(state.fresh_registry().await.descriptors())
}

/// Run one ReAct agent on the objective
pub async fn agent_handler(
    State(state): State<AppState>,
    Json(payload): Json<ObjectiveRequest>,
) -> Result<Json<AgentResponse>, ApiError> {
    let objective = require_objective(&payload)?;
    let run_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(%run_id, "Agent run requested");

    let steps = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&steps);
    let tools = state.fresh_registry().await;
    let mut agent = Agent::new(state.provider.clone(), tools, state.agent.clone())
        .with_step_callback(move |thought, tool_name, args| {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(StepEvent {
                    thought: thought.to_string(),
                    tool_name: tool_name.to_string(),
                    args: args.to_string(),
                });
        });

    let outcome = agent.run(objective).await;
    drop(agent);

    let steps = std::mem::take(&mut *steps.lock().unwrap_or_else(PoisonError::into_inner));
    Ok(Json(AgentResponse {
        run_id,
        outcome: outcome.kind(),
        answer: outcome.into_text(),
        steps,
    }))
}

/// Plan the objective, run every step and return the full report
pub async fn plan_handler(
    State(state): State<AppState>,
    Json(payload): Json<ObjectiveRequest>,
) -> Result<Json<PlanResponse>, ApiError> {
    let objective = require_objective(&payload)?;
    let run_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(%run_id, "Plan run requested");

    let executor = PlanExecutor::new(state.provider.clone(), state.executor_config());
    let report = executor
        .run(objective, Arc::new(agent_core::NoopObserver))
        .await
        .map_err(|e| match e {
            AgentError::Planning(_) => {
                api_error(StatusCode::UNPROCESSABLE_ENTITY, e.user_message(), "PLANNING_FAILED")
            }
            other => {
                tracing::error!("Plan run error: {}", other);
                api_error(StatusCode::INTERNAL_SERVER_ERROR, other.user_message(), "AGENT_ERROR")
            }
        })?;

    Ok(Json(PlanResponse { run_id, report }))
}

// ============================================================================
// WebSocket plan stream
// ============================================================================

/// Progress events pushed to WebSocket clients
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanEvent {
    PlanReady {
        plan: Vec<String>,
    },
    Step {
        step: usize,
        thought: String,
        tool_name: String,
        args: String,
    },
    StepResult {
        step: usize,
        task: String,
        result: String,
    },
    FinalResult {
        transcript: String,
    },
    Error {
        message: String,
    },
}

/// Forwards observer callbacks into a channel drained by the socket task
struct ChannelObserver {
    tx: mpsc::UnboundedSender<PlanEvent>,
}

impl ChannelObserver {
    fn send(&self, event: PlanEvent) {
        // receiver gone means the client disconnected
        let _ = self.tx.send(event);
    }
}

impl PlanObserver for ChannelObserver {
    fn plan_ready(&self, plan: &[String]) {
        self.send(PlanEvent::PlanReady {
            plan: plan.to_vec(),
        });
    }

    fn agent_step(&self, number: usize, thought: &str, tool_name: &str, args: &str) {
        self.send(PlanEvent::Step {
            step: number,
            thought: thought.to_string(),
            tool_name: tool_name.to_string(),
            args: args.to_string(),
        });
    }

    fn step_result(&self, number: usize, task: &str, result: &str) {
        self.send(PlanEvent::StepResult {
            step: number,
            task: task.to_string(),
            result: result.to_string(),
        });
    }

    fn final_result(&self, transcript: &str) {
        self.send(PlanEvent::FinalResult {
            transcript: transcript.to_string(),
        });
    }

    fn error(&self, message: &str) {
        self.send(PlanEvent::Error {
            message: message.to_string(),
        });
    }
}

fn event_frame(event: &PlanEvent) -> Message {
    let text = serde_json::to_string(event).unwrap_or_else(|e| {
        serde_json::json!({"type": "error", "message": e.to_string()}).to_string()
    });
    Message::Text(text.into())
}

/// WebSocket plan-and-execute; every text frame is an objective
pub async fn plan_stream_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_stream(socket, state))
}

async fn handle_stream(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    while let Some(msg) = receiver.next().await {
        let objective = match msg {
            Ok(Message::Text(text)) => text.as_str().trim().to_string(),
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::error!("WebSocket error: {}", e);
                break;
            }
            _ => continue,
        };

        if objective.is_empty() {
            let frame = event_frame(&PlanEvent::Error {
                message: "objective must not be empty".into(),
            });
            if sender.send(frame).await.is_err() {
                break;
            }
            continue;
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let executor = PlanExecutor::new(state.provider.clone(), state.executor_config());
        let run = tokio::spawn(async move {
            let observer = Arc::new(ChannelObserver { tx });
            // planning failures already reached the client as an error event
            let _ = executor.run(&objective, observer).await;
        });

        let mut client_gone = false;
        while let Some(event) = rx.recv().await {
            if sender.send(event_frame(&event)).await.is_err() {
                client_gone = true;
                break;
            }
        }

        if client_gone {
            run.abort();
            break;
        }
        if let Err(e) = run.await {
            tracing::error!("Plan run task failed: {}", e);
            let frame = event_frame(&PlanEvent::Error {
                message: "plan run aborted".into(),
            });
            if sender.send(frame).await.is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_event_wire_format() {
        let event = PlanEvent::StepResult {
            step: 2,
            task: "double 4".into(),
            result: "8".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "step_result");
        assert_eq!(value["step"], 2);
        assert_eq!(value["result"], "8");

        let ready = serde_json::to_value(PlanEvent::PlanReady {
            plan: vec!["a".into()],
        })
        .unwrap();
        assert_eq!(ready["type"], "plan_ready");
    }

    #[test]
    fn test_channel_observer_forwards_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let observer = ChannelObserver { tx };

        observer.plan_ready(&["one".to_string()]);
        observer.agent_step(1, "think", "calculator", "1+1");
        observer.step_result(1, "one", "2");
        observer.final_result("Step 1: one\n2");
        drop(observer);

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(serde_json::to_value(event).unwrap()["type"].as_str().unwrap().to_string());
        }
        assert_eq!(kinds, vec!["plan_ready", "step", "step_result", "final_result"]);
    }

    #[test]
    fn test_empty_objective_is_rejected() {
        let payload = ObjectiveRequest {
            objective: "   ".into(),
        };
        let (status, _) = require_objective(&payload).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
