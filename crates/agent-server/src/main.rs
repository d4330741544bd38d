//! Agent HTTP Server
//!
//! Axum-based server exposing the ReAct agent and the plan-and-execute
//! orchestrator over REST and WebSocket.

mod handlers;
mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::handlers::{agent_handler, health_check, list_tools, plan_handler, plan_stream_handler};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let provider = agent_runtime::provider_from_env()?;

    match provider.health_check().await {
        Ok(true) => tracing::info!("✓ Connected to {}", provider.name()),
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ {} not available - agent runs will fail", provider.name());
        }
    }

    let state = AppState::from_env(provider);

    let tools = state.fresh_registry().await;
    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/tools", get(list_tools))
        .route("/api/agent", post(agent_handler))
        .route("/api/plan", post(plan_handler))
        .route("/api/plan/stream", get(plan_stream_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("agent server running on http://{}", addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health          - Provider health");
    tracing::info!("  GET  /api/tools       - Registered tools");
    tracing::info!("  POST /api/agent       - Run the ReAct agent");
    tracing::info!("  POST /api/plan        - Plan and execute");
    tracing::info!("  GET  /api/plan/stream - WebSocket plan progress");

    axum::serve(listener, app).await?;

    Ok(())
}
