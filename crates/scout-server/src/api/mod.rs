//! HTTP API

pub mod models;
mod routes;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::{Duration, Instant};

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use parking_lot::Mutex;
use scout_agent::{ToolSet, Workflow};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub workflow: Workflow,
    /// Every built-in tool, for the tools endpoints
    pub tools: ToolSet,
    pub tool_timeout: Duration,
    pub app_name: String,
    pub start_time: Instant,
    pub total_processed: AtomicU64,
    /// Serializes turns of the same conversation
    turn_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AppState {
    pub fn new(
        workflow: Workflow,
        tools: ToolSet,
        tool_timeout: Duration,
        app_name: impl Into<String>,
    ) -> Self {
        Self {
            workflow,
            tools,
            tool_timeout,
            app_name: app_name.into(),
            start_time: Instant::now(),
            total_processed: AtomicU64::new(0),
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Lock held for the duration of one turn of `conversation_id`
    pub fn turn_lock(&self, conversation_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.turn_locks.lock();
        // Drop locks nobody is holding or waiting on
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(conversation_id.to_string())
            .or_default()
            .clone()
    }
}

pub fn router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .route("/api/v1/chat", post(routes::chat))
        .route("/api/v1/chat/stream", post(routes::chat_stream))
        .route(
            "/api/v1/chat/history/:conversation_id",
            get(routes::history),
        )
        .route(
            "/api/v1/chat/:conversation_id",
            delete(routes::delete_conversation),
        )
        .route("/api/v1/tools", get(routes::list_tools))
        .route("/api/v1/tools/execute", post(routes::execute_tool))
        .route("/api/v1/agents/status", get(routes::agent_status))
        .with_state(state)
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
