//! Axum route handlers

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use futures::{Stream, StreamExt};
use scout_agent::StepUpdate;
use serde_json::{Map, Value, json};

use super::AppState;
use super::models::*;
use crate::config::VERSION;

fn error_response(status: StatusCode, error: &str, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(error, message))).into_response()
}

fn validation_error(message: &str) -> Response {
    error_response(StatusCode::UNPROCESSABLE_ENTITY, "ValidationError", message)
}

fn new_conversation_id() -> String {
    format!("conv_{}", uuid::Uuid::new_v4().simple())
}

// GET /
pub async fn root(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "message": format!("Welcome to {}", state.app_name),
        "version": VERSION,
        "status": "running",
    }))
}

// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.app_name.clone(),
        version: VERSION.to_string(),
        timestamp: Utc::now(),
    })
}

// POST /api/v1/chat
pub async fn chat(State(state): State<Arc<AppState>>, Json(req): Json<ChatRequest>) -> Response {
    if req.message.trim().is_empty() {
        return validation_error("Message must not be empty");
    }
    let conversation_id = req.conversation_id.unwrap_or_else(new_conversation_id);
    let user_id = req.user_id.unwrap_or_else(|| "default".to_string());
    tracing::info!(conversation_id = %conversation_id, "Processing chat request");

    let started = Instant::now();
    let lock = state.turn_lock(&conversation_id);
    let outcome = {
        let _turn = lock.lock().await;
        state
            .workflow
            .process_message(req.message, conversation_id, user_id)
            .await
    };
    state.total_processed.fetch_add(1, Ordering::Relaxed);

    let mut metadata = Map::new();
    metadata.insert(
        "research_data".to_string(),
        serde_json::to_value(&outcome.research_data).unwrap_or(Value::Null),
    );
    metadata.insert(
        "processing_time".to_string(),
        json!(started.elapsed().as_secs_f64()),
    );

    let response = ChatResponse {
        response: outcome.response,
        conversation_id: outcome.conversation_id,
        status: outcome.status.as_str().to_string(),
        tools_used: outcome.tools_used,
        metadata,
        timestamp: Utc::now(),
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// Client-facing event for one workflow update
pub(crate) fn stream_response(update: &StepUpdate, conversation_id: &str) -> StreamResponse {
    match update {
        StepUpdate::Error { message } => {
            StreamResponse::new(StreamKind::Error, message.clone(), conversation_id)
        }
        StepUpdate::Step { node, state } => match state.last_message() {
            Some(last) => StreamResponse::new(StreamKind::Message, last.content(), conversation_id)
                .with_metadata("node", node.as_str())
                .with_metadata("status", state.workflow_status.as_str()),
            None => StreamResponse::new(
                StreamKind::Status,
                format!("Processing with {}...", node),
                conversation_id,
            )
            .with_metadata("node", node.as_str()),
        },
    }
}

fn sse_event(response: &StreamResponse) -> Event {
    Event::default()
        .json_data(response)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}

fn turn_events(
    state: Arc<AppState>,
    message: String,
    conversation_id: String,
    user_id: String,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let lock = state.turn_lock(&conversation_id);
        let _turn = lock.lock().await;

        let mut updates = state
            .workflow
            .stream_process_message(message, conversation_id.clone(), user_id);
        while let Some(update) = updates.next().await {
            yield Ok(sse_event(&stream_response(&update, &conversation_id)));
        }
        state.total_processed.fetch_add(1, Ordering::Relaxed);

        yield Ok(sse_event(&StreamResponse::new(StreamKind::Complete, "", &conversation_id)));
    }
}

// POST /api/v1/chat/stream
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Response {
    if req.message.trim().is_empty() {
        return validation_error("Message must not be empty");
    }
    let conversation_id = req.conversation_id.unwrap_or_else(new_conversation_id);
    let user_id = req.user_id.unwrap_or_else(|| "default".to_string());
    tracing::info!(conversation_id = %conversation_id, "Streaming chat request");

    let events = turn_events(state, req.message, conversation_id, user_id);
    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}

// GET /api/v1/chat/history/:conversation_id
pub async fn history(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Response {
    match state.workflow.checkpoint(&conversation_id) {
        Ok(Some(checkpoint)) => {
            let mut metadata = Map::new();
            metadata.insert("user_id".to_string(), json!(checkpoint.user_id));
            metadata.insert(
                "status".to_string(),
                json!(checkpoint.workflow_status.as_str()),
            );
            metadata.insert(
                "session_data".to_string(),
                Value::Object(checkpoint.session_data),
            );
            let response = HistoryResponse {
                conversation_id,
                message_count: checkpoint.messages.len(),
                messages: checkpoint.messages,
                metadata,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            "NotFound",
            format!("Conversation {} not found", conversation_id),
        ),
        Err(e) => {
            tracing::error!(conversation_id = %conversation_id, "Failed to load history: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "InternalError", e.to_string())
        }
    }
}

// DELETE /api/v1/chat/:conversation_id
pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Response {
    match state.workflow.reset(&conversation_id) {
        Ok(true) => {
            tracing::info!(conversation_id = %conversation_id, "Conversation deleted");
            let response = DeleteResponse {
                message: format!("Conversation {} deleted successfully", conversation_id),
                conversation_id,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            "NotFound",
            format!("Conversation {} not found", conversation_id),
        ),
        Err(e) => {
            tracing::error!(conversation_id = %conversation_id, "Failed to delete conversation: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "InternalError", e.to_string())
        }
    }
}

// GET /api/v1/tools
pub async fn list_tools(State(state): State<Arc<AppState>>) -> Json<Vec<ToolInfo>> {
    Json(
        state
            .tools
            .iter()
            .map(|tool| ToolInfo {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect(),
    )
}

// POST /api/v1/tools/execute
pub async fn execute_tool(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ToolExecutionRequest>,
) -> Response {
    if state.tools.find(&req.tool_name).is_none() {
        return error_response(
            StatusCode::NOT_FOUND,
            "NotFound",
            format!("Tool not found: {}", req.tool_name),
        );
    }

    let started = Instant::now();
    let result = state
        .tools
        .execute(&req.tool_name, req.parameters, state.tool_timeout)
        .await;
    let execution_time = started.elapsed().as_secs_f64();

    let response = match result {
        Ok(output) => ToolExecutionResponse {
            tool_name: req.tool_name,
            status: "success".to_string(),
            result: Some(output),
            execution_time,
            error_message: None,
        },
        Err(e) => {
            tracing::warn!(tool = %req.tool_name, "Direct tool execution failed: {}", e);
            ToolExecutionResponse {
                tool_name: req.tool_name,
                status: "error".to_string(),
                result: None,
                execution_time,
                error_message: Some(e.to_string()),
            }
        }
    };
    (StatusCode::OK, Json(response)).into_response()
}

// GET /api/v1/agents/status
pub async fn agent_status(State(state): State<Arc<AppState>>) -> Json<AgentStatusResponse> {
    Json(AgentStatusResponse {
        status: "running".to_string(),
        active_conversations: state.workflow.conversation_count(),
        total_processed: state.total_processed.load(Ordering::Relaxed),
        uptime: format_uptime(state.start_time.elapsed().as_secs()),
        agents: vec![
            "supervisor".to_string(),
            "research".to_string(),
            "respond".to_string(),
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use scout_agent::testing::{EchoTool, ScriptedProvider, test_model};
    use scout_agent::{
        AgentContext, BoxedTool, ChatMessage, ConversationState, MemoryCheckpointStore, ToolSet,
        Workflow, WorkflowStatus,
    };
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(llm: ScriptedProvider) -> (axum::Router, Arc<AppState>) {
        let ctx = AgentContext::new(Arc::new(llm), test_model())
            .with_timeouts(Duration::from_secs(30), Duration::from_secs(5));
        let search = ToolSet::from_tools([Arc::new(EchoTool::new("web_search")) as BoxedTool]);
        let mut tools = search.clone();
        tools.add(Arc::new(crate::tools::CalculatorTool::new()));
        let workflow = Workflow::with_agents(
            Arc::new(ctx),
            search,
            Arc::new(MemoryCheckpointStore::new()),
        );
        let state = Arc::new(AppState::new(
            workflow,
            tools,
            Duration::from_secs(5),
            "AI Agent Project",
        ));
        (router(state.clone(), &["*".to_string()]), state)
    }

    async fn send(
        app: &axum::Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    async fn send_json(
        app: &axum::Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, bytes) = send(app, method, uri, body).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn sse_payloads(body: &[u8]) -> Vec<Value> {
        String::from_utf8_lossy(body)
            .lines()
            .filter_map(|line| line.strip_prefix("data: "))
            .map(|data| serde_json::from_str(data).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let (app, _) = app(ScriptedProvider::new());

        let (status, body) = send_json(&app, Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Welcome to AI Agent Project");
        assert_eq!(body["status"], "running");

        let (status, body) = send_json(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], VERSION);
    }

    #[tokio::test]
    async fn test_chat_direct_answer() {
        let (app, state) = app(ScriptedProvider::new().reply("respond").reply("Hi there!"));

        let (status, body) = send_json(
            &app,
            Method::POST,
            "/api/v1/chat",
            Some(json!({"message": "Hello", "conversation_id": "conv_1", "user_id": "u1"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "Hi there!");
        assert_eq!(body["conversation_id"], "conv_1");
        assert_eq!(body["status"], "completed");
        assert_eq!(body["tools_used"], json!([]));
        assert!(body["metadata"]["research_data"].is_null());
        assert!(body["metadata"]["processing_time"].is_number());
        assert_eq!(state.total_processed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_chat_generates_conversation_id() {
        let (app, _) = app(ScriptedProvider::new().reply("respond").reply("ok"));
        let (_, body) = send_json(
            &app,
            Method::POST,
            "/api/v1/chat",
            Some(json!({"message": "Hello"})),
        )
        .await;
        assert!(body["conversation_id"].as_str().unwrap().starts_with("conv_"));
    }

    #[tokio::test]
    async fn test_chat_rejects_empty_message() {
        let (app, state) = app(ScriptedProvider::new());
        let (status, body) = send_json(
            &app,
            Method::POST,
            "/api/v1/chat",
            Some(json!({"message": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "ValidationError");
        assert_eq!(state.total_processed.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_chat_reports_turn_errors_in_body() {
        let (app, _) = app(ScriptedProvider::new().reply("respond").fail("model offline"));
        let (status, body) = send_json(
            &app,
            Method::POST,
            "/api/v1/chat",
            Some(json!({"message": "Hello", "conversation_id": "c1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "error");
        assert!(
            body["response"]
                .as_str()
                .unwrap()
                .starts_with("Response generation error: ")
        );
    }

    #[tokio::test]
    async fn test_stream_emits_one_event_per_node_then_complete() {
        let (app, _) = app(
            ScriptedProvider::new()
                .reply("research")
                .tool_calls(vec![("web_search", json!({"query": "rust"}))])
                .reply("Rust is great."),
        );

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/v1/chat/stream",
            Some(json!({"message": "research rust", "conversation_id": "c1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let events = sse_payloads(&body);
        let kinds: Vec<_> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
        assert_eq!(kinds, vec!["message", "message", "message", "complete"]);

        let nodes: Vec<_> = events[..3]
            .iter()
            .map(|e| e["metadata"]["node"].as_str().unwrap())
            .collect();
        assert_eq!(nodes, vec!["supervisor", "research", "respond"]);
        assert_eq!(events[2]["content"], "Rust is great.");
        assert_eq!(events[2]["metadata"]["status"], "completed");
        assert_eq!(events[3]["content"], "");
        assert_eq!(events[3]["conversation_id"], "c1");
    }

    #[test]
    fn test_stream_response_mapping() {
        let error = stream_response(
            &StepUpdate::Error {
                message: "boom".into(),
            },
            "c1",
        );
        assert_eq!(error.kind, StreamKind::Error);
        assert_eq!(error.content, "boom");

        let mut state = ConversationState::new("hi", "c1", "u1");
        state.messages.clear();
        let status = stream_response(
            &StepUpdate::Step {
                node: "supervisor".into(),
                state,
            },
            "c1",
        );
        assert_eq!(status.kind, StreamKind::Status);
        assert_eq!(status.content, "Processing with supervisor...");
    }

    #[tokio::test]
    async fn test_history_and_delete() {
        let (app, _) = app(ScriptedProvider::new().reply("respond").reply("Hello!"));

        let (status, _) = send_json(&app, Method::GET, "/api/v1/chat/history/c1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        send_json(
            &app,
            Method::POST,
            "/api/v1/chat",
            Some(json!({"message": "Hi", "conversation_id": "c1", "user_id": "u1"})),
        )
        .await;

        let (status, body) = send_json(&app, Method::GET, "/api/v1/chat/history/c1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message_count"], 2);
        assert_eq!(body["metadata"]["user_id"], "u1");
        let messages: Vec<ChatMessage> = serde_json::from_value(body["messages"].clone()).unwrap();
        assert_eq!(
            messages,
            vec![ChatMessage::user("Hi"), ChatMessage::assistant("Hello!")]
        );

        let (status, body) = send_json(&app, Method::DELETE, "/api/v1/chat/c1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Conversation c1 deleted successfully");

        let (status, _) = send_json(&app, Method::DELETE, "/api/v1/chat/c1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_and_execute_tools() {
        let (app, _) = app(ScriptedProvider::new());

        let (status, body) = send_json(&app, Method::GET, "/api/v1/tools", None).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["web_search", "calculator"]);

        let (status, body) = send_json(
            &app,
            Method::POST,
            "/api/v1/tools/execute",
            Some(json!({"tool_name": "calculator", "parameters": {"expression": "(1 + 2) * 3"}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["result"], "9");
        assert!(body["error_message"].is_null());

        let (_, body) = send_json(
            &app,
            Method::POST,
            "/api/v1/tools/execute",
            Some(json!({"tool_name": "calculator", "parameters": {}})),
        )
        .await;
        assert_eq!(body["status"], "error");
        assert!(body["error_message"].is_string());

        let (status, _) = send_json(
            &app,
            Method::POST,
            "/api/v1/tools/execute",
            Some(json!({"tool_name": "rm_rf", "parameters": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_agent_status() {
        let (app, state) = app(ScriptedProvider::new().reply("respond").reply("ok"));
        send_json(
            &app,
            Method::POST,
            "/api/v1/chat",
            Some(json!({"message": "Hi", "conversation_id": "c1"})),
        )
        .await;

        let (status, body) = send_json(&app, Method::GET, "/api/v1/agents/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "running");
        assert_eq!(body["active_conversations"], 1);
        assert_eq!(body["total_processed"], 1);
        assert_eq!(
            state.workflow.checkpoint("c1").unwrap().unwrap().workflow_status,
            WorkflowStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_same_conversation_turns_are_serialized() {
        let (_, state) = app(ScriptedProvider::new());
        let first = state.turn_lock("c1");
        let guard = first.lock().await;

        let second = state.turn_lock("c1");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.try_lock().is_err());
        assert!(state.turn_lock("c2").try_lock().is_ok());

        drop(guard);
        assert!(second.try_lock().is_ok());
    }
}
