//! Scripted LLM providers and tools for tests.
//!
//! Enabled for this crate's unit tests and, through the `test-utils` feature,
//! for integration tests and downstream crates.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use scout_ai::stream::MessageEvent;
use scout_ai::{
    AssistantMetadata, Content, Context, LlmProvider, Message, MessageEventStream, Model,
    StopReason, StreamOptions, Usage,
};

use crate::tool::{Tool, ToolError};

/// Model used by tests; never contacted
pub fn test_model() -> Model {
    Model::openai("scripted-model", "http://127.0.0.1:9")
}

enum Scripted {
    Reply(Message),
    Fail(String),
    Stall,
    Panic,
}

/// An LLM provider that plays back a fixed script of replies, one per call
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<Context>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain text reply
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Scripted::Reply(Message::assistant(text)))
    }

    /// Queue a reply requesting the given tool calls, in order
    pub fn tool_calls(self, calls: Vec<(&str, serde_json::Value)>) -> Self {
        let content = calls
            .into_iter()
            .enumerate()
            .map(|(i, (name, args))| Content::tool_call(format!("call_{}", i), name, args))
            .collect();
        self.push(Scripted::Reply(Message::Assistant {
            content,
            metadata: AssistantMetadata {
                stop_reason: Some(StopReason::ToolUse),
                ..Default::default()
            },
        }))
    }

    /// Queue a failed call
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(Scripted::Fail(message.into()))
    }

    /// Queue a call that never completes
    pub fn stall(self) -> Self {
        self.push(Scripted::Stall)
    }

    /// Queue a call that panics
    pub fn panic(self) -> Self {
        self.push(Scripted::Panic)
    }

    /// Contexts received so far, in call order
    pub fn requests(&self) -> Vec<Context> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn push(self, step: Scripted) -> Self {
        self.script.lock().push_back(step);
        self
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn stream(
        &self,
        _model: &Model,
        context: &Context,
        _options: &StreamOptions,
    ) -> scout_ai::Result<MessageEventStream> {
        self.requests.lock().push(context.clone());
        let step = self.script.lock().pop_front();
        match step {
            Some(Scripted::Reply(message)) => {
                let events = vec![MessageEvent::Done {
                    message,
                    stop_reason: StopReason::Stop,
                    usage: Usage::default(),
                }];
                Ok(Box::pin(futures::stream::iter(events)))
            }
            Some(Scripted::Fail(message)) => Err(scout_ai::Error::Stream(message)),
            Some(Scripted::Stall) => futures::future::pending().await,
            Some(Scripted::Panic) => panic!("scripted provider panic"),
            None => Err(scout_ai::Error::Stream("script exhausted".into())),
        }
    }
}

fn query_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "query": { "type": "string" }
        },
        "required": ["query"]
    })
}

/// Answers `echo: <query>`
pub struct EchoTool {
    name: String,
}

impl EchoTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Echoes the query back"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        query_schema()
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let query = arguments
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or("(empty)");
        Ok(format!("echo: {}", query))
    }
}

/// Always fails with a fixed message
pub struct FailingTool {
    name: String,
    message: String,
}

impl FailingTool {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        query_schema()
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
        Err(ToolError::Failed(self.message.clone()))
    }
}

/// Sleeps for an hour before answering
pub struct SlowTool {
    name: String,
}

impl SlowTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Takes too long"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        query_schema()
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("late".into())
    }
}
