//! Message, model and request types shared by providers and agents

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where a model is hosted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI or any endpoint speaking the same protocol
    OpenAI,
    #[serde(rename = "azure")]
    AzureOpenAI,
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI => "OpenAI",
            Provider::AzureOpenAI => "Azure OpenAI",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    /// Model name; for Azure this is the deployment name
    pub id: String,
    pub provider: Provider,
    /// API base URL, or the resource endpoint for Azure
    pub base_url: String,
    /// Azure `api-version` query parameter
    #[serde(default)]
    pub api_version: Option<String>,
    /// Default output token limit when a request sets none
    pub max_tokens: u32,
    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Model {
    pub fn openai(id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            provider: Provider::OpenAI,
            base_url: base_url.into(),
            api_version: None,
            max_tokens: 4000,
            headers: HashMap::new(),
        }
    }

    pub fn azure(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            id: deployment.into(),
            provider: Provider::AzureOpenAI,
            base_url: endpoint.into(),
            api_version: Some(api_version.into()),
            max_tokens: 4000,
            headers: HashMap::new(),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// URL of the chat completions endpoint for this model
    pub fn completions_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        match self.provider {
            Provider::AzureOpenAI => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                base,
                self.id,
                self.api_version.as_deref().unwrap_or("2024-02-01")
            ),
            Provider::OpenAI => format!("{}/chat/completions", base),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input: u32,
    pub output: u32,
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Stop,
    /// Hit the output token limit
    Length,
    /// Wants its tool calls executed
    ToolUse,
}

/// One block of message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    Text {
        text: String,
    },
    ToolCall {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self::ToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::ToolCall { .. } => None,
        }
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        content: Vec<Content>,
        /// Unix millis
        #[serde(default)]
        timestamp: i64,
    },
    Assistant {
        content: Vec<Content>,
        #[serde(flatten)]
        metadata: AssistantMetadata,
    },
}

/// What the provider reported about a reply
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssistantMetadata {
    pub provider: Option<Provider>,
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Usage,
    pub stop_reason: Option<StopReason>,
    /// Unix millis
    #[serde(default)]
    pub timestamp: i64,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::User {
            content: vec![Content::text(text)],
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant {
            content: vec![Content::text(text)],
            metadata: AssistantMetadata {
                timestamp: chrono::Utc::now().timestamp_millis(),
                ..Default::default()
            },
        }
    }

    pub fn content(&self) -> &[Content] {
        match self {
            Self::User { content, .. } | Self::Assistant { content, .. } => content,
        }
    }

    /// Tool calls of an assistant reply, in the order the model issued them
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        let Self::Assistant { content, .. } = self else {
            return Vec::new();
        };
        content
            .iter()
            .filter_map(|c| match c {
                Content::ToolCall {
                    id,
                    name,
                    arguments,
                } => Some(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: arguments.clone(),
                }),
                Content::Text { .. } => None,
            })
            .collect()
    }

    /// All text blocks joined together
    pub fn text(&self) -> String {
        self.content().iter().filter_map(Content::as_text).collect()
    }
}

/// A function the model may call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object
    pub parameters: serde_json::Value,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Everything sent to the model for one request
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
    /// Tools bound to this request
    pub tools: Vec<Tool>,
}

impl Context {
    pub fn with_system(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: Some(system_prompt.into()),
            ..Default::default()
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn add_tool(&mut self, tool: Tool) {
        self.tools.push(tool);
    }
}

/// Per-request sampling options
#[derive(Debug, Clone, Default)]
pub struct StreamOptions {
    /// Overrides the model's default token limit
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub stop_sequences: Vec<String>,
}
