//! OpenAI Chat Completions API provider
//!
//! Speaks the streaming chat-completions protocol against either the public
//! OpenAI API (bearer auth) or an Azure OpenAI deployment (`api-key` header,
//! deployment-scoped URL).

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};

use super::LlmProvider;
use crate::{
    error::{Error, Result},
    stream::{MessageBuilder, MessageEvent, MessageEventStream},
    types::{Context, Message, Model, Provider, StopReason, StreamOptions, Usage},
};

/// OpenAI / Azure OpenAI API client
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
}

impl OpenAIProvider {
    /// Create a new provider with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    fn headers(&self, model: &Model) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&self.api_key).map_err(|_| Error::InvalidApiKey)?;
        match model.provider {
            Provider::AzureOpenAI => {
                headers.insert("api-key", key);
            }
            Provider::OpenAI => {
                let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                    .map_err(|_| Error::InvalidApiKey)?;
                headers.insert(reqwest::header::AUTHORIZATION, bearer);
            }
        }
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        // Add model-specific headers
        for (key, value) in &model.headers {
            let name = key.parse::<HeaderName>().map_err(|e| {
                Error::InvalidConfig(format!("invalid header name '{}': {}", key, e))
            })?;
            let val = value.parse::<HeaderValue>().map_err(|e| {
                Error::InvalidConfig(format!("invalid header value for '{}': {}", key, e))
            })?;
            headers.insert(name, val);
        }
        Ok(headers)
    }
}

fn chat_request<'a>(
    model: &'a Model,
    context: &'a Context,
    options: &'a StreamOptions,
) -> ChatRequest<'a> {
    let system = context.system_prompt.as_ref().map(|prompt| WireMessage {
        role: "system",
        content: Some(prompt.clone()),
        tool_calls: Vec::new(),
    });
    let messages = system
        .into_iter()
        .chain(context.messages.iter().map(convert_message))
        .collect();

    let tools: Vec<WireTool<'a>> = context
        .tools
        .iter()
        .map(|tool| WireTool {
            kind: "function",
            function: WireFunction {
                name: &tool.name,
                description: &tool.description,
                parameters: &tool.parameters,
            },
        })
        .collect();

    ChatRequest {
        // Azure routes by deployment in the URL and ignores this field
        model: &model.id,
        messages,
        stream: true,
        max_tokens: options.max_tokens.unwrap_or(model.max_tokens),
        temperature: options.temperature,
        stop: (!options.stop_sequences.is_empty()).then_some(options.stop_sequences.as_slice()),
        tool_choice: (!tools.is_empty()).then_some("auto"),
        tools,
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    async fn stream(
        &self,
        model: &Model,
        context: &Context,
        options: &StreamOptions,
    ) -> Result<MessageEventStream> {
        let request = chat_request(model, context, options);
        let url = model.completions_url();
        let headers = self.headers(model)?;

        tracing::debug!(
            model = %model.id,
            provider = model.provider.name(),
            messages = request.messages.len(),
            tools = context.tools.len(),
            "Opening completion stream"
        );

        let request_builder = self.client.post(&url).headers(headers).json(&request);

        let event_source = EventSource::new(request_builder)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;

        Ok(Box::pin(create_stream(event_source, model.clone())))
    }
}

fn convert_message(msg: &Message) -> WireMessage {
    let text = msg.text();
    match msg {
        Message::User { .. } => WireMessage {
            role: "user",
            content: Some(text),
            tool_calls: Vec::new(),
        },
        Message::Assistant { .. } => WireMessage {
            role: "assistant",
            content: (!text.is_empty()).then_some(text),
            tool_calls: msg
                .tool_calls()
                .into_iter()
                .map(|call| WireToolCall {
                    id: call.id,
                    kind: "function",
                    function: WireFunctionCall {
                        name: call.name,
                        arguments: call.arguments.to_string(),
                    },
                })
                .collect(),
        },
    }
}

async fn describe_sse_error(err: reqwest_eventsource::Error) -> String {
    match err {
        reqwest_eventsource::Error::InvalidStatusCode(status, response) => {
            let body = response.text().await.unwrap_or_default();
            Error::from_status(status.as_u16(), body).to_string()
        }
        other => Error::Sse(other.to_string()).to_string(),
    }
}

fn create_stream(
    mut event_source: EventSource,
    model: Model,
) -> impl futures::Stream<Item = MessageEvent> {
    stream! {
        yield MessageEvent::Start {
            message: MessageBuilder::for_model(&model).build(),
        };

        let mut decoder = ChunkDecoder::new(&model);
        while let Some(event) = event_source.next().await {
            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(msg)) if msg.data == "[DONE]" => break,
                Ok(Event::Message(msg)) => match serde_json::from_str::<StreamChunk>(&msg.data) {
                    Ok(chunk) => {
                        for event in decoder.decode(chunk) {
                            yield event;
                        }
                    }
                    Err(e) => {
                        event_source.close();
                        yield MessageEvent::Error {
                            message: format!("Failed to parse chunk: {}", e),
                        };
                        return;
                    }
                },
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(e) => {
                    event_source.close();
                    let message = describe_sse_error(e).await;
                    tracing::warn!(model = %model.id, "Completion stream failed: {}", message);
                    yield MessageEvent::Error { message };
                    return;
                }
            }
        }
        event_source.close();

        yield decoder.finish();
    }
}

/// Turns completion chunks into [`MessageEvent`]s while assembling the reply
///
/// Text lives in content slot 0; tool call `i` in slot `i + 1`.
struct ChunkDecoder {
    builder: MessageBuilder,
    call_ids: Vec<String>,
    finish_reason: Option<String>,
    usage: Usage,
}

impl ChunkDecoder {
    fn new(model: &Model) -> Self {
        Self {
            builder: MessageBuilder::for_model(model),
            call_ids: Vec::new(),
            finish_reason: None,
            usage: Usage::default(),
        }
    }

    fn decode(&mut self, chunk: StreamChunk) -> Vec<MessageEvent> {
        let mut events = Vec::new();
        for choice in chunk.choices {
            if let Some(delta) = choice.delta.content.filter(|d| !d.is_empty()) {
                events.push(MessageEvent::TextDelta {
                    content_index: 0,
                    delta,
                });
            }

            for call in choice.delta.tool_calls.unwrap_or_default() {
                let slot = call.index;
                if self.call_ids.len() <= slot {
                    self.call_ids.resize(slot + 1, String::new());
                }
                if let Some(id) = call.id {
                    self.call_ids[slot] = id;
                }
                let Some(function) = call.function else {
                    continue;
                };
                if let Some(name) = function.name {
                    events.push(MessageEvent::ToolCallStart {
                        content_index: slot + 1,
                        id: self.call_ids[slot].clone(),
                        name,
                    });
                }
                if let Some(delta) = function.arguments.filter(|a| !a.is_empty()) {
                    events.push(MessageEvent::ToolCallDelta {
                        content_index: slot + 1,
                        delta,
                    });
                }
            }

            if choice.finish_reason.is_some() {
                self.finish_reason = choice.finish_reason;
            }
        }

        if let Some(usage) = chunk.usage {
            self.usage = Usage {
                input: usage.prompt_tokens,
                output: usage.completion_tokens,
            };
        }

        for event in &events {
            self.builder.process_event(event);
        }
        events
    }

    fn finish(mut self) -> MessageEvent {
        let stop_reason = match self.finish_reason.as_deref() {
            Some("stop") => Some(StopReason::Stop),
            Some("length") => Some(StopReason::Length),
            Some("tool_calls") => Some(StopReason::ToolUse),
            _ => None,
        };
        self.builder.set_usage(self.usage.clone());
        self.builder.set_stop_reason(stop_reason);

        MessageEvent::Done {
            message: self.builder.build(),
            stop_reason: stop_reason.unwrap_or(StopReason::Stop),
            usage: self.usage,
        }
    }
}

// Wire format

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    stream: bool,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Debug, Serialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded arguments object
    arguments: String,
}

/// One `data:` payload of the completion stream
#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    /// Only present on the final chunk, and only when the server reports it
    #[serde(default)]
    usage: Option<ChunkUsage>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
    tool_calls: Option<Vec<ChunkToolCall>>,
}

/// Fragment of a tool call; `id` and `name` arrive once, arguments in pieces
#[derive(Debug, Deserialize)]
struct ChunkToolCall {
    index: usize,
    id: Option<String>,
    function: Option<ChunkFunction>,
}

#[derive(Debug, Deserialize)]
struct ChunkFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
