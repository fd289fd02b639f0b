//! Provider stream events and reassembly of streamed replies

use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio_stream::Stream;

use crate::types::{AssistantMetadata, Content, Message, Model, StopReason, Usage};

/// One event of a streamed assistant reply
///
/// `content_index` addresses a content block of the reply being built. Text
/// and tool calls never share an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageEvent {
    /// Reply started; carries provider and model but no content yet
    Start { message: Message },
    TextDelta { content_index: usize, delta: String },
    ToolCallStart {
        content_index: usize,
        id: String,
        name: String,
    },
    /// A fragment of a tool call's JSON arguments
    ToolCallDelta { content_index: usize, delta: String },
    Done {
        message: Message,
        stop_reason: StopReason,
        usage: Usage,
    },
    Error { message: String },
}

pub type MessageEventStream = Pin<Box<dyn Stream<Item = MessageEvent> + Send>>;

/// Accumulates stream events into an assistant [`Message`]
#[derive(Debug, Default)]
pub struct MessageBuilder {
    blocks: Vec<Block>,
    metadata: AssistantMetadata,
}

#[derive(Debug)]
enum Block {
    Text(String),
    ToolCall {
        id: String,
        name: String,
        arguments: String,
    },
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp the built message with the model that produced it
    pub fn for_model(model: &Model) -> Self {
        Self {
            blocks: Vec::new(),
            metadata: AssistantMetadata {
                provider: Some(model.provider),
                model: Some(model.id.clone()),
                ..Default::default()
            },
        }
    }

    pub fn process_event(&mut self, event: &MessageEvent) {
        match event {
            MessageEvent::TextDelta {
                content_index,
                delta,
            } => {
                if let Block::Text(text) = self.text_block(*content_index) {
                    text.push_str(delta);
                }
            }
            MessageEvent::ToolCallStart {
                content_index,
                id,
                name,
            } => {
                *self.block(*content_index) = Block::ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: String::new(),
                };
            }
            MessageEvent::ToolCallDelta {
                content_index,
                delta,
            } => {
                if let Some(Block::ToolCall { arguments, .. }) = self.blocks.get_mut(*content_index)
                {
                    arguments.push_str(delta);
                }
            }
            MessageEvent::Done {
                stop_reason, usage, ..
            } => {
                self.metadata.stop_reason = Some(*stop_reason);
                self.metadata.usage = usage.clone();
            }
            MessageEvent::Start { .. } | MessageEvent::Error { .. } => {}
        }
    }

    pub fn set_usage(&mut self, usage: Usage) {
        self.metadata.usage = usage;
    }

    pub fn set_stop_reason(&mut self, stop_reason: Option<StopReason>) {
        self.metadata.stop_reason = stop_reason;
    }

    /// Empty text blocks and unnamed tool calls are dropped. Arguments that
    /// are not valid JSON (a cut-off stream) become an empty object.
    pub fn build(self) -> Message {
        let content = self
            .blocks
            .into_iter()
            .filter_map(|block| match block {
                Block::Text(text) if text.is_empty() => None,
                Block::Text(text) => Some(Content::Text { text }),
                Block::ToolCall { name, .. } if name.is_empty() => None,
                Block::ToolCall {
                    id,
                    name,
                    arguments,
                } => {
                    let arguments = serde_json::from_str(&arguments)
                        .unwrap_or_else(|_| serde_json::json!({}));
                    Some(Content::ToolCall {
                        id,
                        name,
                        arguments,
                    })
                }
            })
            .collect();

        Message::Assistant {
            content,
            metadata: AssistantMetadata {
                timestamp: chrono::Utc::now().timestamp_millis(),
                ..self.metadata
            },
        }
    }

    fn block(&mut self, index: usize) -> &mut Block {
        if self.blocks.len() <= index {
            self.blocks
                .resize_with(index + 1, || Block::Text(String::new()));
        }
        &mut self.blocks[index]
    }

    fn text_block(&mut self, index: usize) -> &mut Block {
        let block = self.block(index);
        if !matches!(block, Block::Text(_)) {
            *block = Block::Text(String::new());
        }
        block
    }
}
