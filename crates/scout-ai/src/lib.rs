//! scout-ai: LLM provider abstraction layer
//!
//! This crate provides the message, tool and streaming types the scout agents
//! speak, plus an OpenAI-compatible chat-completions provider that also
//! targets Azure OpenAI deployments.

pub mod error;
pub mod providers;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
pub use providers::LlmProvider;
pub use stream::MessageEventStream;
pub use types::*;
