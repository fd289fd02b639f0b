//! Shared LLM access for the agents

use std::sync::Arc;
use std::time::Duration;

use scout_ai::providers::{RetryConfig, complete_with_retry};
use scout_ai::{Context, LlmProvider, Message, Model, StreamOptions};

use crate::error::{Error, Result};

/// Everything an agent needs to reach the LLM. Built once at startup and
/// shared between the agents.
#[derive(Clone)]
pub struct AgentContext {
    pub llm: Arc<dyn LlmProvider>,
    pub model: Model,
    pub options: StreamOptions,
    pub retry: RetryConfig,
    /// Upper bound on a single LLM call
    pub llm_timeout: Duration,
    /// Upper bound on a single tool call
    pub tool_timeout: Duration,
}

impl AgentContext {
    pub fn new(llm: Arc<dyn LlmProvider>, model: Model) -> Self {
        Self {
            llm,
            model,
            options: StreamOptions::default(),
            retry: RetryConfig::default(),
            llm_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_options(mut self, options: StreamOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeouts(mut self, llm_timeout: Duration, tool_timeout: Duration) -> Self {
        self.llm_timeout = llm_timeout;
        self.tool_timeout = tool_timeout;
        self
    }

    /// One LLM round trip bounded by `llm_timeout`
    pub async fn complete(&self, context: &Context) -> Result<Message> {
        let call = complete_with_retry(
            self.llm.as_ref(),
            &self.model,
            context,
            &self.options,
            &self.retry,
        );
        match tokio::time::timeout(self.llm_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(Error::Timeout(self.llm_timeout)),
        }
    }
}

impl std::fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContext")
            .field("model", &self.model.id)
            .field("provider", &self.model.provider)
            .field("llm_timeout", &self.llm_timeout)
            .field("tool_timeout", &self.tool_timeout)
            .finish()
    }
}
