//! LLM Provider implementations

pub mod openai;

use std::time::Duration;

use crate::stream::{MessageBuilder, MessageEvent};
use crate::{Context, Error, Message, MessageEventStream, Model, Result, StreamOptions};
use async_trait::async_trait;
use futures::StreamExt;

/// Trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stream a response from the LLM
    async fn stream(
        &self,
        model: &Model,
        context: &Context,
        options: &StreamOptions,
    ) -> Result<MessageEventStream>;

    /// Run a request to completion and return the assembled assistant message
    async fn complete(
        &self,
        model: &Model,
        context: &Context,
        options: &StreamOptions,
    ) -> Result<Message> {
        let stream = self.stream(model, context, options).await?;
        collect_message(stream).await
    }
}

/// Drain a message event stream into its final message
pub async fn collect_message(mut stream: MessageEventStream) -> Result<Message> {
    let mut builder = MessageBuilder::new();
    let mut saw_content = false;

    while let Some(event) = stream.next().await {
        builder.process_event(&event);
        match event {
            MessageEvent::Done { message, .. } => return Ok(message),
            MessageEvent::Error { message } => return Err(Error::Stream(message)),
            MessageEvent::TextDelta { .. } | MessageEvent::ToolCallStart { .. } => {
                saw_content = true;
            }
            _ => {}
        }
    }

    if saw_content {
        tracing::warn!("Provider stream ended without a completion event, using partial message");
        Ok(builder.build())
    } else {
        Err(Error::EmptyResponse)
    }
}

/// Configuration for retrying failed completions
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculate delay for a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Run `complete`, retrying retryable failures according to `retry`
pub async fn complete_with_retry(
    provider: &dyn LlmProvider,
    model: &Model,
    context: &Context,
    options: &StreamOptions,
    retry: &RetryConfig,
) -> Result<Message> {
    let mut attempt = 0u32;
    loop {
        match provider.complete(model, context, options).await {
            Ok(message) => return Ok(message),
            Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                let delay = retry.delay_for_attempt(attempt);
                tracing::warn!(
                    "LLM request failed (attempt {}/{}): {}. Retrying in {:?}...",
                    attempt + 1,
                    retry.max_retries + 1,
                    e,
                    delay
                );
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Content, StopReason, Usage};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedEvents {
        events: Mutex<Vec<Vec<MessageEvent>>>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl LlmProvider for FixedEvents {
        async fn stream(
            &self,
            _model: &Model,
            _context: &Context,
            _options: &StreamOptions,
        ) -> Result<MessageEventStream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut queue = self.events.lock().unwrap();
            let events = if queue.is_empty() {
                vec![]
            } else {
                queue.remove(0)
            };
            Ok(Box::pin(futures::stream::iter(events)))
        }
    }

    fn provider(events: Vec<Vec<MessageEvent>>) -> FixedEvents {
        FixedEvents {
            events: Mutex::new(events),
            calls: AtomicU32::new(0),
        }
    }

    fn done(text: &str) -> MessageEvent {
        MessageEvent::Done {
            message: Message::assistant(text),
            stop_reason: StopReason::Stop,
            usage: Usage::default(),
        }
    }

    fn model() -> Model {
        Model::openai("test-model", "http://localhost")
    }

    #[tokio::test]
    async fn test_complete_returns_done_message() {
        let p = provider(vec![vec![
            MessageEvent::TextDelta {
                content_index: 0,
                delta: "hi".into(),
            },
            done("hi"),
        ]]);
        let msg = p
            .complete(&model(), &Context::default(), &StreamOptions::default())
            .await
            .unwrap();
        assert_eq!(msg.text(), "hi");
    }

    #[tokio::test]
    async fn test_complete_maps_error_event() {
        let p = provider(vec![vec![MessageEvent::Error {
            message: "boom".into(),
        }]]);
        let err = p
            .complete(&model(), &Context::default(), &StreamOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Stream(ref m) if m == "boom"));
    }

    #[tokio::test]
    async fn test_complete_empty_stream() {
        let p = provider(vec![vec![]]);
        let err = p
            .complete(&model(), &Context::default(), &StreamOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyResponse));
    }

    #[tokio::test]
    async fn test_complete_truncated_stream_uses_partial() {
        let p = provider(vec![vec![MessageEvent::TextDelta {
            content_index: 0,
            delta: "partial".into(),
        }]]);
        let msg = p
            .complete(&model(), &Context::default(), &StreamOptions::default())
            .await
            .unwrap();
        assert_eq!(msg.content(), &[Content::text("partial")]);
    }

    #[tokio::test]
    async fn test_retry_on_retryable_error() {
        let p = provider(vec![
            vec![MessageEvent::Error {
                message: "rate limited".into(),
            }],
            vec![done("second")],
        ]);
        let retry = RetryConfig {
            max_retries: 1,
            initial_delay: Duration::from_millis(1),
            ..Default::default()
        };
        let msg = complete_with_retry(
            &p,
            &model(),
            &Context::default(),
            &StreamOptions::default(),
            &retry,
        )
        .await
        .unwrap();
        assert_eq!(msg.text(), "second");
        assert_eq!(p.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_default_retry_makes_single_attempt() {
        let p = provider(vec![vec![MessageEvent::Error {
            message: "rate limited".into(),
        }]]);
        let result = complete_with_retry(
            &p,
            &model(),
            &Context::default(),
            &StreamOptions::default(),
            &RetryConfig::default(),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(p.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_backoff_is_capped() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(retry.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(retry.delay_for_attempt(10), Duration::from_secs(30));
    }
}
