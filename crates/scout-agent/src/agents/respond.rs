use std::sync::Arc;

use async_trait::async_trait;
use scout_ai::{Context, Message};

use super::Node;
use crate::context::AgentContext;
use crate::state::{ChatMessage, ConversationState, WorkflowStatus};

const SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Provide clear, accurate, and helpful responses.";

/// Produces the final reply of a turn
pub struct RespondAgent {
    ctx: Arc<AgentContext>,
}

impl RespondAgent {
    pub fn new(ctx: Arc<AgentContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Node for RespondAgent {
    fn name(&self) -> &str {
        "respond"
    }

    async fn run(&self, mut state: ConversationState) -> ConversationState {
        tracing::info!(conversation_id = %state.conversation_id, "Response node activated");

        let synthesis = state
            .research_data
            .as_ref()
            .map(|d| d.synthesis.clone())
            .filter(|s| !s.is_empty());

        let reply = match synthesis {
            Some(synthesis) => Ok(synthesis),
            None => {
                let mut context = Context::with_system(SYSTEM_PROMPT);
                context.push(Message::user(state.user_input.clone()));
                self.ctx.complete(&context).await.map(|m| m.text())
            }
        };

        match reply {
            Ok(text) => {
                state.messages.push(ChatMessage::assistant(text));
                state.workflow_status = WorkflowStatus::Completed;
                state.current_agent = Some("respond".to_string());
                tracing::info!("Response generated successfully");
            }
            Err(e) => {
                tracing::error!("Response node error: {}", e);
                state.fail(format!("Response generation error: {}", e));
            }
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ResearchData;
    use crate::testing::{ScriptedProvider, test_model};

    fn agent(llm: ScriptedProvider) -> (RespondAgent, Arc<ScriptedProvider>) {
        let llm = Arc::new(llm);
        let ctx = AgentContext::new(llm.clone(), test_model());
        (RespondAgent::new(Arc::new(ctx)), llm)
    }

    #[tokio::test]
    async fn test_direct_answer() {
        let (agent, llm) = agent(ScriptedProvider::new().reply("Hello there!"));
        let state = agent.run(ConversationState::new("hi", "c1", "u1")).await;

        assert_eq!(state.workflow_status, WorkflowStatus::Completed);
        assert_eq!(state.current_agent.as_deref(), Some("respond"));
        assert_eq!(state.last_message(), Some(&ChatMessage::assistant("Hello there!")));

        let requests = llm.requests();
        assert_eq!(requests[0].system_prompt.as_deref(), Some(SYSTEM_PROMPT));
        assert_eq!(requests[0].messages[0].text(), "hi");
    }

    #[tokio::test]
    async fn test_synthesis_is_used_verbatim() {
        let (agent, llm) = agent(ScriptedProvider::new());
        let mut state = ConversationState::new("find x", "c1", "u1");
        state.research_data = Some(ResearchData {
            query: "find x".into(),
            raw_results: vec![],
            synthesis: "X is 42.".into(),
        });

        let state = agent.run(state).await;
        assert_eq!(state.last_message(), Some(&ChatMessage::assistant("X is 42.")));
        assert_eq!(state.workflow_status, WorkflowStatus::Completed);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_synthesis_asks_the_llm() {
        let (agent, llm) = agent(ScriptedProvider::new().reply("direct"));
        let mut state = ConversationState::new("find x", "c1", "u1");
        state.research_data = Some(ResearchData {
            query: "find x".into(),
            raw_results: vec![],
            synthesis: String::new(),
        });

        let state = agent.run(state).await;
        assert_eq!(state.last_message(), Some(&ChatMessage::assistant("direct")));
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_llm_failure() {
        let (agent, _) = agent(ScriptedProvider::new().fail("bad gateway"));
        let state = agent.run(ConversationState::new("hi", "c1", "u1")).await;

        assert_eq!(state.workflow_status, WorkflowStatus::Error);
        let last = state.last_message().unwrap().content();
        assert!(last.starts_with("Response generation error: "), "got: {}", last);
        assert!(last.contains("bad gateway"));
    }
}
