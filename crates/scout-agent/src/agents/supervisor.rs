use std::sync::Arc;

use async_trait::async_trait;
use scout_ai::{Context, Message};
use serde_json::json;

use super::Node;
use crate::context::AgentContext;
use crate::error::Result;
use crate::state::{ConversationState, NextAction};

const SYSTEM_PROMPT: &str = "\
You coordinate a small team of agents and route each user request to one of them.

RESEARCH gathers current information with web search. Pick it for news, recent \
developments, facts that need sources, comparisons across sources, or requests \
that mention things like latest, current, recent, find or search.

RESPOND answers directly. Pick it for general knowledge, definitions, creative \
writing, advice and anything that needs no outside information.

Reply with exactly one word: research or respond.";

/// Inputs containing any of these route to research when the LLM gives no
/// usable decision
const RESEARCH_KEYWORDS: &[&str] = &[
    "search",
    "find",
    "research",
    "latest",
    "current",
    "recent",
    "news",
    "what is",
    "information",
    "data",
    "statistics",
    "compare",
    "versus",
    "vs",
    "trends",
    "developments",
];

/// Keyword routing used when classification fails. Total: every input maps to
/// `Research` or `Respond`.
pub fn fallback_decision(user_input: &str) -> NextAction {
    let lower = user_input.to_lowercase();
    if RESEARCH_KEYWORDS.iter().any(|k| lower.contains(k)) {
        NextAction::Research
    } else {
        NextAction::Respond
    }
}

fn parse_decision(reply: &str) -> Option<NextAction> {
    match reply.trim().to_lowercase().as_str() {
        "research" => Some(NextAction::Research),
        "respond" => Some(NextAction::Respond),
        _ => None,
    }
}

/// Decides whether a request needs research or a direct answer
pub struct SupervisorAgent {
    ctx: Arc<AgentContext>,
}

impl SupervisorAgent {
    pub fn new(ctx: Arc<AgentContext>) -> Self {
        Self { ctx }
    }

    async fn classify(&self, user_input: &str) -> Result<Option<NextAction>> {
        let mut context = Context::with_system(SYSTEM_PROMPT);
        context.push(Message::user(format!(
            "Decide which agent should handle this request.\n\n\
             User request: \"{}\"\n\n\
             Does it need current information, would a web search improve the \
             answer, or can it be answered from existing knowledge?\n\n\
             Answer with only one word: \"research\" or \"respond\".",
            user_input
        )));
        let reply = self.ctx.complete(&context).await?;
        Ok(parse_decision(&reply.text()))
    }
}

fn record_decision(state: &mut ConversationState, decision: NextAction, source: &str) {
    state.next_action = Some(decision);
    state.working_memory.insert(
        "supervisor_decision".to_string(),
        json!({
            "decision": decision.as_str(),
            "reasoning": format!("Analyzed request: '{}' -> {}", state.user_input, decision.as_str()),
            "user_input": state.user_input,
            "source": source,
        }),
    );
}

#[async_trait]
impl Node for SupervisorAgent {
    fn name(&self) -> &str {
        "supervisor"
    }

    async fn run(&self, mut state: ConversationState) -> ConversationState {
        state.current_agent = Some("supervisor".to_string());

        if state.user_input.trim().is_empty() {
            tracing::error!(conversation_id = %state.conversation_id, "Supervisor received empty input");
            let decision = fallback_decision(&state.user_input);
            record_decision(&mut state, decision, "fallback");
            state.fail("Supervisor error: user input is empty");
            return state;
        }

        tracing::info!(conversation_id = %state.conversation_id, "Supervisor analyzing request");

        let (decision, source) = match self.classify(&state.user_input).await {
            Ok(Some(decision)) => (decision, "llm"),
            Ok(None) => {
                tracing::debug!("Supervisor reply was not a decision, using keyword fallback");
                (fallback_decision(&state.user_input), "fallback")
            }
            Err(e) => {
                tracing::error!(
                    conversation_id = %state.conversation_id,
                    "Supervisor classification failed: {}",
                    e
                );
                let decision = fallback_decision(&state.user_input);
                record_decision(&mut state, decision, "fallback");
                state.fail(format!("Supervisor error: {}", e));
                return state;
            }
        };

        tracing::info!(decision = decision.as_str(), source, "Supervisor decision");
        record_decision(&mut state, decision, source);
        state
    }
}
