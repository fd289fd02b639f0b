use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use scout_ai::{Context, Message};

use super::Node;
use crate::context::AgentContext;
use crate::error::Result;
use crate::state::{ChatMessage, ConversationState, ResearchData, ToolOutcome, ToolRecord};
use crate::tool::ToolSet;

const SYNTHESIS_SYSTEM_PROMPT: &str = "You are an expert research analyst. Synthesize the \
following research results into a comprehensive and well-organized response.";

fn system_prompt(tool_names: &[&str]) -> String {
    format!(
        "You are a research agent. Gather current information with the search tools, \
         cross-check sources where you can, separate facts from opinions and point out \
         conflicting information.\n\n\
         Available tools: {}\n\n\
         Break the topic into focused search queries and call the tools you need.",
        tool_names.join(", ")
    )
}

/// Prompt for the second LLM call, embedding every result and error
pub(crate) fn synthesis_prompt(query: &str, records: &[ToolRecord]) -> String {
    let mut prompt = format!("Original Query: {}\n\nResearch Results:\n\n", query);
    for (i, record) in records.iter().enumerate() {
        let n = i + 1;
        match &record.outcome {
            ToolOutcome::Error(error) => {
                let _ = write!(prompt, "Result {}: Error - {}\n\n", n, error);
            }
            ToolOutcome::Result(result) => {
                let _ = write!(
                    prompt,
                    "Result {} (Tool: {}):\nQuery: {}\nResult: {}\n\n",
                    n, record.tool, record.query, result
                );
            }
        }
    }
    prompt.push_str(
        "Write a synthesis of these results that covers:\n\
         1. A summary of the key findings\n\
         2. Patterns or trends\n\
         3. Which sources look reliable\n\
         4. Conflicting information\n\
         5. Actionable recommendations\n\
         6. Open questions that need more research\n",
    );
    prompt
}

/// Calls search tools and synthesizes their results
pub struct ResearchAgent {
    ctx: Arc<AgentContext>,
    tools: ToolSet,
}

impl ResearchAgent {
    pub fn new(ctx: Arc<AgentContext>, tools: ToolSet) -> Self {
        Self { ctx, tools }
    }

    async fn research(&self, state: &ConversationState) -> Result<ResearchData> {
        let query = state.user_input.clone();

        let mut context = Context::with_system(system_prompt(&self.tools.names()));
        context.messages = state
            .messages
            .iter()
            .filter_map(ChatMessage::to_llm_message)
            .collect();
        context.push(Message::user(format!(
            "Please research the following topic: {}",
            query
        )));
        context.tools = self.tools.definitions();

        let reply = self.ctx.complete(&context).await?;

        let mut raw_results = Vec::new();
        for call in reply.tool_calls() {
            if self.tools.find(&call.name).is_none() {
                tracing::warn!(tool = %call.name, "Model requested an unknown tool, skipping");
                continue;
            }

            let outcome = match self
                .tools
                .execute(&call.name, call.arguments.clone(), self.ctx.tool_timeout)
                .await
            {
                Ok(result) => {
                    tracing::info!(tool = %call.name, "Tool executed successfully");
                    ToolOutcome::Result(result)
                }
                Err(e) => {
                    tracing::error!(tool = %call.name, "Tool failed: {}", e);
                    ToolOutcome::Error(e.to_string())
                }
            };
            raw_results.push(ToolRecord {
                tool: call.name,
                query: call.arguments,
                outcome,
            });
        }

        let mut synthesis_context = Context::with_system(SYNTHESIS_SYSTEM_PROMPT);
        synthesis_context.push(Message::user(synthesis_prompt(&query, &raw_results)));
        let synthesis = self.ctx.complete(&synthesis_context).await?.text();

        Ok(ResearchData {
            query,
            raw_results,
            synthesis,
        })
    }
}

#[async_trait]
impl Node for ResearchAgent {
    fn name(&self) -> &str {
        "research"
    }

    async fn run(&self, mut state: ConversationState) -> ConversationState {
        tracing::info!(conversation_id = %state.conversation_id, "Research agent processing query");

        match self.research(&state).await {
            Ok(data) => {
                state
                    .messages
                    .push(ChatMessage::assistant(data.synthesis.clone()));
                state
                    .tools_used
                    .extend(data.raw_results.iter().map(|r| r.tool.clone()));
                state.research_data = Some(data);
                state.current_agent = Some("research".to_string());
                tracing::info!("Research completed successfully");
            }
            Err(e) => {
                tracing::error!("Research agent error: {}", e);
                state.fail(format!("Research failed: {}", e));
            }
        }
        state
    }
}
