//! The workflow engine: runs one conversation turn through the graph

use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use futures::{FutureExt, Stream, StreamExt};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::agents::{Node, ResearchAgent, RespondAgent, SupervisorAgent};
use crate::checkpoint::CheckpointStore;
use crate::context::AgentContext;
use crate::error::WorkflowError;
use crate::graph::{NodeRegistry, Stage, next_stage};
use crate::state::{ChatMessage, ConversationState, ResearchData, WorkflowStatus};
use crate::tool::ToolSet;

/// No path through the graph visits more than three nodes
pub const MAX_STEPS: usize = 3;

/// Summary of a finished turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub response: String,
    pub status: WorkflowStatus,
    pub tools_used: Vec<String>,
    pub research_data: Option<ResearchData>,
    pub conversation_id: String,
}

impl TurnOutcome {
    fn from_state(state: ConversationState) -> Self {
        let response = state
            .last_message()
            .map(|m| m.content().to_string())
            .unwrap_or_else(|| "No response generated".to_string());
        let status = match state.workflow_status {
            WorkflowStatus::InProgress => {
                tracing::warn!(
                    conversation_id = %state.conversation_id,
                    "Turn ended without completing, reporting as error"
                );
                WorkflowStatus::Error
            }
            status => status,
        };
        Self {
            response,
            status,
            tools_used: state.tools_used,
            research_data: state.research_data,
            conversation_id: state.conversation_id,
        }
    }

    fn failed(conversation_id: String, message: impl std::fmt::Display) -> Self {
        Self {
            response: format!("Workflow error: {}", message),
            status: WorkflowStatus::Error,
            tools_used: Vec::new(),
            research_data: None,
            conversation_id,
        }
    }
}

/// One element of a streamed turn
#[derive(Debug, Clone, PartialEq)]
pub enum StepUpdate {
    /// A node finished; carries the full state it returned
    Step {
        node: String,
        state: ConversationState,
    },
    /// The workflow failed; always the last element
    Error { message: String },
}

impl Serialize for StepUpdate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            StepUpdate::Step { node, state } => map.serialize_entry(node, state)?,
            StepUpdate::Error { message } => map.serialize_entry("error", message)?,
        }
        map.end()
    }
}

/// Lazy, finite stream of step updates for one turn
pub type WorkflowStream = Pin<Box<dyn Stream<Item = StepUpdate> + Send>>;

/// Runs conversation turns through supervisor, research and respond nodes
#[derive(Clone)]
pub struct Workflow {
    registry: Arc<NodeRegistry>,
    store: Arc<dyn CheckpointStore>,
}

impl Workflow {
    pub fn new(registry: NodeRegistry, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            registry: Arc::new(registry),
            store,
        }
    }

    /// The standard graph: supervisor, research bound to `research_tools`,
    /// and respond, all sharing one agent context
    pub fn with_agents(
        ctx: Arc<AgentContext>,
        research_tools: ToolSet,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        let registry = NodeRegistry::new()
            .register(Stage::Supervisor, Arc::new(SupervisorAgent::new(ctx.clone())))
            .register(
                Stage::Research,
                Arc::new(ResearchAgent::new(ctx.clone(), research_tools)),
            )
            .register(Stage::Respond, Arc::new(RespondAgent::new(ctx)));
        Self::new(registry, store)
    }

    /// Run a turn to completion. Never fails: workflow errors are reported in
    /// the outcome.
    pub async fn process_message(
        &self,
        user_input: impl Into<String>,
        conversation_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> TurnOutcome {
        let conversation_id = conversation_id.into();
        let mut steps =
            self.stream_process_message(user_input, conversation_id.clone(), user_id);

        let mut last = None;
        while let Some(update) = steps.next().await {
            match update {
                StepUpdate::Step { state, .. } => last = Some(state),
                StepUpdate::Error { message } => {
                    return TurnOutcome::failed(conversation_id, message);
                }
            }
        }

        match last {
            Some(state) => TurnOutcome::from_state(state),
            None => TurnOutcome::failed(conversation_id, "no node was run"),
        }
    }

    /// Run a turn, yielding one update per node invocation. On a workflow
    /// failure a single error update is yielded and the stream ends.
    pub fn stream_process_message(
        &self,
        user_input: impl Into<String>,
        conversation_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> WorkflowStream {
        let workflow = self.clone();
        let user_input = user_input.into();
        let conversation_id = conversation_id.into();
        let user_id = user_id.into();

        Box::pin(stream! {
            let mut state = match workflow.initial_state(user_input, &conversation_id, user_id) {
                Ok(state) => state,
                Err(e) => {
                    tracing::error!(conversation_id = %conversation_id, "Workflow error: {}", e);
                    yield StepUpdate::Error { message: e.to_string() };
                    return;
                }
            };

            let mut stage = Stage::INITIAL;
            let mut steps = 0;
            while !stage.is_terminal() {
                if steps >= MAX_STEPS {
                    let e = WorkflowError::StepLimitExceeded(MAX_STEPS);
                    tracing::error!(conversation_id = %conversation_id, "Workflow error: {}", e);
                    yield StepUpdate::Error { message: e.to_string() };
                    return;
                }

                let node = match workflow.registry.get(stage) {
                    Ok(node) => node.clone(),
                    Err(e) => {
                        tracing::error!(conversation_id = %conversation_id, "Workflow error: {}", e);
                        yield StepUpdate::Error { message: e.to_string() };
                        return;
                    }
                };

                tracing::info!(conversation_id = %conversation_id, node = node.name(), "Node activated");
                state = match run_node(node.as_ref(), state).await {
                    Ok(state) => state,
                    Err(e) => {
                        tracing::error!(conversation_id = %conversation_id, "Workflow error: {}", e);
                        yield StepUpdate::Error { message: e.to_string() };
                        return;
                    }
                };
                steps += 1;
                stage = next_stage(stage, state.next_action, state.workflow_status);

                // Saved before the final update is yielded
                if stage.is_terminal() {
                    if let Err(e) = workflow.store.save(&state) {
                        tracing::error!(conversation_id = %conversation_id, "Workflow error: {}", e);
                        yield StepUpdate::Error { message: e.to_string() };
                        return;
                    }
                    tracing::info!(
                        conversation_id = %conversation_id,
                        status = state.workflow_status.as_str(),
                        steps,
                        "Turn finished"
                    );
                }

                yield StepUpdate::Step { node: node.name().to_string(), state: state.clone() };
            }
        })
    }

    /// Transcript of the latest turn of a conversation
    pub fn history(&self, conversation_id: &str) -> Result<Option<Vec<ChatMessage>>, WorkflowError> {
        Ok(self.checkpoint(conversation_id)?.map(|s| s.messages))
    }

    /// Final state of the latest turn of a conversation
    pub fn checkpoint(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ConversationState>, WorkflowError> {
        self.store.load(conversation_id)
    }

    /// Forget a conversation. Returns whether it existed.
    pub fn reset(&self, conversation_id: &str) -> Result<bool, WorkflowError> {
        self.store.delete(conversation_id)
    }

    /// Number of conversations with a checkpoint
    pub fn conversation_count(&self) -> usize {
        self.store.len()
    }

    fn initial_state(
        &self,
        user_input: String,
        conversation_id: &str,
        user_id: String,
    ) -> Result<ConversationState, WorkflowError> {
        let state = ConversationState::new(user_input, conversation_id, user_id);
        Ok(match self.store.load(conversation_id)? {
            Some(previous) => state.seeded_from(&previous),
            None => state,
        })
    }
}

async fn run_node(
    node: &dyn Node,
    state: ConversationState,
) -> Result<ConversationState, WorkflowError> {
    AssertUnwindSafe(node.run(state))
        .catch_unwind()
        .await
        .map_err(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            WorkflowError::NodePanicked {
                node: node.name().to_string(),
                message,
            }
        })
}
