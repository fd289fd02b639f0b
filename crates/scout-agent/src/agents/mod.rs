//! The workflow nodes

mod research;
mod respond;
mod supervisor;

pub use research::ResearchAgent;
pub use respond::RespondAgent;
pub use supervisor::{SupervisorAgent, fallback_decision};

use async_trait::async_trait;

use crate::state::ConversationState;

/// A step of the workflow graph.
///
/// A node takes the whole state and returns the whole next state. Agent
/// failures are recorded in the returned state (see
/// [`ConversationState::fail`]); a node never returns an error.
#[async_trait]
pub trait Node: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, state: ConversationState) -> ConversationState;
}
