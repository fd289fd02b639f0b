//! scout-agent: multi-agent research orchestration
//!
//! A supervisor decides whether a user request needs web research or a direct
//! answer, a research agent calls search tools and synthesizes what they
//! return, and a respond agent produces the final reply. The [`Workflow`]
//! sequences these nodes as an explicit state machine and persists the
//! conversation state of every turn in a [`CheckpointStore`].

pub mod agents;
pub mod checkpoint;
pub mod context;
pub mod error;
pub mod graph;
pub mod state;
pub mod tool;
pub mod workflow;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use agents::{Node, ResearchAgent, RespondAgent, SupervisorAgent};
pub use checkpoint::{CheckpointStore, MemoryCheckpointStore};
pub use context::AgentContext;
pub use error::{Error, Result, WorkflowError};
pub use graph::{NodeRegistry, Stage, next_stage};
pub use state::{
    ChatMessage, ConversationState, NextAction, ResearchData, ToolOutcome, ToolRecord,
    WorkflowStatus,
};
pub use tool::{BoxedTool, Tool, ToolError, ToolSet};
pub use workflow::{StepUpdate, TurnOutcome, Workflow, WorkflowStream};
