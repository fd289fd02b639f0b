//! Error types for scout-agent

use std::time::Duration;

use thiserror::Error;

/// Result type alias using scout-agent Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by agents while talking to the LLM
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the AI provider layer
    #[error(transparent)]
    Ai(#[from] scout_ai::Error),

    /// The LLM call did not finish within the configured timeout
    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),
}

/// Failures of the workflow engine itself, as opposed to agent failures
/// which are recorded in the conversation state.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// The graph reached a stage that has no node registered
    #[error("no node registered for stage '{0}'")]
    NodeNotRegistered(String),

    /// A node panicked while running
    #[error("node '{node}' panicked: {message}")]
    NodePanicked { node: String, message: String },

    /// The graph did not terminate within the step limit
    #[error("workflow exceeded {0} steps without terminating")]
    StepLimitExceeded(usize),

    /// The checkpoint store failed
    #[error("checkpoint store error: {0}")]
    Checkpoint(String),
}
