//! Per-conversation checkpoint storage

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::WorkflowError;
use crate::state::ConversationState;

/// Keeps the final state of the latest turn of each conversation
pub trait CheckpointStore: Send + Sync {
    fn load(&self, conversation_id: &str) -> Result<Option<ConversationState>, WorkflowError>;

    fn save(&self, state: &ConversationState) -> Result<(), WorkflowError>;

    /// Returns whether a checkpoint existed
    fn delete(&self, conversation_id: &str) -> Result<bool, WorkflowError>;

    /// Number of stored conversations
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process store; contents are lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    states: RwLock<HashMap<String, ConversationState>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self, conversation_id: &str) -> Result<Option<ConversationState>, WorkflowError> {
        Ok(self.states.read().get(conversation_id).cloned())
    }

    fn save(&self, state: &ConversationState) -> Result<(), WorkflowError> {
        self.states
            .write()
            .insert(state.conversation_id.clone(), state.clone());
        Ok(())
    }

    fn delete(&self, conversation_id: &str) -> Result<bool, WorkflowError> {
        Ok(self.states.write().remove(conversation_id).is_some())
    }

    fn len(&self) -> usize {
        self.states.read().len()
    }
}
