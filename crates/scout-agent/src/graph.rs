//! Workflow stages and routing
//!
//! ```text
//! supervisor --research--> research --ok--> respond --> end
//!     |                        |
//!     |--respond--> respond    '--error--> end
//!     '--error / no action--> end
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agents::Node;
use crate::error::WorkflowError;
use crate::state::{NextAction, WorkflowStatus};

/// A state of the workflow machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Supervisor,
    Research,
    Respond,
    End,
}

impl Stage {
    pub const INITIAL: Stage = Stage::Supervisor;

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Supervisor => "supervisor",
            Stage::Research => "research",
            Stage::Respond => "respond",
            Stage::End => "end",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::End)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The transition function of the workflow
pub fn next_stage(stage: Stage, next_action: Option<NextAction>, status: WorkflowStatus) -> Stage {
    match stage {
        Stage::Supervisor => {
            if status == WorkflowStatus::Error {
                return Stage::End;
            }
            match next_action {
                Some(NextAction::Research) => Stage::Research,
                Some(NextAction::Respond) => Stage::Respond,
                Some(NextAction::End) | None => Stage::End,
            }
        }
        Stage::Research => {
            if status == WorkflowStatus::Error {
                Stage::End
            } else {
                Stage::Respond
            }
        }
        Stage::Respond | Stage::End => Stage::End,
    }
}

/// Maps each non-terminal stage to the node that runs it
#[derive(Clone, Default)]
pub struct NodeRegistry {
    nodes: HashMap<Stage, Arc<dyn Node>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, stage: Stage, node: Arc<dyn Node>) -> Self {
        self.nodes.insert(stage, node);
        self
    }

    pub fn get(&self, stage: Stage) -> Result<&Arc<dyn Node>, WorkflowError> {
        self.nodes
            .get(&stage)
            .ok_or_else(|| WorkflowError::NodeNotRegistered(stage.to_string()))
    }
}
