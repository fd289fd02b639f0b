//! Tool trait and execution

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors a tool invocation can end in. These are recorded in the research
/// data, never propagated as turn failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// Arguments did not match the tool's schema
    #[error("{0}")]
    InvalidArguments(String),

    /// The tool ran and failed
    #[error("{0}")]
    Failed(String),

    /// The tool did not finish within the per-call timeout
    #[error("Tool timed out after {0:?}")]
    Timeout(Duration),

    /// No tool is registered under this name
    #[error("Tool not found: {0}")]
    NotFound(String),
}

/// A capability agents can invoke by name
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model calls the tool by
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the arguments object
    fn parameters_schema(&self) -> serde_json::Value;

    /// Run with already-validated arguments, returning text for the model
    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError>;
}

pub type BoxedTool = Arc<dyn Tool>;

/// An ordered collection of tools with their compiled argument validators
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<BoxedTool>,
    /// Compiled argument schemas by tool name
    validators: HashMap<String, Arc<jsonschema::Validator>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tool set from tools in registration order
    pub fn from_tools(tools: impl IntoIterator<Item = BoxedTool>) -> Self {
        let mut set = Self::new();
        for tool in tools {
            set.add(tool);
        }
        set
    }

    /// Register a tool; a schema that fails to compile disables validation
    /// for that tool
    pub fn add(&mut self, tool: BoxedTool) {
        match jsonschema::validator_for(&tool.parameters_schema()) {
            Ok(validator) => {
                self.validators
                    .entry(tool.name().to_string())
                    .or_insert_with(|| Arc::new(validator));
            }
            Err(e) => tracing::warn!(tool = tool.name(), "Unusable parameter schema: {}", e),
        }
        self.tools.push(tool);
    }

    /// First tool registered under `name`
    pub fn find(&self, name: &str) -> Option<&BoxedTool> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Get tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Definitions to bind on an LLM request
    pub fn definitions(&self) -> Vec<scout_ai::Tool> {
        self.tools
            .iter()
            .map(|t| scout_ai::Tool::new(t.name(), t.description(), t.parameters_schema()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoxedTool> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate arguments, then run the named tool bounded by `timeout`
    pub async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
        timeout: Duration,
    ) -> Result<String, ToolError> {
        let tool = self
            .find(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        self.check_arguments(name, &arguments)?;

        match tokio::time::timeout(timeout, tool.execute(arguments)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout(timeout)),
        }
    }
}

impl ToolSet {
    fn check_arguments(&self, name: &str, arguments: &serde_json::Value) -> Result<(), ToolError> {
        let Some(validator) = self.validators.get(name) else {
            return Ok(());
        };
        let problems: Vec<String> = validator
            .iter_errors(arguments)
            .map(|e| match e.instance_path.to_string() {
                path if path.is_empty() => e.to_string(),
                path => format!("{}: {}", path, e),
            })
            .collect();
        if problems.is_empty() {
            return Ok(());
        }
        Err(ToolError::InvalidArguments(format!(
            "Argument validation failed for {}: {}",
            name,
            problems.join("; ")
        )))
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet").field("tools", &self.names()).finish()
    }
}
