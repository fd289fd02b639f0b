//! Workspace file writing tool

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use scout_agent::{Tool, ToolError};
use serde_json::json;
use tokio::fs;

/// Writes files, confined to a single workspace directory
pub struct FileHandlerTool {
    workspace: PathBuf,
}

impl FileHandlerTool {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
        }
    }

    /// Resolve `filename` inside the workspace. Absolute paths and any `..`
    /// component are rejected.
    fn resolve(&self, filename: &str) -> Result<PathBuf, ToolError> {
        let relative = Path::new(filename);
        if filename.trim().is_empty() {
            return Err(ToolError::InvalidArguments("Filename is empty".into()));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(ToolError::InvalidArguments(format!(
                        "Path '{}' is outside the workspace",
                        filename
                    )));
                }
            }
        }
        Ok(self.workspace.join(relative))
    }
}

#[async_trait]
impl Tool for FileHandlerTool {
    fn name(&self) -> &str {
        "file_handler"
    }

    fn description(&self) -> &str {
        "Write content to a file in the server workspace. Creates parent directories and \
         overwrites existing files."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "filename": {
                    "type": "string",
                    "description": "Path of the file, relative to the workspace"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write"
                }
            },
            "required": ["filename", "content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let filename = arguments
            .get("filename")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'filename' argument".into()))?;
        let content = arguments
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;

        let path = self.resolve(filename)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::Failed(format!("Failed to create directory: {}", e)))?;
        }

        fs::write(&path, content)
            .await
            .map_err(|e| ToolError::Failed(format!("Failed to write file: {}", e)))?;

        tracing::debug!(path = %path.display(), bytes = content.len(), "File written");
        Ok(format!("File {} saved.", filename))
    }
}
