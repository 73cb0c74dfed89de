use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Tool timed out after {0} ms")]
    Timeout(u64),
}

impl ToolError {
    /// Output shape the model sees when a call fails
    pub fn to_output(&self) -> Value {
        json!({ "error": self.to_string() })
    }
}

pub type ToolResult<T> = Result<T, ToolError>;
