use super::error::ToolResult;
use crate::llm::model::ToolSpec;
use async_trait::async_trait;
use serde_json::Value;

/// A capability the model may call during the tool loop
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model calls the tool by (e.g., "webSearch")
    fn name(&self) -> String;

    fn description(&self) -> String;

    /// JSON Schema for the tool's arguments
    fn parameters(&self) -> Value;

    async fn call(&self, arguments: Value) -> ToolResult<Value>;

    /// Declaration handed to the model
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name(),
            description: self.description(),
            parameters: self.parameters(),
        }
    }
}
