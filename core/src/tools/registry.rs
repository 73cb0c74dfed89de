use super::error::{ToolError, ToolResult};
use super::traits::Tool;
use crate::llm::model::ToolSpec;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

const DEFAULT_TOOL_TIMEOUT_MS: u64 = 15_000;

/// A registry for the tools attached to agentic requests
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Arc<DashMap<String, Arc<dyn Tool>>>,
    timeout_ms: u64,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TOOL_TIMEOUT_MS)
    }

    pub fn with_timeout(timeout_ms: u64) -> Self {
        Self {
            tools: Arc::new(DashMap::new()),
            timeout_ms,
        }
    }

    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name();
        info!(target: "tool_registry", tool = %name, "Registering tool");
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|t| t.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Declarations for every registered tool, sorted by name
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.iter().map(|t| t.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Call a tool by name under the per-tool timeout
    #[tracing::instrument(skip(self, arguments), fields(tool.name = %name))]
    pub async fn call(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> ToolResult<serde_json::Value> {
        let start_time = std::time::Instant::now();

        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        debug!(target: "tool_registry", tool = %name, "Invoking tool");

        let result = match timeout(Duration::from_millis(self.timeout_ms), tool.call(arguments)).await
        {
            Ok(res) => res,
            Err(_) => {
                warn!(target: "tool_registry", tool = %name, timeout_ms = self.timeout_ms, "Tool execution timed out");
                Err(ToolError::Timeout(self.timeout_ms))
            }
        };

        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => debug!(target: "tool_registry", tool = %name, elapsed_ms, "Tool call succeeded"),
            Err(e) => {
                warn!(target: "tool_registry", tool = %name, elapsed_ms, error = %e, "Tool execution failed")
            }
        }

        result
    }
}
