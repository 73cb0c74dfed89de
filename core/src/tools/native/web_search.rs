use crate::search::{SafeSearch, SearchRequest, TimeLimit};
use crate::tools::gateway::SearchGateway;
use crate::tools::{Tool, ToolError, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct WebSearchArgs {
    query: String,
    #[serde(default)]
    time: Option<TimeLimit>,
}

/// `webSearch`: current information via the search route
pub struct WebSearchTool {
    gateway: Arc<dyn SearchGateway>,
}

impl WebSearchTool {
    pub fn new(gateway: Arc<dyn SearchGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> String {
        "webSearch".to_string()
    }

    fn description(&self) -> String {
        "Search the web for current information, news, or specific facts.".to_string()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to look up."
                },
                "time": {
                    "type": "string",
                    "enum": ["d", "w", "m", "y"],
                    "description": "Time limit: d (day), w (week), m (month), y (year)"
                }
            },
            "required": ["query"]
        })
    }

    async fn call(&self, arguments: Value) -> ToolResult<Value> {
        let args: WebSearchArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        if args.query.trim().is_empty() {
            return Err(ToolError::InvalidArguments("'query' must not be empty".to_string()));
        }
        debug!(target: "tool_registry", query = %args.query, time = ?args.time, "webSearch tool call");

        let request = SearchRequest::Web {
            query: args.query,
            time: args.time.unwrap_or_default(),
            safe: SafeSearch::Strict,
        };
        Ok(super::gateway_output(self.gateway.query(request).await))
    }
}
