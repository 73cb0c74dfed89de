use crate::search::SearchRequest;
use crate::tools::gateway::SearchGateway;
use crate::tools::{Tool, ToolError, ToolResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

fn default_amount() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct ConvertArgs {
    from: String,
    to: String,
    #[serde(default = "default_amount")]
    amount: f64,
}

/// `convertCurrency`: exchange-rate lookup via the search route
pub struct ConvertCurrencyTool {
    gateway: Arc<dyn SearchGateway>,
}

impl ConvertCurrencyTool {
    pub fn new(gateway: Arc<dyn SearchGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl Tool for ConvertCurrencyTool {
    fn name(&self) -> String {
        "convertCurrency".to_string()
    }

    fn description(&self) -> String {
        "Convert currency amounts between different denominations.".to_string()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "from": {
                    "type": "string",
                    "description": "Source currency code (e.g., USD)"
                },
                "to": {
                    "type": "string",
                    "description": "Target currency code (e.g., EUR)"
                },
                "amount": {
                    "type": "number",
                    "description": "Amount to convert"
                }
            },
            "required": ["from", "to"]
        })
    }

    async fn call(&self, arguments: Value) -> ToolResult<Value> {
        let args: ConvertArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        if !args.amount.is_finite() {
            return Err(ToolError::InvalidArguments("'amount' must be finite".to_string()));
        }

        let request = SearchRequest::Currency {
            from: args.from.trim().to_uppercase(),
            to: args.to.trim().to_uppercase(),
            amount: args.amount,
        };
        Ok(super::gateway_output(self.gateway.query(request).await))
    }
}
