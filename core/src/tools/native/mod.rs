pub mod currency;
pub mod web_search;

pub use currency::ConvertCurrencyTool;
pub use web_search::WebSearchTool;

use serde_json::{json, Value};

use crate::search::SearchResponse;

/// `data` on success, `{error}` for anything else
fn gateway_output(result: crate::Result<SearchResponse>) -> Value {
    match result {
        Ok(SearchResponse {
            success: true,
            data: Some(data),
            ..
        }) => serde_json::to_value(data).unwrap_or_else(|e| json!({ "error": e.to_string() })),
        Ok(resp) => json!({
            "error": resp.error.unwrap_or_else(|| "search failed".to_string())
        }),
        Err(e) => json!({ "error": e.to_string() }),
    }
}
