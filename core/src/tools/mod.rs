pub mod error;
pub mod gateway;
pub mod native;
pub mod registry;
pub mod traits;

use std::sync::Arc;

// Re-export common types
pub use error::{ToolError, ToolResult};
pub use gateway::{HttpSearchGateway, SearchGateway};
pub use registry::ToolRegistry;
pub use traits::Tool;

/// Registry holding `webSearch` and `convertCurrency`
pub fn default_registry(gateway: Arc<dyn SearchGateway>, timeout_ms: u64) -> ToolRegistry {
    let registry = ToolRegistry::with_timeout(timeout_ms);
    registry.register(Arc::new(native::WebSearchTool::new(gateway.clone())));
    registry.register(Arc::new(native::ConvertCurrencyTool::new(gateway)));
    registry
}
