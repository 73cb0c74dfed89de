// Parley Core Library
// Chat routing runtime: provider selection, tool loop, dual-backend web search

pub mod config;
pub mod llm;
pub mod message;
pub mod prompts;
pub mod providers;
pub mod router;
pub mod search;
pub mod stream;
pub mod tools;

// Export core types
pub use config::AppConfig;
pub use llm::{ProviderHandle, ProviderSelector};
pub use message::{ChatRequest, Role, UiMessage, UiPart};
pub use prompts::PromptTemplates;
pub use router::{ChatFailure, ConversationRouter, RoutePlan, Strategy};
pub use search::{SearchAggregator, SearchResponse, SearchResult};
pub use stream::{UiEvent, UiStream};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParleyError {
    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Provider {provider} returned {status}: {message}")]
    ProviderError {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Provider protocol error: {0}")]
    ProtocolError(String),

    #[error("Search error: {0}")]
    SearchError(String),

    #[error("Lookup error: {0}")]
    LookupError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ParleyError>;
