use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::client::OpenAiCompatModel;
use super::gemini::GeminiGroundedModel;
use super::provider::{ProviderHandle, Wire};
use crate::message::{Role, UiMessage, UiPart};
use crate::{ParleyError, Result};

/// Attachment forwarded to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePart {
    pub media_type: String,
    /// `data:` URL or remote URL
    pub url: String,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContentPart {
    Text(String),
    File(FilePart),
}

/// Tool call recorded in the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    /// Arguments as text for the provider. Undecodable arguments are held as
    /// the raw string the model produced and go back unchanged.
    pub fn arguments_text(&self) -> String {
        match &self.arguments {
            Value::String(raw) => raw.clone(),
            other => other.to_string(),
        }
    }
}

/// Provider-neutral transcript entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelMessage {
    System(String),
    User(Vec<ContentPart>),
    Assistant {
        text: String,
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        call_id: String,
        name: String,
        output: Value,
    },
}

impl ModelMessage {
    /// Convert a UI message; returns `None` when nothing model-relevant remains
    pub fn from_ui(msg: &UiMessage) -> Option<Self> {
        match msg.role {
            Role::System => {
                let text = msg.plain_text();
                (!text.is_empty()).then_some(ModelMessage::System(text))
            }
            Role::Assistant => {
                let text = msg.plain_text();
                (!text.is_empty()).then_some(ModelMessage::Assistant {
                    text,
                    tool_calls: Vec::new(),
                })
            }
            Role::User => {
                let parts: Vec<ContentPart> = msg
                    .input_parts()
                    .into_iter()
                    .filter_map(|p| match p {
                        UiPart::Text { text } => Some(ContentPart::Text(text)),
                        UiPart::File {
                            media_type,
                            url,
                            filename,
                        } => Some(ContentPart::File(FilePart {
                            media_type,
                            url,
                            filename,
                        })),
                        UiPart::Other => None,
                    })
                    .collect();
                (!parts.is_empty()).then_some(ModelMessage::User(parts))
            }
        }
    }
}

/// Function declaration exposed to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    pub system: String,
    pub messages: Vec<ModelMessage>,
    pub tools: Vec<ToolSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other(String),
}

impl FinishReason {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "stop" | "end_turn" => FinishReason::Stop,
            "length" | "max_tokens" => FinishReason::Length,
            "tool_calls" | "function_call" => FinishReason::ToolCalls,
            "content_filter" | "safety" => FinishReason::ContentFilter,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

/// One increment of a model's streamed output
#[derive(Debug, Clone, PartialEq)]
pub enum ModelChunk {
    Text(String),
    Reasoning(String),
    /// Fragment of a tool call; fragments sharing `index` belong together
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: String,
    },
    Source {
        url: String,
        title: Option<String>,
    },
    Finish(FinishReason),
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ModelChunk>> + Send>>;

/// A hosted model reachable through one provider handle
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn handle(&self) -> &ProviderHandle;

    /// Open a streamed generation. Errors before the first chunk are returned here;
    /// later failures surface as `Err` items.
    async fn stream(&self, request: ModelRequest) -> Result<ChunkStream>;
}

/// Builds concrete models from handles
pub trait ModelFactory: Send + Sync {
    fn build(&self, handle: &ProviderHandle) -> Result<Arc<dyn ChatModel>>;
}

/// Default factory backed by one shared HTTP client
#[derive(Clone)]
pub struct HttpModelFactory {
    http: reqwest::Client,
}

impl HttpModelFactory {
    pub fn new(request_timeout_ms: u64) -> Result<Self> {
        // Streams can run long; only the connect phase gets a hard limit here,
        // the router enforces the overall budget.
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(request_timeout_ms.min(10_000)))
            .user_agent("parley/0.1")
            .build()
            .map_err(|e| {
                ParleyError::ConfigError(format!("Failed to build HTTP client: {e}"))
            })?;
        Ok(Self { http })
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl ModelFactory for HttpModelFactory {
    fn build(&self, handle: &ProviderHandle) -> Result<Arc<dyn ChatModel>> {
        if handle.api_key.is_none() {
            return Err(ParleyError::ConfigError(format!(
                "no credential configured for provider {} ({})",
                handle.provider,
                handle.provider.api_key_var()
            )));
        }
        Ok(match handle.wire {
            Wire::ChatCompletions => {
                Arc::new(OpenAiCompatModel::new(self.http.clone(), handle.clone()))
            }
            Wire::GeminiGrounded => {
                Arc::new(GeminiGroundedModel::new(self.http.clone(), handle.clone()))
            }
        })
    }
}
