//! LLM module: provider catalogue, model selection, streaming clients and the tool loop
//!
//! This module provides:
//! - `ProviderCatalog`, `ProviderHandle` for credentials and endpoints per hosted provider
//! - `ProviderSelector` mapping a requested model id to a handle
//! - `OpenAiCompatModel` and `GeminiGroundedModel` streaming clients behind `ChatModel`
//! - `ToolLoop` driving multi-step generation into UI stream events

pub mod client;
pub mod gemini;
pub mod model;
pub mod provider;
pub mod selector;
pub mod sse;
pub mod tool_loop;

pub use client::OpenAiCompatModel;
pub use gemini::GeminiGroundedModel;
pub use model::{ChatModel, HttpModelFactory, ModelFactory, ModelMessage, ModelRequest};
pub use provider::{Provider, ProviderCatalog, ProviderHandle, Wire};
pub use selector::{ProviderSelector, SelectionReason};
pub use tool_loop::ToolLoop;
