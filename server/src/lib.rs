use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use parley_core::llm::HttpModelFactory;
use parley_core::tools::{default_registry, HttpSearchGateway};
use parley_core::{AppConfig, ConversationRouter, ParleyError, SearchAggregator};

pub mod api;

pub use api::{build_app, AppState};

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error("invalid bind address: {0}")]
    Address(String),
    #[error(transparent)]
    Core(#[from] ParleyError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;

/// Wire router, search and tools from configuration
pub fn build_state(config: &AppConfig) -> Result<AppState> {
    let factory = HttpModelFactory::new(config.chat.request_timeout_ms)?;
    let search = SearchAggregator::from_config(&config.search)?;
    let gateway = HttpSearchGateway::new(&config.server.app_url, config.chat.tool_timeout_ms)?;
    let tools = default_registry(Arc::new(gateway), config.chat.tool_timeout_ms);
    let router = ConversationRouter::from_config(config, Arc::new(factory), tools);
    Ok(AppState::new(router, search))
}

pub async fn start_server(config: AppConfig) -> Result<()> {
    let addr: SocketAddr = config
        .server
        .bind_addr
        .parse()
        .map_err(|e| ServerError::Address(format!("{}: {}", config.server.bind_addr, e)))?;
    let app = build_app(build_state(&config)?);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(target: "server", url = %format!("http://{}", addr), app_url = %config.server.app_url, "Parley server ready");
    axum::serve(listener, app).await?;
    Ok(())
}
