use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::search::{SearchAggregator, SearchRequest, SearchResponse};
use crate::{ParleyError, Result};

/// Where the tools send their searches
#[async_trait]
pub trait SearchGateway: Send + Sync {
    async fn query(&self, request: SearchRequest) -> Result<SearchResponse>;
}

/// Calls the public `/api/search` route over HTTP
#[derive(Clone)]
pub struct HttpSearchGateway {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpSearchGateway {
    pub fn new(app_url: &str, timeout_ms: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| ParleyError::ConfigError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(http, app_url))
    }

    pub fn with_client(http: reqwest::Client, app_url: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}/api/search", app_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl SearchGateway for HttpSearchGateway {
    async fn query(&self, request: SearchRequest) -> Result<SearchResponse> {
        let params = request.to_params();
        debug!(target: "tool_registry", endpoint = %self.endpoint, ?params, "Search gateway call");
        // A failed search still answers with the structured body, so the status is not checked
        let response = self.http.get(&self.endpoint).query(&params).send().await?;
        let body = response.json::<SearchResponse>().await?;
        Ok(body)
    }
}

#[async_trait]
impl SearchGateway for SearchAggregator {
    async fn query(&self, request: SearchRequest) -> Result<SearchResponse> {
        Ok(self.handle(request).await)
    }
}
