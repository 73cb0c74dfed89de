use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{
    LookupProvider, SearchData, SearchParams, SearchProvider, SearchQuery, SearchRequest,
    SearchResponse, SearchResult, SearchSource,
};
use crate::config::SearchConfig;
use crate::providers::{DuckDuckGoHtml, DuckDuckGoJs, SpiceLookup};
use crate::{ParleyError, Result};

/// Results plus the leg of the chain that produced them
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub source: SearchSource,
    pub results: Vec<SearchResult>,
}

/// Primary → fallback search chain with direct lookups on the side
#[derive(Clone)]
pub struct SearchAggregator {
    primary: Arc<dyn SearchProvider>,
    fallback: Arc<dyn SearchProvider>,
    lookup: Arc<dyn LookupProvider>,
    max_results: usize,
}

impl SearchAggregator {
    pub fn new(
        primary: Arc<dyn SearchProvider>,
        fallback: Arc<dyn SearchProvider>,
        lookup: Arc<dyn LookupProvider>,
    ) -> Self {
        Self {
            primary,
            fallback,
            lookup,
            max_results: 20,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Wire the DuckDuckGo backends over one shared HTTP client
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ParleyError::ConfigError(format!("Failed to build search client: {e}")))?;

        let primary = DuckDuckGoHtml::new(http.clone(), &config.html_endpoint);
        let fallback = DuckDuckGoJs::new(http.clone(), &config.token_endpoint, &config.links_endpoint);
        let lookup = SpiceLookup::new(http, &config.spice_endpoint);

        Ok(Self::new(Arc::new(primary), Arc::new(fallback), Arc::new(lookup))
            .with_max_results(config.max_results))
    }

    /// Run a text search. Any primary failure, empty result set included, moves
    /// on to the fallback; only a fallback failure is reported.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchOutcome> {
        let mut query = query.clone();
        query.max_results = query.max_results.min(self.max_results);

        match self.primary.search(&query).await {
            Ok(results) if !results.is_empty() => {
                debug!(target: "search", provider = self.primary.name(), count = results.len(), "Primary search succeeded");
                return Ok(SearchOutcome {
                    source: SearchSource::Primary,
                    results,
                });
            }
            Ok(_) => {
                warn!(target: "search", provider = self.primary.name(), query = %query.query, "Primary search returned no results; falling back");
            }
            Err(e) => {
                warn!(target: "search", provider = self.primary.name(), error = %e, "Primary search failed; falling back");
            }
        }

        // Recency is not supported on the fallback leg
        let fallback_query = SearchQuery {
            time: None,
            ..query
        };
        let results = self.fallback.search(&fallback_query).await?;
        info!(target: "search", provider = self.fallback.name(), count = results.len(), "Fallback search answered");
        Ok(SearchOutcome {
            source: SearchSource::Fallback,
            results,
        })
    }

    /// Validated request in, structured response out. Never errors.
    pub async fn handle(&self, request: SearchRequest) -> SearchResponse {
        let outcome = match request {
            SearchRequest::Currency { from, to, amount } => self
                .lookup
                .currency(&from, &to, amount)
                .await
                .map(|rate| SearchResponse::ok(SearchData::Rate(rate), None)),
            SearchRequest::Define { word } => self
                .lookup
                .define(&word)
                .await
                .map(|defs| SearchResponse::ok(SearchData::Definitions(defs), None)),
            SearchRequest::Web { query, time, safe } => {
                let q = SearchQuery {
                    query,
                    max_results: self.max_results,
                    time: Some(time),
                    safe,
                };
                self.search(&q).await.map(|o| {
                    SearchResponse::ok(SearchData::Results(o.results), Some(o.source))
                })
            }
        };

        outcome.unwrap_or_else(|e| {
            warn!(target: "search", error = %e, "Search request failed");
            SearchResponse::failure(failure_message(&e))
        })
    }

    /// Raw query parameters in, structured response out
    pub async fn handle_params(&self, params: &SearchParams) -> SearchResponse {
        match SearchRequest::from_params(params) {
            Ok(request) => self.handle(request).await,
            Err(e) => SearchResponse::failure(failure_message(&e)),
        }
    }
}

/// Boundary messages carry the bare reason, not the error-kind prefix
fn failure_message(e: &ParleyError) -> String {
    match e {
        ParleyError::InvalidRequest(m)
        | ParleyError::SearchError(m)
        | ParleyError::LookupError(m) => m.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_strips_kind_prefix() {
        let e = ParleyError::InvalidRequest("Word required".into());
        assert_eq!(failure_message(&e), "Word required");
        let e = ParleyError::Timeout(10);
        assert_eq!(failure_message(&e), "Timed out after 10 ms");
    }
}
