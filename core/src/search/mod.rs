//! Web search and lookup plumbing behind `GET /api/search`.
//!
//! - `SearchProvider`: something that answers a text query
//! - `LookupProvider`: currency conversion and dictionary definitions
//! - `SearchAggregator`: primary/fallback chain and the structured response boundary

mod aggregator;
mod request;

pub use aggregator::{SearchAggregator, SearchOutcome};
pub use request::{SearchParams, SearchRequest};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ParleyError, Result};

/// Normalized search hit, whichever provider produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub description: String,
}

/// Recency filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeLimit {
    #[serde(rename = "d")]
    Day,
    #[serde(rename = "w")]
    Week,
    #[default]
    #[serde(rename = "m")]
    Month,
    #[serde(rename = "y")]
    Year,
}

impl TimeLimit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeLimit::Day => "d",
            TimeLimit::Week => "w",
            TimeLimit::Month => "m",
            TimeLimit::Year => "y",
        }
    }
}

impl std::str::FromStr for TimeLimit {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "d" => Ok(TimeLimit::Day),
            "w" => Ok(TimeLimit::Week),
            "m" => Ok(TimeLimit::Month),
            "y" => Ok(TimeLimit::Year),
            other => Err(ParleyError::InvalidRequest(format!(
                "invalid time filter '{}' (expected d, w, m or y)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafeSearch {
    #[default]
    Strict,
    Off,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: usize,
    pub time: Option<TimeLimit>,
    pub safe: SafeSearch,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: 20,
            time: Some(TimeLimit::Month),
            safe: SafeSearch::Strict,
        }
    }
}

/// Which leg of the chain answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSource {
    Primary,
    Fallback,
}

impl fmt::Display for SearchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchSource::Primary => f.write_str("primary"),
            SearchSource::Fallback => f.write_str("fallback"),
        }
    }
}

/// Currency conversion result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateResult {
    pub from: String,
    pub to: String,
    pub amount: f64,
    pub converted: f64,
    pub rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    pub word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_of_speech: Option<String>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
}

/// Payload of a successful search response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchData {
    Results(Vec<SearchResult>),
    Rate(RateResult),
    Definitions(Vec<Definition>),
}

/// `{success, source?, data?, error?}`: the only shape that leaves the aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SearchSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SearchData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResponse {
    pub fn ok(data: SearchData, source: Option<SearchSource>) -> Self {
        Self {
            success: true,
            source,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            source: None,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>>;
}

#[async_trait]
pub trait LookupProvider: Send + Sync {
    async fn currency(&self, from: &str, to: &str, amount: f64) -> Result<RateResult>;

    async fn define(&self, word: &str) -> Result<Vec<Definition>>;
}
