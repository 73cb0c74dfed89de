use serde::{Deserialize, Serialize};

use super::{SafeSearch, TimeLimit};
use crate::{ParleyError, Result};

/// Raw query-string parameters of `GET /api/search`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
}

/// Validated search request
#[derive(Debug, Clone, PartialEq)]
pub enum SearchRequest {
    Web {
        query: String,
        time: TimeLimit,
        safe: SafeSearch,
    },
    Currency {
        from: String,
        to: String,
        amount: f64,
    },
    Define {
        word: String,
    },
}

fn non_blank(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl SearchRequest {
    pub fn web(query: impl Into<String>) -> Self {
        SearchRequest::Web {
            query: query.into(),
            time: TimeLimit::default(),
            safe: SafeSearch::default(),
        }
    }

    /// Validate raw parameters. `type` other than `currency`/`define` means web search.
    pub fn from_params(params: &SearchParams) -> Result<Self> {
        match params.kind.as_deref() {
            Some("currency") => {
                let amount = match non_blank(&params.amount) {
                    None => 1.0,
                    Some(raw) => raw
                        .parse::<f64>()
                        .ok()
                        .filter(|a| a.is_finite())
                        .ok_or_else(|| {
                            ParleyError::InvalidRequest(format!("invalid amount '{}'", raw))
                        })?,
                };
                Ok(SearchRequest::Currency {
                    from: non_blank(&params.from).unwrap_or("USD").to_uppercase(),
                    to: non_blank(&params.to).unwrap_or("EUR").to_uppercase(),
                    amount,
                })
            }
            Some("define") => {
                let word = non_blank(&params.word)
                    .ok_or_else(|| ParleyError::InvalidRequest("Word required".to_string()))?;
                Ok(SearchRequest::Define {
                    word: word.to_string(),
                })
            }
            _ => {
                let query = non_blank(&params.q).ok_or_else(|| {
                    ParleyError::InvalidRequest("Search query 'q' is required".to_string())
                })?;
                let time = match non_blank(&params.time) {
                    None => TimeLimit::default(),
                    Some(raw) => raw.parse()?,
                };
                let safe = if params.safe.as_deref() == Some("false") {
                    SafeSearch::Off
                } else {
                    SafeSearch::Strict
                };
                Ok(SearchRequest::Web {
                    query: query.to_string(),
                    time,
                    safe,
                })
            }
        }
    }

    /// Inverse of `from_params`, used for the internal HTTP hop
    pub fn to_params(&self) -> SearchParams {
        match self {
            SearchRequest::Web { query, time, safe } => SearchParams {
                q: Some(query.clone()),
                time: Some(time.as_str().to_string()),
                safe: (*safe == SafeSearch::Off).then(|| "false".to_string()),
                ..Default::default()
            },
            SearchRequest::Currency { from, to, amount } => SearchParams {
                kind: Some("currency".to_string()),
                from: Some(from.clone()),
                to: Some(to.clone()),
                amount: Some(amount.to_string()),
                ..Default::default()
            },
            SearchRequest::Define { word } => SearchParams {
                kind: Some("define".to_string()),
                word: Some(word.clone()),
                ..Default::default()
            },
        }
    }
}
