/// DuckDuckGo JS-endpoint search (fallback backend)
///
/// Two requests: the landing page hands out a `vqd` token, then `d.js`
/// returns the results as a JavaScript payload. The endpoint has no recency
/// filter, so `SearchQuery::time` is ignored here.
use std::sync::LazyLock;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::search::{SafeSearch, SearchProvider, SearchQuery, SearchResult};
use crate::{ParleyError, Result};

static VQD_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r#"vqd=["']?([\d-]+)"#).expect("vqd regex is valid")
});
static PAGE_LAYOUT_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"DDG\.pageLayout\.load\('d',\s*")
        .expect("page layout regex is valid")
});

pub struct DuckDuckGoJs {
    http: reqwest::Client,
    token_endpoint: String,
    links_endpoint: String,
}

/// One entry of the `d.js` payload. The trailing pagination entry has no `u`.
#[derive(Debug, Deserialize)]
struct JsResult {
    #[serde(default)]
    t: String,
    #[serde(default)]
    u: Option<String>,
    #[serde(default)]
    a: String,
}

impl DuckDuckGoJs {
    pub fn new(
        http: reqwest::Client,
        token_endpoint: impl Into<String>,
        links_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token_endpoint: token_endpoint.into(),
            links_endpoint: links_endpoint.into(),
        }
    }

    async fn fetch_vqd(&self, query: &str) -> Result<String> {
        let body = self
            .http
            .get(&self.token_endpoint)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| ParleyError::SearchError(format!("Token request failed: {}", e)))?
            .text()
            .await
            .map_err(|e| ParleyError::SearchError(format!("Failed to read token page: {}", e)))?;
        extract_vqd(&body).ok_or_else(|| {
            ParleyError::SearchError("Failed to get the VQD for query".to_string())
        })
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoJs {
    fn name(&self) -> &'static str {
        "duckduckgo-js"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        debug!(target: "search", query = %query.query, "Performing DuckDuckGo JS search");
        let vqd = self.fetch_vqd(&query.query).await?;

        let safe = match query.safe {
            SafeSearch::Strict => ("p", "1"),
            SafeSearch::Off => ("p", "-2"),
        };
        let response = self
            .http
            .get(&self.links_endpoint)
            .query(&[
                ("q", query.query.as_str()),
                ("vqd", vqd.as_str()),
                ("kl", "wt-wt"),
                ("l", "wt-wt"),
                ("s", "0"),
                ("dl", "en"),
                ("ct", "US"),
                ("sp", "1"),
                ("bpa", "1"),
                ("biaexp", "b"),
                ("msvrtexp", "b"),
                safe,
            ])
            .send()
            .await
            .map_err(|e| {
                warn!(target: "search", error = %e, "DuckDuckGo JS request failed");
                ParleyError::SearchError(format!("Search request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(ParleyError::SearchError(format!(
                "Search endpoint returned status: {}",
                response.status()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| ParleyError::SearchError(format!("Failed to read search payload: {}", e)))?;

        parse_js_results(&body, query.max_results)
    }
}

pub fn extract_vqd(html: &str) -> Option<String> {
    VQD_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Parse the `DDG.pageLayout.load('d', [...])` payload. A page with no
/// layout call means DuckDuckGo found nothing.
pub fn parse_js_results(body: &str, max_results: usize) -> Result<Vec<SearchResult>> {
    let Some(call) = PAGE_LAYOUT_RE.find(body) else {
        if body.contains("DDG.deep.is506") || body.contains("DDG.deep.anomalyDetectionBlock") {
            return Err(ParleyError::SearchError(
                "DuckDuckGo detected an anomaly in the request".to_string(),
            ));
        }
        return Ok(Vec::new());
    };

    // Read exactly one JSON array after the call prefix; brackets inside strings are data
    let entries: Vec<JsResult> = serde_json::Deserializer::from_str(&body[call.end()..])
        .into_iter::<Vec<JsResult>>()
        .next()
        .unwrap_or_else(|| Ok(Vec::new()))
        .map_err(|e| ParleyError::SearchError(format!("Malformed results payload: {}", e)))?;

    Ok(entries
        .into_iter()
        .filter_map(|entry| {
            let url = entry.u.filter(|u| !u.is_empty())?;
            Some(SearchResult {
                title: strip_html(&entry.t),
                url,
                description: strip_html(&entry.a),
            })
        })
        .take(max_results)
        .collect())
}

/// Drop markup and decode entities
fn strip_html(fragment: &str) -> String {
    let doc = html_scraper::Html::parse_fragment(fragment);
    doc.root_element()
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_vqd_in_any_quoting() {
        assert_eq!(
            extract_vqd(r#"<script>vqd="4-123456789012345678901234567890";</script>"#).as_deref(),
            Some("4-123456789012345678901234567890")
        );
        assert_eq!(extract_vqd("...vqd=4-42&amp;...").as_deref(), Some("4-42"));
        assert!(extract_vqd("<html></html>").is_none());
    }

    #[test]
    fn parses_layout_payload_and_skips_pagination_marker() {
        let body = r#"if (DDG.pageLayout) DDG.pageLayout.load('d',[{"a":"The <b>Rust</b> &amp; Cargo book","t":"Rust Book","u":"https://doc.rust-lang.org/book/"},{"n":"/d.js?q=rust&s=20"}]);DDG.duckbar.load('images');"#;
        let results = parse_js_results(body, 20).unwrap();
        assert_eq!(
            results,
            vec![SearchResult {
                title: "Rust Book".into(),
                url: "https://doc.rust-lang.org/book/".into(),
                description: "The Rust & Cargo book".into(),
            }]
        );
    }

    #[test]
    fn closing_sequence_inside_snippet_is_not_the_end() {
        let body = r#"DDG.pageLayout.load('d',[{"a":"call f([1]); then return","t":"Tricky","u":"https://example.com/a"},{"a":"second","t":"Two","u":"https://example.com/b"}]);DDG.duckbar.load('images');"#;
        let results = parse_js_results(body, 20).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].description, "call f([1]); then return");
        assert_eq!(results[1].url, "https://example.com/b");
    }

    #[test]
    fn truncated_payload_is_an_error() {
        assert!(parse_js_results(r#"DDG.pageLayout.load('d',[{"t":"x","u":"#, 20).is_err());
    }

    #[test]
    fn missing_layout_means_no_results() {
        assert!(parse_js_results("DDG.search.altIsNavigational = 1;", 20)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn anomaly_block_is_an_error() {
        assert!(parse_js_results("DDG.deep.anomalyDetectionBlock({});", 20).is_err());
    }
}
