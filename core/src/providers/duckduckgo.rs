/// DuckDuckGo HTML search (primary backend)
///
/// Posts the query to the no-JS results page and scrapes the organic hits.
/// Sponsored entries are skipped and `/l/?uddg=` redirect links are unwrapped
/// to their targets.
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::search::{SafeSearch, SearchProvider, SearchQuery, SearchResult};
use crate::{ParleyError, Result};

pub struct DuckDuckGoHtml {
    http: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGoHtml {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoHtml {
    fn name(&self) -> &'static str {
        "duckduckgo-html"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        debug!(target: "search", query = %query.query, time = ?query.time, "Performing DuckDuckGo HTML search");

        let mut form: Vec<(&str, &str)> = vec![("q", query.query.as_str()), ("kl", "wt-wt")];
        if let Some(time) = query.time {
            form.push(("df", time.as_str()));
        }
        if query.safe == SafeSearch::Off {
            form.push(("kp", "-2"));
        }

        let response = self
            .http
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "search", error = %e, "DuckDuckGo HTML request failed");
                ParleyError::SearchError(format!("Search request failed: {}", e))
            })?;

        // 202 is how the HTML endpoint signals rate limiting
        if response.status() != StatusCode::OK {
            let status = response.status();
            warn!(target: "search", status = %status, "DuckDuckGo HTML returned non-OK status");
            return Err(ParleyError::SearchError(format!(
                "Search endpoint returned status: {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ParleyError::SearchError(format!("Failed to read search page: {}", e)))?;

        Ok(parse_html_results(&body, query.max_results))
    }
}

/// Extract organic results from a DuckDuckGo HTML results page
pub fn parse_html_results(html: &str, max_results: usize) -> Vec<SearchResult> {
    let doc = html_scraper::Html::parse_document(html);
    let (Ok(result_sel), Ok(title_sel), Ok(snippet_sel)) = (
        html_scraper::Selector::parse("div.result"),
        html_scraper::Selector::parse("a.result__a"),
        html_scraper::Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for node in doc.select(&result_sel) {
        if out.len() >= max_results {
            break;
        }
        let classes: Vec<&str> = node.value().classes().collect();
        if classes.iter().any(|c| c.starts_with("result--ad")) {
            continue;
        }
        let Some(anchor) = node.select(&title_sel).next() else {
            continue;
        };
        let Some(url) = anchor.value().attr("href").and_then(unwrap_redirect) else {
            continue;
        };
        let title = collapse_whitespace(&anchor.text().collect::<String>());
        let description = node
            .select(&snippet_sel)
            .next()
            .map(|s| collapse_whitespace(&s.text().collect::<String>()))
            .unwrap_or_default();
        out.push(SearchResult {
            title,
            url,
            description,
        });
    }
    out
}

/// `//duckduckgo.com/l/?uddg=<encoded>&rut=...` → target URL. Direct links pass through.
fn unwrap_redirect(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let base = url::Url::parse("https://duckduckgo.com/").ok()?;
    let parsed = base.join(href).ok()?;
    let is_redirect = parsed
        .host_str()
        .map(|h| h.ends_with("duckduckgo.com"))
        .unwrap_or(false)
        && parsed.path().starts_with("/l/");
    if is_redirect {
        // y.js is the ad click tracker
        return parsed
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned())
            .filter(|target| !target.contains("duckduckgo.com/y.js"));
    }
    if parsed.host_str().map(|h| h.ends_with("duckduckgo.com")) == Some(true)
        && parsed.path().starts_with("/y.js")
    {
        return None;
    }
    Some(parsed.to_string())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"
<html><body>
<div class="results">
  <div class="result results_links results_links_deep result--ad">
    <a class="result__a" href="https://duckduckgo.com/y.js?ad_provider=x">Buy Rust</a>
    <a class="result__snippet">sponsored</a>
  </div>
  <div class="result results_links results_links_deep web-result">
    <h2 class="result__title">
      <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F&amp;rut=abc">Rust   Programming
        Language</a>
    </h2>
    <a class="result__snippet" href="#">A language empowering <b>everyone</b>.</a>
  </div>
  <div class="result results_links web-result">
    <a class="result__a" href="https://doc.rust-lang.org/book/">The Book</a>
  </div>
</div>
</body></html>"##;

    #[test]
    fn scrapes_organic_results_and_unwraps_redirects() {
        let results = parse_html_results(PAGE, 20);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://www.rust-lang.org/");
        assert_eq!(results[0].title, "Rust Programming Language");
        assert_eq!(results[0].description, "A language empowering everyone.");
        assert_eq!(results[1].url, "https://doc.rust-lang.org/book/");
        assert_eq!(results[1].description, "");
    }

    #[test]
    fn respects_result_cap() {
        assert_eq!(parse_html_results(PAGE, 1).len(), 1);
    }

    #[test]
    fn empty_page_yields_nothing() {
        assert!(parse_html_results("<html><body>No results.</body></html>", 20).is_empty());
    }
}
