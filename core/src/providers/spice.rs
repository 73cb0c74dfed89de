/// DuckDuckGo "spice" lookups: currency conversion and dictionary definitions
///
/// Both endpoints answer with JSONP (`ddg_spice_currency({...});`); the
/// wrapper is stripped before decoding.
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::search::{Definition, LookupProvider, RateResult};
use crate::{ParleyError, Result};

pub struct SpiceLookup {
    http: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct CurrencyPayload {
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    to: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    quotecurrency: String,
    mid: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionPayload {
    #[serde(default)]
    word: Option<String>,
    #[serde(default)]
    part_of_speech: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    attribution_text: Option<String>,
}

impl SpiceLookup {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    async fn fetch(&self, segments: &[&str]) -> Result<String> {
        let url = lookup_url(&self.endpoint, segments)?;
        debug!(target: "search", %url, "Spice lookup");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ParleyError::LookupError(format!("Lookup request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(ParleyError::LookupError(format!(
                "Lookup endpoint returned status: {}",
                response.status()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| ParleyError::LookupError(format!("Failed to read lookup response: {}", e)))
    }
}

#[async_trait]
impl LookupProvider for SpiceLookup {
    async fn currency(&self, from: &str, to: &str, amount: f64) -> Result<RateResult> {
        let amount_segment = amount.to_string();
        let (from_lc, to_lc) = (from.to_lowercase(), to.to_lowercase());
        let body = self
            .fetch(&["currency", amount_segment.as_str(), from_lc.as_str(), to_lc.as_str()])
            .await?;
        parse_currency(&body, from, to, amount)
    }

    async fn define(&self, word: &str) -> Result<Vec<Definition>> {
        let word_lc = word.to_lowercase();
        let body = self
            .fetch(&["dictionary", "definition", word_lc.as_str()])
            .await?;
        parse_definitions(&body, word)
    }
}

/// `{endpoint}/{segments...}` with every segment percent-encoded, so caller
/// input never adds path levels, a query or a fragment.
pub fn lookup_url(endpoint: &str, segments: &[&str]) -> Result<url::Url> {
    if let Some(bad) = segments.iter().find(|s| s.is_empty() || **s == "." || **s == "..") {
        return Err(ParleyError::LookupError(format!(
            "invalid lookup term '{}'",
            bad
        )));
    }
    let mut url = url::Url::parse(endpoint)
        .map_err(|e| ParleyError::ConfigError(format!("invalid lookup endpoint '{}': {}", endpoint, e)))?;
    url.path_segments_mut()
        .map_err(|_| ParleyError::ConfigError(format!("lookup endpoint '{}' cannot take a path", endpoint)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// `callback(<json>);` → `<json>`. Bare JSON passes through.
pub fn strip_jsonp(body: &str) -> &str {
    let trimmed = body.trim();
    match (trimmed.find('('), trimmed.rfind(')')) {
        (Some(open), Some(close))
            if open < close
                && trimmed[..open]
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') =>
        {
            &trimmed[open + 1..close]
        }
        _ => trimmed,
    }
}

pub fn parse_currency(body: &str, from: &str, to: &str, amount: f64) -> Result<RateResult> {
    let payload: CurrencyPayload = serde_json::from_str(strip_jsonp(body))
        .map_err(|e| ParleyError::LookupError(format!("Malformed currency response: {}", e)))?;

    let quote = payload
        .to
        .iter()
        .find(|q| q.quotecurrency.eq_ignore_ascii_case(to))
        .or_else(|| payload.to.first())
        .ok_or_else(|| {
            ParleyError::LookupError(format!("No conversion available for {} to {}", from, to))
        })?;

    let rate = if amount != 0.0 { quote.mid / amount } else { 0.0 };
    Ok(RateResult {
        from: payload.from.unwrap_or_else(|| from.to_uppercase()),
        to: quote.quotecurrency.clone(),
        amount,
        converted: quote.mid,
        rate,
        timestamp: payload.timestamp,
    })
}

pub fn parse_definitions(body: &str, word: &str) -> Result<Vec<Definition>> {
    let entries: Vec<DefinitionPayload> = serde_json::from_str(strip_jsonp(body))
        .map_err(|e| ParleyError::LookupError(format!("Malformed dictionary response: {}", e)))?;

    let definitions: Vec<Definition> = entries
        .into_iter()
        .filter_map(|entry| {
            let text = entry.text.filter(|t| !t.trim().is_empty())?;
            Some(Definition {
                word: entry.word.unwrap_or_else(|| word.to_string()),
                part_of_speech: entry.part_of_speech,
                text,
                attribution: entry.attribution_text,
            })
        })
        .collect();

    if definitions.is_empty() {
        return Err(ParleyError::LookupError(format!(
            "No definitions found for '{}'",
            word
        )));
    }
    Ok(definitions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_terms_stay_inside_one_segment() {
        let url = lookup_url(
            "http://127.0.0.1:9/spice/",
            &["dictionary", "definition", "../../currency/1/usd/eur"],
        )
        .unwrap();
        assert_eq!(url.path(), "/spice/dictionary/definition/..%2F..%2Fcurrency%2F1%2Fusd%2Feur");

        let url = lookup_url("http://127.0.0.1:9/spice", &["dictionary", "definition", "rock#roll?x"]).unwrap();
        assert_eq!(url.path(), "/spice/dictionary/definition/rock%23roll%3Fx");
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
    }

    #[test]
    fn dot_segments_are_rejected() {
        for term in ["..", ".", ""] {
            let err = lookup_url("http://127.0.0.1:9/spice", &["dictionary", "definition", term]);
            assert!(matches!(err, Err(ParleyError::LookupError(_))), "{term:?}");
        }
    }

    #[test]
    fn strips_jsonp_wrapper() {
        assert_eq!(strip_jsonp("ddg_spice_currency({\"a\":1});\n"), "{\"a\":1}");
        assert_eq!(strip_jsonp("[1,2]"), "[1,2]");
    }

    #[test]
    fn currency_payload_is_normalized() {
        let body = r#"ddg_spice_currency({"terms":"http://www.xe.com/legal/","from":"USD","amount":10.0,"timestamp":"2024-05-01T12:00:00Z","to":[{"quotecurrency":"EUR","mid":9.31}]});"#;
        let rate = parse_currency(body, "USD", "EUR", 10.0).unwrap();
        assert_eq!(rate.from, "USD");
        assert_eq!(rate.to, "EUR");
        assert!((rate.converted - 9.31).abs() < 1e-9);
        assert!((rate.rate - 0.931).abs() < 1e-9);
        assert_eq!(rate.timestamp.as_deref(), Some("2024-05-01T12:00:00Z"));
    }

    #[test]
    fn currency_without_quotes_is_an_error() {
        let body = r#"ddg_spice_currency({"from":"USD","to":[]});"#;
        assert!(parse_currency(body, "USD", "XXX", 1.0).is_err());
    }

    #[test]
    fn definitions_skip_empty_entries() {
        let body = r#"ddg_spice_dictionary_definition([
            {"word":"serendipity","partOfSpeech":"noun","text":"The faculty of making fortunate discoveries by accident.","attributionText":"from The American Heritage Dictionary"},
            {"word":"serendipity","partOfSpeech":"noun"}
        ]);"#;
        let defs = parse_definitions(body, "serendipity").unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].part_of_speech.as_deref(), Some("noun"));
        assert!(defs[0].attribution.is_some());
    }

    #[test]
    fn unknown_word_is_an_error() {
        assert!(parse_definitions("ddg_spice_dictionary_definition([]);", "qwxz").is_err());
    }
}
