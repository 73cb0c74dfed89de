use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header, Uri};
use axum::{response::IntoResponse, routing::get, routing::post, Router};
use parley_core::config::SearchConfig;
use parley_core::llm::provider::{Provider, ProviderCatalog};
use parley_core::llm::HttpModelFactory;
use parley_core::search::{SearchData, SearchRequest};
use parley_core::tools::{default_registry, HttpSearchGateway, SearchGateway};
use parley_core::{ConversationRouter, PromptTemplates, SearchAggregator};
use parley_server::{build_app, AppState};
use serde_json::{json, Value};

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn completions() -> impl IntoResponse {
    let body = [
        json!({"choices": [{"delta": {"role": "assistant", "content": "Hello"}}]}),
        json!({"choices": [{"delta": {"content": " there"}, "finish_reason": "stop"}]}),
    ]
    .iter()
    .map(|chunk| format!("data: {}\n\n", chunk))
    .collect::<String>()
        + "data: [DONE]\n\n";
    ([(header::CONTENT_TYPE, "text/event-stream")], body)
}

async fn html_results() -> impl IntoResponse {
    let body = r#"<html><body>
      <div class="result results_links web-result">
        <h2><a class="result__a" href="https://www.rust-lang.org/">Rust Programming Language</a></h2>
        <a class="result__snippet">A language empowering everyone.</a>
      </div>
    </body></html>"#;
    ([(header::CONTENT_TYPE, "text/html")], body)
}

/// Upstream paths the lookup stubs were asked for, still percent-encoded
type Seen = Arc<Mutex<Vec<String>>>;

async fn currency(State(seen): State<Seen>, uri: Uri) -> &'static str {
    seen.lock().unwrap().push(uri.path().to_string());
    r#"ddg_spice_currency({"from":"USD","amount":10,"to":[{"quotecurrency":"EUR","mid":9.2}]});"#
}

async fn definition(State(seen): State<Seen>, uri: Uri) -> &'static str {
    seen.lock().unwrap().push(uri.path().to_string());
    r#"ddg_spice_dictionary_definition([{"word":"rock","partOfSpeech":"noun","text":"A stone.","attributionText":"from a dictionary"}]);"#
}

/// Fake upstreams: one OpenAI-compatible provider plus the search endpoints
async fn upstream() -> String {
    upstream_recording().await.0
}

async fn upstream_recording() -> (String, Seen) {
    let seen: Seen = Arc::default();
    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .route("/html/", post(html_results))
        .route("/spice/currency/:amount/:from/:to", get(currency))
        .route("/spice/dictionary/definition/:word", get(definition))
        .with_state(seen.clone());
    (spawn(app).await, seen)
}

fn search_config(upstream: &str) -> SearchConfig {
    SearchConfig {
        html_endpoint: format!("{}/html/", upstream),
        token_endpoint: format!("{}/token", upstream),
        links_endpoint: format!("{}/d.js", upstream),
        spice_endpoint: format!("{}/spice", upstream),
        timeout_ms: 2_000,
        user_agent: "parley-test".to_string(),
        max_results: 20,
    }
}

async fn parley(upstream: &str, catalog: ProviderCatalog) -> String {
    let config = search_config(upstream);
    let gateway = SearchAggregator::from_config(&config).unwrap();
    let router = ConversationRouter::new(
        Arc::new(catalog),
        Arc::new(PromptTemplates::builtin()),
        Arc::new(HttpModelFactory::new(2_000).unwrap()),
        default_registry(Arc::new(gateway), 2_000),
    );
    let search = SearchAggregator::from_config(&config).unwrap();
    spawn(build_app(AppState::new(router, search))).await
}

fn cerebras_catalog(upstream: &str) -> ProviderCatalog {
    ProviderCatalog::empty().with_endpoint(
        Provider::Cerebras,
        format!("{}/v1", upstream),
        Some("csk-test".into()),
    )
}

/// JSON payloads of every SSE `data:` line
fn data_lines(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|l| l.strip_prefix("data:"))
        .map(|l| l.trim().to_string())
        .collect()
}

#[tokio::test]
async fn test_chat_streams_ui_events() {
    let up = upstream().await;
    let base = parley(&up, cerebras_catalog(&up)).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/chat", base))
        .json(&json!({
            "messages": [{"role": "user", "text": "hello"}],
            "model": "qwen-3-32b",
            "webSearch": false,
            "hasAttachment": false,
            "system_prompt": "casual"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()
            .get("x-vercel-ai-ui-message-stream")
            .and_then(|v| v.to_str().ok()),
        Some("v1")
    );

    let body = resp.text().await.unwrap();
    let lines = data_lines(&body);
    assert_eq!(lines.last().map(String::as_str), Some("[DONE]"));

    let events: Vec<Value> = lines[..lines.len() - 1]
        .iter()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let types: Vec<&str> = events.iter().filter_map(|e| e["type"].as_str()).collect();
    assert_eq!(types.first(), Some(&"start"));
    assert_eq!(types.last(), Some(&"finish"));
    assert!(!types.contains(&"error"));

    let text: String = events
        .iter()
        .filter(|e| e["type"] == "text-delta")
        .filter_map(|e| e["delta"].as_str())
        .collect();
    assert_eq!(text, "Hello there");
}

#[tokio::test]
async fn test_chat_rejects_malformed_body() {
    let up = upstream().await;
    let base = parley(&up, cerebras_catalog(&up)).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/chat", base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_chat_without_credential_is_generic_500() {
    let up = upstream().await;
    let base = parley(&up, ProviderCatalog::empty()).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/chat", base))
        .json(&json!({"messages": [{"role": "user", "text": "hi"}], "model": "qwen-3-32b"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"error": "Internal Server Error"}));
}

#[tokio::test]
async fn test_search_endpoint() {
    let up = upstream().await;
    let base = parley(&up, ProviderCatalog::empty()).await;
    let http = reqwest::Client::new();

    let resp = http
        .get(format!("{}/api/search", base))
        .query(&[("q", "rust")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["source"], json!("primary"));
    assert_eq!(body["data"][0]["url"], json!("https://www.rust-lang.org/"));
    assert_eq!(body["data"][0]["title"], json!("Rust Programming Language"));

    let resp = http
        .get(format!("{}/api/search", base))
        .query(&[("type", "currency"), ("from", "usd"), ("to", "eur"), ("amount", "10")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["to"], json!("EUR"));
    assert!((body["data"]["converted"].as_f64().unwrap() - 9.2).abs() < 1e-9);

    let resp = http
        .get(format!("{}/api/search", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body,
        json!({"success": false, "error": "Search query 'q' is required"})
    );
}

#[tokio::test]
async fn test_healthz() {
    let up = upstream().await;
    let base = parley(&up, ProviderCatalog::empty()).await;
    let body: Value = reqwest::get(format!("{}/healthz", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn test_http_gateway_round_trips_through_search_route() {
    let (up, seen) = upstream_recording().await;
    let base = parley(&up, ProviderCatalog::empty()).await;
    let gateway = HttpSearchGateway::new(&base, 2_000).unwrap();

    let resp = gateway
        .query(SearchRequest::Currency {
            from: "USD".into(),
            to: "EUR".into(),
            amount: 10.0,
        })
        .await
        .unwrap();
    assert!(resp.success);
    match resp.data {
        Some(SearchData::Rate(rate)) => {
            assert_eq!(rate.to, "EUR");
            assert!((rate.converted - 9.2).abs() < 1e-9);
        }
        other => panic!("unexpected data: {:?}", other),
    }

    let resp = gateway
        .query(SearchRequest::Define { word: "Rock#Roll".into() })
        .await
        .unwrap();
    match resp.data {
        Some(SearchData::Definitions(defs)) => {
            assert_eq!(defs.len(), 1);
            assert_eq!(defs[0].text, "A stone.");
        }
        other => panic!("unexpected data: {:?}", other),
    }

    let resp = gateway
        .query(SearchRequest::Define { word: "../../currency/1/usd/eur".into() })
        .await
        .unwrap();
    assert!(resp.success);

    let resp = gateway.query(SearchRequest::web("   ")).await.unwrap();
    assert!(!resp.success);
    assert_eq!(resp.error.as_deref(), Some("Search query 'q' is required"));

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "/spice/currency/10/usd/eur".to_string(),
            "/spice/dictionary/definition/rock%23roll".to_string(),
            "/spice/dictionary/definition/..%2F..%2Fcurrency%2F1%2Fusd%2Feur".to_string(),
        ]
    );
}
