use parley_core::config::{AppConfig, ChatConfig, SearchConfig};
use parley_core::llm::provider::{Provider, ProviderCatalog};
use parley_core::router::SearchStrategy;
use serial_test::serial;

fn offline_config() -> AppConfig {
    AppConfig {
        providers: ProviderCatalog::empty(),
        ..AppConfig::default()
    }
}

#[test]
#[serial]
fn test_env_overrides_defaults() {
    std::env::set_var("PARLEY_MAX_STEPS", "5");
    std::env::set_var("PARLEY_SEARCH_SPICE_ENDPOINT", "http://127.0.0.1:1/spice");
    let chat = ChatConfig::default();
    let search = SearchConfig::default();
    std::env::remove_var("PARLEY_MAX_STEPS");
    std::env::remove_var("PARLEY_SEARCH_SPICE_ENDPOINT");

    assert_eq!(chat.max_steps, 5);
    assert_eq!(chat.request_timeout_ms, 30_000);
    assert_eq!(search.spice_endpoint, "http://127.0.0.1:1/spice");
    assert_eq!(search.max_results, 20);
}

#[test]
#[serial]
fn test_provider_credentials_from_env() {
    std::env::set_var("CEREBRAS_API_KEY", "csk-env");
    std::env::set_var("PARLEY_CEREBRAS_BASE_URL", "http://127.0.0.1:2/v1");
    let catalog = ProviderCatalog::default();
    std::env::remove_var("CEREBRAS_API_KEY");
    std::env::remove_var("PARLEY_CEREBRAS_BASE_URL");

    let ep = catalog.endpoint(Provider::Cerebras);
    assert_eq!(ep.api_key.as_deref(), Some("csk-env"));
    assert_eq!(ep.base_url, "http://127.0.0.1:2/v1");
}

#[test]
fn test_toml_overlay() {
    let toml = r#"
[server]
app_url = "http://127.0.0.1:4000"

[chat]
max_steps = 3
search_pool = ["google", "google", "google", "perplexity"]

[providers.groq]
api_key = "gsk-file"
base_url = "http://127.0.0.1:5/v1"

[providers.nonexistent]
api_key = "ignored"

[prompts.pirate]
name = "Pirate"
system_prompt = "Answer like a pirate."
"#;
    let cfg = AppConfig::overlay_toml(offline_config(), toml).unwrap();
    assert_eq!(cfg.server.app_url, "http://127.0.0.1:4000");
    assert_eq!(cfg.chat.max_steps, 3);
    assert_eq!(
        cfg.chat.search_pool,
        vec![
            SearchStrategy::Google,
            SearchStrategy::Google,
            SearchStrategy::Google,
            SearchStrategy::Perplexity
        ]
    );
    assert!(cfg.providers.has_credential(Provider::Groq));
    assert_eq!(
        cfg.providers.endpoint(Provider::Groq).base_url,
        "http://127.0.0.1:5/v1"
    );
    assert_eq!(cfg.prompts.resolve(Some("pirate")), "Answer like a pirate.");
    // built-ins survive the overlay
    assert!(cfg.prompts.get("casual").is_some());
}

#[test]
fn test_malformed_toml_is_an_error() {
    assert!(AppConfig::overlay_toml(offline_config(), "[chat\nmax_steps = ").is_err());
    assert!(AppConfig::overlay_toml(offline_config(), "[chat]\nsearch_pool = [\"bing\"]").is_err());
}

#[test]
fn test_validate_requires_google_credential() {
    let cfg = offline_config();
    assert!(cfg.validate().is_err());

    let mut cfg = offline_config();
    cfg.providers = ProviderCatalog::empty().with_endpoint(
        Provider::Google,
        Provider::Google.default_base_url(),
        Some("g-key".into()),
    );
    assert!(cfg.validate().is_ok());

    cfg.chat.search_pool.clear();
    assert!(cfg.validate().is_err());
}
