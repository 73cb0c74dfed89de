//! Process-wide configuration: env-driven defaults with an optional TOML overlay.
//!
//! Built once at start-up and handed to components; nothing reaches into the
//! environment after that.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::llm::provider::{Provider, ProviderCatalog};
use crate::prompts::{PromptTemplate, PromptTemplates};
use crate::router::SearchStrategy;
use crate::{ParleyError, Result};

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Base URL the tools use to reach `/api/search`
    pub app_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: env_string("PARLEY_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            app_url: env_string("PARLEY_APP_URL")
                .unwrap_or_else(|| "http://127.0.0.1:3000".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Wall-clock budget for one chat request, stream included
    pub request_timeout_ms: u64,
    /// Maximum model↔tool round-trips per request
    pub max_steps: usize,
    pub tool_timeout_ms: u64,
    /// Weighted pool the web-search strategy is drawn from
    pub search_pool: Vec<SearchStrategy>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: env_parse("PARLEY_REQUEST_TIMEOUT_MS").unwrap_or(30_000),
            max_steps: env_parse("PARLEY_MAX_STEPS").unwrap_or(20),
            tool_timeout_ms: env_parse("PARLEY_TOOL_TIMEOUT_MS").unwrap_or(15_000),
            search_pool: vec![SearchStrategy::Google, SearchStrategy::Perplexity],
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Primary provider: DuckDuckGo HTML results page
    pub html_endpoint: String,
    /// Fallback provider: landing page issuing the `vqd` token
    pub token_endpoint: String,
    /// Fallback provider: JS results endpoint
    pub links_endpoint: String,
    /// Currency and dictionary lookups
    pub spice_endpoint: String,
    pub timeout_ms: u64,
    pub user_agent: String,
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            html_endpoint: env_string("PARLEY_SEARCH_HTML_ENDPOINT")
                .unwrap_or_else(|| "https://html.duckduckgo.com/html/".to_string()),
            token_endpoint: env_string("PARLEY_SEARCH_TOKEN_ENDPOINT")
                .unwrap_or_else(|| "https://duckduckgo.com/".to_string()),
            links_endpoint: env_string("PARLEY_SEARCH_LINKS_ENDPOINT")
                .unwrap_or_else(|| "https://links.duckduckgo.com/d.js".to_string()),
            spice_endpoint: env_string("PARLEY_SEARCH_SPICE_ENDPOINT")
                .unwrap_or_else(|| "https://duckduckgo.com/js/spice".to_string()),
            timeout_ms: env_parse("PARLEY_SEARCH_TIMEOUT_MS").unwrap_or(10_000),
            user_agent: env_string("PARLEY_SEARCH_USER_AGENT").unwrap_or_else(|| {
                "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0".to_string()
            }),
            max_results: 20,
        }
    }
}

/// Immutable application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub providers: ProviderCatalog,
    pub chat: ChatConfig,
    pub search: SearchConfig,
    pub prompts: PromptTemplates,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            providers: ProviderCatalog::default(),
            chat: ChatConfig::default(),
            search: SearchConfig::default(),
            prompts: PromptTemplates::builtin(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file (path via PARLEY_CONFIG or ./parley.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path = std::env::var("PARLEY_CONFIG").unwrap_or_else(|_| "parley.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            info!(target: "config", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match Self::overlay_toml(default.clone(), &s) {
                Ok(cfg) => {
                    info!(target: "config", path = %path, "Loaded TOML config");
                    cfg
                }
                Err(e) => {
                    warn!(target: "config", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                warn!(target: "config", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    /// Apply a TOML document on top of `base`
    pub fn overlay_toml(base: Self, toml_str: &str) -> Result<Self> {
        let parsed: ParleyToml =
            toml::from_str(toml_str).map_err(|e| ParleyError::ConfigError(e.to_string()))?;
        Ok(parsed.overlay(base))
    }

    /// Start-up checks. A missing credential for the default/attachment provider is fatal;
    /// other missing credentials only disable the routes that need them.
    pub fn validate(&self) -> Result<()> {
        if !self.providers.has_credential(Provider::Google) {
            return Err(ParleyError::ConfigError(format!(
                "{} is required (default and attachment provider)",
                Provider::Google.api_key_var()
            )));
        }
        for provider in Provider::ALL {
            if !self.providers.has_credential(provider) {
                warn!(target: "config", provider = %provider, var = provider.api_key_var(), "Credential not set; requests routed to this provider will fail");
            }
        }
        if self.chat.search_pool.is_empty() {
            return Err(ParleyError::ConfigError(
                "chat.search_pool must not be empty".to_string(),
            ));
        }
        if self.chat.max_steps == 0 {
            return Err(ParleyError::ConfigError(
                "chat.max_steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, Deserialize)]
struct ParleyToml {
    server: Option<ServerToml>,
    chat: Option<ChatToml>,
    search: Option<SearchToml>,
    providers: Option<HashMap<String, ProviderToml>>,
    prompts: Option<HashMap<String, PromptTemplate>>,
}

impl ParleyToml {
    fn overlay(self, mut base: AppConfig) -> AppConfig {
        if let Some(s) = self.server {
            s.apply(&mut base.server);
        }
        if let Some(c) = self.chat {
            c.apply(&mut base.chat);
        }
        if let Some(s) = self.search {
            s.apply(&mut base.search);
        }
        if let Some(providers) = self.providers {
            for (name, p) in providers {
                match name.parse::<Provider>() {
                    Ok(provider) => p.apply(base.providers.endpoint_mut(provider)),
                    Err(e) => warn!(target: "config", error = %e, "Ignoring provider section"),
                }
            }
        }
        if let Some(prompts) = self.prompts {
            for (id, template) in prompts {
                base.prompts.insert(id, template);
            }
        }
        base
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ServerToml {
    bind_addr: Option<String>,
    app_url: Option<String>,
}
impl ServerToml {
    fn apply(self, s: &mut ServerConfig) {
        if let Some(v) = self.bind_addr {
            s.bind_addr = v;
        }
        if let Some(v) = self.app_url {
            s.app_url = v;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ChatToml {
    request_timeout_ms: Option<u64>,
    max_steps: Option<usize>,
    tool_timeout_ms: Option<u64>,
    search_pool: Option<Vec<SearchStrategy>>,
}
impl ChatToml {
    fn apply(self, c: &mut ChatConfig) {
        if let Some(v) = self.request_timeout_ms {
            c.request_timeout_ms = v;
        }
        if let Some(v) = self.max_steps {
            c.max_steps = v;
        }
        if let Some(v) = self.tool_timeout_ms {
            c.tool_timeout_ms = v;
        }
        if let Some(v) = self.search_pool {
            c.search_pool = v;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SearchToml {
    html_endpoint: Option<String>,
    token_endpoint: Option<String>,
    links_endpoint: Option<String>,
    spice_endpoint: Option<String>,
    timeout_ms: Option<u64>,
    user_agent: Option<String>,
    max_results: Option<usize>,
}
impl SearchToml {
    fn apply(self, s: &mut SearchConfig) {
        if let Some(v) = self.html_endpoint {
            s.html_endpoint = v;
        }
        if let Some(v) = self.token_endpoint {
            s.token_endpoint = v;
        }
        if let Some(v) = self.links_endpoint {
            s.links_endpoint = v;
        }
        if let Some(v) = self.spice_endpoint {
            s.spice_endpoint = v;
        }
        if let Some(v) = self.timeout_ms {
            s.timeout_ms = v;
        }
        if let Some(v) = self.user_agent {
            s.user_agent = v;
        }
        if let Some(v) = self.max_results {
            s.max_results = v;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ProviderToml {
    base_url: Option<String>,
    api_key: Option<String>,
}
impl ProviderToml {
    fn apply(self, ep: &mut crate::llm::provider::ProviderEndpoint) {
        if let Some(v) = self.base_url {
            ep.base_url = v;
        }
        if let Some(v) = self.api_key.filter(|k| !k.is_empty()) {
            ep.api_key = Some(v);
        }
    }
}
