use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{ParleyError, Result};

/// Hosted model providers the router can reach
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Cerebras,
    Groq,
    Xai,
    HuggingFace,
    OpenRouter,
    Perplexity,
}

impl Provider {
    pub const ALL: [Provider; 7] = [
        Provider::Google,
        Provider::Cerebras,
        Provider::Groq,
        Provider::Xai,
        Provider::HuggingFace,
        Provider::OpenRouter,
        Provider::Perplexity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Cerebras => "cerebras",
            Provider::Groq => "groq",
            Provider::Xai => "xai",
            Provider::HuggingFace => "huggingface",
            Provider::OpenRouter => "openrouter",
            Provider::Perplexity => "perplexity",
        }
    }

    /// Environment variable holding the credential
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Provider::Google => "GOOGLE_GENERATIVE_AI_API_KEY",
            Provider::Cerebras => "CEREBRAS_API_KEY",
            Provider::Groq => "GROQ_API_KEY",
            Provider::Xai => "XAI_API_KEY",
            Provider::HuggingFace => "HUGGINGFACE_API_KEY",
            Provider::OpenRouter => "OPENROUTER_API_KEY",
            Provider::Perplexity => "PERPLEXITY_API_KEY",
        }
    }

    /// Environment variable overriding the OpenAI-compatible base URL
    pub fn base_url_var(&self) -> String {
        format!("PARLEY_{}_BASE_URL", self.as_str().to_uppercase())
    }

    /// OpenAI-compatible base URL (the part before `/chat/completions`)
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Google => "https://generativelanguage.googleapis.com/v1beta/openai",
            Provider::Cerebras => "https://api.cerebras.ai/v1",
            Provider::Groq => "https://api.groq.com/openai/v1",
            Provider::Xai => "https://api.x.ai/v1",
            Provider::HuggingFace => "https://router.huggingface.co/v1",
            Provider::OpenRouter => "https://openrouter.ai/api/v1",
            Provider::Perplexity => "https://api.perplexity.ai",
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self> {
        Provider::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParleyError::ConfigError(format!("unknown provider '{}'", s)))
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a handle talks to its provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Wire {
    /// OpenAI-compatible `/chat/completions` streaming
    ChatCompletions,
    /// Native Gemini streaming with built-in search and URL tools
    GeminiGrounded,
}

/// Credential and address of one provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEndpoint {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl ProviderEndpoint {
    pub fn from_env(provider: Provider) -> Self {
        Self {
            base_url: std::env::var(provider.base_url_var())
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| provider.default_base_url().to_string()),
            api_key: std::env::var(provider.api_key_var())
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }
}

/// Immutable credential table, built once at start-up and shared read-only
#[derive(Debug, Clone)]
pub struct ProviderCatalog {
    endpoints: BTreeMap<Provider, ProviderEndpoint>,
    /// Native Gemini API root used by the grounded search strategy
    pub google_native_base_url: String,
}

impl Default for ProviderCatalog {
    fn default() -> Self {
        Self {
            endpoints: Provider::ALL
                .iter()
                .map(|p| (*p, ProviderEndpoint::from_env(*p)))
                .collect(),
            google_native_base_url: std::env::var("PARLEY_GOOGLE_NATIVE_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
        }
    }
}

impl ProviderCatalog {
    /// A catalogue with default URLs and no credentials, ignoring the environment
    pub fn empty() -> Self {
        Self {
            endpoints: Provider::ALL
                .iter()
                .map(|p| {
                    (
                        *p,
                        ProviderEndpoint {
                            base_url: p.default_base_url().to_string(),
                            api_key: None,
                        },
                    )
                })
                .collect(),
            google_native_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }

    pub fn with_endpoint(
        mut self,
        provider: Provider,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        self.endpoints.insert(
            provider,
            ProviderEndpoint {
                base_url: base_url.into(),
                api_key,
            },
        );
        self
    }

    pub fn with_google_native_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.google_native_base_url = base_url.into();
        self
    }

    pub fn endpoint(&self, provider: Provider) -> ProviderEndpoint {
        self.endpoints
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| ProviderEndpoint {
                base_url: provider.default_base_url().to_string(),
                api_key: None,
            })
    }

    pub(crate) fn endpoint_mut(&mut self, provider: Provider) -> &mut ProviderEndpoint {
        self.endpoints
            .entry(provider)
            .or_insert_with(|| ProviderEndpoint {
                base_url: provider.default_base_url().to_string(),
                api_key: None,
            })
    }

    pub fn has_credential(&self, provider: Provider) -> bool {
        self.endpoint(provider).api_key.is_some()
    }

    /// Handle for the OpenAI-compatible endpoint of `provider`
    pub fn handle(&self, provider: Provider, model: impl Into<String>) -> ProviderHandle {
        let ep = self.endpoint(provider);
        ProviderHandle {
            provider,
            model: model.into(),
            base_url: ep.base_url,
            api_key: ep.api_key,
            wire: Wire::ChatCompletions,
        }
    }

    /// Handle for native Gemini streaming with search grounding
    pub fn grounded_handle(&self, model: impl Into<String>) -> ProviderHandle {
        ProviderHandle {
            provider: Provider::Google,
            model: model.into(),
            base_url: self.google_native_base_url.clone(),
            api_key: self.endpoint(Provider::Google).api_key,
            wire: Wire::GeminiGrounded,
        }
    }
}

/// Per-request reference to a configured hosted model. Never mutated after creation.
#[derive(Clone, PartialEq)]
pub struct ProviderHandle {
    pub provider: Provider,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub wire: Wire,
}

// Keep credentials out of logs
impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("wire", &self.wire)
            .finish()
    }
}
