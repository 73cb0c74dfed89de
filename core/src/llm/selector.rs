use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::provider::{Provider, ProviderCatalog, ProviderHandle};

/// Model used for attachments, the default route and grounded search
pub const GEMINI_FLASH_LITE: &str = "gemini-2.5-flash-lite-preview-09-2025";

/// What a matching rule resolves to
#[derive(Debug, Clone, PartialEq)]
pub enum RuleTarget {
    /// Fixed upstream model, whatever the client asked for
    Fixed {
        provider: Provider,
        model: &'static str,
    },
    /// Forward the client's model id verbatim
    PassThrough(Provider),
}

impl RuleTarget {
    fn resolve(&self, catalog: &ProviderCatalog, model_id: &str) -> ProviderHandle {
        match self {
            RuleTarget::Fixed { provider, model } => catalog.handle(*provider, *model),
            RuleTarget::PassThrough(provider) => catalog.handle(*provider, model_id),
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            RuleTarget::Fixed { provider, .. } => *provider,
            RuleTarget::PassThrough(provider) => *provider,
        }
    }
}

/// One entry of the dispatch table: case-insensitive substring → target
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRule {
    pub keyword: &'static str,
    pub target: RuleTarget,
}

impl SelectionRule {
    pub const fn fixed(keyword: &'static str, provider: Provider, model: &'static str) -> Self {
        Self {
            keyword,
            target: RuleTarget::Fixed { provider, model },
        }
    }

    pub const fn pass_through(keyword: &'static str, provider: Provider) -> Self {
        Self {
            keyword,
            target: RuleTarget::PassThrough(provider),
        }
    }

    fn matches(&self, lowered_model_id: &str) -> bool {
        lowered_model_id.contains(self.keyword)
    }
}

/// Evaluation order matters: the first match wins.
pub const DEFAULT_RULES: [SelectionRule; 5] = [
    SelectionRule::fixed("qwen", Provider::Cerebras, "qwen-3-32b"),
    SelectionRule::fixed("llama", Provider::Groq, "llama-3.1-8b-instant"),
    SelectionRule::fixed("grok", Provider::Xai, "grok-3-mini-fast"),
    SelectionRule::fixed("oss", Provider::HuggingFace, "openai/gpt-oss-20b:cheapest"),
    SelectionRule::pass_through("free", Provider::OpenRouter),
];

/// Why a handle was chosen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "keyword", rename_all = "snake_case")]
pub enum SelectionReason {
    Attachment,
    Rule(&'static str),
    Default,
}

/// Maps a client model id (and attachment presence) to a provider handle.
/// Selection never fails.
#[derive(Debug, Clone)]
pub struct ProviderSelector {
    catalog: Arc<ProviderCatalog>,
    rules: Vec<SelectionRule>,
    attachment: RuleTarget,
    fallback: RuleTarget,
}

impl ProviderSelector {
    pub fn new(catalog: Arc<ProviderCatalog>) -> Self {
        let gemini = RuleTarget::Fixed {
            provider: Provider::Google,
            model: GEMINI_FLASH_LITE,
        };
        Self {
            catalog,
            rules: DEFAULT_RULES.to_vec(),
            attachment: gemini.clone(),
            fallback: gemini,
        }
    }

    /// Replace the rule table (order preserved)
    pub fn with_rules(mut self, rules: Vec<SelectionRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn rules(&self) -> &[SelectionRule] {
        &self.rules
    }

    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    pub fn select(&self, model_id: &str, has_attachment: bool) -> ProviderHandle {
        self.select_with_reason(model_id, has_attachment).0
    }

    pub fn select_with_reason(
        &self,
        model_id: &str,
        has_attachment: bool,
    ) -> (ProviderHandle, SelectionReason) {
        if has_attachment {
            let handle = self.attachment.resolve(&self.catalog, model_id);
            debug!(target: "selector", requested = %model_id, provider = %handle.provider, "Attachment present; using attachment-capable provider");
            return (handle, SelectionReason::Attachment);
        }

        let lowered = model_id.to_lowercase();
        if let Some(rule) = self.rules.iter().find(|r| r.matches(&lowered)) {
            let handle = rule.target.resolve(&self.catalog, model_id);
            debug!(target: "selector", requested = %model_id, keyword = rule.keyword, provider = %handle.provider, model = %handle.model, "Rule matched");
            return (handle, SelectionReason::Rule(rule.keyword));
        }

        let handle = self.fallback.resolve(&self.catalog, model_id);
        debug!(target: "selector", requested = %model_id, provider = %handle.provider, "No rule matched; using default provider");
        (handle, SelectionReason::Default)
    }
}
