use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Template id used when the requested one is unknown
pub const FALLBACK_TEMPLATE_ID: &str = "casual";

/// Last resort when neither the requested nor the fallback template exists
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub system_prompt: String,
}

impl PromptTemplate {
    fn builtin(name: &str, description: &str, system_prompt: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            system_prompt: system_prompt.to_string(),
        }
    }
}

/// Template id → system prompt.
#[derive(Debug, Clone, Default)]
pub struct PromptTemplates {
    templates: HashMap<String, PromptTemplate>,
}

impl PromptTemplates {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut t = Self::empty();
        t.insert(
            "casual",
            PromptTemplate::builtin(
                "Casual",
                "Friendly everyday conversation",
                "You are a friendly, upbeat assistant. Keep answers conversational and easy to follow, \
                 use plain language, and ask a short clarifying question when the request is ambiguous.",
            ),
        );
        t.insert(
            "professional",
            PromptTemplate::builtin(
                "Professional",
                "Formal, structured answers",
                "You are a precise professional assistant. Answer in a formal tone, structure longer \
                 answers with headings or bullet points, and state assumptions explicitly.",
            ),
        );
        t.insert(
            "creative",
            PromptTemplate::builtin(
                "Creative",
                "Brainstorming and writing",
                "You are an imaginative writing partner. Offer original ideas, vivid language and \
                 several alternatives when brainstorming.",
            ),
        );
        t.insert(
            "technical",
            PromptTemplate::builtin(
                "Technical",
                "Engineering and programming help",
                "You are a senior software engineer. Give correct, idiomatic code with brief \
                 explanations, point out edge cases, and prefer standard tooling.",
            ),
        );
        t.insert(
            "concise",
            PromptTemplate::builtin(
                "Concise",
                "Shortest useful answer",
                "You are a terse assistant. Reply in as few words as possible without losing accuracy.",
            ),
        );
        t.insert(
            "tutor",
            PromptTemplate::builtin(
                "Tutor",
                "Step-by-step teaching",
                "You are a patient tutor. Explain concepts step by step, check understanding with \
                 small questions, and build from fundamentals.",
            ),
        );
        t
    }

    pub fn insert(&mut self, id: impl Into<String>, template: PromptTemplate) {
        self.templates.insert(id.into(), template);
    }

    pub fn remove(&mut self, id: &str) -> Option<PromptTemplate> {
        self.templates.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&PromptTemplate> {
        self.templates.get(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.templates.keys().map(|k| k.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    /// Resolve a system prompt: requested id, then `casual`, then the hardcoded default.
    /// Empty prompts count as missing. Never fails.
    pub fn resolve(&self, id: Option<&str>) -> &str {
        id.and_then(|id| self.non_empty(id))
            .or_else(|| self.non_empty(FALLBACK_TEMPLATE_ID))
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }

    fn non_empty(&self, id: &str) -> Option<&str> {
        self.templates
            .get(id)
            .map(|t| t.system_prompt.as_str())
            .filter(|s| !s.trim().is_empty())
    }
}
