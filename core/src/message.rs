//! Inbound chat payloads as sent by the browser client.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A rendered part of a UI message. Only text and files feed the model;
/// everything else (reasoning, tool records, sources) is display state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiPart {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    File {
        media_type: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<UiPart>,
    /// Shorthand accepted in place of `parts`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl UiMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: None,
            role: Role::User,
            parts: vec![UiPart::Text { text: text.into() }],
            text: None,
            content: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            ..Self::user(text)
        }
    }

    /// Parts that carry model input, with the shorthand fields folded in
    pub fn input_parts(&self) -> Vec<UiPart> {
        let mut parts: Vec<UiPart> = self
            .parts
            .iter()
            .filter(|p| !matches!(p, UiPart::Other))
            .cloned()
            .collect();
        if parts.is_empty() {
            if let Some(text) = self.text.as_ref().or(self.content.as_ref()) {
                parts.push(UiPart::Text { text: text.clone() });
            }
        }
        parts
    }

    /// Concatenated text parts
    pub fn plain_text(&self) -> String {
        self.input_parts()
            .iter()
            .filter_map(|p| match p {
                UiPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Body of `POST /api/chat`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<UiMessage>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub web_search: bool,
    #[serde(default)]
    pub has_attachment: bool,
    #[serde(default, rename = "system_prompt", alias = "systemPrompt")]
    pub system_prompt: Option<String>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<UiMessage>) -> Self {
        Self {
            messages,
            model: model.into(),
            web_search: false,
            has_attachment: false,
            system_prompt: None,
        }
    }

    pub fn with_web_search(mut self, on: bool) -> Self {
        self.web_search = on;
        self
    }

    pub fn with_attachment(mut self, on: bool) -> Self {
        self.has_attachment = on;
        self
    }

    pub fn with_system_prompt(mut self, id: impl Into<String>) -> Self {
        self.system_prompt = Some(id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthand_text_becomes_a_part() {
        let req: ChatRequest = serde_json::from_str(
            r#"{"messages":[{"role":"user","text":"hello"}],"model":"qwen-3-32b","webSearch":false,"hasAttachment":false,"system_prompt":"casual"}"#,
        )
        .unwrap();
        assert_eq!(req.model, "qwen-3-32b");
        assert_eq!(req.system_prompt.as_deref(), Some("casual"));
        assert_eq!(
            req.messages[0].input_parts(),
            vec![UiPart::Text {
                text: "hello".into()
            }]
        );
    }

    #[test]
    fn unknown_parts_are_ignored() {
        let msg: UiMessage = serde_json::from_str(
            r#"{"id":"m1","role":"assistant","parts":[
                {"type":"step-start"},
                {"type":"reasoning","text":"thinking"},
                {"type":"text","text":"answer"},
                {"type":"file","mediaType":"image/png","url":"data:image/png;base64,AAAA"}
            ]}"#,
        )
        .unwrap();
        let parts = msg.input_parts();
        assert_eq!(parts.len(), 2);
        assert_eq!(msg.plain_text(), "answer");
    }
}
