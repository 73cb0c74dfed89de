//! UI message stream events (AI SDK UI message stream protocol, v1).
//!
//! Framing is `start`, then one or more `start-step` … `finish-step` blocks,
//! then `finish`. A failed stream ends with a single `error` event instead.

use std::pin::Pin;

use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response header announcing the protocol to the client
pub const UI_STREAM_HEADER: &str = "x-vercel-ai-ui-message-stream";
pub const UI_STREAM_VERSION: &str = "v1";
/// Terminal SSE payload after the last event
pub const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiEvent {
    #[serde(rename_all = "camelCase")]
    Start { message_id: String },
    StartStep,
    TextStart { id: String },
    TextDelta { id: String, delta: String },
    TextEnd { id: String },
    ReasoningStart { id: String },
    ReasoningDelta { id: String, delta: String },
    ReasoningEnd { id: String },
    #[serde(rename_all = "camelCase")]
    SourceUrl {
        source_id: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ToolInputAvailable {
        tool_call_id: String,
        tool_name: String,
        input: Value,
    },
    #[serde(rename_all = "camelCase")]
    ToolOutputAvailable { tool_call_id: String, output: Value },
    FinishStep,
    Finish,
    #[serde(rename_all = "camelCase")]
    Error { error_text: String },
}

impl UiEvent {
    pub fn error(message: impl Into<String>) -> Self {
        UiEvent::Error {
            error_text: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UiEvent::Finish | UiEvent::Error { .. })
    }

    /// JSON payload for one SSE `data:` line
    pub fn to_json(&self) -> String {
        // Plain enum of strings and JSON values; serialization cannot fail
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","errorText":"failed to encode stream event"}"#.to_string()
        })
    }
}

pub type UiStream = Pin<Box<dyn Stream<Item = UiEvent> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_use_protocol_field_names() {
        let v: Value = serde_json::from_str(
            &UiEvent::Start {
                message_id: "m1".into(),
            }
            .to_json(),
        )
        .unwrap();
        assert_eq!(v, json!({"type":"start","messageId":"m1"}));

        let v: Value = serde_json::from_str(
            &UiEvent::ToolOutputAvailable {
                tool_call_id: "c1".into(),
                output: json!({"ok": true}),
            }
            .to_json(),
        )
        .unwrap();
        assert_eq!(
            v,
            json!({"type":"tool-output-available","toolCallId":"c1","output":{"ok":true}})
        );

        assert_eq!(UiEvent::StartStep.to_json(), r#"{"type":"start-step"}"#);
        assert_eq!(
            UiEvent::error("boom").to_json(),
            r#"{"type":"error","errorText":"boom"}"#
        );
    }
}
