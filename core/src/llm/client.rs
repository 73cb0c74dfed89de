use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, error};

use super::model::{
    ChatModel, ChunkStream, ContentPart, FinishReason, ModelChunk, ModelMessage, ModelRequest,
    ToolSpec,
};
use super::provider::{Provider, ProviderHandle};
use super::sse::data_stream;
use crate::{ParleyError, Result};

/// Streaming client for OpenAI-compatible `/chat/completions` endpoints
#[derive(Clone)]
pub struct OpenAiCompatModel {
    http: Client,
    handle: ProviderHandle,
}

impl OpenAiCompatModel {
    pub fn new(http: Client, handle: ProviderHandle) -> Self {
        Self { http, handle }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.handle.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatModel {
    fn handle(&self) -> &ProviderHandle {
        &self.handle
    }

    async fn stream(&self, request: ModelRequest) -> Result<ChunkStream> {
        let url = self.endpoint();
        let body = build_chat_body(&self.handle.model, &request);
        debug!(target: "llm_client", provider = %self.handle.provider, model = %self.handle.model, tools = request.tools.len(), "POST {} (stream)", url);

        let mut req = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .header("accept", "text/event-stream");
        if let Some(key) = &self.handle.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!(target: "llm_client", provider = %self.handle.provider, %status, body = %text, "Chat Completions error");
            return Err(provider_error(self.handle.provider, status, &text));
        }

        let mut events = data_stream(resp);
        Ok(Box::pin(async_stream::stream! {
            while let Some(event) = events.next().await {
                let data = match event {
                    Ok(d) => d,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                if data.trim() == "[DONE]" {
                    return;
                }
                let val: Value = match serde_json::from_str(&data) {
                    Ok(v) => v,
                    Err(e) => {
                        yield Err(ParleyError::ProtocolError(format!("Failed to parse stream chunk: {e}")));
                        return;
                    }
                };
                match parse_chat_chunk(&val) {
                    Ok(chunks) => {
                        for chunk in chunks {
                            yield Ok(chunk);
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }))
    }
}

/// Map a non-success upstream status to a descriptive error
pub fn provider_error(provider: Provider, status: StatusCode, body: &str) -> ParleyError {
    let message = match status.as_u16() {
        401 | 403 => format!(
            "credential rejected; check {} ({})",
            provider.api_key_var(),
            body
        ),
        402 => "payment required: insufficient credits".to_string(),
        404 => format!("model not found or endpoint unavailable: {}", body),
        429 => "rate limited by provider".to_string(),
        500..=599 => format!("upstream server error: {}", body),
        _ => body.to_string(),
    };
    ParleyError::ProviderError {
        provider: provider.to_string(),
        status: status.as_u16(),
        message,
    }
}

pub fn build_chat_body(model: &str, request: &ModelRequest) -> Value {
    let mut messages: Vec<Value> = Vec::new();
    if !request.system.is_empty() {
        messages.push(json!({"role": "system", "content": request.system}));
    }
    for m in &request.messages {
        messages.push(chat_message(m));
    }

    let mut body = json!({
        "model": model,
        "messages": messages,
        "stream": true,
    });
    if !request.tools.is_empty() {
        body["tools"] = Value::Array(request.tools.iter().map(function_tool).collect());
        body["tool_choice"] = json!("auto");
    }
    body
}

fn function_tool(spec: &ToolSpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": spec.name,
            "description": spec.description,
            "parameters": spec.parameters,
        }
    })
}

fn chat_message(m: &ModelMessage) -> Value {
    match m {
        ModelMessage::System(text) => json!({"role": "system", "content": text}),
        ModelMessage::User(parts) => {
            if let [ContentPart::Text(text)] = parts.as_slice() {
                return json!({"role": "user", "content": text});
            }
            let content: Vec<Value> = parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text(text) => json!({"type": "text", "text": text}),
                    ContentPart::File(f) if f.media_type.starts_with("image/") => {
                        json!({"type": "image_url", "image_url": {"url": f.url}})
                    }
                    ContentPart::File(f) => json!({
                        "type": "file",
                        "file": {
                            "filename": f.filename.clone().unwrap_or_else(|| "attachment".to_string()),
                            "file_data": f.url,
                        }
                    }),
                })
                .collect();
            json!({"role": "user", "content": content})
        }
        ModelMessage::Assistant { text, tool_calls } => {
            let mut msg = json!({
                "role": "assistant",
                "content": if text.is_empty() { Value::Null } else { json!(text) },
            });
            if !tool_calls.is_empty() {
                msg["tool_calls"] = Value::Array(
                    tool_calls
                        .iter()
                        .map(|c| {
                            json!({
                                "id": c.id,
                                "type": "function",
                                "function": {
                                    "name": c.name,
                                    "arguments": c.arguments_text(),
                                }
                            })
                        })
                        .collect(),
                );
            }
            msg
        }
        ModelMessage::Tool {
            call_id, output, ..
        } => json!({
            "role": "tool",
            "tool_call_id": call_id,
            "content": output.to_string(),
        }),
    }
}

/// Parse one streamed Chat Completions chunk (public for testing)
pub fn parse_chat_chunk(v: &Value) -> Result<Vec<ModelChunk>> {
    if let Some(err) = v.get("error") {
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| err.to_string());
        return Err(ParleyError::ProtocolError(format!(
            "provider reported an error mid-stream: {message}"
        )));
    }

    let mut out = Vec::new();

    // Perplexity-style citations ride along on the chunk itself
    if let Some(results) = v.get("search_results").and_then(|x| x.as_array()) {
        for r in results {
            if let Some(url) = r.get("url").and_then(|u| u.as_str()) {
                out.push(ModelChunk::Source {
                    url: url.to_string(),
                    title: r
                        .get("title")
                        .and_then(|t| t.as_str())
                        .map(|s| s.to_string()),
                });
            }
        }
    } else if let Some(citations) = v.get("citations").and_then(|x| x.as_array()) {
        for c in citations {
            if let Some(url) = c.as_str() {
                out.push(ModelChunk::Source {
                    url: url.to_string(),
                    title: None,
                });
            }
        }
    }

    let Some(choice) = v
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
    else {
        return Ok(out);
    };

    if let Some(delta) = choice.get("delta") {
        let reasoning = delta
            .get("reasoning_content")
            .or_else(|| delta.get("reasoning"))
            .and_then(|r| r.as_str())
            .filter(|s| !s.is_empty());
        if let Some(r) = reasoning {
            out.push(ModelChunk::Reasoning(r.to_string()));
        }
        if let Some(text) = delta
            .get("content")
            .and_then(|c| c.as_str())
            .filter(|s| !s.is_empty())
        {
            out.push(ModelChunk::Text(text.to_string()));
        }
        if let Some(calls) = delta.get("tool_calls").and_then(|t| t.as_array()) {
            for (pos, tc) in calls.iter().enumerate() {
                let index = tc
                    .get("index")
                    .and_then(|i| i.as_u64())
                    .map(|i| i as usize)
                    .unwrap_or(pos);
                let func = tc.get("function");
                let arguments = match func.and_then(|f| f.get("arguments")) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                out.push(ModelChunk::ToolCallDelta {
                    index,
                    id: tc.get("id").and_then(|x| x.as_str()).map(|s| s.to_string()),
                    name: func
                        .and_then(|f| f.get("name"))
                        .and_then(|n| n.as_str())
                        .map(|s| s.to_string()),
                    arguments,
                });
            }
        }
    }

    if let Some(reason) = choice.get("finish_reason").and_then(|f| f.as_str()) {
        out.push(ModelChunk::Finish(FinishReason::parse(reason)));
    }

    Ok(out)
}
