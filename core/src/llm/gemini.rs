//! Native Gemini streaming with Google's built-in search grounding.
//!
//! The `google_search` and `url_context` tools execute on Google's side, so no
//! client-side tool round-trips happen on this path; grounding chunks are
//! surfaced as sources and thought parts as reasoning.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error};

use super::client::provider_error;
use super::model::{
    ChatModel, ChunkStream, ContentPart, FinishReason, ModelChunk, ModelMessage, ModelRequest,
};
use super::provider::ProviderHandle;
use super::sse::data_stream;
use crate::{ParleyError, Result};

#[derive(Clone)]
pub struct GeminiGroundedModel {
    http: Client,
    handle: ProviderHandle,
}

impl GeminiGroundedModel {
    pub fn new(http: Client, handle: ProviderHandle) -> Self {
        Self { http, handle }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.handle.base_url.trim_end_matches('/'),
            self.handle.model
        )
    }
}

#[async_trait]
impl ChatModel for GeminiGroundedModel {
    fn handle(&self) -> &ProviderHandle {
        &self.handle
    }

    async fn stream(&self, request: ModelRequest) -> Result<ChunkStream> {
        let url = self.endpoint();
        let body = build_gemini_body(&request);
        debug!(target: "llm_client", model = %self.handle.model, "POST {} (grounded stream)", url);

        let mut req = self.http.post(&url).header("content-type", "application/json");
        if let Some(key) = &self.handle.api_key {
            req = req.header("x-goog-api-key", key);
        }

        let resp = req.json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!(target: "llm_client", %status, body = %text, "Gemini streamGenerateContent error");
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
                let val: Value = match serde_json::from_str(&data) {
                    Ok(v) => v,
                    Err(e) => {
                        yield Err(ParleyError::ProtocolError(format!("Failed to parse Gemini chunk: {e}")));
                        return;
                    }
                };
                match parse_gemini_chunk(&val) {
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

pub fn build_gemini_body(request: &ModelRequest) -> Value {
    let mut contents: Vec<Value> = Vec::new();
    let mut system = request.system.clone();

    for m in &request.messages {
        match m {
            // Gemini takes a single system instruction
            ModelMessage::System(text) => {
                if !system.is_empty() {
                    system.push_str("\n\n");
                }
                system.push_str(text);
            }
            ModelMessage::User(parts) => {
                contents.push(json!({
                    "role": "user",
                    "parts": parts.iter().map(gemini_part).collect::<Vec<_>>(),
                }));
            }
            ModelMessage::Assistant { text, .. } => {
                if !text.is_empty() {
                    contents.push(json!({"role": "model", "parts": [{"text": text}]}));
                }
            }
            // Client-side tools are never attached on this path
            ModelMessage::Tool { .. } => {}
        }
    }

    let mut body = json!({
        "contents": contents,
        "tools": [{"google_search": {}}, {"url_context": {}}],
        "generationConfig": {"thinkingConfig": {"includeThoughts": true}},
    });
    if !system.is_empty() {
        body["systemInstruction"] = json!({"parts": [{"text": system}]});
    }
    body
}

fn gemini_part(part: &ContentPart) -> Value {
    match part {
        ContentPart::Text(text) => json!({"text": text}),
        ContentPart::File(f) => match split_data_url(&f.url) {
            Some((mime, data)) => json!({"inline_data": {"mime_type": mime, "data": data}}),
            None => json!({"file_data": {"mime_type": f.media_type, "file_uri": f.url}}),
        },
    }
}

/// `data:<mime>;base64,<payload>` → (mime, payload)
fn split_data_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (meta, data) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    Some((mime, data))
}

/// Parse one streamed `GenerateContentResponse` (public for testing)
pub fn parse_gemini_chunk(v: &Value) -> Result<Vec<ModelChunk>> {
    if let Some(err) = v.get("error") {
        return Err(ParleyError::ProtocolError(format!(
            "Gemini reported an error mid-stream: {}",
            err.get("message").and_then(|m| m.as_str()).unwrap_or("unknown")
        )));
    }

    let mut out = Vec::new();
    let Some(candidate) = v
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
    else {
        return Ok(out);
    };

    if let Some(parts) = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
    {
        for part in parts {
            let Some(text) = part.get("text").and_then(|t| t.as_str()) else {
                continue;
            };
            if text.is_empty() {
                continue;
            }
            if part.get("thought").and_then(|t| t.as_bool()) == Some(true) {
                out.push(ModelChunk::Reasoning(text.to_string()));
            } else {
                out.push(ModelChunk::Text(text.to_string()));
            }
        }
    }

    if let Some(chunks) = candidate
        .get("groundingMetadata")
        .and_then(|g| g.get("groundingChunks"))
        .and_then(|c| c.as_array())
    {
        for chunk in chunks {
            if let Some(web) = chunk.get("web") {
                if let Some(uri) = web.get("uri").and_then(|u| u.as_str()) {
                    out.push(ModelChunk::Source {
                        url: uri.to_string(),
                        title: web
                            .get("title")
                            .and_then(|t| t.as_str())
                            .map(|s| s.to_string()),
                    });
                }
            }
        }
    }

    if let Some(reason) = candidate.get("finishReason").and_then(|f| f.as_str()) {
        out.push(ModelChunk::Finish(FinishReason::parse(reason)));
    }

    Ok(out)
}
