use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures_util::future::join_all;
use futures_util::StreamExt;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::model::{ChatModel, ModelChunk, ModelMessage, ModelRequest, ToolCall};
use crate::stream::{UiEvent, UiStream};
use crate::tools::{ToolError, ToolRegistry};

pub const DEFAULT_MAX_STEPS: usize = 20;

/// Tool call being assembled from streamed fragments
#[derive(Debug, Default)]
struct PendingCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Assembled call plus its decoded input, or the reason decoding failed
struct ReadyCall {
    call: ToolCall,
    invalid: Option<ToolError>,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn assemble(pending: BTreeMap<usize, PendingCall>) -> Vec<ReadyCall> {
    pending
        .into_values()
        .map(|p| {
            let id = p.id.unwrap_or_else(|| format!("call_{}", new_id()));
            let raw = p.arguments.trim();
            let (arguments, invalid) = if raw.is_empty() {
                (Value::Object(Default::default()), None)
            } else {
                match serde_json::from_str::<Value>(raw) {
                    Ok(v) => (v, None),
                    Err(e) => (
                        Value::String(raw.to_string()),
                        Some(ToolError::InvalidArguments(format!("arguments are not valid JSON: {e}"))),
                    ),
                }
            };
            ReadyCall {
                call: ToolCall {
                    id,
                    name: p.name,
                    arguments,
                },
                invalid,
            }
        })
        .collect()
}

/// Multi-step generation: stream the model, run any tool calls it makes, feed
/// the results back, repeat until it answers without tools or the step cap.
pub struct ToolLoop {
    model: Arc<dyn ChatModel>,
    tools: Option<ToolRegistry>,
    max_steps: usize,
}

impl ToolLoop {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            tools: None,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = (!tools.is_empty()).then_some(tools);
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Run to completion as a UI event stream. Failures end the stream with
    /// one `error` event; they are never raised to the caller.
    pub fn run(self, mut request: ModelRequest) -> UiStream {
        let ToolLoop {
            model,
            tools,
            max_steps,
        } = self;
        if let Some(registry) = &tools {
            request.tools = registry.specs();
        }

        Box::pin(async_stream::stream! {
            let handle = model.handle().clone();
            yield UiEvent::Start { message_id: new_id() };

            let mut seen_sources: HashSet<String> = HashSet::new();
            for step in 0..max_steps {
                debug!(target: "tool_loop", step, provider = %handle.provider, model = %handle.model, "Starting step");
                yield UiEvent::StartStep;

                let mut chunks = match model.stream(request.clone()).await {
                    Ok(s) => s,
                    Err(e) => {
                        error!(target: "tool_loop", step, provider = %handle.provider, error = %e, "Model stream failed to open");
                        yield UiEvent::error(e.to_string());
                        return;
                    }
                };

                let mut text = String::new();
                let mut text_id: Option<String> = None;
                let mut reasoning_id: Option<String> = None;
                let mut pending: BTreeMap<usize, PendingCall> = BTreeMap::new();

                while let Some(chunk) = chunks.next().await {
                    match chunk {
                        Err(e) => {
                            error!(target: "tool_loop", step, provider = %handle.provider, error = %e, "Model stream failed");
                            yield UiEvent::error(e.to_string());
                            return;
                        }
                        Ok(ModelChunk::Reasoning(delta)) => {
                            let id = match &reasoning_id {
                                Some(id) => id.clone(),
                                None => {
                                    let id = new_id();
                                    reasoning_id = Some(id.clone());
                                    yield UiEvent::ReasoningStart { id: id.clone() };
                                    id
                                }
                            };
                            yield UiEvent::ReasoningDelta { id, delta };
                        }
                        Ok(ModelChunk::Text(delta)) => {
                            if let Some(id) = reasoning_id.take() {
                                yield UiEvent::ReasoningEnd { id };
                            }
                            let id = match &text_id {
                                Some(id) => id.clone(),
                                None => {
                                    let id = new_id();
                                    text_id = Some(id.clone());
                                    yield UiEvent::TextStart { id: id.clone() };
                                    id
                                }
                            };
                            text.push_str(&delta);
                            yield UiEvent::TextDelta { id, delta };
                        }
                        Ok(ModelChunk::Source { url, title }) => {
                            if seen_sources.insert(url.clone()) {
                                yield UiEvent::SourceUrl { source_id: new_id(), url, title };
                            }
                        }
                        Ok(ModelChunk::ToolCallDelta { index, id, name, arguments }) => {
                            let entry = pending.entry(index).or_default();
                            if id.is_some() {
                                entry.id = id;
                            }
                            if let Some(name) = name {
                                entry.name.push_str(&name);
                            }
                            entry.arguments.push_str(&arguments);
                        }
                        Ok(ModelChunk::Finish(reason)) => {
                            debug!(target: "tool_loop", step, ?reason, "Model finished step");
                        }
                    }
                }

                if let Some(id) = reasoning_id.take() {
                    yield UiEvent::ReasoningEnd { id };
                }
                if let Some(id) = text_id.take() {
                    yield UiEvent::TextEnd { id };
                }

                let Some(registry) = tools.as_ref().filter(|_| !pending.is_empty()) else {
                    if !pending.is_empty() {
                        warn!(target: "tool_loop", count = pending.len(), "Ignoring tool calls on a request without tools");
                    }
                    yield UiEvent::FinishStep;
                    break;
                };

                let calls = assemble(std::mem::take(&mut pending));
                for ready in &calls {
                    yield UiEvent::ToolInputAvailable {
                        tool_call_id: ready.call.id.clone(),
                        tool_name: ready.call.name.clone(),
                        input: ready.call.arguments.clone(),
                    };
                }

                let outputs: Vec<Value> = join_all(calls.iter().map(|ready| async move {
                    if let Some(err) = &ready.invalid {
                        return err.to_output();
                    }
                    match registry.call(&ready.call.name, ready.call.arguments.clone()).await {
                        Ok(v) => v,
                        Err(e) => e.to_output(),
                    }
                }))
                .await;

                for (ready, output) in calls.iter().zip(&outputs) {
                    yield UiEvent::ToolOutputAvailable {
                        tool_call_id: ready.call.id.clone(),
                        output: output.clone(),
                    };
                }

                request.messages.push(ModelMessage::Assistant {
                    text: std::mem::take(&mut text),
                    tool_calls: calls.iter().map(|r| r.call.clone()).collect(),
                });
                for (ready, output) in calls.into_iter().zip(outputs) {
                    request.messages.push(ModelMessage::Tool {
                        call_id: ready.call.id,
                        name: ready.call.name,
                        output,
                    });
                }
                yield UiEvent::FinishStep;

                if step + 1 == max_steps {
                    info!(target: "tool_loop", max_steps, "Step cap reached; ending generation");
                }
            }

            yield UiEvent::Finish;
        })
    }
}
