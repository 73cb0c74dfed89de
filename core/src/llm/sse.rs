use std::pin::Pin;

use futures_util::{Stream, StreamExt};

use crate::{ParleyError, Result};

/// Incremental decoder for `text/event-stream` bodies. Yields the `data` payload
/// of every complete event; other fields and comments are dropped.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if let Some(event) = self.feed_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush whatever is left once the body ends
    pub fn finish(&mut self) -> Vec<String> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string();
            if let Some(event) = self.feed_line(&line) {
                events.push(event);
            }
        }
        if let Some(event) = self.dispatch() {
            events.push(event);
        }
        events
    }

    fn feed_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            self.data_lines
                .push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data_lines.is_empty() {
            return None;
        }
        let data = self.data_lines.join("\n");
        self.data_lines.clear();
        Some(data)
    }
}

pub type DataStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Turn a streaming HTTP response into its SSE `data` payloads
pub fn data_stream(response: reqwest::Response) -> DataStream {
    Box::pin(async_stream::stream! {
        let mut bytes_stream = response.bytes_stream();
        let mut decoder = SseDecoder::new();

        while let Some(chunk_result) = bytes_stream.next().await {
            match chunk_result {
                Ok(bytes) => {
                    for event in decoder.push(&bytes) {
                        yield Ok(event);
                    }
                }
                Err(e) => {
                    yield Err(ParleyError::HttpError(e));
                    return;
                }
            }
        }

        for event in decoder.finish() {
            yield Ok(event);
        }
    })
}
