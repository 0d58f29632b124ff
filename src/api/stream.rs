use super::logging::emit_frame_parse_error;
use crate::types::{StreamEvent, Usage};
use serde::Deserialize;

/// Incremental decoder for the backend's `event:`/`data:` framed chat stream.
///
/// Chunks arrive in order but at arbitrary byte boundaries: a multi-byte
/// character or a line may be split across reads. The decoder keeps the
/// undecodable byte tail and the incomplete trailing line across calls, so
/// the emitted event sequence is identical for any chunking of the same
/// bytes. Anything still buffered when the transport ends is discarded.
#[derive(Default)]
pub struct StreamParser {
    bytes: Vec<u8>,
    line: String,
    pending_event: Option<String>,
}

impl StreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let text = self.decode_chunk(chunk);
        self.line.push_str(&text);

        let mut events = Vec::new();
        while let Some(newline) = self.line.find('\n') {
            let raw: String = self.line.drain(..=newline).collect();
            let line = raw.trim_end_matches(['\n', '\r']);
            self.consume_line(line, &mut events);
        }
        events
    }

    /// Append the chunk and drain the maximal decodable UTF-8 prefix.
    /// An incomplete trailing sequence stays buffered; an invalid sequence
    /// is replaced with U+FFFD and skipped.
    fn decode_chunk(&mut self, chunk: &[u8]) -> String {
        self.bytes.extend_from_slice(chunk);

        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.bytes) {
                Ok(valid) => {
                    out.push_str(valid);
                    self.bytes.clear();
                    break;
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.bytes[..valid_up_to]));
                    match err.error_len() {
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.bytes.drain(..valid_up_to + invalid);
                        }
                        None => {
                            self.bytes.drain(..valid_up_to);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    fn consume_line(&mut self, line: &str, events: &mut Vec<StreamEvent>) {
        if let Some(rest) = line.strip_prefix("event:") {
            self.pending_event = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            // A data line without a preceding event line is a protocol
            // violation; drop it and keep reading.
            let Some(event_type) = self.pending_event.take() else {
                return;
            };
            if let Some(event) = parse_frame(&event_type, rest.trim()) {
                events.push(event);
            }
        }
    }
}

#[derive(Deserialize)]
struct TextDeltaPayload {
    text: String,
}

#[derive(Deserialize)]
struct ToolStartPayload {
    tool: String,
    id: String,
}

#[derive(Deserialize)]
struct ToolResultPayload {
    tool: String,
    result: serde_json::Value,
}

#[derive(Deserialize)]
struct DonePayload {
    usage: Usage,
}

#[derive(Deserialize)]
struct ErrorPayload {
    message: String,
}

fn parse_frame(event_type: &str, data: &str) -> Option<StreamEvent> {
    let parsed = match event_type {
        "text_delta" => serde_json::from_str::<TextDeltaPayload>(data)
            .map(|payload| StreamEvent::TextDelta { text: payload.text }),
        "tool_start" => serde_json::from_str::<ToolStartPayload>(data).map(|payload| {
            StreamEvent::ToolStart {
                tool: payload.tool,
                id: payload.id,
            }
        }),
        "tool_result" => serde_json::from_str::<ToolResultPayload>(data).map(|payload| {
            StreamEvent::ToolResult {
                tool: payload.tool,
                result: payload.result,
            }
        }),
        "done" => serde_json::from_str::<DonePayload>(data).map(|payload| StreamEvent::Done {
            usage: payload.usage,
        }),
        "error" => serde_json::from_str::<ErrorPayload>(data).map(|payload| StreamEvent::Error {
            message: payload.message,
        }),
        // Unknown event types are dropped, not fatal.
        _ => return None,
    };

    match parsed {
        Ok(event) => Some(event),
        Err(error) => {
            emit_frame_parse_error(event_type, data, &error);
            None
        }
    }
}
