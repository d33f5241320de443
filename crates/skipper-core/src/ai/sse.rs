//! SSE stream processing
//!
//! Line framing for `data: <json>` events (with partial-line carry between
//! network chunks) and reassembly of incrementally streamed tool-call
//! fragments into whole tool calls.

use std::collections::HashMap;

use super::types::{ToolCall, ToolCallChunk};

/// End-of-stream sentinel payload
pub const DONE_SENTINEL: &str = "[DONE]";

/// Accumulates raw bytes and yields complete lines.
///
/// A chunk may end mid-line; the tail is carried into the next `push` call.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    partial: String,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one network chunk, returning every complete line it closed.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let text = String::from_utf8_lossy(bytes);
        let combined = if self.partial.is_empty() {
            text.into_owned()
        } else {
            let mut combined = std::mem::take(&mut self.partial);
            combined.push_str(&text);
            combined
        };

        let ends_complete = combined.ends_with('\n');
        let mut lines: Vec<String> = Vec::new();
        let mut iter = combined.lines().peekable();
        while let Some(line) = iter.next() {
            if iter.peek().is_none() && !ends_complete {
                self.partial = line.to_string();
                break;
            }
            lines.push(line.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Whatever is left after the stream closed without a trailing newline.
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.partial))
        }
    }
}

/// Extract the payload of a `data: ` event line, if this is one.
pub fn event_data(line: &str) -> Option<&str> {
    line.strip_prefix("data: ")
}

/// Reassembles streamed tool-call fragments into complete calls.
///
/// Fragments arrive keyed by a per-choice index and may or may not carry the
/// call id. Entries are keyed by the emitted id once one is seen, with an
/// `idx:<i>` placeholder before that; a late-arriving id migrates the
/// placeholder entry in place so first-appearance order survives.
#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    order: Vec<String>,
    entries: HashMap<String, ToolCall>,
    index_keys: HashMap<usize, String>,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, chunk: &ToolCallChunk) {
        let idx = chunk.index.unwrap_or(0);
        let incoming_id = chunk
            .id
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let key = match self.index_keys.get(&idx).cloned() {
            Some(existing) => match incoming_id {
                Some(ref id) if existing != *id && existing.starts_with("idx:") => {
                    self.migrate_key(&existing, id);
                    self.index_keys.insert(idx, id.clone());
                    id.clone()
                }
                _ => existing,
            },
            None => {
                let key = incoming_id
                    .clone()
                    .unwrap_or_else(|| format!("idx:{}", idx));
                self.index_keys.insert(idx, key.clone());
                self.order.push(key.clone());
                self.entries.insert(key.clone(), ToolCall::default());
                key
            }
        };

        let Some(entry) = self.entries.get_mut(&key) else {
            return;
        };
        if let Some(id) = chunk.id.as_deref().filter(|s| !s.is_empty()) {
            entry.id = id.to_string();
        }
        if let Some(kind) = chunk.kind.as_deref().filter(|s| !s.is_empty()) {
            entry.kind = kind.to_string();
        }
        if let Some(func) = &chunk.function {
            if let Some(name) = func.name.as_deref() {
                entry.function.name.push_str(name);
            }
            if let Some(args) = func.arguments.as_deref() {
                entry.function.arguments.push_str(args);
            }
        }
    }

    fn migrate_key(&mut self, old: &str, new: &str) {
        if let Some(entry) = self.entries.remove(old) {
            self.entries.insert(new.to_string(), entry);
        }
        if let Some(slot) = self.order.iter_mut().find(|k| *k == old) {
            *slot = new.to_string();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Emit the reassembled calls in first-appearance order.
    pub fn finish(mut self) -> Vec<ToolCall> {
        self.order
            .iter()
            .filter_map(|key| self.entries.remove(key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::FunctionChunk;

    fn chunk(
        index: usize,
        id: Option<&str>,
        name: Option<&str>,
        args: Option<&str>,
    ) -> ToolCallChunk {
        ToolCallChunk {
            index: Some(index),
            id: id.map(str::to_string),
            kind: id.map(|_| "function".to_string()),
            function: Some(FunctionChunk {
                name: name.map(str::to_string),
                arguments: args.map(str::to_string),
            }),
        }
    }

    #[test]
    fn line_buffer_carries_partial_lines() {
        let mut buf = SseLineBuffer::new();
        assert_eq!(buf.push(b"data: {\"a\""), Vec::<String>::new());
        let lines = buf.push(b":1}\ndata: [DO");
        assert_eq!(lines, vec!["data: {\"a\":1}".to_string()]);
        let lines = buf.push(b"NE]\n");
        assert_eq!(lines, vec!["data: [DONE]".to_string()]);
        assert!(buf.take_remainder().is_none());
    }

    #[test]
    fn line_buffer_strips_carriage_returns() {
        let mut buf = SseLineBuffer::new();
        let lines = buf.push(b"data: x\r\n");
        assert_eq!(lines, vec!["data: x".to_string()]);
    }

    #[test]
    fn event_data_matches_only_data_lines() {
        assert_eq!(event_data("data: {}"), Some("{}"));
        assert_eq!(event_data(": keepalive"), None);
        assert_eq!(event_data("event: ping"), None);
    }

    #[test]
    fn assembler_concatenates_fragments() {
        let mut asm = ToolCallAssembler::new();
        asm.absorb(&chunk(0, Some("t1"), Some("read_"), Some("{\"pa")));
        asm.absorb(&chunk(0, None, Some("file"), Some("th\":\"x\"}")));
        let calls = asm.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "t1");
        assert_eq!(calls[0].function.name, "read_file");
        assert_eq!(calls[0].function.arguments, "{\"path\":\"x\"}");
    }

    #[test]
    fn assembler_migrates_placeholder_to_late_id() {
        let mut asm = ToolCallAssembler::new();
        asm.absorb(&chunk(0, None, Some("get_page_size"), None));
        asm.absorb(&chunk(0, Some("call_9"), None, Some("{}")));
        let calls = asm.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_9");
        assert_eq!(calls[0].function.name, "get_page_size");
        assert_eq!(calls[0].function.arguments, "{}");
    }

    #[test]
    fn assembler_preserves_first_appearance_order() {
        let mut asm = ToolCallAssembler::new();
        asm.absorb(&chunk(0, Some("a"), Some("first"), None));
        asm.absorb(&chunk(1, None, Some("second"), None));
        asm.absorb(&chunk(0, None, None, Some("{}")));
        asm.absorb(&chunk(1, Some("b"), None, Some("{}")));
        let calls = asm.finish();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].function.name, "first");
        assert_eq!(calls[1].function.name, "second");
        assert_eq!(calls[1].id, "b");
    }

    #[test]
    fn assembler_keeps_last_nonempty_type_and_id() {
        let mut asm = ToolCallAssembler::new();
        asm.absorb(&ToolCallChunk {
            index: Some(0),
            id: Some("t1".into()),
            kind: Some("function".into()),
            function: None,
        });
        asm.absorb(&ToolCallChunk {
            index: Some(0),
            id: None,
            kind: None,
            function: Some(FunctionChunk {
                name: Some("x".into()),
                arguments: None,
            }),
        });
        let calls = asm.finish();
        assert_eq!(calls[0].kind, "function");
        assert_eq!(calls[0].id, "t1");
    }
}
