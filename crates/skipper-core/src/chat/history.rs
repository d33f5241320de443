//! Conversation history
//!
//! Ordered message log with an advisory token counter and an API-safe view.
//! The remote service rejects tool messages that do not answer an earlier
//! assistant tool call, and rejects empty tool content; both repairs happen
//! here so the rest of the system can append freely.

use crate::ai::types::{Message, Role};
use crate::constants::history::MAX_TOOL_RESPONSE_CHARS;

/// Rough token approximation: one token per four chars, minimum one for any
/// non-empty text. Advisory only.
pub fn approx_tokens(text: &str) -> i64 {
    if text.is_empty() {
        return 0;
    }
    let runes = text.chars().count();
    if runes < 4 {
        1
    } else {
        (runes / 4) as i64
    }
}

pub struct History {
    messages: Vec<Message>,
    tokens: i64,
}

impl History {
    /// A fresh log seeded with the system prompt.
    pub fn new(system_prompt: &str) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
            tokens: 0,
        }
    }

    /// Clear and reseed with a system prompt; the counter resets.
    pub fn reset(&mut self, system_prompt: &str) {
        self.messages = vec![Message::system(system_prompt)];
        self.tokens = 0;
    }

    pub fn add_user(&mut self, content: impl Into<String>) {
        let content = content.into();
        self.tokens += approx_tokens(&content);
        self.messages.push(Message::user(content));
    }

    pub fn add_assistant(&mut self, msg: Message) {
        self.tokens += approx_tokens(&msg.content);
        self.messages.push(msg);
    }

    /// Append a tool response, truncating long output and substituting a
    /// placeholder for empty output.
    pub fn add_tool_response(&mut self, tool_call_id: impl Into<String>, content: &str) {
        let mut content = truncate_for_history(content, MAX_TOOL_RESPONSE_CHARS);
        if content.is_empty() {
            content = "Tool executed successfully (no output).".to_string();
        }
        self.tokens += approx_tokens(&content);
        self.messages.push(Message::tool(tool_call_id, content));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Replace the whole log with the given message sequence. The counter is
    /// recomputed over non-system messages.
    pub fn load(&mut self, messages: Vec<Message>, fallback_system_prompt: &str) {
        if messages.is_empty() {
            self.reset(fallback_system_prompt);
            return;
        }
        self.tokens = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| approx_tokens(&m.content))
            .sum();
        self.messages = messages;
    }

    /// The message sequence as the API may see it: every tool message must
    /// answer a pending assistant tool call (each call answered at most
    /// once); orphans are dropped. The flag reports whether anything was
    /// dropped, which callers surface as a history repair.
    pub fn api_view(&self) -> (Vec<Message>, bool) {
        let mut clean: Vec<Message> = Vec::with_capacity(self.messages.len());
        let mut pending: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut changed = false;

        for msg in &self.messages {
            match msg.role {
                Role::Assistant => {
                    for tc in &msg.tool_calls {
                        if !tc.id.is_empty() {
                            pending.insert(tc.id.clone());
                        }
                    }
                    clean.push(msg.clone());
                }
                Role::Tool => {
                    let admissible = msg
                        .tool_call_id
                        .as_deref()
                        .map(|id| pending.remove(id))
                        .unwrap_or(false);
                    if admissible {
                        clean.push(msg.clone());
                    } else {
                        changed = true;
                    }
                }
                _ => clean.push(msg.clone()),
            }
        }

        (clean, changed)
    }

    /// Replace the entire log with one system message carrying the summary.
    pub fn replace_with_summary(&mut self, summary: &str) {
        self.messages = vec![Message::system(format!(
            "Summary of the conversation so far. Use this context to continue assisting the user:\n\n{}",
            summary
        ))];
        self.tokens = 0;
    }

    pub fn total_tokens(&self) -> i64 {
        self.tokens
    }
}

fn truncate_for_history(s: &str, max_chars: usize) -> String {
    if max_chars == 0 || s.is_empty() {
        return s.to_string();
    }
    let runes: Vec<char> = s.chars().collect();
    if runes.len() <= max_chars {
        return s.to_string();
    }
    let trimmed: String = runes[..max_chars].iter().collect();
    format!(
        "{}\n\n... [TOOL OUTPUT TRUNCATED FOR HISTORY: {} chars removed] ...",
        trimmed,
        runes.len() - max_chars
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::{FunctionCall, ToolCall};

    fn assistant_with_call(id: &str) -> Message {
        Message {
            role: Role::Assistant,
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: id.to_string(),
                kind: "function".to_string(),
                function: FunctionCall {
                    name: "get_page_size".to_string(),
                    arguments: "{}".to_string(),
                },
            }],
            tool_call_id: None,
        }
    }

    #[test]
    fn api_view_keeps_matched_tool_messages() {
        let mut h = History::new("sys");
        h.add_user("hi");
        h.add_assistant(assistant_with_call("t1"));
        h.add_tool_response("t1", "4096");

        let (view, changed) = h.api_view();
        assert!(!changed);
        assert_eq!(view.len(), 4);
        assert_eq!(view[3].role, Role::Tool);
    }

    #[test]
    fn api_view_drops_orphan_tool_messages() {
        let mut h = History::new("sys");
        h.add_tool_response("ghost", "output");
        let (view, changed) = h.api_view();
        assert!(changed);
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn api_view_drops_duplicate_answers() {
        let mut h = History::new("sys");
        h.add_assistant(assistant_with_call("t1"));
        h.add_tool_response("t1", "first");
        h.add_tool_response("t1", "second");
        let (view, changed) = h.api_view();
        assert!(changed);
        let tool_msgs: Vec<_> = view.iter().filter(|m| m.role == Role::Tool).collect();
        assert_eq!(tool_msgs.len(), 1);
        assert_eq!(tool_msgs[0].content, "first");
    }

    #[test]
    fn api_view_preserves_order() {
        let mut h = History::new("sys");
        h.add_user("q1");
        h.add_assistant(assistant_with_call("a"));
        h.add_tool_response("a", "r1");
        h.add_assistant(Message::assistant("done"));
        let (view, _) = h.api_view();
        let roles: Vec<Role> = view.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
    }

    #[test]
    fn tool_output_is_truncated_with_footer() {
        let mut h = History::new("sys");
        h.add_assistant(assistant_with_call("t1"));
        let long = "x".repeat(MAX_TOOL_RESPONSE_CHARS + 500);
        h.add_tool_response("t1", &long);
        let msg = h.messages().last().unwrap();
        assert!(msg.content.contains("TOOL OUTPUT TRUNCATED FOR HISTORY: 500 chars removed"));
        assert!(msg.content.chars().count() < long.chars().count());
    }

    #[test]
    fn empty_tool_output_gets_placeholder() {
        let mut h = History::new("sys");
        h.add_assistant(assistant_with_call("t1"));
        h.add_tool_response("t1", "");
        assert_eq!(
            h.messages().last().unwrap().content,
            "Tool executed successfully (no output)."
        );
    }

    #[test]
    fn token_counter_grows_monotonically() {
        let mut h = History::new("sys");
        let before = h.total_tokens();
        h.add_user("a question that is long enough to count");
        let mid = h.total_tokens();
        h.add_assistant(Message::assistant("an answer"));
        let after = h.total_tokens();
        assert!(before <= mid && mid < after);
    }

    #[test]
    fn replace_with_summary_leaves_single_system_message() {
        let mut h = History::new("sys");
        h.add_user("q");
        h.add_assistant(Message::assistant("a"));
        h.replace_with_summary("we discussed things");
        assert_eq!(h.messages().len(), 1);
        assert_eq!(h.messages()[0].role, Role::System);
        assert!(h.messages()[0].content.contains("we discussed things"));
        assert_eq!(h.total_tokens(), 0);
    }

    #[test]
    fn load_recomputes_counter_excluding_system() {
        let mut h = History::new("sys");
        h.load(
            vec![
                Message::system("a very long system prompt that should not count"),
                Message::user("12345678"),
            ],
            "fallback",
        );
        assert_eq!(h.total_tokens(), 2);
    }
}
