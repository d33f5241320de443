//! The agent loop
//!
//! One turn alternates completions and tool invocations until the model
//! stops requesting tools, the iteration budget runs out, or the deadline
//! closes in. A turn nearing its deadline forgoes tools and asks for one
//! final summary under a short sub-budget, so callers get a best-effort
//! report instead of nothing.

pub mod cancellation;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::ai::client::CompletionClient;
use crate::ai::types::Message;
use crate::chat::{History, PauseController};
use crate::constants::agent::{
    FINALIZE_BUDGET, FINALIZE_WINDOW, MAX_TOOL_ITERATIONS, PROGRESS_SNIPPET_CHARS,
};
use crate::error::CoreError;
use crate::tools::{ToolContext, ToolRegistry};

pub use cancellation::RunContext;

const FINALIZE_PROMPT: &str = "Time budget is almost finished. Stop using tools now. Return a \
     concise final report with: 1) what was completed, 2) exact files changed, 3) unresolved items.";

/// What a turn produced. `output` carries accumulated progress even when an
/// error terminated the loop, so timeouts still surface partial work.
#[derive(Debug)]
pub struct AgentOutcome {
    pub output: String,
    pub error: Option<CoreError>,
    /// Whether orphan tool messages had to be dropped from history
    pub repaired: bool,
}

impl AgentOutcome {
    fn ok(output: String, repaired: bool) -> Self {
        Self {
            output,
            error: None,
            repaired,
        }
    }

    fn failed(progress: &str, error: CoreError, repaired: bool) -> Self {
        Self {
            output: progress.trim().to_string(),
            error: Some(error),
            repaired,
        }
    }
}

/// One agent incarnation: a completion client, a tool catalog, a model, and
/// the shared state its tools execute against.
pub struct AgentLoop {
    pub client: Arc<CompletionClient>,
    pub registry: Arc<ToolRegistry>,
    pub model: String,
    /// Use the streaming endpoint and forward deltas to `sink`
    pub streaming: bool,
    pub sink: Option<mpsc::UnboundedSender<String>>,
    pub pause: Option<Arc<PauseController>>,
    pub tool_ctx: ToolContext,
}

impl AgentLoop {
    /// Run one turn against the given history.
    pub async fn run_turn(&self, ctx: &RunContext, history: &mut History) -> AgentOutcome {
        let specs = self.registry.specs();
        let mut progress = String::new();
        let mut repaired = false;
        let tool_ctx = ToolContext {
            run: ctx.clone(),
            ..self.tool_ctx.clone()
        };

        for iteration in 1..=MAX_TOOL_ITERATIONS {
            if let Some(pause) = &self.pause {
                if let Err(e) = pause.wait_if_paused(ctx).await {
                    return AgentOutcome::failed(&progress, e, repaired);
                }
            }
            if let Err(e) = ctx.check() {
                return AgentOutcome::failed(&progress, e, repaired);
            }

            if should_finalize_now(ctx) {
                // A finalize completion that *succeeds* stands as the turn's
                // result even when empty (callers classify empty output);
                // only a failed finalize reports the deadline.
                match self.force_finalize_no_tools(ctx, history).await {
                    Ok(text) => {
                        let output = if progress.trim().is_empty() {
                            text
                        } else if text.trim().is_empty() {
                            progress.trim().to_string()
                        } else {
                            format!("{}\n\n{}", progress.trim(), text)
                        };
                        return AgentOutcome::ok(output, repaired);
                    }
                    Err(_) => {
                        return AgentOutcome::failed(
                            &progress,
                            CoreError::DeadlineExceeded,
                            repaired,
                        )
                    }
                }
            }

            let (msgs, changed) = history.api_view();
            if changed {
                warn!("history repair: removed invalid tool messages");
                repaired = true;
                history.load(msgs.clone(), "");
            }

            let assistant = if self.streaming {
                self.client
                    .stream(ctx, &msgs, &specs, &self.model, self.sink.as_ref())
                    .await
            } else {
                self.client.once(ctx, &msgs, &specs, &self.model).await
            };
            let assistant = match assistant {
                Ok(m) => m,
                Err(e) => return AgentOutcome::failed(&progress, e, repaired),
            };

            history.add_assistant(assistant.clone());
            let text = assistant.content.trim();
            if !text.is_empty() {
                progress.push_str("Assistant:\n");
                progress.push_str(text);
                progress.push_str("\n\n");
            }

            if assistant.tool_calls.is_empty() {
                info!(iteration, "turn complete without tool calls");
                let output = if progress.trim().is_empty() {
                    text.to_string()
                } else {
                    progress.trim().to_string()
                };
                return AgentOutcome::ok(output, repaired);
            }

            for tc in &assistant.tool_calls {
                if let Some(pause) = &self.pause {
                    if let Err(e) = pause.wait_if_paused(ctx).await {
                        return AgentOutcome::failed(&progress, e, repaired);
                    }
                }
                if let Err(e) = ctx.check() {
                    return AgentOutcome::failed(&progress, e, repaired);
                }

                progress.push_str(&format!("ToolCall: {}\n", tc.function.name));
                let out = self
                    .registry
                    .dispatch(&tc.function.name, &tc.function.arguments, &tool_ctx)
                    .await;
                let snip = snippet(&out, PROGRESS_SNIPPET_CHARS);
                if !snip.trim().is_empty() {
                    progress.push_str("ToolOutput:\n");
                    progress.push_str(&snip);
                    progress.push_str("\n\n");
                }
                history.add_tool_response(&tc.id, &out);
            }
        }

        AgentOutcome::failed(
            &progress,
            CoreError::MaxIterations(MAX_TOOL_ITERATIONS),
            repaired,
        )
    }

    /// The one last no-tools completion inside the finalize window. The
    /// finalize exchange is deliberately not appended to history.
    async fn force_finalize_no_tools(
        &self,
        ctx: &RunContext,
        history: &History,
    ) -> Result<String, CoreError> {
        let (mut msgs, _) = history.api_view();
        msgs.push(Message::user(FINALIZE_PROMPT));

        let final_ctx = match ctx.remaining() {
            Some(remaining) if remaining > std::time::Duration::from_secs(2) => {
                let budget = FINALIZE_BUDGET.min(remaining - std::time::Duration::from_secs(1));
                ctx.with_timeout(budget)
            }
            _ => ctx.clone(),
        };

        let resp = self.client.once(&final_ctx, &msgs, &[], &self.model).await?;
        Ok(resp.content.trim().to_string())
    }
}

/// True once the remaining time has shrunk into the finalize window.
pub fn should_finalize_now(ctx: &RunContext) -> bool {
    match ctx.remaining() {
        Some(remaining) => remaining <= FINALIZE_WINDOW,
        None => false,
    }
}

/// First `max` chars with an ellipsis, used for progress-buffer entries.
pub fn snippet(s: &str, max: usize) -> String {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let runes: Vec<char> = trimmed.chars().collect();
    if runes.len() <= max {
        return trimmed.to_string();
    }
    let mut out: String = runes[..max].iter().collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn snippet_truncates_with_ellipsis() {
        assert_eq!(snippet("  hello  ", 10), "hello");
        let long = "a".repeat(700);
        let snip = snippet(&long, 600);
        assert_eq!(snip.chars().count(), 603);
        assert!(snip.ends_with("..."));
        assert_eq!(snippet("   ", 10), "");
    }

    #[tokio::test]
    async fn finalize_fires_only_inside_window() {
        let no_deadline = RunContext::new();
        assert!(!should_finalize_now(&no_deadline));

        let distant = RunContext::new().with_timeout(Duration::from_secs(600));
        assert!(!should_finalize_now(&distant));

        let close = RunContext::new().with_timeout(Duration::from_secs(5));
        assert!(should_finalize_now(&close));
    }
}
