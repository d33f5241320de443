//! Shell execution tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use tokio::process::Command;

use crate::constants::shell::MAX_OUTPUT_CHARS;
use crate::error::CoreError;
use crate::tools::{get_str, Tool, ToolContext, ToolResult};

pub struct RunCommandTool;

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the working directory and return its combined output. \
         Long output is truncated; re-run with filters (grep, tail) to narrow it."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let command = get_str(&args, "command", "");
        let command = command.trim();
        if command.is_empty() {
            return ToolResult::error("run_command requires a non-empty 'command' argument.");
        }
        tracing::info!(command, "executing shell command");

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(command);
            c
        };
        cmd.current_dir(&ctx.working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let outcome = ctx
            .run
            .run(async {
                cmd.output()
                    .await
                    .map_err(|e| CoreError::Command(format!("failed to run command: {}", e)))
            })
            .await;

        match outcome {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                let mut combined = match (stdout.is_empty(), stderr.is_empty()) {
                    (true, true) => String::new(),
                    (false, true) => stdout.into_owned(),
                    (true, false) => stderr.into_owned(),
                    (false, false) => format!("{}\n{}", stdout, stderr),
                };

                if !output.status.success() {
                    let code = output.status.code().unwrap_or(-1);
                    combined.push_str(&format!("\nError: exit status {}", code));
                }
                if combined.trim().is_empty() {
                    combined = "(Command executed successfully with no output)".to_string();
                }
                ToolResult::success(guard_output(&combined))
            }
            Err(e) if e.is_canceled() => ToolResult::success(
                "[SYSTEM: Command execution was interrupted by the user.]".to_string(),
            ),
            Err(e) if e.is_deadline() => {
                ToolResult::error("command aborted: deadline exceeded")
            }
            Err(e) => ToolResult::error(e),
        }
    }
}

/// Cap command output with a footer that steers the model toward narrower
/// re-runs instead of apologies.
pub fn guard_output(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= MAX_OUTPUT_CHARS {
        return s.to_string();
    }
    let kept: String = chars[..MAX_OUTPUT_CHARS].iter().collect();
    format!(
        "{}\n\n... [OUTPUT TRUNCATED - {} more characters] ...\n\
         SYSTEM HINT: The output is too long. DO NOT ask the user to read it.\n\
         INSTEAD: Run the command again using filters (like 'grep' or 'tail') to narrow the result.",
        kept,
        chars.len() - MAX_OUTPUT_CHARS
    )
}
