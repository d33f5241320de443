//! Process inspection and signaling tools

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::process;
use crate::tools::{get_bool, get_str, Tool, ToolContext, ToolResult};

fn parse_pids(args: &Value) -> Vec<i32> {
    match args.get("pids") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f as i64))
                    .map(|p| p as i32),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

pub struct CpuUsageSampleTool;

#[async_trait]
impl Tool for CpuUsageSampleTool {
    fn name(&self) -> &str {
        "get_process_cpu_usage_sample"
    }

    fn description(&self) -> &str {
        "Sample CPU usage of the given PIDs over a one-second window. Returns a JSON \
         map of pid to percent; as_integer rounds the values."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pids": {
                    "type": "array",
                    "items": {"type": "integer"},
                    "description": "Process ids to sample"
                },
                "as_integer": {
                    "type": "boolean",
                    "description": "Round percentages to integers"
                }
            },
            "required": ["pids"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        let pids = parse_pids(&args);
        if pids.is_empty() {
            return ToolResult::error(
                "get_process_cpu_usage_sample requires non-empty 'pids'.",
            );
        }

        if get_bool(&args, "as_integer", false) {
            match process::process_cpu_usage_simple(&pids).await {
                // BTreeMap keeps the JSON key order deterministic.
                Ok(vals) => {
                    let sorted: BTreeMap<i32, i64> = vals.into_iter().collect();
                    ToolResult::success(serde_json::to_string(&sorted).unwrap_or_default())
                }
                Err(e) => ToolResult::error(e),
            }
        } else {
            match process::process_cpu_usage(&pids).await {
                Ok(vals) => {
                    let sorted: BTreeMap<i32, f64> = vals.into_iter().collect();
                    ToolResult::success(serde_json::to_string(&sorted).unwrap_or_default())
                }
                Err(e) => ToolResult::error(e),
            }
        }
    }
}

pub struct SendProcessSignalTool;

#[async_trait]
impl Tool for SendProcessSignalTool {
    fn name(&self) -> &str {
        "send_process_signal"
    }

    fn description(&self) -> &str {
        "Send a signal to a process tree (descendants first). With graceful_timeout the \
         tree is polled and escalated to KILL if it survives; force sends KILL directly."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pid": {
                    "type": "integer",
                    "description": "Root process id"
                },
                "signal": {
                    "type": "string",
                    "description": "Signal name (TERM, INT, KILL, ...), default TERM"
                },
                "graceful_timeout": {
                    "type": "integer",
                    "description": "Seconds to wait before escalating to KILL (0 = no wait)"
                },
                "force": {
                    "type": "boolean",
                    "description": "Send KILL immediately"
                }
            },
            "required": ["pid"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        let pid = match args.get("pid") {
            Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            _ => 0,
        };
        if pid <= 0 {
            return ToolResult::error("send_process_signal requires integer 'pid'.");
        }

        let signal = get_str(&args, "signal", "TERM");
        let grace = crate::tools::get_int(&args, "graceful_timeout", 0).max(0) as u64;
        let force = get_bool(&args, "force", false);

        match process::kill_process_tree_with_timeout(pid as i32, signal.trim(), grace, force)
            .await
        {
            Ok(()) => ToolResult::success(format!("Signal handling completed for pid={}", pid)),
            Err(e) => ToolResult::error(e),
        }
    }
}

pub struct GetPageSizeTool;

#[async_trait]
impl Tool for GetPageSizeTool {
    fn name(&self) -> &str {
        "get_page_size"
    }

    fn description(&self) -> &str {
        "Return the operating system memory page size in bytes."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    async fn execute(&self, _args: Value, _ctx: &ToolContext) -> ToolResult {
        ToolResult::success(process::page_size().to_string())
    }
}
