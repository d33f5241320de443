//! Subagent factory and context-provider tools

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::constants::subagent::MAX_DEPTH;
use crate::subagent::{format_batch_report, FactoryDeps, FactoryInput};
use crate::tools::{get_bool, get_str, Tool, ToolContext, ToolResult};

pub struct SubagentFactoryTool;

#[async_trait]
impl Tool for SubagentFactoryTool {
    fn name(&self) -> &str {
        "subagent_factory"
    }

    fn description(&self) -> &str {
        "Split a mega_prompt into tasks (default delimiter '---TASK---') and run one \
         subagent per task concurrently. Returns a batch summary; inspect individual \
         tasks afterwards with subagent_context_provider."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "mega_prompt": {
                    "type": "string",
                    "description": "Multi-task text to split into subagent tasks"
                },
                "task_list_name": {
                    "type": "string",
                    "description": "Slug used in generated task ids"
                },
                "split_symbol": {
                    "type": "string",
                    "description": "Literal delimiter between tasks (default '---TASK---')"
                },
                "split_regex": {
                    "type": "string",
                    "description": "Regex delimiter; overrides split_symbol when set"
                },
                "base_instruction": {
                    "type": "string",
                    "description": "Instruction block prepended to every task"
                },
                "max_concurrency": {
                    "type": "integer",
                    "description": "Parallel workers, 1-200 (default 3)"
                },
                "timeout_sec": {
                    "type": "integer",
                    "description": "Per-task wall budget in seconds, 1-3600 (default 600)"
                },
                "ttl_seconds": {
                    "type": "integer",
                    "description": "Task-context TTL in seconds, 1-86400 (default 600)"
                },
                "output_dir": {
                    "type": "string",
                    "description": "Where task files and report.json go"
                },
                "model": {
                    "type": "string",
                    "description": "Model override for the subagents"
                }
            },
            "required": ["mega_prompt"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        if !ctx.experimental {
            return ToolResult::error(
                "subagent_factory is disabled. Enable experimental mode first.",
            );
        }
        if ctx.depth >= MAX_DEPTH {
            return ToolResult::error(format!(
                "nested subagent depth limit reached ({}).",
                MAX_DEPTH
            ));
        }
        let Some(manager) = ctx.manager.clone() else {
            return ToolResult::error("subagent manager is unavailable.");
        };
        let Some(client) = ctx.client.clone() else {
            return ToolResult::error("completion client is unavailable.");
        };

        let input = FactoryInput::from_args(&args);
        let deps = FactoryDeps {
            client,
            editor: ctx.editor.clone(),
            default_model: ctx.model.clone(),
            system_prompt: ctx.system_prompt.clone(),
            experimental: ctx.experimental,
            child_depth: ctx.depth + 1,
        };

        match manager.run_factory(&ctx.run, input, deps).await {
            Ok(report) => ToolResult::success(format_batch_report(&report)),
            Err(e) => ToolResult::error(format!("subagent_factory failed: {}", e)),
        }
    }
}

pub struct SubagentContextProviderTool;

#[async_trait]
impl Tool for SubagentContextProviderTool {
    fn name(&self) -> &str {
        "subagent_context_provider"
    }

    fn description(&self) -> &str {
        "Fetch the stored context summary of a finished subagent task by task_id. \
         consume=true (default) deletes the entry after reading."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task_id": {
                    "type": "string",
                    "description": "Task id from a batch report"
                },
                "consume": {
                    "type": "boolean",
                    "description": "Delete the context after reading (default true)"
                }
            },
            "required": ["task_id"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let task_id = get_str(&args, "task_id", "");
        if task_id.trim().is_empty() {
            return ToolResult::error("task_id is required");
        }
        let consume = get_bool(&args, "consume", true);

        let Some(manager) = ctx.manager.clone() else {
            return ToolResult::error("subagent manager is unavailable.");
        };
        match manager.task_context_summary(task_id.trim(), consume).await {
            Ok(summary) => ToolResult::success(summary),
            Err(e) => ToolResult::error(e),
        }
    }
}
