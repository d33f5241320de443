//! Checkpoint-engine tools: unified-diff apply, snapshots, undo, history

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::editor::VerifyMode;
use crate::tools::{get_int, get_str, Tool, ToolContext, ToolResult};

pub struct ApplyUnifiedDiffPatchTool;

#[async_trait]
impl Tool for ApplyUnifiedDiffPatchTool {
    fn name(&self) -> &str {
        "apply_unified_diff_patch"
    }

    fn description(&self) -> &str {
        "Apply a unified diff to a worktree with automatic pre/post checkpoints. \
         On failure or failed verification the worktree is rolled back unchanged. \
         verify_mode: none | syntax | tests."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "work_tree": {
                    "type": "string",
                    "description": "Worktree root directory"
                },
                "patch": {
                    "type": "string",
                    "description": "Unified diff content"
                },
                "verify_mode": {
                    "type": "string",
                    "enum": ["none", "syntax", "tests"],
                    "description": "Verification to run after applying (default none)"
                }
            },
            "required": ["work_tree", "patch"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let work_tree = get_str(&args, "work_tree", "");
        if work_tree.trim().is_empty() {
            return ToolResult::error(
                "apply_unified_diff_patch requires a non-empty 'work_tree' argument.",
            );
        }
        let patch = get_str(&args, "patch", "");
        if patch.trim().is_empty() {
            return ToolResult::error(
                "apply_unified_diff_patch requires a non-empty 'patch' argument.",
            );
        }
        let mode = match VerifyMode::parse(&get_str(&args, "verify_mode", "")) {
            Ok(m) => m,
            Err(e) => return ToolResult::error(e),
        };

        match ctx.editor.apply_unified_diff(&work_tree, &patch, mode).await {
            Ok(outcome) => ToolResult::success(format!(
                "Patch applied successfully. Checkpoints: pre={} post={}",
                outcome.pre, outcome.post
            )),
            Err(e) => ToolResult::error(e),
        }
    }
}

pub struct CreateCheckpointTool;

#[async_trait]
impl Tool for CreateCheckpointTool {
    fn name(&self) -> &str {
        "create_checkpoint"
    }

    fn description(&self) -> &str {
        "Snapshot a worktree (or a single file) in the editor checkpoint store and \
         return the checkpoint id."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "work_tree": {
                    "type": "string",
                    "description": "Worktree root directory"
                },
                "file_path": {
                    "type": "string",
                    "description": "Optional single file to snapshot instead of all changes"
                },
                "message": {
                    "type": "string",
                    "description": "Optional checkpoint message"
                }
            },
            "required": ["work_tree"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let work_tree = get_str(&args, "work_tree", "");
        if work_tree.trim().is_empty() {
            return ToolResult::error(
                "create_checkpoint requires a non-empty 'work_tree' argument.",
            );
        }
        let file_path = get_str(&args, "file_path", "");
        let message = get_str(&args, "message", "");
        match ctx
            .editor
            .create_checkpoint(&work_tree, file_path.trim(), message.trim())
            .await
        {
            Ok(head) => ToolResult::success(format!("Checkpoint created: {}", head)),
            Err(e) => ToolResult::error(e),
        }
    }
}

pub struct UndoCheckpointsTool;

#[async_trait]
impl Tool for UndoCheckpointsTool {
    fn name(&self) -> &str {
        "undo_checkpoints"
    }

    fn description(&self) -> &str {
        "Restore the worktree to the state N checkpoints back, removing untracked \
         files introduced since."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "work_tree": {
                    "type": "string",
                    "description": "Worktree root directory"
                },
                "steps": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "How many checkpoints to undo (default 1)"
                }
            },
            "required": ["work_tree"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let work_tree = get_str(&args, "work_tree", "");
        if work_tree.trim().is_empty() {
            return ToolResult::error(
                "undo_checkpoints requires a non-empty 'work_tree' argument.",
            );
        }
        let steps = get_int(&args, "steps", 1);
        if steps < 1 {
            return ToolResult::error("steps must be >= 1");
        }
        match ctx.editor.undo(&work_tree, steps as usize).await {
            Ok(head) => ToolResult::success(format!("Undo complete. HEAD={}", head)),
            Err(e) => ToolResult::error(e),
        }
    }
}

pub struct EditorHistoryTool;

#[async_trait]
impl Tool for EditorHistoryTool {
    fn name(&self) -> &str {
        "editor_history"
    }

    fn description(&self) -> &str {
        "List recent editor checkpoints for a worktree as '<id> <message>' lines."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "work_tree": {
                    "type": "string",
                    "description": "Worktree root directory"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "How many checkpoints to list (default 10)"
                }
            },
            "required": ["work_tree"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let work_tree = get_str(&args, "work_tree", "");
        if work_tree.trim().is_empty() {
            return ToolResult::error(
                "editor_history requires a non-empty 'work_tree' argument.",
            );
        }
        let limit = get_int(&args, "limit", 10);
        if limit < 1 {
            return ToolResult::error("limit must be >= 1");
        }
        match ctx.editor.history(&work_tree, limit as usize).await {
            Ok(out) => ToolResult::success(out),
            Err(e) => ToolResult::error(e),
        }
    }
}
