//! File-management tool family: diffs, comparisons, backups, merging

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::constants::fileops::DEFAULT_COMPARE_WIDTH;
use crate::fileops::file_tools;
use crate::tools::{get_int, get_str, Tool, ToolContext, ToolResult};

pub struct ShowFileDiffTool;

#[async_trait]
impl Tool for ShowFileDiffTool {
    fn name(&self) -> &str {
        "show_file_diff"
    }

    fn description(&self) -> &str {
        "Unified diff of a file against another path (compare_path) or one of its \
         backups (backup_id)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to diff"},
                "compare_path": {"type": "string", "description": "Other file to diff against"},
                "backup_id": {"type": "string", "description": "Backup id to diff against"}
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        let path = get_str(&args, "path", "");
        let compare = get_str(&args, "compare_path", "");
        let backup = get_str(&args, "backup_id", "");
        match file_tools::show_file_diff(&path, &compare, &backup) {
            Ok(out) => ToolResult::success(out),
            Err(e) => ToolResult::error(e),
        }
    }
}

pub struct CompareFilesSideBySideTool;

#[async_trait]
impl Tool for CompareFilesSideBySideTool {
    fn name(&self) -> &str {
        "compare_files_side_by_side"
    }

    fn description(&self) -> &str {
        "Render two files in padded columns with '|' marking differing rows."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "left_path": {"type": "string"},
                "right_path": {"type": "string"},
                "width": {"type": "integer", "description": "Total column width (default 120)"}
            },
            "required": ["left_path", "right_path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        let left = get_str(&args, "left_path", "");
        let right = get_str(&args, "right_path", "");
        if left.trim().is_empty() || right.trim().is_empty() {
            return ToolResult::error(
                "compare_files_side_by_side requires non-empty 'left_path' and 'right_path'.",
            );
        }
        let width = get_int(&args, "width", DEFAULT_COMPARE_WIDTH as i64).max(0) as usize;
        match file_tools::compare_files_side_by_side(&left, &right, width) {
            Ok(out) => ToolResult::success(out),
            Err(e) => ToolResult::error(e),
        }
    }
}

pub struct CreateFileBackupTool;

#[async_trait]
impl Tool for CreateFileBackupTool {
    fn name(&self) -> &str {
        "create_file_backup"
    }

    fn description(&self) -> &str {
        "Copy a file into the backup store and return the backup id."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to back up"}
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        match file_tools::create_file_backup(&get_str(&args, "path", "")) {
            Ok(out) => ToolResult::success(out),
            Err(e) => ToolResult::error(e),
        }
    }
}

pub struct RestoreFileBackupTool;

#[async_trait]
impl Tool for RestoreFileBackupTool {
    fn name(&self) -> &str {
        "restore_file_backup"
    }

    fn description(&self) -> &str {
        "Overwrite a file with the contents of a previously created backup."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to restore"},
                "backup_id": {"type": "string", "description": "Backup id returned by create_file_backup"}
            },
            "required": ["path", "backup_id"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        match file_tools::restore_file_backup(
            &get_str(&args, "path", ""),
            &get_str(&args, "backup_id", ""),
        ) {
            Ok(out) => ToolResult::success(out),
            Err(e) => ToolResult::error(e),
        }
    }
}

pub struct MergeFilesTool;

#[async_trait]
impl Tool for MergeFilesTool {
    fn name(&self) -> &str {
        "merge_files"
    }

    fn description(&self) -> &str {
        "Three-way line merge of left and right against a base; conflicting lines are \
         wrapped in LEFT/BASE/RIGHT markers."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "base_path": {"type": "string"},
                "left_path": {"type": "string"},
                "right_path": {"type": "string"},
                "output_path": {"type": "string", "description": "Defaults to <base>.merged"}
            },
            "required": ["base_path", "left_path", "right_path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        match file_tools::merge_files(
            &get_str(&args, "base_path", ""),
            &get_str(&args, "left_path", ""),
            &get_str(&args, "right_path", ""),
            &get_str(&args, "output_path", ""),
        ) {
            Ok(out) => ToolResult::success(out),
            Err(e) => ToolResult::error(e),
        }
    }
}

pub struct DetectFileTypeTool;

#[async_trait]
impl Tool for DetectFileTypeTool {
    fn name(&self) -> &str {
        "detect_file_type"
    }

    fn description(&self) -> &str {
        "Report size, extension, binary/encoding guess, and newline style of a file."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to inspect"}
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        match file_tools::detect_file_type(&get_str(&args, "path", "")) {
            Ok(out) => ToolResult::success(out),
            Err(e) => ToolResult::error(e),
        }
    }
}
