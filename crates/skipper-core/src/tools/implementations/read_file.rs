//! File reading and line-addressed patching tools

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::fileops;
use crate::tools::{get_str, Tool, ToolContext, ToolResult};

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a text file with line numbers ('12 | code'). Optional line_range like '400-600'. \
         Binary files are refused; long files are truncated with a notice."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path of the file to read"
                },
                "line_range": {
                    "type": "string",
                    "description": "Optional 'start-end' range, e.g. '400-600'"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        let path = get_str(&args, "path", "");
        let path = path.trim();
        if path.is_empty() {
            return ToolResult::error("read_file requires a non-empty 'path' argument.");
        }
        let range = get_str(&args, "line_range", "");
        match fileops::read_file_with_lines(path, range.trim()) {
            Ok(out) => ToolResult::success(out),
            Err(e) => ToolResult::error(e),
        }
    }
}

pub struct PatchFileTool;

#[async_trait]
impl Tool for PatchFileTool {
    fn name(&self) -> &str {
        "patch_file"
    }

    fn description(&self) -> &str {
        "Edit a file with line operations addressed by ORIGINAL line numbers: \
         '26--' removes line 26, '26++ code' replaces it, '26<< code' / '26>> code' insert \
         before/after, '0++ code' prepends, '00++ code' appends. Offsets are handled \
         automatically; never recompute shifted line numbers."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path of the file to patch"
                },
                "patch": {
                    "type": "string",
                    "description": "Line operations, one per line"
                }
            },
            "required": ["path", "patch"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        let path = get_str(&args, "path", "");
        let path = path.trim();
        if path.is_empty() {
            return ToolResult::error("patch_file requires a non-empty 'path' argument.");
        }
        let patch = get_str(&args, "patch", "");
        if patch.trim().is_empty() {
            return ToolResult::error("patch_file requires a non-empty 'patch' argument.");
        }
        match fileops::apply_file_patch(path, &patch) {
            Ok(out) => ToolResult::success(out),
            Err(e) => ToolResult::error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::cancellation::RunContext;
    use std::io::Write;

    fn ctx() -> ToolContext {
        ToolContext::new(RunContext::new())
    }

    #[tokio::test]
    async fn read_then_patch_round_trip() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"alpha\nbeta\n").unwrap();
        let path = f.path().to_str().unwrap();

        let read = ReadFileTool.execute(json!({"path": path}), &ctx()).await;
        assert!(read.output.contains("1 | alpha"));

        let patched = PatchFileTool
            .execute(json!({"path": path, "patch": "2++ BETA"}), &ctx())
            .await;
        assert!(!patched.is_error);
        assert_eq!(std::fs::read_to_string(path).unwrap(), "alpha\nBETA\n");
    }

    #[tokio::test]
    async fn missing_path_is_an_error() {
        let out = ReadFileTool.execute(json!({}), &ctx()).await;
        assert!(out.is_error);
        let out = PatchFileTool
            .execute(json!({"path": "", "patch": "1--"}), &ctx())
            .await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn read_missing_file_reports_error_text() {
        let out = ReadFileTool
            .execute(json!({"path": "/nonexistent/x.txt"}), &ctx())
            .await;
        assert!(out.is_error);
        assert!(out.output.starts_with("Error:"));
    }
}
