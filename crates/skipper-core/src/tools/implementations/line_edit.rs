//! Line-editing tool family over [`crate::fileops::line_tools`]

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::fileops::line_tools::{
    apply_batch_line_operations, delete_lines_by_pattern, extract_line_range,
    remove_duplicate_lines, remove_line_ranges, reorder_line_range, replace_line_range,
    BatchLineOperation,
};
use crate::fileops::{parse_range_spec, LineRange};
use crate::tools::{get_bool, get_int, get_str, Tool, ToolContext, ToolResult};

fn require_path(args: &Value, tool: &str) -> Result<String, ToolResult> {
    let path = get_str(args, "path", "");
    let path = path.trim().to_string();
    if path.is_empty() {
        return Err(ToolResult::error(format!(
            "{} requires a non-empty 'path' argument.",
            tool
        )));
    }
    Ok(path)
}

pub struct RemoveLinesTool;

#[async_trait]
impl Tool for RemoveLinesTool {
    fn name(&self) -> &str {
        "remove_lines"
    }

    fn description(&self) -> &str {
        "Remove line ranges from a text file. 'ranges' is a list of 'N' or 'N-M' specs \
         addressed against the current file."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to edit"},
                "ranges": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Range specs like '12' or '4-9'"
                },
                "start_line": {"type": "integer", "description": "Fallback single range start"},
                "end_line": {"type": "integer", "description": "Fallback single range end"}
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        let path = match require_path(&args, self.name()) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let mut ranges: Vec<LineRange> = Vec::new();
        if let Some(Value::Array(items)) = args.get("ranges") {
            for item in items {
                let spec = item.as_str().unwrap_or_default();
                match parse_range_spec(spec) {
                    Ok(r) => ranges.push(r),
                    Err(e) => {
                        return ToolResult::error(format!("invalid range {:?}: {}", spec, e))
                    }
                }
            }
        }
        if ranges.is_empty() {
            let start = get_int(&args, "start_line", 0);
            if start > 0 {
                let end = get_int(&args, "end_line", start);
                ranges.push(LineRange {
                    start: start as usize,
                    end: end.max(start) as usize,
                });
            }
        }

        match remove_line_ranges(&path, &ranges) {
            Ok(out) => ToolResult::success(out),
            Err(e) => ToolResult::error(e),
        }
    }
}

pub struct ReplaceLineRangeTool;

#[async_trait]
impl Tool for ReplaceLineRangeTool {
    fn name(&self) -> &str {
        "replace_line_range"
    }

    fn description(&self) -> &str {
        "Replace an inclusive line range with new text (may span multiple lines; empty \
         text deletes the range)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to edit"},
                "start_line": {"type": "integer", "minimum": 1},
                "end_line": {"type": "integer", "minimum": 1},
                "replacement": {"type": "string", "description": "Replacement text"}
            },
            "required": ["path", "start_line", "end_line"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        let path = match require_path(&args, self.name()) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let start = get_int(&args, "start_line", 0);
        let end = get_int(&args, "end_line", 0);
        if start < 1 || end < 1 {
            return ToolResult::error(
                "replace_line_range requires numeric 'start_line' and 'end_line'.",
            );
        }
        let replacement = get_str(&args, "replacement", "");
        match replace_line_range(&path, start as usize, end as usize, &replacement) {
            Ok(out) => ToolResult::success(out),
            Err(e) => ToolResult::error(e),
        }
    }
}

pub struct BatchLineOperationsTool;

#[async_trait]
impl Tool for BatchLineOperationsTool {
    fn name(&self) -> &str {
        "batch_line_operations"
    }

    fn description(&self) -> &str {
        "Apply a sequence of line operations (delete, replace, insert_before, \
         insert_after) to one file. Operations run in order against the evolving file."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to edit"},
                "operations": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "op": {"type": "string", "enum": ["delete", "replace", "insert_before", "insert_after"]},
                            "line": {"type": "integer", "minimum": 1},
                            "end_line": {"type": "integer"},
                            "text": {"type": "string"}
                        },
                        "required": ["op", "line"]
                    }
                }
            },
            "required": ["path", "operations"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        let path = match require_path(&args, self.name()) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let ops: Vec<BatchLineOperation> = match args.get("operations") {
            Some(v) => match serde_json::from_value(v.clone()) {
                Ok(ops) => ops,
                Err(e) => {
                    return ToolResult::error(format!("invalid 'operations': {}", e));
                }
            },
            None => Vec::new(),
        };
        if ops.is_empty() {
            return ToolResult::error("batch_line_operations requires non-empty 'operations'.");
        }
        match apply_batch_line_operations(&path, &ops) {
            Ok(out) => ToolResult::success(out),
            Err(e) => ToolResult::error(e),
        }
    }
}

pub struct DeleteLinesByPatternTool;

#[async_trait]
impl Tool for DeleteLinesByPatternTool {
    fn name(&self) -> &str {
        "delete_lines_by_pattern"
    }

    fn description(&self) -> &str {
        "Delete every line matching a regex pattern (case-insensitive unless \
         case_sensitive is true)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to edit"},
                "pattern": {"type": "string", "description": "Regex to match doomed lines"},
                "case_sensitive": {"type": "boolean"}
            },
            "required": ["path", "pattern"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        let path = match require_path(&args, self.name()) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let pattern = get_str(&args, "pattern", "");
        let case_sensitive = get_bool(&args, "case_sensitive", false);
        match delete_lines_by_pattern(&path, &pattern, case_sensitive) {
            Ok(out) => ToolResult::success(out),
            Err(e) => ToolResult::error(e),
        }
    }
}

pub struct ExtractLineRangeTool;

#[async_trait]
impl Tool for ExtractLineRangeTool {
    fn name(&self) -> &str {
        "extract_line_range"
    }

    fn description(&self) -> &str {
        "Return a line range of a file formatted as '<lineno> | <text>' without \
         modifying it."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to read"},
                "start_line": {"type": "integer", "minimum": 1},
                "end_line": {"type": "integer", "minimum": 1}
            },
            "required": ["path", "start_line", "end_line"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        let path = match require_path(&args, self.name()) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let start = get_int(&args, "start_line", 0);
        let end = get_int(&args, "end_line", 0);
        if start < 1 || end < 1 {
            return ToolResult::error(
                "extract_line_range requires numeric 'start_line' and 'end_line'.",
            );
        }
        match extract_line_range(&path, start as usize, end as usize) {
            Ok(out) => ToolResult::success(out),
            Err(e) => ToolResult::error(e),
        }
    }
}

pub struct ReorderLineRangeTool;

#[async_trait]
impl Tool for ReorderLineRangeTool {
    fn name(&self) -> &str {
        "reorder_line_range"
    }

    fn description(&self) -> &str {
        "Move a block of lines so it starts before the given target line."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to edit"},
                "start_line": {"type": "integer", "minimum": 1},
                "end_line": {"type": "integer", "minimum": 1},
                "target_line": {"type": "integer", "minimum": 1}
            },
            "required": ["path", "start_line", "end_line", "target_line"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        let path = match require_path(&args, self.name()) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let start = get_int(&args, "start_line", 0);
        let end = get_int(&args, "end_line", 0);
        let target = get_int(&args, "target_line", 0);
        if start < 1 || end < 1 || target < 1 {
            return ToolResult::error(
                "reorder_line_range requires numeric 'start_line', 'end_line', and 'target_line'.",
            );
        }
        match reorder_line_range(&path, start as usize, end as usize, target as usize) {
            Ok(out) => ToolResult::success(out),
            Err(e) => ToolResult::error(e),
        }
    }
}

pub struct RemoveDuplicateLinesTool;

#[async_trait]
impl Tool for RemoveDuplicateLinesTool {
    fn name(&self) -> &str {
        "remove_duplicate_lines"
    }

    fn description(&self) -> &str {
        "Remove duplicate lines, keeping first occurrences. Optionally case-insensitive \
         and blank-line preserving."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File to edit"},
                "case_sensitive": {"type": "boolean"},
                "ignore_blank": {"type": "boolean", "description": "Keep blank lines untouched"}
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> ToolResult {
        let path = match require_path(&args, self.name()) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let case_sensitive = get_bool(&args, "case_sensitive", false);
        let ignore_blank = get_bool(&args, "ignore_blank", false);
        match remove_duplicate_lines(&path, case_sensitive, ignore_blank) {
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

    fn temp(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[tokio::test]
    async fn remove_lines_accepts_range_specs() {
        let f = temp("1\n2\n3\n4\n");
        let out = RemoveLinesTool
            .execute(
                json!({"path": f.path().to_str().unwrap(), "ranges": ["2-3"]}),
                &ctx(),
            )
            .await;
        assert!(!out.is_error, "{}", out.output);
        assert_eq!(std::fs::read_to_string(f.path()).unwrap(), "1\n4\n");
    }

    #[tokio::test]
    async fn remove_lines_falls_back_to_start_end() {
        let f = temp("1\n2\n3\n");
        RemoveLinesTool
            .execute(
                json!({"path": f.path().to_str().unwrap(), "start_line": 1, "end_line": 2}),
                &ctx(),
            )
            .await;
        assert_eq!(std::fs::read_to_string(f.path()).unwrap(), "3\n");
    }

    #[tokio::test]
    async fn batch_operations_parse_from_json() {
        let f = temp("a\nb\n");
        let out = BatchLineOperationsTool
            .execute(
                json!({
                    "path": f.path().to_str().unwrap(),
                    "operations": [{"op": "replace", "line": 1, "text": "A"}]
                }),
                &ctx(),
            )
            .await;
        assert!(!out.is_error, "{}", out.output);
        assert_eq!(std::fs::read_to_string(f.path()).unwrap(), "A\nb\n");
    }

    #[tokio::test]
    async fn missing_numeric_fields_are_rejected() {
        let f = temp("a\n");
        let out = ReplaceLineRangeTool
            .execute(json!({"path": f.path().to_str().unwrap()}), &ctx())
            .await;
        assert!(out.is_error);
        let out = ExtractLineRangeTool
            .execute(json!({"path": f.path().to_str().unwrap()}), &ctx())
            .await;
        assert!(out.is_error);
    }
}
