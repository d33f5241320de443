//! Tool execution framework and the standard tool set

pub mod implementations;
pub mod registry;

use std::sync::Arc;

use serde_json::Value;

pub use registry::{Tool, ToolContext, ToolRegistry, ToolResult};

/// Permissive string getter: strings pass through, numbers and bools are
/// rendered. Missing or null yields the default.
pub fn get_str(args: &Value, key: &str, default: &str) -> String {
    match args.get(key) {
        Some(Value::String(s)) => {
            if s.trim().is_empty() {
                default.to_string()
            } else {
                s.clone()
            }
        }
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => default.to_string(),
    }
}

/// Permissive integer getter: numbers or numeric strings.
pub fn get_int(args: &Value, key: &str, default: i64) -> i64 {
    match args.get(key) {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

/// Permissive boolean getter: bools, "true"/"1"/"yes"/"y", nonzero numbers.
pub fn get_bool(args: &Value, key: &str, default: bool) -> bool {
    match args.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => {
            matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "y")
        }
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(default),
        _ => default,
    }
}

/// The standard tool set. `subagent_factory` is registered only when
/// experimental mode is enabled, which gates both advertisement and
/// execution.
pub fn standard_registry(experimental: bool) -> ToolRegistry {
    use implementations::*;

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(RunCommandTool));
    registry.register(Arc::new(ReadFileTool));
    registry.register(Arc::new(PatchFileTool));
    registry.register(Arc::new(ApplyUnifiedDiffPatchTool));
    registry.register(Arc::new(CreateCheckpointTool));
    registry.register(Arc::new(UndoCheckpointsTool));
    registry.register(Arc::new(EditorHistoryTool));
    registry.register(Arc::new(CpuUsageSampleTool));
    registry.register(Arc::new(SendProcessSignalTool));
    registry.register(Arc::new(GetPageSizeTool));
    registry.register(Arc::new(RemoveLinesTool));
    registry.register(Arc::new(ReplaceLineRangeTool));
    registry.register(Arc::new(BatchLineOperationsTool));
    registry.register(Arc::new(DeleteLinesByPatternTool));
    registry.register(Arc::new(ExtractLineRangeTool));
    registry.register(Arc::new(ReorderLineRangeTool));
    registry.register(Arc::new(RemoveDuplicateLinesTool));
    registry.register(Arc::new(ShowFileDiffTool));
    registry.register(Arc::new(CompareFilesSideBySideTool));
    registry.register(Arc::new(CreateFileBackupTool));
    registry.register(Arc::new(RestoreFileBackupTool));
    registry.register(Arc::new(MergeFilesTool));
    registry.register(Arc::new(DetectFileTypeTool));
    registry.register(Arc::new(SubagentContextProviderTool));
    if experimental {
        registry.register(Arc::new(SubagentFactoryTool));
    }
    registry
}
