//! Standard tool implementations

mod checkpoints;
mod file_manage;
mod line_edit;
mod process_tools;
mod read_file;
mod run_command;
mod subagents;

pub use checkpoints::{
    ApplyUnifiedDiffPatchTool, CreateCheckpointTool, EditorHistoryTool, UndoCheckpointsTool,
};
pub use file_manage::{
    CompareFilesSideBySideTool, CreateFileBackupTool, DetectFileTypeTool, MergeFilesTool,
    RestoreFileBackupTool, ShowFileDiffTool,
};
pub use line_edit::{
    BatchLineOperationsTool, DeleteLinesByPatternTool, ExtractLineRangeTool,
    RemoveDuplicateLinesTool, RemoveLinesTool, ReorderLineRangeTool, ReplaceLineRangeTool,
};
pub use process_tools::{CpuUsageSampleTool, GetPageSizeTool, SendProcessSignalTool};
pub use read_file::{PatchFileTool, ReadFileTool};
pub use run_command::RunCommandTool;
pub use subagents::{SubagentContextProviderTool, SubagentFactoryTool};
