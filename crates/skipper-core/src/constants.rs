//! Application constants and configuration defaults
//!
//! Centralized location for magic numbers and default values

use std::time::Duration;

/// HTTP client configuration
pub mod http {
    use super::*;

    /// Connection timeout for HTTP requests
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Streaming timeout - completions with large tool outputs can run long
    pub const STREAM_TIMEOUT: Duration = Duration::from_secs(600);
}

/// Completion-request retry policy
pub mod retry {
    use super::*;

    /// Total attempts per request (first try included)
    pub const MAX_REQUEST_ATTEMPTS: u32 = 7;

    /// First retry delay; doubles each attempt
    pub const BASE_RETRY_DELAY: Duration = Duration::from_secs(2);

    /// Ceiling for computed and Retry-After delays
    pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(8);
}

/// Agent loop budgets
pub mod agent {
    use super::*;

    /// Completion + tool-call rounds per turn
    pub const MAX_TOOL_ITERATIONS: usize = 16;

    /// When less than this remains before the deadline, stop using tools
    /// and ask for a final summary instead.
    pub const FINALIZE_WINDOW: Duration = Duration::from_secs(20);

    /// Upper bound on the finalize completion itself
    pub const FINALIZE_BUDGET: Duration = Duration::from_secs(8);

    /// Poll cadence while the pause flag is set
    pub const PAUSE_POLL: Duration = Duration::from_millis(200);

    /// Tool output snippet length kept in the progress buffer
    pub const PROGRESS_SNIPPET_CHARS: usize = 600;
}

/// Subagent factory defaults and clamps
pub mod subagent {
    use super::*;

    pub const DEFAULT_CONCURRENCY: usize = 3;
    pub const MAX_CONCURRENCY: usize = 200;
    pub const DEFAULT_TIMEOUT_SEC: u64 = 600;
    pub const MAX_TIMEOUT_SEC: u64 = 3600;
    pub const DEFAULT_TTL_SEC: u64 = 600;
    pub const MAX_TTL_SEC: u64 = 86_400;

    /// Root agent may spawn subagents; those may spawn one more level.
    pub const MAX_DEPTH: u8 = 2;

    /// Cadence of the expired-context scrub task
    pub const SCRUB_INTERVAL: Duration = Duration::from_secs(30);

    /// Last-output snippet kept in each task context
    pub const SNIPPET_CHARS: usize = 220;

    pub const DEFAULT_SPLIT_SYMBOL: &str = "---TASK---";
    pub const DEFAULT_TASK_LIST_NAME: &str = "tasklist";
}

/// History bookkeeping
pub mod history {
    /// Tool responses are truncated to this many chars before entering history
    pub const MAX_TOOL_RESPONSE_CHARS: usize = 6_000;
}

/// File reading and diff limits
pub mod fileops {
    pub const MAX_READ_LINES: usize = 1_000;
    pub const MAX_READ_CHARS: usize = 15_000;
    pub const MAX_DIFF_OUTPUT_LINES: usize = 500;
    pub const DEFAULT_COMPARE_WIDTH: usize = 120;
    pub const MIN_COMPARE_WIDTH: usize = 60;

    /// Bytes sampled for the binary-content heuristic
    pub const BINARY_SAMPLE_BYTES: usize = 8_192;
}

/// Shell execution
pub mod shell {
    use super::*;

    /// Command output is truncated at this many chars with a hint footer
    pub const MAX_OUTPUT_CHARS: usize = 4_000;

    /// Wall-clock bound when the caller supplies no tighter deadline
    pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);
}

/// Directory names
pub mod app {
    /// Subdirectory under the user cache and config dirs
    pub const DIR_NAME: &str = "skipper";

    /// Project-local state directory (subagent batch outputs)
    pub const LOCAL_DIR_NAME: &str = ".skipper";
}
