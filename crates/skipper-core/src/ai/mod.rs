//! Chat-completion client: wire types, SSE processing, retry policy

pub mod client;
pub mod retry;
pub mod sse;
pub mod types;

pub use client::CompletionClient;
pub use types::{Message, Model, Role, ToolCall, ToolSpec};
