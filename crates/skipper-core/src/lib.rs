//! skipper-core - library behind the skipper terminal agent
//!
//! - Streaming chat-completion client with bounded retry
//! - Conversation history with API-safe repair
//! - Tool execution framework and the standard tool set
//! - Checkpointed worktree editing with rollback
//! - Bounded, cancellable agent loop with deadline finalization
//! - Concurrency-limited subagent batches with persisted reports

pub mod agent;
pub mod ai;
pub mod chat;
pub mod config;
pub mod constants;
pub mod editor;
pub mod error;
pub mod fileops;
pub mod paths;
pub mod process;
pub mod subagent;
pub mod tools;

pub use agent::{AgentLoop, AgentOutcome, RunContext};
pub use ai::{CompletionClient, Message, Model, Role, ToolCall, ToolSpec};
pub use chat::{History, PauseController};
pub use config::Config;
pub use editor::{EditorStore, VerifyMode};
pub use error::CoreError;
pub use subagent::{BatchReport, FactoryDeps, FactoryInput, Manager};
pub use tools::{standard_registry, ToolContext, ToolRegistry};
