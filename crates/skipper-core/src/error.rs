//! Core error type
//!
//! One classification shared by the completion client, the agent loop and the
//! subagent manager. Task outcome bucketing (timeout / canceled / run_error)
//! keys off these variants, so cancellation and deadline expiry must stay
//! distinguishable from transport and API failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Caller-initiated cancellation
    #[error("request canceled")]
    Canceled,

    /// The scope's deadline passed
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Non-retryable (or retry-exhausted) HTTP status from the API
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Transport-level failure after the retry budget
    #[error("request failed after retries: {0}")]
    Transport(String),

    /// Invalid caller input; nothing was executed
    #[error("{0}")]
    Input(String),

    /// Missing model or credentials
    #[error("configuration error: {0}")]
    Config(String),

    /// The agent loop ran out of tool iterations
    #[error("exceeded maximum tool iterations ({0})")]
    MaxIterations(usize),

    /// Structurally invalid API response (no choices, broken JSON, ...)
    #[error("malformed API response: {0}")]
    Protocol(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// External command (git, verification) failed
    #[error("{0}")]
    Command(String),
}

impl CoreError {
    pub fn input(msg: impl Into<String>) -> Self {
        CoreError::Input(msg.into())
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, CoreError::Canceled)
    }

    pub fn is_deadline(&self) -> bool {
        matches!(self, CoreError::DeadlineExceeded)
    }
}
