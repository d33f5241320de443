//! Run-scoped cancellation and deadlines
//!
//! A `RunContext` pairs a `CancellationToken` with an optional deadline and
//! is threaded through every component: client, tools, agent loops, subagent
//! workers. Child scopes inherit cancellation and may only tighten the
//! deadline, so a subagent's per-task timeout can never outlive its parent.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::CoreError;

#[derive(Debug, Clone)]
pub struct RunContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    /// A fresh root scope with no deadline.
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Child scope: cancellation flows down, deadline is inherited.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    /// Child scope whose deadline is the tighter of the parent's and `now + timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) => Some(existing.min(candidate)),
            None => Some(candidate),
        };
        Self {
            cancel: self.cancel.child_token(),
            deadline,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline; `None` when no deadline is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Non-blocking state check, mirroring `ctx.Err()`.
    pub fn check(&self) -> Result<(), CoreError> {
        if self.cancel.is_cancelled() {
            return Err(CoreError::Canceled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(CoreError::DeadlineExceeded);
            }
        }
        Ok(())
    }

    /// Sleep that wakes early on cancellation or deadline expiry.
    pub async fn sleep(&self, dur: Duration) -> Result<(), CoreError> {
        let wake = Instant::now() + dur;
        let target = match self.deadline {
            Some(deadline) if deadline < wake => deadline,
            _ => wake,
        };
        tokio::select! {
            _ = self.cancel.cancelled() => Err(CoreError::Canceled),
            _ = tokio::time::sleep_until(target) => {
                if target == wake {
                    Ok(())
                } else {
                    Err(CoreError::DeadlineExceeded)
                }
            }
        }
    }

    /// Race a fallible future against this scope's cancellation and deadline.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, CoreError>
    where
        F: std::future::Future<Output = Result<T, CoreError>>,
    {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.cancel.cancelled() => Err(CoreError::Canceled),
                _ = tokio::time::sleep_until(deadline) => Err(CoreError::DeadlineExceeded),
                r = fut => r,
            },
            None => tokio::select! {
                _ = self.cancel.cancelled() => Err(CoreError::Canceled),
                r = fut => r,
            },
        }
    }
}
