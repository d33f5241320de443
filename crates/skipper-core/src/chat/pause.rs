//! Cooperative pause
//!
//! Checkpoint-based on purpose: the flag is only consulted at turn
//! boundaries and between tool calls, so an in-flight completion or tool
//! call is never interrupted and tool-call/response pairing stays intact.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::agent::cancellation::RunContext;
use crate::constants::agent::PAUSE_POLL;
use crate::error::CoreError;

#[derive(Debug, Default)]
pub struct PauseController {
    paused: AtomicBool,
}

impl PauseController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the flag, returning the new state.
    pub fn toggle(&self) -> bool {
        // fetch_xor returns the previous value.
        !self.paused.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Block in short polls while paused. Cancellation or deadline expiry
    /// ends the wait with the corresponding error.
    pub async fn wait_if_paused(&self, ctx: &RunContext) -> Result<(), CoreError> {
        while self.is_paused() {
            ctx.check()?;
            ctx.sleep(PAUSE_POLL).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn toggle_flips_state() {
        let p = PauseController::new();
        assert!(!p.is_paused());
        assert!(p.toggle());
        assert!(p.is_paused());
        assert!(!p.toggle());
        assert!(!p.is_paused());
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_not_paused() {
        let p = PauseController::new();
        let ctx = RunContext::new();
        p.wait_if_paused(&ctx).await.unwrap();
    }

    #[tokio::test]
    async fn wait_resumes_after_unpause() {
        let p = Arc::new(PauseController::new());
        p.toggle();
        let ctx = RunContext::new();

        let unpause = p.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            unpause.toggle();
        });

        p.wait_if_paused(&ctx).await.unwrap();
        assert!(!p.is_paused());
    }

    #[tokio::test]
    async fn wait_aborts_on_cancellation() {
        let p = PauseController::new();
        p.toggle();
        let ctx = RunContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });
        let err = p.wait_if_paused(&ctx).await.unwrap_err();
        assert!(err.is_canceled());
    }
}
