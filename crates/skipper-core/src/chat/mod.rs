//! Conversation state: message history and the cooperative pause flag

pub mod history;
pub mod pause;

pub use history::{approx_tokens, History};
pub use pause::PauseController;
