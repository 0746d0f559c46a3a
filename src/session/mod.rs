//! Remote shell session management.
//!
//! This module provides the prompt-scraping session engine together with its
//! sentinel marker and lifecycle state.

mod engine;
mod sentinel;
mod state;

pub use engine::{
    Session, SessionConfig, DEFAULT_ESCALATION_COMMAND, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT,
};
pub use sentinel::Sentinel;
pub use state::SessionState;
