//! Error types for adb-pty.

use std::time::Duration;

use thiserror::Error;

/// Main error type for adb-pty operations.
#[derive(Error, Debug)]
pub enum AdbPtyError {
    /// The bridge executable could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// PTY-related error.
    #[error("PTY error: {0}")]
    Pty(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking read or teardown did not complete in time.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The output channel reached end-of-file or was already released.
    #[error("channel closed")]
    ChannelClosed,

    /// Exit code text could not be parsed.
    #[error("output parse error: {0}")]
    ParseError(String),

    /// Privilege escalation did not yield a root shell.
    #[error("privilege escalation failed: remote uid is '{uid}'")]
    Escalation { uid: String },

    /// The command cannot be sent over a line-oriented terminal.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Invalid state transition attempted.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        from: crate::session::SessionState,
        to: crate::session::SessionState,
    },

    /// Session is not ready to run a command.
    #[error("session not ready: current state is {0:?}")]
    NotReady(crate::session::SessionState),

    /// The session has no bridge process attached.
    #[error("session has no bridge process")]
    NoProcess,

    /// Sentinel token contains characters unsafe inside a shell prompt.
    #[error("invalid sentinel token: {0}")]
    InvalidSentinel(String),

    /// A self-check expectation was not met.
    #[error("{check} failed: expected exit 0 and '{expected}', got exit {exit_code} and '{output}'")]
    CheckFailed {
        check: &'static str,
        expected: String,
        exit_code: i32,
        output: String,
    },
}

/// Convenience Result type for adb-pty operations.
pub type Result<T> = std::result::Result<T, AdbPtyError>;
