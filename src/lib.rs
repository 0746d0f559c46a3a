//! # adb-pty
//!
//! Run shell commands on Android devices through `adb shell`.
//!
//! `adb shell` is driven as an interactive, prompt-based shell behind a
//! pseudoterminal. Command boundaries are recovered by installing a
//! session-unique sentinel as the prompt, and exit codes are fetched with a
//! second `echo $?` exchange.
//!
//! ## Features
//!
//! - **Structured results**: `(exit code, output)` from an unstructured shell
//! - **Root commands**: optional `su` escalation with identity verification
//! - **Bounded waits**: every blocking read has a deadline
//! - **Scoped sessions**: one session per command, released on every path
//!
//! ## Quick Start
//!
//! ```no_run
//! use adb_pty::{Session, SessionConfig};
//!
//! fn main() -> adb_pty::Result<()> {
//!     adb_pty::logging::try_init().ok();
//!
//!     let mut session = Session::open(SessionConfig::default())?;
//!     let result = session.run_command("getprop ro.build.version.release")?;
//!     println!("exit {}: {}", result.exit_code, result.output_trimmed());
//!     session.close();
//!
//!     // Or one-shot:
//!     let result = adb_pty::root_cmd("id")?;
//!     println!("{}", result.output);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod logging;
pub mod output;
pub mod pty;
pub mod session;

// Re-export commonly used types
pub use error::{AdbPtyError, Result};
pub use execution::{cmd, root_cmd, Command, CommandExecutor, CommandResult, Privilege};
pub use output::OutputSanitizer;
pub use pty::{BridgeCommand, PtySize, ShellExit};
pub use session::{Sentinel, Session, SessionConfig, SessionState};
