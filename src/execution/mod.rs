//! Command execution on the device.
//!
//! This module provides the public operations:
//! - `cmd` / `root_cmd` one-shot execution
//! - `CommandExecutor` for a configured bridge
//! - the shell/root self-check
//!
//! # Example
//!
//! ```no_run
//! use adb_pty::execution::{cmd, root_cmd};
//!
//! let result = cmd("echo $USER").unwrap();
//! assert_eq!(result.output_trimmed(), "shell");
//!
//! let (code, output) = root_cmd("id").unwrap().into_parts();
//! println!("{code}: {output}");
//! ```

mod command;
mod executor;
mod result;

pub use command::{Command, Privilege};
pub use executor::{
    check_root_access, check_shell_access, cmd, root_cmd, self_check, CommandExecutor,
    SelfCheckReport,
};
pub use result::CommandResult;
