//! Command representation.

use std::time::Duration;

/// Which remote account runs a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Privilege {
    /// The bridge's default user (`shell` on Android).
    #[default]
    Default,
    /// Root, reached through the escalation command.
    Root,
}

/// A command to be executed on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// The command line to execute.
    pub command_line: String,
    /// Account to run as.
    pub privilege: Privilege,
    /// Per-step deadline override.
    pub timeout: Option<Duration>,
}

impl Command {
    /// Create a new command with the given command line.
    pub fn new(command_line: impl Into<String>) -> Self {
        Self {
            command_line: command_line.into(),
            privilege: Privilege::Default,
            timeout: None,
        }
    }

    /// Run as root.
    pub fn root(mut self) -> Self {
        self.privilege = Privilege::Root;
        self
    }

    /// Set the privilege explicitly.
    pub fn privilege(mut self, privilege: Privilege) -> Self {
        self.privilege = privilege;
        self
    }

    /// Set the execution timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

impl Default for Command {
    fn default() -> Self {
        Self::new("")
    }
}
