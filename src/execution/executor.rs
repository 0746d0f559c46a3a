//! One-shot command execution.
//!
//! Every execution opens a fresh session, runs exactly one command and
//! releases the session again, on success and on error alike.

use tracing::{debug, info, warn};

use super::command::{Command, Privilege};
use super::result::CommandResult;
use crate::error::AdbPtyError;
use crate::session::{Session, SessionConfig};
use crate::Result;

/// Runs commands on the device, one session per command.
#[derive(Debug, Clone, Default)]
pub struct CommandExecutor {
    config: SessionConfig,
}

impl CommandExecutor {
    /// Create a new command executor.
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Base session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Session configuration for a specific command.
    pub fn session_config(&self, command: &Command) -> SessionConfig {
        let mut config = self.config.clone();
        config.elevate = command.privilege == Privilege::Root;
        if let Some(timeout) = command.timeout {
            config.timeout = timeout;
        }
        config
    }

    /// Execute a command (blocking).
    ///
    /// The bridge is waited for before returning, whatever the outcome.
    pub fn execute(&self, command: &Command) -> Result<CommandResult> {
        let mut session = Session::start(self.session_config(command))?;
        debug!(
            "running '{}' as {:?}",
            command.command_line, command.privilege
        );
        let result = session
            .reset_prompt()
            .and_then(|()| session.run_command(&command.command_line));

        if let Err(e) = session.shutdown() {
            warn!("bridge did not exit after the session closed: {}", e);
        }
        result
    }

    /// Run a command as the default user.
    pub fn run(&self, command_line: &str) -> Result<CommandResult> {
        self.execute(&Command::new(command_line))
    }

    /// Run a command as root.
    pub fn run_root(&self, command_line: &str) -> Result<CommandResult> {
        self.execute(&Command::new(command_line).root())
    }
}

/// Run a command on the connected device as the default user.
pub fn cmd(command_line: &str) -> Result<CommandResult> {
    CommandExecutor::default().run(command_line)
}

/// Run a command on the connected device as root. The device must be rooted.
pub fn root_cmd(command_line: &str) -> Result<CommandResult> {
    CommandExecutor::default().run_root(command_line)
}

/// Outcome of [`self_check`].
#[derive(Debug, Clone)]
pub struct SelfCheckReport {
    /// `echo $USER` as the default user.
    pub shell_user: CommandResult,
    /// `echo $USER` as root.
    pub root_user: CommandResult,
    /// `id` as the default user.
    pub shell_id: CommandResult,
    /// `id` as root.
    pub root_id: CommandResult,
}

/// Verify that the default user is `shell`.
pub fn check_shell_access(executor: &CommandExecutor) -> Result<CommandResult> {
    let result = executor.run("echo $USER")?;
    expect_identity("shell access", "shell", result)
}

/// Verify that escalation yields `root`.
pub fn check_root_access(executor: &CommandExecutor) -> Result<CommandResult> {
    let result = executor.run_root("echo $USER")?;
    expect_identity("root access", "root", result)
}

/// Validate shell and root access, then collect `id` from both accounts.
///
/// Stops at the first failure.
pub fn self_check(executor: &CommandExecutor) -> Result<SelfCheckReport> {
    info!("checking shell access");
    let shell_user = check_shell_access(executor)?;
    info!("checking root access");
    let root_user = check_root_access(executor)?;

    let shell_id = expect_success("shell id", executor.run("id")?)?;
    let root_id = expect_success("root id", executor.run_root("id")?)?;

    Ok(SelfCheckReport {
        shell_user,
        root_user,
        shell_id,
        root_id,
    })
}

fn expect_identity(
    check: &'static str,
    expected: &str,
    result: CommandResult,
) -> Result<CommandResult> {
    if result.success() && result.output_trimmed() == expected {
        Ok(result)
    } else {
        Err(AdbPtyError::CheckFailed {
            check,
            expected: expected.to_string(),
            exit_code: result.exit_code,
            output: result.output_trimmed().to_string(),
        })
    }
}

fn expect_success(check: &'static str, result: CommandResult) -> Result<CommandResult> {
    if result.success() {
        Ok(result)
    } else {
        Err(AdbPtyError::CheckFailed {
            check,
            expected: "any output".to_string(),
            exit_code: result.exit_code,
            output: result.output_trimmed().to_string(),
        })
    }
}
