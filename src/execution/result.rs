//! Command result type.

use std::fmt;

use crate::output::OutputSanitizer;

/// Result of one remote command: exit code and raw output text.
///
/// The output is exactly what the remote shell printed between the echoed
/// command and the next prompt, with carriage returns removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Exit code reported by `echo $?`.
    pub exit_code: i32,
    /// Output text.
    ///
    /// Decoded lossily: bytes that are not valid UTF-8 become U+FFFD.
    pub output: String,
}

impl CommandResult {
    /// Create a new command result.
    pub fn new(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
        }
    }

    /// Check if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Get output as string, trimmed.
    pub fn output_trimmed(&self) -> &str {
        self.output.trim()
    }

    /// Get output lines.
    pub fn output_lines(&self) -> impl Iterator<Item = &str> {
        self.output.lines()
    }

    /// Output with ANSI escape sequences removed (e.g. colored `ls`).
    pub fn plain_output(&self) -> String {
        OutputSanitizer::strip_ansi_str(&self.output)
    }

    /// Split into `(exit_code, output)`.
    pub fn into_parts(self) -> (i32, String) {
        (self.exit_code, self.output)
    }
}

impl From<CommandResult> for (i32, String) {
    fn from(result: CommandResult) -> Self {
        result.into_parts()
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {:?})", self.exit_code, self.output)
    }
}
