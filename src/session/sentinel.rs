//! Session sentinel: the prompt string that frames command output.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

use crate::error::AdbPtyError;
use crate::Result;

/// Global counter mixed into every generated sentinel.
static COUNTER: AtomicU64 = AtomicU64::new(1);

const PREFIX: &str = "::adb-pty-";
const SUFFIX: &str = "::";

/// Marker installed as the remote shell's `PS1`.
///
/// Rendered as `::adb-pty-<token>::`. Generated tokens combine a process-wide
/// counter with 64 random bits, so a sentinel is unique within the process and
/// improbable in real command output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sentinel(String);

impl Sentinel {
    /// Generate a fresh sentinel.
    pub fn generate() -> Self {
        let count = COUNTER.fetch_add(1, Ordering::Relaxed);
        let noise: u64 = rand::thread_rng().gen();
        Self(format!("{PREFIX}{count:x}-{noise:016x}{SUFFIX}"))
    }

    /// Build a sentinel around a fixed token.
    ///
    /// The token must be non-empty and consist of ASCII alphanumerics, `-`
    /// or `_`, so it needs no quoting inside the prompt assignment.
    pub fn from_token(token: &str) -> Result<Self> {
        let valid = !token.is_empty()
            && token
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !valid {
            return Err(AdbPtyError::InvalidSentinel(token.to_string()));
        }
        Ok(Self(format!("{PREFIX}{token}{SUFFIX}")))
    }

    /// The sentinel text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The sentinel bytes, as they appear at the end of the stream.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shell statement that installs this sentinel as the primary prompt.
    ///
    /// The value is split into two adjacent quoted halves. The shell joins
    /// them, while the terminal echo of the statement never contains the
    /// sentinel itself.
    pub fn prompt_assignment(&self) -> String {
        let (head, tail) = self.0.split_at(self.0.len() / 2);
        format!("PS1='{head}''{tail}'")
    }

    /// Whether `buffer` currently ends with this sentinel.
    pub fn terminates(&self, buffer: &[u8]) -> bool {
        buffer.ends_with(self.as_bytes())
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
