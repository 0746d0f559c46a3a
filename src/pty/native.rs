//! Bridge process spawning on top of a portable-pty pseudoterminal.
//!
//! The bridge (normally `adb shell`) gets a pipe on stdin and the PTY slave on
//! stdout/stderr. Input is written to the pipe; output is read from the master.

use std::io::Write;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread;

use portable_pty::{native_pty_system, MasterPty, PtySize as NativePtySize};
use tracing::{debug, warn};

use super::reader::ChunkReader;
use super::PtySize;
use crate::error::AdbPtyError;
use crate::Result;

/// Default bridge executable.
pub const DEFAULT_BRIDGE: &str = "adb";

/// How the bridge process is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeCommand {
    /// Executable name or path.
    pub program: String,
    /// Arguments, e.g. `["-s", "emulator-5554", "shell"]`.
    pub args: Vec<String>,
}

impl BridgeCommand {
    /// `<program> shell`.
    pub fn shell(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec!["shell".to_string()],
        }
    }

    /// `<program> -s <serial> shell`, or `<program> shell` without a serial.
    pub fn for_device(program: impl Into<String>, serial: Option<&str>) -> Self {
        let mut cmd = Self::shell(program);
        if let Some(serial) = serial {
            cmd.args = vec!["-s".to_string(), serial.to_string(), "shell".to_string()];
        }
        cmd
    }

    /// An arbitrary program and argument list.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for BridgeCommand {
    fn default() -> Self {
        Self::shell(DEFAULT_BRIDGE)
    }
}

/// How the bridge process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellExit {
    /// Exited normally with the given code.
    Exited(i32),
    /// Killed by the given signal.
    Signaled(i32),
}

impl ShellExit {
    /// Exit code for a normal exit.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            Self::Signaled(_) => None,
        }
    }

    /// Whether the process exited normally with code 0.
    pub fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

impl From<std::process::ExitStatus> for ShellExit {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::Signaled(signal);
            }
        }
        Self::Exited(status.code().unwrap_or(-1))
    }
}

/// A running bridge process.
///
/// Dropping it never kills the child. A child that is still running is
/// handed to a background thread that waits for it, so it never lingers as
/// a zombie.
pub struct BridgeProcess {
    child: Option<Child>,
    pid: u32,
    program: String,
}

impl BridgeProcess {
    /// Process ID of the bridge.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Poll the process without blocking.
    pub fn try_wait(&mut self) -> Result<Option<ShellExit>> {
        match self.child.as_mut() {
            Some(child) => Ok(child.try_wait()?.map(ShellExit::from)),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for BridgeProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeProcess")
            .field("program", &self.program)
            .field("pid", &self.pid)
            .finish()
    }
}

impl Drop for BridgeProcess {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        match child.try_wait() {
            Ok(Some(status)) => debug!("{} exited: {}", self.program, status),
            Ok(None) => {
                debug!(
                    "{} (pid {}) still running, reaping in background",
                    self.program, self.pid
                );
                let program = std::mem::take(&mut self.program);
                let reaper = thread::Builder::new()
                    .name("adb-pty-reaper".into())
                    .spawn(move || match child.wait() {
                        Ok(status) => debug!("{} exited: {}", program, status),
                        Err(e) => warn!("failed to wait for {}: {}", program, e),
                    });
                if let Err(e) = reaper {
                    warn!("failed to spawn reaper thread: {}", e);
                }
            }
            Err(e) => warn!("failed to poll {}: {}", self.program, e),
        }
    }
}

/// The three handles produced by spawning a bridge.
pub struct SpawnedBridge {
    /// Output of the bridge, read from the PTY master.
    pub reader: ChunkReader,
    /// Input of the bridge (pipe write end).
    pub writer: Box<dyn Write + Send>,
    /// The bridge process itself.
    pub process: BridgeProcess,
}

/// Spawn `command` with stdin on a pipe and stdout/stderr on a fresh PTY.
pub fn spawn_bridge(command: &BridgeCommand, size: PtySize) -> Result<SpawnedBridge> {
    let native_size = NativePtySize {
        rows: size.rows,
        cols: size.cols,
        pixel_width: 0,
        pixel_height: 0,
    };

    let pair = native_pty_system()
        .openpty(native_size)
        .map_err(|e| AdbPtyError::Pty(e.to_string()))?;

    let (stdout, stderr) = open_slave(pair.master.as_ref())?;

    let mut child = Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::piped())
        .stdout(stdout)
        .stderr(stderr)
        .spawn()
        .map_err(|source| AdbPtyError::Spawn {
            program: command.program.clone(),
            source,
        })?;

    // Only the child keeps the slave open, so EOF on the master follows its exit
    drop(pair.slave);

    let stdin: ChildStdin = child
        .stdin
        .take()
        .ok_or_else(|| AdbPtyError::Pty("bridge stdin was not captured".into()))?;

    let reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| AdbPtyError::Pty(e.to_string()))?;
    let reader = ChunkReader::spawn(reader)?.keep_alive(Box::new(pair.master));

    let pid = child.id();
    debug!("spawned {} {:?} (pid {})", command.program, command.args, pid);

    Ok(SpawnedBridge {
        reader,
        writer: Box::new(stdin),
        process: BridgeProcess {
            child: Some(child),
            pid,
            program: command.program.clone(),
        },
    })
}

/// Open the slave side of the PTY twice, for the child's stdout and stderr.
#[cfg(unix)]
fn open_slave(master: &dyn MasterPty) -> Result<(Stdio, Stdio)> {
    use std::os::unix::fs::OpenOptionsExt;

    let path = master
        .tty_name()
        .ok_or_else(|| AdbPtyError::Pty("PTY slave has no device name".into()))?;

    let slave = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY)
        .open(&path)
        .map_err(|e| AdbPtyError::Pty(format!("{}: {}", path.display(), e)))?;
    let slave_err = slave.try_clone()?;

    Ok((Stdio::from(slave), Stdio::from(slave_err)))
}

#[cfg(not(unix))]
fn open_slave(_master: &dyn MasterPty) -> Result<(Stdio, Stdio)> {
    Err(AdbPtyError::Pty(
        "splitting a PTY slave from a piped stdin requires a Unix host".into(),
    ))
}
