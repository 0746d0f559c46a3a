//! Prompt-scraping protocol engine.
//!
//! The remote shell offers no framing of its own. The engine installs a
//! session-unique sentinel as the prompt, skips the terminal's echo of each
//! submitted line, and treats the reappearance of the sentinel at the very end
//! of the stream as "command finished". Exit status is fetched with a second
//! exchange (`echo $?`).

use std::io::Write;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use super::sentinel::Sentinel;
use super::state::SessionState;
use crate::error::AdbPtyError;
use crate::execution::CommandResult;
use crate::pty::{
    spawn_bridge, BridgeCommand, BridgeProcess, ChunkReader, Deadline, PtySize, ShellExit,
    READ_CHUNK_SIZE,
};
use crate::Result;

/// Default deadline for each blocking protocol step.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between termination polls in [`Session::stop`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default privilege escalation command.
pub const DEFAULT_ESCALATION_COMMAND: &str = "su";

/// Startup noise discarded before escalating.
const STARTUP_NOISE_LEN: usize = 0x100;

const EXIT_STATUS_COMMAND: &str = "echo $?";
const IDENTITY_COMMAND: &str = "id -u";
const EXIT_COMMAND: &[u8] = b"exit\r";

/// Configuration for a remote shell session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Bridge invocation.
    pub bridge: BridgeCommand,
    /// PTY dimensions.
    pub pty_size: PtySize,
    /// Deadline for each blocking read, and for [`Session::stop`].
    pub timeout: Duration,
    /// Sleep between termination polls.
    pub poll_interval: Duration,
    /// Escalate privileges before installing the sentinel.
    pub elevate: bool,
    /// Command used to escalate.
    pub escalation_command: String,
    /// Check `id -u` after escalating.
    pub verify_escalation: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bridge: BridgeCommand::default(),
            pty_size: PtySize::default(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            elevate: false,
            escalation_command: DEFAULT_ESCALATION_COMMAND.to_string(),
            verify_escalation: true,
        }
    }
}

impl SessionConfig {
    /// Default configuration for the given bridge.
    pub fn new(bridge: BridgeCommand) -> Self {
        Self {
            bridge,
            ..Self::default()
        }
    }

    /// Set the bridge invocation.
    pub fn bridge(mut self, bridge: BridgeCommand) -> Self {
        self.bridge = bridge;
        self
    }

    /// Set the PTY size.
    pub fn pty_size(mut self, size: PtySize) -> Self {
        self.pty_size = size;
        self
    }

    /// Set the per-step deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the teardown poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Escalate to root before running commands.
    pub fn elevated(mut self) -> Self {
        self.elevate = true;
        self
    }

    /// Set the escalation command.
    pub fn escalation_command(mut self, command: impl Into<String>) -> Self {
        self.escalation_command = command.into();
        self
    }

    /// Enable or disable post-escalation identity verification.
    pub fn verify_escalation(mut self, verify: bool) -> Self {
        self.verify_escalation = verify;
        self
    }
}

/// One remote shell session.
///
/// Dropping the session releases its channels; see [`Session::close`].
pub struct Session {
    reader: Option<ChunkReader>,
    writer: Option<Box<dyn Write + Send>>,
    process: Option<BridgeProcess>,
    sentinel: Sentinel,
    state: SessionState,
    config: SessionConfig,
    exit_status: Option<ShellExit>,
}

impl Session {
    /// Spawn the bridge process. The sentinel prompt is not installed yet.
    pub fn start(config: SessionConfig) -> Result<Self> {
        let spawned = spawn_bridge(&config.bridge, config.pty_size)?;
        info!(
            "started {} (pid {})",
            config.bridge.program,
            spawned.process.pid()
        );

        Ok(Self {
            reader: Some(spawned.reader),
            writer: Some(spawned.writer),
            process: Some(spawned.process),
            sentinel: Sentinel::generate(),
            state: SessionState::Created,
            config,
            exit_status: None,
        })
    }

    /// Spawn the bridge and install the sentinel prompt.
    pub fn open(config: SessionConfig) -> Result<Self> {
        let mut session = Self::start(config)?;
        session.reset_prompt()?;
        Ok(session)
    }

    /// Build a session over existing channels, without a bridge process.
    pub fn from_channel(
        reader: ChunkReader,
        writer: Box<dyn Write + Send>,
        config: SessionConfig,
    ) -> Self {
        Self {
            reader: Some(reader),
            writer: Some(writer),
            process: None,
            sentinel: Sentinel::generate(),
            state: SessionState::Created,
            config,
            exit_status: None,
        }
    }

    /// Replace the generated sentinel. Only meaningful before `reset_prompt`.
    pub fn with_sentinel(mut self, sentinel: Sentinel) -> Self {
        self.sentinel = sentinel;
        self
    }

    /// The sentinel used as this session's prompt.
    pub fn sentinel(&self) -> &Sentinel {
        &self.sentinel
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The session's configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Termination status recorded by [`Session::stop`].
    pub fn exit_status(&self) -> Option<ShellExit> {
        self.exit_status
    }

    /// Process ID of the bridge, if there is one.
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(BridgeProcess::pid)
    }

    /// Install the sentinel as the remote prompt.
    ///
    /// Discards the startup banner, escalates first when configured, then
    /// assigns `PS1` and consumes output up to the first sentinel.
    pub fn reset_prompt(&mut self) -> Result<()> {
        if !self.state.can_transition_to(SessionState::Ready) {
            return Err(AdbPtyError::InvalidStateTransition {
                from: self.state,
                to: SessionState::Ready,
            });
        }

        if self.config.elevate {
            self.escalate()?;
        }

        let banner = self.drain()?;
        trace!("discarded {} bytes of startup output", banner);

        let assignment = self.sentinel.prompt_assignment();
        self.send(&assignment)?;
        self.read_until_sentinel()?;
        self.state.transition_to(SessionState::Ready)?;
        debug!("prompt set to {}", self.sentinel);

        if self.config.elevate && self.config.verify_escalation {
            self.verify_escalation()?;
        }

        Ok(())
    }

    /// Write `command` and a carriage return, then skip the terminal's echo.
    ///
    /// On return the read cursor sits right before the command's output.
    pub fn send(&mut self, command: &str) -> Result<()> {
        validate_command(command)?;
        let deadline = self.deadline();

        let writer = self.writer.as_mut().ok_or(AdbPtyError::ChannelClosed)?;
        writer.write_all(command.as_bytes())?;
        writer.write_all(b"\r")?;
        writer.flush()?;
        debug!("sent '{}'", command);

        let reader = self.reader.as_mut().ok_or(AdbPtyError::ChannelClosed)?;
        skip_echo(reader, command.len(), deadline)
    }

    /// Read until the stream ends with the sentinel.
    ///
    /// Carriage returns are dropped; the returned text excludes the sentinel.
    /// Invalid UTF-8 is replaced with U+FFFD.
    pub fn read_until_sentinel(&mut self) -> Result<String> {
        let deadline = self.deadline();
        let reader = self.reader.as_mut().ok_or(AdbPtyError::ChannelClosed)?;
        let framed = frame_until_sentinel(reader, &self.sentinel, deadline)?;
        trace!("framed {} bytes", framed.len());
        Ok(String::from_utf8_lossy(&framed).into_owned())
    }

    /// Run one command and fetch its exit status.
    pub fn run_command(&mut self, command: &str) -> Result<CommandResult> {
        if !self.state.can_execute() {
            return Err(AdbPtyError::NotReady(self.state));
        }
        validate_command(command)?;

        // Stays Busy if an exchange fails: the stream position is unknown
        self.state.transition_to(SessionState::Busy)?;
        let output = self.exchange(command)?;
        let status = self.exchange(EXIT_STATUS_COMMAND)?;
        self.state.transition_to(SessionState::Ready)?;

        let exit_code = parse_exit_code(&status)?;
        debug!("'{}' exited with {}", command, exit_code);
        Ok(CommandResult::new(exit_code, output))
    }

    /// Release the read and write channels.
    ///
    /// Safe to call repeatedly. The bridge process is left running; it
    /// normally exits on its own once its stdin is closed.
    pub fn close(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.reader.take();
        self.writer.take();
        let _ = self.state.transition_to(SessionState::Closed);
        debug!("session closed");
    }

    /// Ask the remote shell to exit and wait for the bridge to terminate.
    ///
    /// Sends `exit` every poll interval until the process has exited or was
    /// signaled. Write failures are ignored, since the pipe may already be
    /// closing. Gives up with [`AdbPtyError::Timeout`] after the configured
    /// timeout. Later calls return the recorded status.
    pub fn stop(&mut self) -> Result<ShellExit> {
        if let Some(status) = self.exit_status {
            return Ok(status);
        }

        let deadline = self.deadline();
        let process = self.process.as_mut().ok_or(AdbPtyError::NoProcess)?;

        loop {
            if let Some(status) = process.try_wait()? {
                info!("bridge terminated: {:?}", status);
                self.exit_status = Some(status);
                return Ok(status);
            }

            if deadline.is_expired() {
                warn!("bridge (pid {}) did not exit", process.pid());
                return Err(deadline.timeout_error());
            }

            if let Some(writer) = self.writer.as_mut() {
                if let Err(e) = writer.write_all(EXIT_COMMAND).and_then(|_| writer.flush()) {
                    trace!("ignoring exit write failure: {}", e);
                }
            }

            thread::sleep(self.config.poll_interval);
        }
    }

    /// Close the session, then wait for the bridge to exit.
    ///
    /// Closing stdin lets the bridge finish on its own, so no `exit` is
    /// sent. Returns `None` for a session without a bridge process.
    pub fn shutdown(&mut self) -> Result<Option<ShellExit>> {
        self.close();
        if self.process.is_none() {
            return Ok(None);
        }
        self.stop().map(Some)
    }

    fn deadline(&self) -> Deadline {
        Deadline::after(self.config.timeout)
    }

    fn exchange(&mut self, command: &str) -> Result<String> {
        self.send(command)?;
        self.read_until_sentinel()
    }

    /// Read chunks until one comes back shorter than requested.
    fn drain(&mut self) -> Result<usize> {
        let deadline = self.deadline();
        let reader = self.reader.as_mut().ok_or(AdbPtyError::ChannelClosed)?;

        let mut drained = 0;
        loop {
            let chunk = reader.read_some(READ_CHUNK_SIZE, deadline)?;
            drained += chunk.len();
            if chunk.len() < READ_CHUNK_SIZE {
                return Ok(drained);
            }
        }
    }

    fn escalate(&mut self) -> Result<()> {
        let deadline = self.deadline();
        let reader = self.reader.as_mut().ok_or(AdbPtyError::ChannelClosed)?;
        let noise = reader.read_some(STARTUP_NOISE_LEN, deadline)?;
        trace!("discarded {} bytes before escalating", noise.len());

        let command = self.config.escalation_command.clone();
        debug!("escalating with '{}'", command);
        self.send(&command)
    }

    fn verify_escalation(&mut self) -> Result<()> {
        let uid = self.exchange(IDENTITY_COMMAND)?;
        let uid = uid.trim();
        if !is_root_identity(uid) {
            return Err(AdbPtyError::Escalation {
                uid: uid.to_string(),
            });
        }
        debug!("escalation verified");
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("sentinel", &self.sentinel)
            .field("state", &self.state)
            .field("process", &self.process)
            .field("exit_status", &self.exit_status)
            .finish_non_exhaustive()
    }
}

fn validate_command(command: &str) -> Result<()> {
    if command.contains(['\r', '\n']) {
        return Err(AdbPtyError::InvalidCommand(format!(
            "line breaks are not supported: {:?}",
            command
        )));
    }
    Ok(())
}

/// Discard the echo of an `echoed`-byte command line, through its newline.
///
/// Carriage returns do not count toward `echoed`: the terminal may insert
/// them anywhere in the echo.
fn skip_echo(reader: &mut ChunkReader, echoed: usize, deadline: Deadline) -> Result<()> {
    let mut remaining = echoed;
    while remaining > 0 {
        let chunk = reader.read_some(remaining, deadline)?;
        remaining -= chunk.iter().filter(|&&b| b != b'\r').count();
    }

    while reader.read_byte(deadline)? != b'\n' {}
    Ok(())
}

/// Accumulate `\r`-stripped output until its tail equals `sentinel`.
///
/// The tail check runs on the whole buffer, so a sentinel split across
/// reads is still found.
fn frame_until_sentinel(
    reader: &mut ChunkReader,
    sentinel: &Sentinel,
    deadline: Deadline,
) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(READ_CHUNK_SIZE);
    loop {
        let chunk = reader.read_some(READ_CHUNK_SIZE, deadline)?;
        buffer.extend(chunk.into_iter().filter(|&b| b != b'\r'));

        if sentinel.terminates(&buffer) {
            buffer.truncate(buffer.len() - sentinel.len());
            return Ok(buffer);
        }
    }
}

/// `id -u` prints `0` as root. Older toolbox `id` ignores `-u` and prints
/// the full `uid=0(root) gid=0(root) ...` line instead.
fn is_root_identity(output: &str) -> bool {
    output == "0" || output.starts_with("uid=0(")
}

fn parse_exit_code(text: &str) -> Result<i32> {
    text.trim()
        .parse()
        .map_err(|_| AdbPtyError::ParseError(format!("exit status is not an integer: {:?}", text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pty::{ScriptedReader, StalledReader};
    use std::sync::{Arc, Mutex};

    /// Everything written by the session, shared with the test.
    #[derive(Clone, Default)]
    struct SharedWriter(Arc<Mutex<Vec<u8>>>);

    impl SharedWriter {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for SharedWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    const BANNER: &str = "shell@generic:/ $ ";
    const PS1_ECHO: &str = "PS1='::adb-''pty-t::'\r\r\n";
    const PROMPT: &str = "::adb-pty-t::";

    fn scripted(chunks: &[&str], config: SessionConfig) -> (Session, SharedWriter) {
        let writer = SharedWriter::default();
        let reader = ChunkReader::spawn(ScriptedReader::new(chunks.iter().copied())).unwrap();
        let session = Session::from_channel(reader, Box::new(writer.clone()), config)
            .with_sentinel(Sentinel::from_token("t").unwrap());
        (session, writer)
    }

    fn test_config() -> SessionConfig {
        SessionConfig::default().timeout(Duration::from_secs(5))
    }

    fn ready_session(rest: &[&str]) -> (Session, SharedWriter) {
        let mut chunks = vec![BANNER, PS1_ECHO, PROMPT];
        chunks.extend_from_slice(rest);
        let (mut session, writer) = scripted(&chunks, test_config());
        session.reset_prompt().unwrap();
        (session, writer)
    }

    #[test]
    fn test_reset_prompt() {
        let (session, writer) = ready_session(&[]);
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(writer.contents(), "PS1='::adb-''pty-t::'\r");
    }

    #[test]
    fn test_run_command() {
        let (mut session, writer) = ready_session(&[
            "echo $USER\r\r\n",
            "shell\r\n::adb-pty-t::",
            "echo $?\r\r\n",
            "0\r\n::adb-pty-t::",
        ]);

        let result = session.run_command("echo $USER").unwrap();
        assert_eq!(result, CommandResult::new(0, "shell\n"));
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(
            writer.contents(),
            "PS1='::adb-''pty-t::'\recho $USER\recho $?\r"
        );
    }

    #[test]
    fn test_run_command_nonzero_exit() {
        let (mut session, _) = ready_session(&[
            "ls /nope\r\r\n",
            "ls: /nope: No such file or directory\r\n::adb-pty-t::",
            "echo $?\r\r\n",
            "1\r\n::adb-pty-t::",
        ]);

        let result = session.run_command("ls /nope").unwrap();
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.output, "ls: /nope: No such file or directory\n");
    }

    #[test]
    fn test_sentinel_spanning_reads() {
        let (mut session, _) = ready_session(&[
            "echo $USER\r\r\n",
            "shell\r\n::adb-",
            "pty-t::",
            "echo $?\r\r\n",
            "0\r\n::",
            "adb",
            "-pty-t::",
        ]);

        let result = session.run_command("echo $USER").unwrap();
        assert_eq!(result, CommandResult::new(0, "shell\n"));
    }

    #[test]
    fn test_sentinel_mid_output_is_not_a_boundary() {
        let (mut session, _) = ready_session(&[
            "cat f\r\r\n",
            "a ::adb-pty-t:: b\r\n::adb-pty-t::",
            "echo $?\r\r\n",
            "0\r\n::adb-pty-t::",
        ]);

        let result = session.run_command("cat f").unwrap();
        assert_eq!(result.output, "a ::adb-pty-t:: b\n");
    }

    #[test]
    fn test_echo_skip_with_inserted_carriage_returns() {
        let (mut session, _) = ready_session(&[
            "echo $US\rER\r\r\nshell\r\n::adb-pty-t::",
            "ec\rho $?\r\r\n0\r\n::adb-pty-t::",
        ]);

        let result = session.run_command("echo $USER").unwrap();
        assert_eq!(result, CommandResult::new(0, "shell\n"));
    }

    #[test]
    fn test_empty_output() {
        let (mut session, _) = ready_session(&[
            "true\r\r\n",
            "::adb-pty-t::",
            "echo $?\r\r\n",
            "0\r\n::adb-pty-t::",
        ]);

        let result = session.run_command("true").unwrap();
        assert_eq!(result, CommandResult::new(0, ""));
    }

    #[test]
    fn test_non_integer_exit_status() {
        let (mut session, _) = ready_session(&[
            "x\r\r\n",
            "::adb-pty-t::",
            "echo $?\r\r\n",
            "garbage\r\n::adb-pty-t::",
        ]);

        let err = session.run_command("x").unwrap_err();
        assert!(matches!(err, AdbPtyError::ParseError(_)), "got {:?}", err);
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_run_before_reset_prompt() {
        let (mut session, _) = scripted(&[], test_config());
        let err = session.run_command("id").unwrap_err();
        assert!(matches!(err, AdbPtyError::NotReady(SessionState::Created)));
    }

    #[test]
    fn test_reset_prompt_twice() {
        let (mut session, _) = ready_session(&[]);
        let err = session.reset_prompt().unwrap_err();
        assert!(matches!(err, AdbPtyError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_multiline_command_rejected() {
        let (mut session, writer) = ready_session(&[]);
        let err = session.run_command("echo a\necho b").unwrap_err();
        assert!(matches!(err, AdbPtyError::InvalidCommand(_)));
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(writer.contents(), "PS1='::adb-''pty-t::'\r");
    }

    #[test]
    fn test_channel_eof_leaves_session_busy() {
        let (mut session, _) = ready_session(&["sleep 1\r\r\n", "partial"]);

        let err = session.run_command("sleep 1").unwrap_err();
        assert!(matches!(err, AdbPtyError::ChannelClosed));
        assert_eq!(session.state(), SessionState::Busy);

        let err = session.run_command("id").unwrap_err();
        assert!(matches!(err, AdbPtyError::NotReady(SessionState::Busy)));
    }

    #[test]
    fn test_timeout_instead_of_hang() {
        let writer = SharedWriter::default();
        let reader = ChunkReader::spawn(StalledReader).unwrap();
        let config = SessionConfig::default().timeout(Duration::from_millis(50));
        let mut session = Session::from_channel(reader, Box::new(writer), config);

        let err = session.reset_prompt().unwrap_err();
        assert!(matches!(err, AdbPtyError::Timeout(_)), "got {:?}", err);
    }

    #[test]
    fn test_escalation() {
        let (mut session, writer) = scripted(
            &[
                BANNER,
                "su\r\r\n",
                "root@generic:/ # ",
                PS1_ECHO,
                PROMPT,
                "id -u\r\r\n",
                "0\r\n::adb-pty-t::",
                "echo $USER\r\r\n",
                "root\r\n::adb-pty-t::",
                "echo $?\r\r\n",
                "0\r\n::adb-pty-t::",
            ],
            test_config().elevated(),
        );

        session.reset_prompt().unwrap();
        let result = session.run_command("echo $USER").unwrap();
        assert_eq!(result.output_trimmed(), "root");
        assert!(writer.contents().starts_with("su\rPS1="));
    }

    #[test]
    fn test_escalation_denied() {
        let (mut session, _) = scripted(
            &[
                BANNER,
                "su\r\r\n",
                "su: permission denied\r\nshell@generic:/ $ ",
                PS1_ECHO,
                PROMPT,
                "id -u\r\r\n",
                "2000\r\n::adb-pty-t::",
            ],
            test_config().elevated(),
        );

        let err = session.reset_prompt().unwrap_err();
        assert!(
            matches!(err, AdbPtyError::Escalation { ref uid } if uid == "2000"),
            "got {:?}",
            err
        );
    }

    #[test]
    fn test_invalid_utf8_output_is_replaced() {
        let chunks: [&[u8]; 1] = [b"ab\xffc\r\n::adb-pty-t::"];
        let reader = ChunkReader::spawn(ScriptedReader::new(chunks)).unwrap();
        let mut session =
            Session::from_channel(reader, Box::new(SharedWriter::default()), test_config())
                .with_sentinel(Sentinel::from_token("t").unwrap());

        assert_eq!(session.read_until_sentinel().unwrap(), "ab\u{fffd}c\n");
    }

    #[test]
    fn test_escalation_with_legacy_id() {
        // Toolbox `id` ignores -u and prints the full identity line
        let (mut session, _) = scripted(
            &[
                BANNER,
                "su\r\r\n",
                "root@generic:/ # ",
                PS1_ECHO,
                PROMPT,
                "id -u\r\r\n",
                "uid=0(root) gid=0(root)\r\n::adb-pty-t::",
            ],
            test_config().elevated(),
        );

        session.reset_prompt().unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_root_identity_forms() {
        assert!(is_root_identity("0"));
        assert!(is_root_identity("uid=0(root) gid=0(root)"));
        assert!(!is_root_identity("2000"));
        assert!(!is_root_identity("uid=2000(shell) gid=2000(shell)"));
        assert!(!is_root_identity("uid=00(x)"));
        assert!(!is_root_identity(""));
    }

    #[test]
    fn test_drain_reads_past_full_chunks() {
        let full = "x".repeat(READ_CHUNK_SIZE);
        let (mut session, _) = scripted(&[full.as_str(), BANNER, PS1_ECHO], test_config());

        assert_eq!(session.drain().unwrap(), READ_CHUNK_SIZE + BANNER.len());
        // The next unread chunk is the first one after the short read
        let reader = session.reader.as_mut().unwrap();
        let next = reader.read_some(READ_CHUNK_SIZE, Deadline::after(Duration::from_secs(5)));
        assert_eq!(next.unwrap(), PS1_ECHO.as_bytes());
    }

    #[test]
    fn test_reset_prompt_after_long_banner() {
        let full = "m".repeat(READ_CHUNK_SIZE);
        let (mut session, _) = scripted(
            &[
                full.as_str(),
                full.as_str(),
                BANNER,
                PS1_ECHO,
                PROMPT,
                "echo $USER\r\r\n",
                "shell\r\n::adb-pty-t::",
                "echo $?\r\r\n",
                "0\r\n::adb-pty-t::",
            ],
            test_config(),
        );

        session.reset_prompt().unwrap();
        let result = session.run_command("echo $USER").unwrap();
        assert_eq!(result, CommandResult::new(0, "shell\n"));
    }

    #[test]
    fn test_escalation_without_verification() {
        let (mut session, writer) = scripted(
            &[BANNER, "su\r\r\n", "shell@generic:/ $ ", PS1_ECHO, PROMPT],
            test_config().elevated().verify_escalation(false),
        );

        session.reset_prompt().unwrap();
        assert!(!writer.contents().contains("id -u"));
    }

    #[test]
    fn test_close_twice() {
        let (mut session, _) = ready_session(&[]);
        session.close();
        session.close();
        assert_eq!(session.state(), SessionState::Closed);

        let err = session.send("id").unwrap_err();
        assert!(matches!(err, AdbPtyError::ChannelClosed));
        let err = session.run_command("id").unwrap_err();
        assert!(matches!(err, AdbPtyError::NotReady(SessionState::Closed)));

        // An unrelated session is unaffected
        let (mut other, _) = ready_session(&[
            "id\r\r\n",
            "uid=2000(shell)\r\n::adb-pty-t::",
            "echo $?\r\r\n",
            "0\r\n::adb-pty-t::",
        ]);
        assert!(other.run_command("id").unwrap().success());
    }

    #[test]
    fn test_stop_without_process() {
        let (mut session, _) = scripted(&[], test_config());
        assert!(matches!(session.stop(), Err(AdbPtyError::NoProcess)));
        assert!(session.pid().is_none());
    }

    #[test]
    fn test_parse_exit_code() {
        assert_eq!(parse_exit_code("0\n").unwrap(), 0);
        assert_eq!(parse_exit_code(" 127 \n").unwrap(), 127);
        assert!(parse_exit_code("").is_err());
        assert!(parse_exit_code("1\n2\n").is_err());
    }

    #[cfg(unix)]
    fn stop_config(script: &str) -> SessionConfig {
        SessionConfig::new(BridgeCommand::new("sh", ["-c", script]))
            .timeout(Duration::from_secs(10))
            .poll_interval(Duration::from_millis(20))
    }

    #[test]
    #[cfg(unix)]
    fn test_stop_reports_normal_exit() {
        // Consumes exactly one "exit\r" before exiting
        let mut session = Session::start(stop_config("head -c 5 >/dev/null; exit 3")).unwrap();
        assert!(session.pid().is_some());

        assert_eq!(session.stop().unwrap(), ShellExit::Exited(3));
        assert_eq!(session.stop().unwrap(), ShellExit::Exited(3));
        assert_eq!(session.exit_status(), Some(ShellExit::Exited(3)));
    }

    #[test]
    #[cfg(unix)]
    fn test_stop_reports_signal() {
        let mut session = Session::start(stop_config("kill -9 $$")).unwrap();

        assert_eq!(session.stop().unwrap(), ShellExit::Signaled(9));
        assert_eq!(session.stop().unwrap(), ShellExit::Signaled(9));
    }

    #[test]
    #[cfg(unix)]
    fn test_stop_after_close() {
        let mut session = Session::start(stop_config("cat >/dev/null; exit 0")).unwrap();
        // Closing stdin ends `cat`, so no exit command is needed
        session.close();
        assert_eq!(session.stop().unwrap(), ShellExit::Exited(0));
    }

    #[test]
    #[cfg(unix)]
    fn test_stop_times_out() {
        // Neither reads stdin nor exits within the timeout
        let config = stop_config("trap '' INT; sleep 3").timeout(Duration::from_millis(300));
        let mut session = Session::start(config).unwrap();

        let err = session.stop().unwrap_err();
        assert!(
            matches!(err, AdbPtyError::Timeout(d) if d == Duration::from_millis(300)),
            "got {:?}",
            err
        );
        assert_eq!(session.exit_status(), None);
    }

    #[test]
    #[cfg(unix)]
    fn test_shutdown_waits_for_bridge() {
        let mut session = Session::start(stop_config("cat >/dev/null; exit 4")).unwrap();

        assert_eq!(session.shutdown().unwrap(), Some(ShellExit::Exited(4)));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.exit_status(), Some(ShellExit::Exited(4)));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_dropped_session_is_reaped() {
        let mut session = Session::start(stop_config("cat >/dev/null")).unwrap();
        let pid = session.pid().unwrap();
        session.close();
        drop(session);

        assert!(crate::pty::reaped_within(pid, Duration::from_secs(5)));
    }

    #[test]
    fn test_shutdown_without_process() {
        let (mut session, _) = ready_session(&[]);
        assert_eq!(session.shutdown().unwrap(), None);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_session_config_builder() {
        let config = SessionConfig::default()
            .timeout(Duration::from_secs(3))
            .poll_interval(Duration::from_millis(5))
            .elevated()
            .escalation_command("su 0")
            .verify_escalation(false);

        assert_eq!(config.bridge, BridgeCommand::default());
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.poll_interval, Duration::from_millis(5));
        assert!(config.elevate);
        assert_eq!(config.escalation_command, "su 0");
        assert!(!config.verify_escalation);
    }
}
