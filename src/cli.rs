//! Command-line interface for adb-pty.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    /// Remote command words, joined with spaces before sending.
    pub command: Vec<String>,
    /// Run the command as root.
    pub root: bool,
    /// Bridge executable (overrides config).
    pub bridge: Option<String>,
    /// Device serial passed to the bridge as `-s`.
    pub serial: Option<String>,
    /// Per-step timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Skip `id -u` verification after escalating.
    pub no_verify: bool,
    /// Run the shell/root self-check.
    pub self_check: bool,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

impl Args {
    /// The remote command line, if one was given.
    pub fn command_line(&self) -> Option<String> {
        if self.command.is_empty() {
            None
        } else {
            Some(self.command.join(" "))
        }
    }
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
///
/// The first positional argument starts the remote command; everything after
/// it belongs to the command, including words that look like options.
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('r') | Long("root") => {
                result.root = true;
            }
            Short('b') | Long("bridge") => {
                result.bridge = Some(parser.value()?.parse()?);
            }
            Short('s') | Long("serial") => {
                result.serial = Some(parser.value()?.parse()?);
            }
            Short('t') | Long("timeout") => {
                let value: String = parser.value()?.parse()?;
                let secs = value
                    .parse()
                    .ok()
                    .filter(|&secs: &u64| secs > 0)
                    .ok_or(ArgsError::InvalidValue("timeout", value))?;
                result.timeout_secs = Some(secs);
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Long("no-verify") => {
                result.no_verify = true;
            }
            Long("self-check") => {
                result.self_check = true;
            }
            Value(val) => {
                result.command.push(val.string()?);
                for raw in parser.raw_args()? {
                    let word = raw
                        .into_string()
                        .map_err(|raw| ArgsError::NotUnicode(raw.to_string_lossy().into()))?;
                    result.command.push(word);
                }
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    if result.self_check && !result.command.is_empty() {
        return Err(ArgsError::Conflict("--self-check", "a command"));
    }
    if result.root && result.command.is_empty() && !result.help && !result.version {
        return Err(ArgsError::MissingCommand("--root"));
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"adb-pty {version}
Run shell commands on an Android device through adb shell

USAGE:
    adb-pty [OPTIONS] [COMMAND]...

With no COMMAND, runs the self-check.

OPTIONS:
    -r, --root              Run COMMAND as root (via su)
    -b, --bridge <PATH>     Bridge executable [default: adb]
    -s, --serial <SERIAL>   Target device serial
    -t, --timeout <SECS>    Deadline for each protocol step [default: 30]
    -c, --config <FILE>     Path to configuration file (JSON)
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
        --no-verify         Do not verify the uid after escalating
        --self-check        Verify shell and root access, print both ids
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    ADB_PTY_BRIDGE          Bridge executable (overrides config)
    ADB_PTY_SERIAL          Device serial (overrides config)
    ADB_PTY_TIMEOUT         Timeout in seconds (overrides config)
    ADB_PTY_LOG_LEVEL       Log level (overrides config)
    RUST_LOG                Alternative log level setting

EXAMPLES:
    # Default user
    adb-pty getprop ro.product.model

    # Root, on a specific device
    adb-pty -r -s emulator-5554 ls -l /data

    # Self-check on a rooted device
    adb-pty --self-check
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("adb-pty {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Command word is not valid UTF-8.
    NotUnicode(String),
    /// Two arguments cannot be combined.
    Conflict(&'static str, &'static str),
    /// An option only applies to a command, and none was given.
    MissingCommand(&'static str),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::NotUnicode(word) => write!(f, "argument is not valid unicode: '{}'", word),
            Self::Conflict(a, b) => write!(f, "{} cannot be combined with {}", a, b),
            Self::MissingCommand(option) => write!(f, "{} requires a command", option),
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
