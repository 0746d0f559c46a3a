//! adb-pty binary entry point.

use std::error::Error;
use std::io::Write;
use std::process::ExitCode;

use adb_pty::cli::{self, Args};
use adb_pty::config::Config;
use adb_pty::execution::{self_check, Command, CommandExecutor};
use adb_pty::logging;
use tracing::{debug, info};

fn main() -> Result<ExitCode, Box<dyn Error>> {
    let args = cli::parse_args()?;

    if args.help {
        cli::print_help();
        return Ok(ExitCode::SUCCESS);
    }
    if args.version {
        cli::print_version();
        return Ok(ExitCode::SUCCESS);
    }

    let config = Config::load(&args)?;
    logging::init_with_filter(config.log_filter())?;
    debug!("configuration: {:?}", config);

    let executor = CommandExecutor::new(config.to_session_config());

    if args.self_check {
        return run_self_check(&executor);
    }
    match args.command_line() {
        Some(line) => run_command(&executor, &args, line),
        // No command also means self-check
        None => run_self_check(&executor),
    }
}

fn run_command(
    executor: &CommandExecutor,
    args: &Args,
    line: String,
) -> Result<ExitCode, Box<dyn Error>> {
    let mut command = Command::new(line);
    if args.root {
        command = command.root();
    }

    let result = executor.execute(&command)?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(result.output.as_bytes())?;
    stdout.flush()?;

    // Exit codes outside 0..=255 cannot be reproduced locally
    Ok(ExitCode::from(u8::try_from(result.exit_code).unwrap_or(1)))
}

fn run_self_check(executor: &CommandExecutor) -> Result<ExitCode, Box<dyn Error>> {
    println!("Testing adb pty for connected device.");
    println!();
    println!("Testing shell and root user access.");

    let report = self_check(executor)?;
    info!("self-check passed");

    println!();
    println!("Expecting both shell and root ids with 0 exit code for both");
    println!();
    println!("{}", report.shell_id);
    println!("{}", report.root_id);

    Ok(ExitCode::SUCCESS)
}
