//! CLI entry point for the cresta prominence drivers.
//!
//! Parses command-line arguments with clap, executes the requested driver,
//! renders the summary to stdout, and maps errors to exit codes. Logging
//! is initialised eagerly so subsequent operations can emit structured
//! diagnostics via `tracing`.

use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use cresta_cli::{
    cli::{render_summary, run_cli, Cli, CliError},
    logging::{self, LoggingError},
};
use tracing::error;

/// Parse CLI arguments, execute the command, render the summary, and flush
/// the output stream.
fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let summary = run_cli(cli).context("failed to execute command")?;
    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    render_summary(&summary, &mut writer).context("failed to render summary")?;
    writer.flush().context("failed to flush output")?;
    Ok(())
}

fn main() -> ExitCode {
    if let Err(err) = logging::init_logging() {
        report_logging_init_error(&err);
        return ExitCode::FAILURE;
    }

    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(cli_error) = err.downcast_ref::<CliError>() {
                log_cli_error(cli_error);
            } else {
                error!(error = %err, "command execution failed");
            }
            ExitCode::FAILURE
        }
    }
}

// One-off diagnostic emitted before tracing is initialised.
#[allow(clippy::print_stderr)]
fn report_logging_init_error(err: &LoggingError) {
    eprintln!("failed to initialize logging: {err}");
}

fn log_cli_error(err: &CliError) {
    match err {
        CliError::Pipeline(pipeline) => error!(
            error = %pipeline,
            code = %pipeline.code(),
            "command execution failed"
        ),
        _ => error!(error = %err, "command execution failed"),
    }
}
