//! CLI argument surface and command runners.

mod commands;

pub use commands::{
    render_summary, run_cli, Cli, CliError, Command, ExecutionSummary, MergeCommand,
    ParentsCommand, RegionCommand,
};
