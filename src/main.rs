// Entry point: parses arguments, sets up logging and runs one report or summary.
mod cli;

use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use hll_accuracy_report::pipeline::{run_report, run_summarize};
use hll_accuracy_report::ReportError;

use crate::cli::{Cli, Command};

fn main() -> ExitCode {
    // stdout carries the report, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Report(args) => args.resolve().and_then(|config| {
            let outcome = run_report(&config)?;
            println!("{}", outcome.report);
            Ok(())
        }),
        Command::Summarize(args) => run_summarize(&args.runs, &args.output).map(|_| ()),
    };

    exit_code(result)
}

/// Log a failed run once and turn it into a non-zero exit status.
fn exit_code(result: Result<(), ReportError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
