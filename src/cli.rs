use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use hll_accuracy_report::config::ReportConfig;
use hll_accuracy_report::ReportError;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the accuracy report and write the chart documents
    Report(ReportArgs),
    /// Aggregate per-run estimates into a statistics table
    Summarize(SummarizeArgs),
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Path to config TOML
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Per-stream-average statistics table (overrides config)
    #[arg(long)]
    pub statistics: Option<PathBuf>,

    /// Single-stream detail table (overrides config)
    #[arg(long)]
    pub single_stream: Option<PathBuf>,

    /// Directory for chart documents (overrides config)
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// HyperLogLog precision B used by the experiment (overrides config)
    #[arg(long)]
    pub precision: Option<u8>,
}

#[derive(Args, Debug)]
pub struct SummarizeArgs {
    /// Long-format runs table: run, percentage, exact_count, hll_estimate
    #[arg(long)]
    pub runs: PathBuf,

    /// Statistics table to write
    #[arg(long, default_value = "statistics.csv")]
    pub output: PathBuf,
}

impl ReportArgs {
    /// Config file (or defaults) with command-line overrides applied.
    pub fn resolve(&self) -> Result<ReportConfig, ReportError> {
        let mut config = match &self.config {
            Some(path) => ReportConfig::load(path)?,
            None => ReportConfig::default(),
        };
        if let Some(path) = &self.statistics {
            config.statistics = path.clone();
        }
        if let Some(path) = &self.single_stream {
            config.single_stream = path.clone();
        }
        if let Some(dir) = &self.out_dir {
            config.out_dir = dir.clone();
        }
        if let Some(precision) = self.precision {
            config.experiment.precision = precision;
        }
        Ok(config)
    }
}
