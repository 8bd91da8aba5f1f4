//! One-shot report runs wiring ingestion, summarization and output together.
//!
//! All inputs are read and validated, and every artifact is built in memory,
//! before the first file is written. Writing itself is all or nothing.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::chart::{report_charts, write_documents, Chart, ChartDocument};
use crate::checkpoint::CheckpointSummary;
use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::report::ConsoleReport;
use crate::summarizer::{runs_from_records, summarize};
use crate::table::{read_runs, read_single_stream, read_statistics, write_statistics};

/// Result of a completed report run.
#[derive(Debug)]
pub struct ReportOutcome {
    pub report: ConsoleReport,
    pub charts: Vec<PathBuf>,
}

/// Read both tables, build the console report and write the chart documents.
pub fn run_report(config: &ReportConfig) -> Result<ReportOutcome, ReportError> {
    let bound = config.theoretical_bound()?;
    let compliance_bound = config.compliance_bound()?;

    let statistics = read_statistics(&config.statistics)?;
    let single_stream = read_single_stream(&config.single_stream)?;
    info!(
        checkpoints = statistics.len(),
        single_stream_checkpoints = single_stream.len(),
        "tables loaded"
    );

    let report = ConsoleReport::new(config.experiment.precision, &statistics, compliance_bound);
    let documents: Vec<ChartDocument> = report_charts(
        &single_stream,
        &statistics,
        bound,
        &config.experiment,
        &config.style,
    )
    .iter()
    .map(Chart::document)
    .collect();

    let charts = write_documents(&documents, &config.out_dir)?;

    Ok(ReportOutcome { report, charts })
}

/// Summarize the long-format runs table into a statistics table at `output`.
pub fn run_summarize(runs: &Path, output: &Path) -> Result<Vec<CheckpointSummary>, ReportError> {
    let records = read_runs(runs)?;
    let (checkpoints, stream_runs) = runs_from_records(&records)?;
    let summaries = summarize(&stream_runs, &checkpoints)?;

    let mut table = Vec::new();
    write_statistics(&mut table, &summaries)?;
    fs::write(output, table).map_err(|source| ReportError::Write {
        path: output.to_path_buf(),
        source,
    })?;
    info!(
        runs = stream_runs.len(),
        checkpoints = summaries.len(),
        path = %output.display(),
        "statistics saved"
    );
    Ok(summaries)
}
