//! Console report: per-checkpoint table, error summary and bound compliance.

use std::fmt::{self, Display, Formatter};

use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Modify, Style};
use tabled::{Table, Tabled};

use crate::checkpoint::CheckpointSummary;
use crate::summarizer::{within_bound, ErrorSummary};

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "Step")]
    step: String,
    #[tabled(rename = "Exact")]
    exact: u64,
    #[tabled(rename = "E(estimate)")]
    mean_estimate: String,
    #[tabled(rename = "σ(estimate)")]
    std_dev: String,
    #[tabled(rename = "Error%")]
    error: String,
}

impl From<&CheckpointSummary> for ReportRow {
    fn from(s: &CheckpointSummary) -> Self {
        Self {
            step: format!("{:.0}%", s.percentage),
            exact: s.exact,
            mean_estimate: format!("{:.0}", s.mean_estimate),
            std_dev: format!("{:.0}", s.std_dev),
            error: format!("{:.2}%", s.mean_error * 100.0),
        }
    }
}

/// Accuracy report over the per-checkpoint statistics, rendered through [`Display`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleReport {
    precision: u8,
    summaries: Vec<CheckpointSummary>,
    errors: Option<ErrorSummary>,
    bound: f64,
    compliant: bool,
}

impl ConsoleReport {
    pub fn new(precision: u8, summaries: &[CheckpointSummary], bound: f64) -> Self {
        Self {
            precision,
            summaries: summaries.to_vec(),
            errors: ErrorSummary::from_summaries(summaries),
            bound,
            compliant: within_bound(summaries, bound),
        }
    }

    /// Whether the largest mean error stays strictly below the bound.
    pub fn compliant(&self) -> bool {
        self.compliant
    }

    pub fn errors(&self) -> Option<ErrorSummary> {
        self.errors
    }

    fn table(&self) -> String {
        let rows: Vec<ReportRow> = self.summaries.iter().map(ReportRow::from).collect();
        Table::new(rows)
            .with(Style::psql())
            .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
            .to_string()
    }
}

impl Display for ConsoleReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "HyperLogLog accuracy (B = {})", self.precision)?;
        writeln!(f, "{}", self.table())?;
        if let Some(errors) = self.errors {
            writeln!(f)?;
            writeln!(f, "Mean error across checkpoints: {:.2}%", errors.mean * 100.0)?;
            writeln!(f, "Max error: {:.2}%", errors.max * 100.0)?;
            writeln!(f, "Min error: {:.2}%", errors.min * 100.0)?;
        }
        writeln!(f)?;
        write!(
            f,
            "All errors within the theoretical bound ({:.2}%): {}",
            self.bound * 100.0,
            if self.compliant { "YES" } else { "NO" }
        )
    }
}
