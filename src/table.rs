//! Schema-checked ingestion of the experiment tables.
//!
//! Three delimited tables are understood:
//! - statistics: `percentage, exact, mean_estimate, std_dev, mean_error`,
//!   one row per checkpoint, aggregated over all runs;
//! - single-stream: `percentage, exact_count, hll_estimate, error`,
//!   one row per checkpoint of a representative run;
//! - runs: `run, percentage, exact_count, hll_estimate`, long format, one row
//!   per run and checkpoint.
//!
//! Headers are checked before any row is read, so a missing column is reported
//! by name. Extra columns (e.g. `stream_size`) are ignored.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::checkpoint::{Checkpoint, CheckpointSummary, StreamDetail};
use crate::error::ReportError;
use crate::summarizer::{relative_error, validate_checkpoints, RunRecord};

/// Tolerated difference between a recorded and a recomputed relative error.
const ERROR_TOLERANCE: f64 = 1e-6;

/// Row type of a table with a fixed set of required columns.
pub trait Schema: DeserializeOwned {
    /// Table name used in error messages.
    const TABLE: &'static str;
    /// Columns that must be present in the header.
    const COLUMNS: &'static [&'static str];

    /// Named numeric fields checked to be finite and non-negative.
    fn fields(&self) -> Vec<(&'static str, f64)>;

    /// Checkpoint this row belongs to.
    fn checkpoint(&self) -> Checkpoint;
}

impl Schema for CheckpointSummary {
    const TABLE: &'static str = "statistics";
    const COLUMNS: &'static [&'static str] =
        &["percentage", "exact", "mean_estimate", "std_dev", "mean_error"];

    fn fields(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("percentage", self.percentage),
            ("mean_estimate", self.mean_estimate),
            ("std_dev", self.std_dev),
            ("mean_error", self.mean_error),
        ]
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint::new(self.percentage, self.exact)
    }
}

impl Schema for StreamDetail {
    const TABLE: &'static str = "single-stream";
    const COLUMNS: &'static [&'static str] =
        &["percentage", "exact_count", "hll_estimate", "error"];

    fn fields(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("percentage", self.percentage),
            ("hll_estimate", self.hll_estimate),
            ("error", self.error),
        ]
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint::new(self.percentage, self.exact_count)
    }
}

impl Schema for RunRecord {
    const TABLE: &'static str = "runs";
    const COLUMNS: &'static [&'static str] = &["run", "percentage", "exact_count", "hll_estimate"];

    fn fields(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("percentage", self.percentage),
            ("hll_estimate", self.hll_estimate),
        ]
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint::new(self.percentage, self.exact_count)
    }
}

/// Parse all rows of `T` from `reader`, checking the header and every field.
///
/// Row numbers in error messages are 1-based and exclude the header.
pub fn parse_rows<T: Schema, R: Read>(reader: R) -> Result<Vec<T>, ReportError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|err| ReportError::shape(T::TABLE, format!("unreadable header: {err}")))?
        .clone();
    if let Some(missing) = T::COLUMNS
        .iter()
        .find(|column| !headers.iter().any(|h| h == **column))
    {
        return Err(ReportError::shape(
            T::TABLE,
            format!("missing column `{missing}`"),
        ));
    }

    let mut rows = Vec::new();
    for (idx, result) in rdr.deserialize::<T>().enumerate() {
        let row_no = idx + 1;
        let row = result.map_err(|err| ReportError::shape(T::TABLE, format!("row {row_no}: {err}")))?;
        if let Some((column, value)) = row
            .fields()
            .into_iter()
            .find(|(_, v)| !v.is_finite() || *v < 0.0)
        {
            return Err(ReportError::shape(
                T::TABLE,
                format!("row {row_no}: column `{column}` has invalid value {value}"),
            ));
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(ReportError::shape(T::TABLE, "no rows"));
    }
    debug!(table = T::TABLE, rows = rows.len(), "parsed table");
    Ok(rows)
}

/// Parse a one-row-per-checkpoint table, additionally requiring strictly increasing checkpoints.
fn parse_checkpoint_rows<T: Schema, R: Read>(reader: R) -> Result<Vec<T>, ReportError> {
    let rows = parse_rows::<T, R>(reader)?;
    let checkpoints: Vec<Checkpoint> = rows.iter().map(|row| row.checkpoint()).collect();
    validate_checkpoints(&checkpoints, T::TABLE)?;
    Ok(rows)
}

/// Parse the per-stream-average statistics table.
pub fn parse_statistics<R: Read>(reader: R) -> Result<Vec<CheckpointSummary>, ReportError> {
    parse_checkpoint_rows(reader)
}

/// Parse the single-stream detail table.
///
/// The recorded `error` is checked against the error recomputed from the exact
/// count and the estimate; a disagreement is logged and the recomputed value wins.
pub fn parse_single_stream<R: Read>(reader: R) -> Result<Vec<StreamDetail>, ReportError> {
    let mut rows: Vec<StreamDetail> = parse_checkpoint_rows(reader)?;
    for row in rows.iter_mut() {
        let error = relative_error(row.hll_estimate, row.exact_count, row.percentage)?;
        if (error - row.error).abs() > ERROR_TOLERANCE {
            warn!(
                percentage = row.percentage,
                recorded = row.error,
                recomputed = error,
                "single-stream error column disagrees with its estimate"
            );
        }
        row.error = error;
    }
    Ok(rows)
}

/// Parse the long-format runs table.
pub fn parse_runs<R: Read>(reader: R) -> Result<Vec<RunRecord>, ReportError> {
    parse_rows(reader)
}

fn open(path: &Path) -> Result<File, ReportError> {
    File::open(path).map_err(|source| ReportError::MissingInput {
        path: path.to_path_buf(),
        source,
    })
}

/// Attach the file path to shape errors so the message names the offending file.
fn in_file<T>(path: &Path, result: Result<T, ReportError>) -> Result<T, ReportError> {
    result.map_err(|err| match err {
        ReportError::ShapeMismatch { table, detail } => ReportError::ShapeMismatch {
            table: format!("{table} table {}", path.display()),
            detail,
        },
        other => other,
    })
}

pub fn read_statistics(path: &Path) -> Result<Vec<CheckpointSummary>, ReportError> {
    in_file(path, parse_statistics(open(path)?))
}

pub fn read_single_stream(path: &Path) -> Result<Vec<StreamDetail>, ReportError> {
    in_file(path, parse_single_stream(open(path)?))
}

pub fn read_runs(path: &Path) -> Result<Vec<RunRecord>, ReportError> {
    in_file(path, parse_runs(open(path)?))
}

/// Write summaries in the statistics table layout.
pub fn write_statistics<W: Write>(
    writer: W,
    summaries: &[CheckpointSummary],
) -> Result<(), ReportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for summary in summaries {
        wtr.serialize(summary)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const STATISTICS: &str = "\
percentage,exact,mean_estimate,std_dev,mean_error
10,99532,99821.3,612.4,0.0061
20,198114,198502.1,1103.9,0.0052
30,295420,294980.7,1650.2,0.0058
";

    const SINGLE_STREAM: &str = "\
percentage,stream_size,exact_count,hll_estimate,error
10,100000,99532,100117,0.00587751
50,500000,486790,484105,0.00551573
100,1000000,948123,952311,0.00441715
";

    #[test]
    fn test_parse_statistics() {
        let rows = parse_statistics(STATISTICS.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].exact, 99532);
        assert_eq!(rows[2].percentage, 30.0);
        assert!((rows[1].mean_error - 0.0052).abs() < 1e-12);
    }

    #[test]
    fn test_parse_single_stream_ignores_extra_columns() {
        let rows = parse_single_stream(SINGLE_STREAM.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].exact_count, 486790);
        assert_eq!(rows[1].hll_estimate, 484105.0);
    }

    #[test]
    fn test_single_stream_error_is_recomputed() {
        let input = "percentage,exact_count,hll_estimate,error\n10,100,103,0.5\n";
        let rows = parse_single_stream(input.as_bytes()).unwrap();
        assert!((rows[0].error - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_single_stream_zero_exact_is_division_by_zero() {
        let input = "percentage,exact_count,hll_estimate,error\n0,0,0,0\n10,100,103,0.03\n";
        assert!(matches!(
            parse_single_stream(input.as_bytes()),
            Err(ReportError::DivisionByZero { .. })
        ));
    }

    #[test_case("exact,mean_estimate,std_dev,mean_error\n1,1,0,0\n" => "percentage"; "percentage")]
    #[test_case("percentage,exact,mean_estimate,mean_error\n10,1,1,0\n" => "std_dev"; "std dev")]
    #[test_case("percentage,exact,std_dev,mean_estimate\n10,1,0,1\n" => "mean_error"; "mean error")]
    fn test_missing_column(input: &str) -> String {
        match parse_statistics(input.as_bytes()) {
            Err(ReportError::ShapeMismatch { table, detail }) => {
                assert_eq!(table, "statistics");
                detail
                    .trim_start_matches("missing column `")
                    .trim_end_matches('`')
                    .to_string()
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test_case("percentage,exact,mean_estimate,std_dev,mean_error\n"; "header only")]
    #[test_case("percentage,exact,mean_estimate,std_dev,mean_error\n10,abc,1,0,0\n"; "non numeric exact")]
    #[test_case("percentage,exact,mean_estimate,std_dev,mean_error\n10,5,1,0\n"; "short row")]
    #[test_case("percentage,exact,mean_estimate,std_dev,mean_error\n10,5,-1,0,0\n"; "negative estimate")]
    #[test_case("percentage,exact,mean_estimate,std_dev,mean_error\n10,5,NaN,0,0\n"; "nan estimate")]
    #[test_case("percentage,exact,mean_estimate,std_dev,mean_error\n20,5,5,0,0\n10,3,3,0,0\n"; "decreasing")]
    #[test_case("percentage,exact,mean_estimate,std_dev,mean_error\n10,5,5,0,0\n10,5,5,0,0\n"; "duplicate")]
    #[test_case("percentage,exact,mean_estimate,std_dev,mean_error\n120,5,5,0,0\n"; "percentage above 100")]
    fn test_malformed_statistics(input: &str) {
        assert!(matches!(
            parse_statistics(input.as_bytes()),
            Err(ReportError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_parse_runs_in_any_order() {
        let input = "run,percentage,exact_count,hll_estimate\n2,10,100,99\n1,10,100,101\n";
        let rows = parse_runs(input.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].run, 2);
    }

    #[test]
    fn test_missing_file_is_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statistics.csv");
        assert!(matches!(
            read_statistics(&path),
            Err(ReportError::MissingInput { path: p, .. }) if p == path
        ));
    }

    #[test]
    fn test_file_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("single_stream.csv");
        std::fs::write(&path, "percentage,exact_count,error\n10,100,0\n").unwrap();
        match read_single_stream(&path) {
            Err(ReportError::ShapeMismatch { table, detail }) => {
                assert!(table.contains("single_stream.csv"));
                assert!(detail.contains("hll_estimate"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_written_statistics_parse_back() {
        let rows = parse_statistics(STATISTICS.as_bytes()).unwrap();
        let mut buf = Vec::new();
        write_statistics(&mut buf, &rows).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("percentage,exact,mean_estimate,std_dev,mean_error\n"));
        assert_eq!(parse_statistics(text.as_bytes()).unwrap(), rows);
    }
}
