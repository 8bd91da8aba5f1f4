//! Per-checkpoint statistics over independent simulation runs.
//!
//! Given the estimates every run reported at each checkpoint, [`summarize`]
//! computes the mean estimate, the sample standard deviation (divisor `n - 1`)
//! and the mean relative error. Means are accumulated incrementally and the
//! deviations are scaled by their largest magnitude before squaring, so every
//! field stays finite for estimates up to `f64::MAX` and distinct estimates
//! never collapse to a zero deviation. The computation is a pure batch transform:
//! checkpoints are independent of each other and nothing is retained between
//! calls.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::checkpoint::{Checkpoint, CheckpointSummary, StreamRun};
use crate::error::ReportError;

/// Table label used in shape errors raised for in-memory runs.
const RUNS: &str = "runs";

/// Relative error `|estimate - exact| / exact` at the checkpoint `percentage`.
///
/// A zero exact count has no defined relative error and fails with
/// [`ReportError::DivisionByZero`] rather than producing `0`, `NaN` or `inf`.
#[inline]
pub fn relative_error(estimate: f64, exact: u64, percentage: f64) -> Result<f64, ReportError> {
    if exact == 0 {
        return Err(ReportError::DivisionByZero { percentage });
    }
    let exact = exact as f64;
    Ok((estimate - exact).abs() / exact)
}

/// Summarize `runs` at every checkpoint, preserving checkpoint order.
pub fn summarize(
    runs: &[StreamRun],
    checkpoints: &[Checkpoint],
) -> Result<Vec<CheckpointSummary>, ReportError> {
    validate_checkpoints(checkpoints, RUNS)?;
    validate_runs(runs, checkpoints.len())?;

    let summaries = checkpoints
        .iter()
        .enumerate()
        .map(|(idx, checkpoint)| summarize_checkpoint(runs, idx, checkpoint))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        runs = runs.len(),
        checkpoints = checkpoints.len(),
        "summarized stream runs"
    );
    Ok(summaries)
}

fn summarize_checkpoint(
    runs: &[StreamRun],
    idx: usize,
    checkpoint: &Checkpoint,
) -> Result<CheckpointSummary, ReportError> {
    let estimates: Vec<f64> = runs.iter().map(|run| run.estimates[idx]).collect();

    let mean_estimate = running_mean(estimates.iter().copied());

    let std_dev = if estimates.iter().all(|&e| e == estimates[0]) {
        // identical estimates carry no spread, including the single-run case
        0.0
    } else {
        let scale = estimates
            .iter()
            .map(|e| (e - mean_estimate).abs())
            .fold(0.0, f64::max);
        let sum_sq: f64 = estimates
            .iter()
            .map(|e| ((e - mean_estimate) / scale).powi(2))
            .sum();
        scale * (sum_sq / (estimates.len() - 1) as f64).sqrt()
    };

    let mut mean_error = 0.0;
    for (k, &estimate) in estimates.iter().enumerate() {
        let error = relative_error(estimate, checkpoint.exact_count, checkpoint.percentage)?;
        mean_error += (error - mean_error) / (k + 1) as f64;
    }

    Ok(CheckpointSummary {
        percentage: checkpoint.percentage,
        exact: checkpoint.exact_count,
        mean_estimate,
        std_dev,
        mean_error,
    })
}

/// Mean of `values` as `m += (x - m) / k`, which cannot overflow for finite input.
fn running_mean(values: impl Iterator<Item = f64>) -> f64 {
    values
        .enumerate()
        .fold(0.0, |mean, (k, x)| mean + (x - mean) / (k + 1) as f64)
}

/// Checkpoints must be finite, within `[0, 100]` and strictly increasing.
pub(crate) fn validate_checkpoints(
    checkpoints: &[Checkpoint],
    table: &str,
) -> Result<(), ReportError> {
    if checkpoints.is_empty() {
        return Err(ReportError::shape(table, "no checkpoints"));
    }
    for (idx, checkpoint) in checkpoints.iter().enumerate() {
        let pct = checkpoint.percentage;
        if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
            return Err(ReportError::shape(
                table,
                format!("checkpoint {idx}: percentage {pct} outside [0, 100]"),
            ));
        }
    }
    if let Some(pair) = checkpoints
        .windows(2)
        .find(|pair| pair[1].percentage <= pair[0].percentage)
    {
        return Err(ReportError::shape(
            table,
            format!(
                "checkpoints not strictly increasing: {}% followed by {}%",
                pair[0].percentage, pair[1].percentage
            ),
        ));
    }
    Ok(())
}

fn validate_runs(runs: &[StreamRun], checkpoint_count: usize) -> Result<(), ReportError> {
    if runs.is_empty() {
        return Err(ReportError::shape(RUNS, "at least one run is required"));
    }
    for (run_idx, run) in runs.iter().enumerate() {
        if run.estimates.len() != checkpoint_count {
            return Err(ReportError::shape(
                RUNS,
                format!(
                    "run {run_idx} reports {} estimates for {checkpoint_count} checkpoints",
                    run.estimates.len()
                ),
            ));
        }
        if let Some(bad) = run.estimates.iter().find(|e| !e.is_finite() || **e < 0.0) {
            return Err(ReportError::shape(
                RUNS,
                format!("run {run_idx} reports invalid estimate {bad}"),
            ));
        }
    }
    Ok(())
}

/// One row of the long-format runs table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run: u32,
    pub percentage: f64,
    pub exact_count: u64,
    pub hll_estimate: f64,
}

/// Group long-format records into checkpoints and per-run estimates.
///
/// Records may arrive in any order. Every run must report every checkpoint
/// exactly once, and all runs must agree on the exact count of a checkpoint.
pub fn runs_from_records(
    records: &[RunRecord],
) -> Result<(Vec<Checkpoint>, Vec<StreamRun>), ReportError> {
    let mut by_run: BTreeMap<u32, Vec<&RunRecord>> = BTreeMap::new();
    for record in records {
        by_run.entry(record.run).or_default().push(record);
    }
    for rows in by_run.values_mut() {
        rows.sort_by(|a, b| a.percentage.total_cmp(&b.percentage));
    }

    let mut runs = by_run.iter();
    let Some((&first_id, first_rows)) = runs.next() else {
        return Err(ReportError::shape(RUNS, "no run records"));
    };
    let checkpoints: Vec<Checkpoint> = first_rows
        .iter()
        .map(|r| Checkpoint::new(r.percentage, r.exact_count))
        .collect();
    validate_checkpoints(&checkpoints, RUNS).map_err(|err| match err {
        ReportError::ShapeMismatch { table, detail } => ReportError::ShapeMismatch {
            table,
            detail: format!("run {first_id}: {detail}"),
        },
        other => other,
    })?;

    for (&run_id, rows) in runs {
        if rows.len() != checkpoints.len() {
            return Err(ReportError::shape(
                RUNS,
                format!(
                    "run {run_id} has {} checkpoints, run {first_id} has {}",
                    rows.len(),
                    checkpoints.len()
                ),
            ));
        }
        for (row, checkpoint) in rows.iter().zip(&checkpoints) {
            if row.percentage != checkpoint.percentage {
                return Err(ReportError::shape(
                    RUNS,
                    format!(
                        "run {run_id} reports the {}% checkpoint where run {first_id} reports {}%",
                        row.percentage, checkpoint.percentage
                    ),
                ));
            }
            if row.exact_count != checkpoint.exact_count {
                return Err(ReportError::shape(
                    RUNS,
                    format!(
                        "exact count at {}% differs between runs {first_id} ({}) and {run_id} ({})",
                        checkpoint.percentage, checkpoint.exact_count, row.exact_count
                    ),
                ));
            }
        }
    }

    let stream_runs = by_run
        .values()
        .map(|rows| StreamRun::new(rows.iter().map(|r| r.hll_estimate).collect()))
        .collect();
    Ok((checkpoints, stream_runs))
}

/// Whether every checkpoint's mean error stays strictly below `bound`.
///
/// An empty summary set is trivially within bound.
pub fn within_bound(summaries: &[CheckpointSummary], bound: f64) -> bool {
    summaries
        .iter()
        .map(|s| s.mean_error)
        .fold(f64::NEG_INFINITY, f64::max)
        < bound
}

/// Mean, max and min of the mean error across checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ErrorSummary {
    pub mean: f64,
    pub max: f64,
    pub min: f64,
}

impl ErrorSummary {
    /// Returns `None` when there are no checkpoints.
    pub fn from_summaries(summaries: &[CheckpointSummary]) -> Option<Self> {
        if summaries.is_empty() {
            return None;
        }
        let errors = summaries.iter().map(|s| s.mean_error);
        Some(Self {
            mean: errors.clone().sum::<f64>() / summaries.len() as f64,
            max: errors.clone().fold(f64::NEG_INFINITY, f64::max),
            min: errors.fold(f64::INFINITY, f64::min),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const EPS: f64 = 1e-9;

    fn checkpoints(exact: &[u64]) -> Vec<Checkpoint> {
        exact
            .iter()
            .enumerate()
            .map(|(i, &e)| Checkpoint::new(10.0 * (i + 1) as f64, e))
            .collect()
    }

    fn with_errors(errors: &[f64]) -> Vec<CheckpointSummary> {
        errors
            .iter()
            .enumerate()
            .map(|(i, &mean_error)| CheckpointSummary {
                percentage: 10.0 * (i + 1) as f64,
                exact: 100,
                mean_estimate: 100.0,
                std_dev: 0.0,
                mean_error,
            })
            .collect()
    }

    #[test]
    fn test_three_runs_single_checkpoint() {
        let runs = vec![
            StreamRun::new(vec![98.0]),
            StreamRun::new(vec![101.0]),
            StreamRun::new(vec![103.0]),
        ];
        let out = summarize(&runs, &checkpoints(&[100])).unwrap();
        assert_eq!(out.len(), 1);
        let s = out[0];
        assert_eq!(s.exact, 100);
        assert!((s.mean_estimate - 100.67).abs() < 0.01);
        assert!((s.std_dev - 2.517).abs() < 0.001);
        assert!((s.mean_error - 0.02).abs() < 0.001);
    }

    #[test]
    fn test_preserves_length_and_order() {
        let cps = checkpoints(&[10, 20, 30, 40]);
        let runs = vec![
            StreamRun::new(vec![11.0, 19.0, 30.0, 41.0]),
            StreamRun::new(vec![9.0, 21.0, 31.0, 39.0]),
        ];
        let out = summarize(&runs, &cps).unwrap();
        assert_eq!(out.len(), cps.len());
        for (s, cp) in out.iter().zip(&cps) {
            assert_eq!(s.percentage, cp.percentage);
            assert_eq!(s.exact, cp.exact_count);
        }
    }

    #[test]
    fn test_mean_is_arithmetic_mean() {
        let runs = vec![
            StreamRun::new(vec![1000.0]),
            StreamRun::new(vec![1010.0]),
            StreamRun::new(vec![995.0]),
            StreamRun::new(vec![1003.0]),
        ];
        let out = summarize(&runs, &checkpoints(&[1000])).unwrap();
        assert!((out[0].mean_estimate - 1002.0).abs() < EPS);
    }

    #[test_case(&[500.0, 500.0, 500.0] => true; "identical estimates")]
    #[test_case(&[500.0, 501.0, 500.0] => false; "one differing estimate")]
    #[test_case(&[0.1, 0.1, 0.1] => true; "identical fractional estimates")]
    #[test_case(&[1e-200, 2e-200] => false; "tiny distinct estimates")]
    #[test_case(&[5e-324, 1e-323, 5e-324] => false; "subnormal distinct estimates")]
    fn test_std_dev_zero_iff_identical(estimates: &[f64]) -> bool {
        let runs: Vec<StreamRun> = estimates.iter().map(|&e| StreamRun::new(vec![e])).collect();
        summarize(&runs, &checkpoints(&[500])).unwrap()[0].std_dev == 0.0
    }

    #[test]
    fn test_single_run_has_zero_std_dev() {
        let runs = vec![StreamRun::new(vec![120.0, 180.0])];
        let out = summarize(&runs, &checkpoints(&[100, 200])).unwrap();
        assert!(out.iter().all(|s| s.std_dev == 0.0 && s.std_dev.is_finite()));
        assert!((out[0].mean_error - 0.2).abs() < EPS);
        assert!((out[1].mean_error - 0.1).abs() < EPS);
    }

    #[test]
    fn test_mean_error_zero_when_all_exact() {
        let runs = vec![
            StreamRun::new(vec![100.0, 250.0]),
            StreamRun::new(vec![100.0, 250.0]),
        ];
        let out = summarize(&runs, &checkpoints(&[100, 250])).unwrap();
        assert!(out.iter().all(|s| s.mean_error == 0.0));
    }

    #[test_case(2.0; "double")]
    #[test_case(0.5; "half")]
    #[test_case(3.0; "triple")]
    fn test_mean_error_scales_with_deviation(k: f64) {
        let exact = 1000.0;
        let deviations = [-12.0, 7.0, 3.0, -1.0];
        let runs_for = |scale: f64| -> Vec<StreamRun> {
            deviations
                .iter()
                .map(|d| StreamRun::new(vec![exact + d * scale]))
                .collect()
        };
        let cps = checkpoints(&[1000]);
        let base = summarize(&runs_for(1.0), &cps).unwrap()[0].mean_error;
        let scaled = summarize(&runs_for(k), &cps).unwrap()[0].mean_error;
        assert!((scaled - k * base).abs() < EPS);
    }

    #[test]
    fn test_zero_exact_count_is_division_by_zero() {
        let runs = vec![StreamRun::new(vec![0.0, 3.0])];
        let err = summarize(&runs, &checkpoints(&[0, 3])).unwrap_err();
        assert!(matches!(err, ReportError::DivisionByZero { percentage } if percentage == 10.0));
    }

    #[test]
    fn test_no_runs_is_shape_mismatch() {
        let err = summarize(&[], &checkpoints(&[10])).unwrap_err();
        assert!(matches!(err, ReportError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_run_length_mismatch_is_shape_mismatch() {
        let runs = vec![
            StreamRun::new(vec![10.0, 20.0]),
            StreamRun::new(vec![10.0]),
        ];
        let err = summarize(&runs, &checkpoints(&[10, 20])).unwrap_err();
        assert!(matches!(err, ReportError::ShapeMismatch { ref detail, .. } if detail.contains("run 1")));
    }

    #[test]
    fn test_unordered_checkpoints_are_shape_mismatch() {
        let cps = vec![Checkpoint::new(20.0, 20), Checkpoint::new(10.0, 10)];
        let runs = vec![StreamRun::new(vec![20.0, 10.0])];
        let err = summarize(&runs, &cps).unwrap_err();
        assert!(matches!(err, ReportError::ShapeMismatch { .. }));
    }

    #[test_case(f64::NAN; "nan")]
    #[test_case(-1.0; "negative")]
    #[test_case(f64::INFINITY; "infinite")]
    fn test_invalid_estimate_is_shape_mismatch(estimate: f64) {
        let runs = vec![StreamRun::new(vec![estimate])];
        let err = summarize(&runs, &checkpoints(&[10])).unwrap_err();
        assert!(matches!(err, ReportError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_huge_identical_estimates_stay_exact() {
        let runs = vec![StreamRun::new(vec![1e308]), StreamRun::new(vec![1e308])];
        let out = summarize(&runs, &checkpoints(&[10])).unwrap();
        assert_eq!(out[0].mean_estimate, 1e308);
        assert_eq!(out[0].std_dev, 0.0);
        assert!(out[0].mean_error.is_finite());
    }

    #[test]
    fn test_huge_distinct_estimates_stay_finite() {
        let runs = vec![
            StreamRun::new(vec![f64::MAX]),
            StreamRun::new(vec![f64::MAX / 2.0]),
        ];
        let out = summarize(&runs, &checkpoints(&[10])).unwrap();
        assert_eq!(out[0].mean_estimate, f64::MAX * 0.75);
        assert!(out[0].std_dev.is_finite() && out[0].std_dev > 0.0);
        assert!(out[0].mean_error.is_finite());
    }

    #[test]
    fn test_tiny_distinct_estimates_keep_their_spread() {
        let runs = vec![StreamRun::new(vec![1e-200]), StreamRun::new(vec![2e-200])];
        let out = summarize(&runs, &checkpoints(&[10])).unwrap();
        // sample std dev of {a, 2a} is a / sqrt(2)
        let expected = 1e-200 / std::f64::consts::SQRT_2;
        assert!((out[0].std_dev - expected).abs() <= expected * 1e-12);
    }

    #[test_case(&[0.005, 0.009, 0.012], 0.0103 => false; "max above bound")]
    #[test_case(&[0.005, 0.008, 0.010], 0.0103 => true; "all below bound")]
    #[test_case(&[0.005, 0.0103], 0.0103 => false; "equal to bound is not within")]
    #[test_case(&[], 0.0103 => true; "no checkpoints")]
    fn test_within_bound(errors: &[f64], bound: f64) -> bool {
        within_bound(&with_errors(errors), bound)
    }

    #[test]
    fn test_error_summary() {
        let summary = ErrorSummary::from_summaries(&with_errors(&[0.004, 0.01, 0.007])).unwrap();
        assert!((summary.mean - 0.007).abs() < EPS);
        assert_eq!(summary.max, 0.01);
        assert_eq!(summary.min, 0.004);
        assert!(ErrorSummary::from_summaries(&[]).is_none());
    }

    fn record(run: u32, percentage: f64, exact_count: u64, hll_estimate: f64) -> RunRecord {
        RunRecord {
            run,
            percentage,
            exact_count,
            hll_estimate,
        }
    }

    #[test]
    fn test_runs_from_records_groups_unordered_rows() {
        let records = vec![
            record(2, 20.0, 200, 204.0),
            record(1, 20.0, 200, 198.0),
            record(1, 10.0, 100, 101.0),
            record(2, 10.0, 100, 99.0),
        ];
        let (cps, runs) = runs_from_records(&records).unwrap();
        assert_eq!(cps, vec![Checkpoint::new(10.0, 100), Checkpoint::new(20.0, 200)]);
        assert_eq!(
            runs,
            vec![
                StreamRun::new(vec![101.0, 198.0]),
                StreamRun::new(vec![99.0, 204.0]),
            ]
        );
        let out = summarize(&runs, &cps).unwrap();
        assert!((out[0].mean_estimate - 100.0).abs() < EPS);
        assert!((out[1].mean_estimate - 201.0).abs() < EPS);
    }

    #[test]
    fn test_runs_from_records_missing_checkpoint() {
        let records = vec![
            record(1, 10.0, 100, 101.0),
            record(1, 20.0, 200, 198.0),
            record(2, 10.0, 100, 99.0),
        ];
        let err = runs_from_records(&records).unwrap_err();
        assert!(matches!(err, ReportError::ShapeMismatch { ref detail, .. } if detail.contains("run 2")));
    }

    #[test]
    fn test_runs_from_records_exact_count_disagreement() {
        let records = vec![record(1, 10.0, 100, 101.0), record(2, 10.0, 101, 99.0)];
        let err = runs_from_records(&records).unwrap_err();
        assert!(matches!(err, ReportError::ShapeMismatch { ref detail, .. } if detail.contains("exact count")));
    }

    #[test]
    fn test_runs_from_records_duplicate_checkpoint() {
        let records = vec![record(1, 10.0, 100, 101.0), record(1, 10.0, 100, 99.0)];
        assert!(matches!(
            runs_from_records(&records),
            Err(ReportError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_runs_from_records_empty() {
        assert!(matches!(
            runs_from_records(&[]),
            Err(ReportError::ShapeMismatch { .. })
        ));
    }
}
