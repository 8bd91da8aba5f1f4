//! Data model shared by the summarizer, the table readers and the report.
//!
//! A [`Checkpoint`] is a point along stream processing (e.g. "10% processed")
//! with the true number of distinct elements seen so far. A [`StreamRun`] holds
//! the estimates a single simulation produced at each checkpoint, and a
//! [`CheckpointSummary`] aggregates all runs at one checkpoint.

use serde::{Deserialize, Serialize};

/// Point along stream processing at which accuracy is measured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Share of the stream processed, in `[0, 100]`.
    pub percentage: f64,
    /// True distinct-element count at this point.
    pub exact_count: u64,
}

impl Checkpoint {
    #[inline]
    pub fn new(percentage: f64, exact_count: u64) -> Self {
        Self {
            percentage,
            exact_count,
        }
    }
}

/// Estimates reported by one simulation run, one per checkpoint, in checkpoint order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamRun {
    pub estimates: Vec<f64>,
}

impl StreamRun {
    #[inline]
    pub fn new(estimates: Vec<f64>) -> Self {
        Self { estimates }
    }
}

impl From<Vec<f64>> for StreamRun {
    fn from(estimates: Vec<f64>) -> Self {
        Self::new(estimates)
    }
}

/// Aggregate of all runs at one checkpoint.
///
/// Field names double as the column names of the per-stream-average
/// statistics table, so a summary serializes straight into that table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSummary {
    pub percentage: f64,
    pub exact: u64,
    pub mean_estimate: f64,
    pub std_dev: f64,
    pub mean_error: f64,
}

impl CheckpointSummary {
    /// Lower edge of the `mean ± σ` uncertainty band, clamped at zero.
    #[inline]
    pub fn band_low(&self) -> f64 {
        (self.mean_estimate - self.std_dev).max(0.0)
    }

    /// Upper edge of the `mean ± σ` uncertainty band.
    #[inline]
    pub fn band_high(&self) -> f64 {
        self.mean_estimate + self.std_dev
    }
}

/// Estimate and error of the representative run at one checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamDetail {
    pub percentage: f64,
    pub exact_count: u64,
    pub hll_estimate: f64,
    pub error: f64,
}
