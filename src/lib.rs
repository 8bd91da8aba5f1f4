//! `hll-accuracy-report` summarizes and reports how accurately a HyperLogLog
//! estimator tracks the true number of distinct elements as a stream is processed.
//!
//! The estimator and its simulation harness run elsewhere and persist their
//! results as tables. This crate turns per-run estimates into per-checkpoint
//! statistics, checks the measured error against the theoretical bound, prints
//! a console report and emits the data behind the accuracy charts.
pub mod bound;
pub mod chart;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod summarizer;
pub mod table;

pub use checkpoint::{Checkpoint, CheckpointSummary, StreamDetail, StreamRun};
pub use error::ReportError;
pub use summarizer::{relative_error, summarize, within_bound};
