use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::bound::TheoreticalBound;
use crate::chart::ChartStyle;
use crate::error::ReportError;

/// Settings of a report run. Every field has a default matching the reference
/// experiment (B = 14, 10 streams of 1,000,000 elements).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "ReportConfig::default_statistics")]
    pub statistics: PathBuf,
    #[serde(default = "ReportConfig::default_single_stream")]
    pub single_stream: PathBuf,
    #[serde(default = "ReportConfig::default_out_dir")]
    pub out_dir: PathBuf,
    #[serde(default)]
    pub experiment: ExperimentConfig,
    #[serde(default)]
    pub style: ChartStyle,
}

/// Parameters of the simulation that produced the tables. They are only
/// reported, except `precision`, which determines the theoretical bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    #[serde(default = "ExperimentConfig::default_precision")]
    pub precision: u8,
    #[serde(default = "ExperimentConfig::default_streams")]
    pub streams: u32,
    #[serde(default = "ExperimentConfig::default_stream_size")]
    pub stream_size: u64,
    /// Explicit compliance threshold; the `1.32 / sqrt(m)` bound when absent.
    #[serde(default)]
    pub bound: Option<f64>,
}

impl ExperimentConfig {
    fn default_precision() -> u8 {
        14
    }
    fn default_streams() -> u32 {
        10
    }
    fn default_stream_size() -> u64 {
        1_000_000
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            precision: Self::default_precision(),
            streams: Self::default_streams(),
            stream_size: Self::default_stream_size(),
            bound: None,
        }
    }
}

impl ReportConfig {
    fn default_statistics() -> PathBuf {
        PathBuf::from("statistics.csv")
    }
    fn default_single_stream() -> PathBuf {
        PathBuf::from("single_stream.csv")
    }
    fn default_out_dir() -> PathBuf {
        PathBuf::from(".")
    }

    /// Load a TOML config. Missing keys fall back to their defaults.
    pub fn load(path: &Path) -> Result<Self, ReportError> {
        let text = fs::read_to_string(path).map_err(|source| ReportError::MissingInput {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|err| ReportError::Config {
            path: path.to_path_buf(),
            detail: err.to_string(),
        })
    }

    /// Bounds implied by the configured precision.
    pub fn theoretical_bound(&self) -> Result<TheoreticalBound, ReportError> {
        TheoreticalBound::for_precision(self.experiment.precision)
    }

    /// Threshold the maximum mean error is checked against.
    pub fn compliance_bound(&self) -> Result<f64, ReportError> {
        match self.experiment.bound {
            Some(bound) if bound.is_finite() && bound > 0.0 => Ok(bound),
            Some(bound) => Err(ReportError::InvalidSetting(format!(
                "bound {bound} must be a positive number"
            ))),
            None => Ok(self.theoretical_bound()?.upper_bound),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            statistics: Self::default_statistics(),
            single_stream: Self::default_single_stream(),
            out_dir: Self::default_out_dir(),
            experiment: ExperimentConfig::default(),
            style: ChartStyle::default(),
        }
    }
}
