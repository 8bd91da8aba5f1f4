//! Chart documents for the three accuracy charts.
//!
//! Each chart is described as data: line series, uncertainty bands, bars,
//! horizontal reference lines and annotations, grouped into panels and
//! written as JSON next to the console report. Drawing pixels is left to
//! whatever consumes the documents. Each chart is built with its own
//! [`ChartStyle`], which is copied into every document it produces, so there
//! is no process-wide styling state.

use std::fs;
use std::path::{Path, PathBuf};

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bound::TheoreticalBound;
use crate::checkpoint::{CheckpointSummary, StreamDetail};
use crate::config::ExperimentConfig;
use crate::error::ReportError;

/// Checkpoints annotated with their error on the comparison chart.
const ANNOTATED_CHECKPOINTS: [f64; 3] = [10.0, 50.0, 100.0];
/// Headroom above the largest plotted error.
const ERROR_HEADROOM: f64 = 1.2;
const STREAM_AXIS: &str = "Stream processed (%)";
const COUNT_AXIS: &str = "Distinct elements";

/// Figure and palette settings handed to every chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartStyle {
    /// Figure size in inches, `[width, height]`.
    #[serde(default = "ChartStyle::default_figure_size")]
    pub figure_size: [f64; 2],
    #[serde(default = "ChartStyle::default_dpi")]
    pub dpi: u32,
    #[serde(default = "ChartStyle::default_font_size")]
    pub font_size: f64,
    #[serde(default = "ChartStyle::default_grid_alpha")]
    pub grid_alpha: f64,
    #[serde(default)]
    pub palette: Palette,
}

impl ChartStyle {
    fn default_figure_size() -> [f64; 2] {
        [14.0, 6.0]
    }
    fn default_dpi() -> u32 {
        300
    }
    fn default_font_size() -> f64 {
        10.0
    }
    fn default_grid_alpha() -> f64 {
        0.3
    }
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            figure_size: Self::default_figure_size(),
            dpi: Self::default_dpi(),
            font_size: Self::default_font_size(),
            grid_alpha: Self::default_grid_alpha(),
            palette: Palette::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub exact: String,
    pub estimate: String,
    pub error: String,
    pub standard_error: String,
    pub upper_bound: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            exact: "#2E86AB".into(),
            estimate: "#A23B72".into(),
            error: "#F18F01".into(),
            standard_error: "green".into(),
            upper_bound: "red".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartDocument {
    pub name: &'static str,
    pub style: ChartStyle,
    pub panels: Vec<Panel>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Panel {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x_limits: [f64; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_limits: Option<[f64; 2]>,
    pub series: Vec<Series>,
    pub bands: Vec<Band>,
    pub bars: Vec<Bar>,
    pub reference_lines: Vec<ReferenceLine>,
    pub annotations: Vec<Annotation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub label: String,
    pub color: String,
    pub points: Vec<[f64; 2]>,
}

/// Filled area between `low` and `high` over `x`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Band {
    pub label: String,
    pub color: String,
    pub x: Vec<f64>,
    pub low: Vec<f64>,
    pub high: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub x: f64,
    pub height: f64,
    pub width: f64,
    pub label: String,
}

/// Horizontal line at `y`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceLine {
    pub label: String,
    pub color: String,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub x: f64,
    pub y: f64,
    pub text: String,
}

#[enum_dispatch]
pub trait Chart {
    /// File stem of the written document.
    fn name(&self) -> &'static str;
    fn style(&self) -> &ChartStyle;
    fn panels(&self) -> Vec<Panel>;

    fn document(&self) -> ChartDocument {
        ChartDocument {
            name: self.name(),
            style: self.style().clone(),
            panels: self.panels(),
        }
    }
}

/// The three charts of an accuracy report.
#[enum_dispatch(Chart)]
#[derive(Debug, Clone)]
pub enum ChartKind {
    Comparison(ComparisonChart),
    Statistics(StatisticsChart),
    Accuracy(AccuracyChart),
}

/// Exact count against the estimate of the representative run, plus its relative error.
#[derive(Debug, Clone)]
pub struct ComparisonChart {
    pub rows: Vec<StreamDetail>,
    pub bound: TheoreticalBound,
    pub style: ChartStyle,
}

/// Exact count, mean estimate and the `mean ± σ` band over all runs.
#[derive(Debug, Clone)]
pub struct StatisticsChart {
    pub summaries: Vec<CheckpointSummary>,
    pub bound: TheoreticalBound,
    pub streams: u32,
    pub stream_size: u64,
    pub style: ChartStyle,
}

/// Mean relative error per checkpoint as bars against the theoretical bounds.
#[derive(Debug, Clone)]
pub struct AccuracyChart {
    pub summaries: Vec<CheckpointSummary>,
    pub bound: TheoreticalBound,
    pub style: ChartStyle,
}

fn bound_lines(bound: &TheoreticalBound, palette: &Palette) -> Vec<ReferenceLine> {
    vec![
        ReferenceLine {
            label: format!(
                "Theoretical bound 1.04/√m ({:.2}%)",
                bound.standard_error * 100.0
            ),
            color: palette.standard_error.clone(),
            y: bound.standard_error * 100.0,
        },
        ReferenceLine {
            label: format!("Theoretical bound 1.32/√m ({:.2}%)", bound.upper_bound * 100.0),
            color: palette.upper_bound.clone(),
            y: bound.upper_bound * 100.0,
        },
    ]
}

impl Chart for ComparisonChart {
    fn name(&self) -> &'static str {
        "graph1_comparison"
    }

    fn style(&self) -> &ChartStyle {
        &self.style
    }

    fn panels(&self) -> Vec<Panel> {
        let palette = &self.style.palette;
        let points = |f: fn(&StreamDetail) -> f64| -> Vec<[f64; 2]> {
            self.rows.iter().map(|r| [r.percentage, f(r)]).collect()
        };

        let annotations = self
            .rows
            .iter()
            .filter(|r| ANNOTATED_CHECKPOINTS.contains(&r.percentage))
            .map(|r| Annotation {
                x: r.percentage,
                y: r.hll_estimate,
                text: format!("{:.1}% error", r.error * 100.0),
            })
            .collect();

        let absolute = Panel {
            title: "Exact count vs HyperLogLog estimate".into(),
            x_label: STREAM_AXIS.into(),
            y_label: COUNT_AXIS.into(),
            x_limits: [0.0, 105.0],
            series: vec![
                Series {
                    label: "Exact F0".into(),
                    color: palette.exact.clone(),
                    points: points(|r| r.exact_count as f64),
                },
                Series {
                    label: "HLL estimate".into(),
                    color: palette.estimate.clone(),
                    points: points(|r| r.hll_estimate),
                },
            ],
            annotations,
            ..Panel::default()
        };

        let max_error = self
            .rows
            .iter()
            .map(|r| r.error * 100.0)
            .fold(self.bound.upper_bound * 100.0, f64::max);
        let relative = Panel {
            title: "HyperLogLog relative error".into(),
            x_label: STREAM_AXIS.into(),
            y_label: "Relative error (%)".into(),
            x_limits: [0.0, 105.0],
            y_limits: Some([0.0, max_error * ERROR_HEADROOM]),
            series: vec![Series {
                label: "Relative error".into(),
                color: palette.error.clone(),
                points: points(|r| r.error * 100.0),
            }],
            reference_lines: bound_lines(&self.bound, palette),
            ..Panel::default()
        };

        vec![absolute, relative]
    }
}

/// `1000000` -> `1,000,000`
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

impl Chart for StatisticsChart {
    fn name(&self) -> &'static str {
        "graph2_statistics"
    }

    fn style(&self) -> &ChartStyle {
        &self.style
    }

    fn panels(&self) -> Vec<Panel> {
        let palette = &self.style.palette;
        let x: Vec<f64> = self.summaries.iter().map(|s| s.percentage).collect();

        let text = format!(
            "Parameters:\nB = {} ({} registers)\nStreams: {}\nStream size: {}\n\n\
             Theoretical error:\n1.04/√m = {:.2}%\n1.32/√m = {:.2}%",
            self.bound.precision,
            self.bound.registers,
            self.streams,
            group_thousands(self.stream_size),
            self.bound.standard_error * 100.0,
            self.bound.upper_bound * 100.0,
        );

        vec![Panel {
            title: format!(
                "HyperLogLog estimate statistics over {} streams\nMean and standard deviation",
                self.streams
            ),
            x_label: STREAM_AXIS.into(),
            y_label: COUNT_AXIS.into(),
            x_limits: [0.0, 105.0],
            series: vec![
                Series {
                    label: "Exact F0".into(),
                    color: palette.exact.clone(),
                    points: self
                        .summaries
                        .iter()
                        .map(|s| [s.percentage, s.exact as f64])
                        .collect(),
                },
                Series {
                    label: "E(Nt) mean estimate".into(),
                    color: palette.estimate.clone(),
                    points: self
                        .summaries
                        .iter()
                        .map(|s| [s.percentage, s.mean_estimate])
                        .collect(),
                },
            ],
            bands: vec![Band {
                label: "E(Nt) ± σ".into(),
                color: palette.estimate.clone(),
                x,
                low: self.summaries.iter().map(CheckpointSummary::band_low).collect(),
                high: self.summaries.iter().map(CheckpointSummary::band_high).collect(),
            }],
            text: Some(text),
            ..Panel::default()
        }]
    }
}

impl Chart for AccuracyChart {
    fn name(&self) -> &'static str {
        "graph3_accuracy"
    }

    fn style(&self) -> &ChartStyle {
        &self.style
    }

    fn panels(&self) -> Vec<Panel> {
        let bars = self
            .summaries
            .iter()
            .map(|s| Bar {
                x: s.percentage,
                height: s.mean_error * 100.0,
                width: 7.0,
                label: format!("{:.2}%", s.mean_error * 100.0),
            })
            .collect();

        vec![Panel {
            title: "Mean HyperLogLog accuracy along the stream".into(),
            x_label: STREAM_AXIS.into(),
            y_label: "Mean relative error (%)".into(),
            x_limits: [0.0, 110.0],
            bars,
            reference_lines: bound_lines(&self.bound, &self.style.palette),
            ..Panel::default()
        }]
    }
}

/// Build the three report charts from the ingested tables, all sharing `style`.
pub fn report_charts(
    single_stream: &[StreamDetail],
    statistics: &[CheckpointSummary],
    bound: TheoreticalBound,
    experiment: &ExperimentConfig,
    style: &ChartStyle,
) -> Vec<ChartKind> {
    vec![
        ComparisonChart {
            rows: single_stream.to_vec(),
            bound,
            style: style.clone(),
        }
        .into(),
        StatisticsChart {
            summaries: statistics.to_vec(),
            bound,
            streams: experiment.streams,
            stream_size: experiment.stream_size,
            style: style.clone(),
        }
        .into(),
        AccuracyChart {
            summaries: statistics.to_vec(),
            bound,
            style: style.clone(),
        }
        .into(),
    ]
}

fn write_error(path: &Path, source: std::io::Error) -> ReportError {
    ReportError::Write {
        path: path.to_path_buf(),
        source,
    }
}

/// Write every document as `<out_dir>/<name>.json` and return the paths.
///
/// Either all documents end up in place or none does: each one is first
/// staged as a hidden `.<name>.json.tmp` file, and the staged files are only
/// renamed onto their targets once every document has been written. On
/// failure, staged files and targets renamed so far are removed.
pub fn write_documents(
    documents: &[ChartDocument],
    out_dir: &Path,
) -> Result<Vec<PathBuf>, ReportError> {
    fs::create_dir_all(out_dir).map_err(|source| write_error(out_dir, source))?;
    let paths: Vec<(PathBuf, PathBuf)> = documents
        .iter()
        .map(|document| {
            (
                out_dir.join(format!(".{}.json.tmp", document.name)),
                out_dir.join(format!("{}.json", document.name)),
            )
        })
        .collect();

    let mut committed = Vec::with_capacity(paths.len());
    if let Err(err) = stage_and_commit(documents, &paths, &mut committed) {
        for (staged, _) in &paths {
            // absent when staging stopped early or the rename went through
            let _ = fs::remove_file(staged);
        }
        for target in &committed {
            if let Err(cleanup) = fs::remove_file(target) {
                warn!(path = %target.display(), %cleanup, "could not remove chart");
            }
        }
        return Err(err);
    }

    for (document, target) in documents.iter().zip(&committed) {
        info!(chart = document.name, path = %target.display(), "chart saved");
    }
    Ok(committed)
}

fn stage_and_commit(
    documents: &[ChartDocument],
    paths: &[(PathBuf, PathBuf)],
    committed: &mut Vec<PathBuf>,
) -> Result<(), ReportError> {
    for (document, (staged, _)) in documents.iter().zip(paths) {
        let bytes = serde_json::to_vec_pretty(document)?;
        fs::write(staged, bytes).map_err(|source| write_error(staged, source))?;
    }
    for (staged, target) in paths {
        fs::rename(staged, target).map_err(|source| write_error(target, source))?;
        committed.push(target.clone());
    }
    Ok(())
}
