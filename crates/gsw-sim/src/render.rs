//! SVG histograms of stored Geweke results.

use std::fs;
use std::path::PathBuf;

use clap::ValueEnum;
use gsw_core::errors::SweepError;
use gsw_pool::Task;
use gsw_run::PlotJob;
use gsw_store::ResultStore;
use serde::{Deserialize, Serialize};

use crate::geweke::{ColumnChains, GewekeResult};

/// Name of the render task.
pub const RENDER_TASK: &str = "render-geweke";

const FORWARD_FILL: &str = "#3b82f6";
const POSTERIOR_FILL: &str = "#f97316";
const TITLE_HEIGHT: u32 = 18;

/// How bar heights are scaled.
///
/// Applied the same way to every column type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HistogramNorm {
    /// Count divided by sample size and bin width.
    #[default]
    Density,
    /// Raw counts.
    Counts,
}

impl HistogramNorm {
    /// Flag value of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            HistogramNorm::Density => "density",
            HistogramNorm::Counts => "counts",
        }
    }
}

/// Panel geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureConfig {
    /// Panel width in pixels.
    pub width: u32,
    /// Panel height in pixels, title excluded.
    pub height: u32,
    /// Bins shared by both chains of a column.
    pub bins: usize,
}

impl Default for FigureConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 160,
            bins: 16,
        }
    }
}

/// Render options, fixed for a whole plotting phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOpts {
    /// Bar height scaling.
    pub norm: HistogramNorm,
    /// Panel geometry.
    pub figure: FigureConfig,
}

/// Heights of one sample over shared bins.
pub fn histogram(values: &[f64], min: f64, span: f64, bins: usize, norm: HistogramNorm) -> Vec<f64> {
    let bins = bins.max(1);
    let mut counts = vec![0usize; bins];
    for value in values {
        let idx = ((value - min) / span * bins as f64).floor().max(0.0) as usize;
        counts[idx.min(bins - 1)] += 1;
    }
    match norm {
        HistogramNorm::Counts => counts.into_iter().map(|count| count as f64).collect(),
        HistogramNorm::Density => {
            let scale = values.len().max(1) as f64 * (span / bins as f64);
            counts.into_iter().map(|count| count as f64 / scale).collect()
        }
    }
}

fn bounds(column: &ColumnChains) -> (f64, f64) {
    let values = column.forward.iter().chain(&column.posterior).copied();
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), val| {
        (lo.min(val), hi.max(val))
    });
    if min.is_finite() && max.is_finite() {
        (min, (max - min).max(1e-9))
    } else {
        (0.0, 1.0)
    }
}

fn bars(parts: &mut Vec<String>, heights: &[f64], top: f64, y0: f64, opts: &RenderOpts, fill: &str) {
    let figure = opts.figure;
    let bar_width = figure.width as f64 / heights.len().max(1) as f64;
    for (idx, height) in heights.iter().enumerate() {
        let scaled = if top > 0.0 {
            height / top * figure.height as f64
        } else {
            0.0
        };
        parts.push(format!(
            "<rect x='{:.2}' y='{:.2}' width='{:.2}' height='{:.2}' fill='{}' fill-opacity='0.5' />",
            bar_width * idx as f64,
            y0 + figure.height as f64 - scaled,
            bar_width.max(1.0),
            scaled,
            fill
        ));
    }
}

/// One panel per column, forward and posterior histograms overlaid.
pub fn render_result_svg(result: &GewekeResult, title: &str, opts: &RenderOpts) -> String {
    let figure = opts.figure;
    let panel_height = figure.height + TITLE_HEIGHT;
    let total_height = TITLE_HEIGHT + panel_height * result.columns.len() as u32;
    let mut parts = vec![
        format!(
            "<svg xmlns='http://www.w3.org/2000/svg' width='{w}' height='{h}'>",
            w = figure.width,
            h = total_height
        ),
        format!(
            "<text x='2' y='13' font-size='11'>{} (max ks={:.3}, {})</text>",
            escape(title),
            result.max_ks_distance,
            opts.norm.as_str()
        ),
    ];
    for (panel, column) in result.columns.iter().enumerate() {
        let top_y = (TITLE_HEIGHT + panel_height * panel as u32) as f64;
        let (min, span) = bounds(column);
        let forward = histogram(&column.forward, min, span, figure.bins, opts.norm);
        let posterior = histogram(&column.posterior, min, span, figure.bins, opts.norm);
        let top = forward.iter().chain(&posterior).copied().fold(0.0, f64::max);
        parts.push(format!(
            "<text x='2' y='{:.2}' font-size='10'>column {} {} ks={:.3}</text>",
            top_y + 13.0,
            column.column,
            column.cctype,
            column.ks_distance
        ));
        let y0 = top_y + TITLE_HEIGHT as f64;
        bars(&mut parts, &forward, top, y0, opts, FORWARD_FILL);
        bars(&mut parts, &posterior, top, y0, opts, POSTERIOR_FILL);
    }
    parts.push("</svg>".into());
    parts.join("")
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Reads one stored result and writes `<out_dir>/<key>.svg`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderTask {
    opts: RenderOpts,
}

impl RenderTask {
    /// Renderer using `opts` for every result.
    pub fn new(opts: RenderOpts) -> Self {
        Self { opts }
    }
}

impl Task for RenderTask {
    type Input = PlotJob;
    type Output = PathBuf;

    fn name(&self) -> &str {
        RENDER_TASK
    }

    fn run(&self, job: PlotJob) -> Result<PathBuf, SweepError> {
        let stored = ResultStore::open(&job.root)?.read::<GewekeResult>(&job.key)?;
        let svg = render_result_svg(&stored.result, job.key.as_str(), &self.opts);
        let path = job.out_dir.join(format!("{}.svg", job.key));
        fs::write(&path, svg).map_err(|err| {
            SweepError::store_io("plot_write", err).with_context("path", path.display().to_string())
        })?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsw_config::{ColumnType, GewekeParams};

    fn result() -> GewekeResult {
        let column = |column, cctype| ColumnChains {
            column,
            cctype,
            forward: vec![0.0, 0.5, 0.5, 1.0],
            posterior: vec![0.25, 0.5, 0.75, 1.0],
            ks_distance: 0.25,
        };
        GewekeResult {
            params: GewekeParams {
                gen_seed: 0,
                num_rows: 4,
                num_iters: 4,
                num_multinomial_values: 2,
                cctypes: vec![ColumnType::Continuous, ColumnType::Multinomial],
            },
            columns: vec![
                column(0, ColumnType::Continuous),
                column(1, ColumnType::Multinomial),
            ],
            max_ks_distance: 0.25,
        }
    }

    #[test]
    fn counts_sum_to_sample_size() {
        let heights = histogram(&[0.0, 0.1, 0.9, 1.0], 0.0, 1.0, 4, HistogramNorm::Counts);
        assert_eq!(heights, vec![2.0, 0.0, 0.0, 2.0]);
    }

    #[test]
    fn density_integrates_to_one() {
        let values = [0.0, 0.2, 0.4, 0.6, 0.8, 1.0];
        let heights = histogram(&values, 0.0, 1.0, 5, HistogramNorm::Density);
        let area: f64 = heights.iter().map(|height| height * 0.2).sum();
        assert!((area - 1.0).abs() < 1e-12);
    }

    #[test]
    fn every_column_gets_a_panel() {
        let svg = render_result_svg(&result(), "k", &RenderOpts::default());
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("column 0 continuous"));
        assert!(svg.contains("column 1 multinomial"));
        let bars = svg.matches("<rect").count();
        assert_eq!(bars, 2 * 2 * FigureConfig::default().bins);
    }

    #[test]
    fn norm_is_named_in_the_title() {
        let opts = RenderOpts {
            norm: HistogramNorm::Counts,
            ..RenderOpts::default()
        };
        assert!(render_result_svg(&result(), "k", &opts).contains("counts"));
    }
}
