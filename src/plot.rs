//! Line plots drawn with `plotters` on an in-memory bitmap.
//!
//! A [`LinePlot`] carries a title, axis descriptions, grey reference lines
//! and a legend. Rendering goes through `BitMapBackend::with_buffer` and the
//! buffer is saved with `image`, so the file format (PNG or JPEG) follows
//! the output extension.
//!
//! Text needs a system sans-serif font. [`LinePlot::without_text`] draws only
//! the axes, reference lines and series.
use anyhow::{anyhow, bail, Context, Result};
use image::RgbImage;
use log::info;
use ndarray::{Array2, Axis};
use plotters::prelude::*;
use plotters::style::Color as _;
use std::path::Path;

use crate::decode::DecodingCurve;
use crate::evoked::Evoked;

pub type Color = RGBColor;

pub const GREY: Color = RGBColor(128, 128, 128);
pub const INDIGO: Color = RGBColor(75, 0, 130);
pub const DARKORCHID: Color = RGBColor(153, 50, 204);
pub const PLUM: Color = RGBColor(221, 160, 221);
pub const PINK: Color = RGBColor(255, 192, 203);
pub const PALEVIOLETRED: Color = RGBColor(219, 112, 147);
pub const STEELBLUE: Color = RGBColor(70, 130, 180);

/// Colours of the phonetic-feature curves, in feature order.
pub const FEATURE_COLORS: [Color; 5] = [INDIGO, DARKORCHID, PLUM, PINK, PALEVIOLETRED];

#[derive(Debug, Clone)]
pub struct Series {
    pub label: String,
    pub color: Color,
    pub x:     Vec<f64>,
    pub y:     Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct LinePlot {
    pub width:   u32,
    pub height:  u32,
    pub title:   String,
    pub x_desc:  String,
    pub y_desc:  String,
    pub x_range: Option<(f64, f64)>,
    pub y_range: Option<(f64, f64)>,
    pub hlines:  Vec<f64>,
    pub vlines:  Vec<f64>,
    pub series:  Vec<Series>,
    /// Draw caption, tick labels, axis descriptions and legend.
    pub text:    bool,
    /// Legend entry per series; off for plots with one trace per channel.
    pub legend:  bool,
}

fn finite_range<'a>(values: impl Iterator<Item = &'a f64>) -> Option<(f64, f64)> {
    values.filter(|v| v.is_finite()).fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

fn widen((lo, hi): (f64, f64)) -> (f64, f64) {
    if hi > lo { (lo, hi) } else { (lo - 1.0, hi + 1.0) }
}

/// Maximal runs of consecutive finite points.
fn finite_runs(x: &[f64], y: &[f64]) -> Vec<Vec<(f64, f64)>> {
    let mut runs = vec![Vec::new()];
    for (&a, &b) in x.iter().zip(y) {
        if a.is_finite() && b.is_finite() {
            if let Some(run) = runs.last_mut() {
                run.push((a, b));
            }
        } else if runs.last().is_some_and(|r| !r.is_empty()) {
            runs.push(Vec::new());
        }
    }
    runs.retain(|r| r.len() > 1);
    runs
}

fn draw_err(e: impl std::fmt::Display) -> anyhow::Error {
    anyhow!("drawing plot: {e}")
}

impl LinePlot {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            title: String::new(),
            x_desc: String::new(),
            y_desc: String::new(),
            x_range: None,
            y_range: None,
            hlines: Vec::new(),
            vlines: Vec::new(),
            series: Vec::new(),
            text: true,
            legend: true,
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn axes(mut self, x_desc: &str, y_desc: &str) -> Self {
        self.x_desc = x_desc.to_string();
        self.y_desc = y_desc.to_string();
        self
    }

    pub fn y_range(mut self, lo: f64, hi: f64) -> Self {
        self.y_range = Some((lo, hi));
        self
    }

    pub fn hline(mut self, y: f64) -> Self {
        self.hlines.push(y);
        self
    }

    pub fn vline(mut self, x: f64) -> Self {
        self.vlines.push(x);
        self
    }

    pub fn without_text(mut self) -> Self {
        self.text = false;
        self
    }

    pub fn without_legend(mut self) -> Self {
        self.legend = false;
        self
    }

    pub fn add_series(&mut self, label: &str, color: Color, x: Vec<f64>, y: Vec<f64>) {
        self.series.push(Series { label: label.to_string(), color, x, y });
    }

    fn ranges(&self) -> Result<((f64, f64), (f64, f64))> {
        let x = self.x_range
            .or_else(|| finite_range(self.series.iter().flat_map(|s| s.x.iter())))
            .context("nothing to plot")?;
        let y = self.y_range
            .or_else(|| finite_range(self.series.iter().flat_map(|s| s.y.iter())))
            .context("nothing to plot")?;
        Ok((widen(x), widen(y)))
    }

    /// Draw into an RGB image. Non-finite points split a series into
    /// separate segments.
    pub fn render(&self) -> Result<RgbImage> {
        if self.width < 40 || self.height < 40 {
            bail!("plot {}x{} is too small", self.width, self.height);
        }
        for s in &self.series {
            if s.x.len() != s.y.len() {
                bail!("series '{}' has {} x and {} y values", s.label, s.x.len(), s.y.len());
            }
        }
        let ((x0, x1), (y0, y1)) = self.ranges()?;

        let mut buf = vec![0u8; self.width as usize * self.height as usize * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buf, (self.width, self.height)).into_drawing_area();
            root.fill(&WHITE).map_err(draw_err)?;

            let mut builder = ChartBuilder::on(&root);
            builder.margin(12);
            if self.text {
                if !self.title.is_empty() {
                    builder.caption(&self.title, ("sans-serif", 22).into_font());
                }
                builder.x_label_area_size(45).y_label_area_size(60);
            }
            let mut chart = builder.build_cartesian_2d(x0..x1, y0..y1).map_err(draw_err)?;

            if self.text {
                chart.configure_mesh()
                    .disable_x_mesh()
                    .disable_y_mesh()
                    .x_desc(self.x_desc.as_str())
                    .y_desc(self.y_desc.as_str())
                    .draw()
                    .map_err(draw_err)?;
            } else {
                let axes = [
                    vec![(x0, y0), (x1, y0)],
                    vec![(x0, y0), (x0, y1)],
                ];
                for axis in axes {
                    chart.draw_series(LineSeries::new(axis, &BLACK)).map_err(draw_err)?;
                }
            }

            for &y in &self.hlines {
                chart.draw_series(LineSeries::new([(x0, y), (x1, y)], &GREY)).map_err(draw_err)?;
            }
            for &x in &self.vlines {
                chart.draw_series(LineSeries::new([(x, y0), (x, y1)], &GREY)).map_err(draw_err)?;
            }

            let mut labelled = false;
            for s in &self.series {
                let color = s.color;
                for (i, run) in finite_runs(&s.x, &s.y).into_iter().enumerate() {
                    let anno = chart
                        .draw_series(LineSeries::new(run, ShapeStyle::from(&color).stroke_width(1)))
                        .map_err(draw_err)?;
                    if i == 0 && self.legend {
                        anno.label(s.label.as_str())
                            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
                        labelled = true;
                    }
                }
            }
            if self.text && labelled {
                chart.configure_series_labels()
                    .background_style(WHITE.mix(0.8))
                    .border_style(BLACK)
                    .position(SeriesLabelPosition::UpperRight)
                    .draw()
                    .map_err(draw_err)?;
            }
            root.present().map_err(draw_err)?;
        }
        RgbImage::from_raw(self.width, self.height, buf).context("plot buffer has the wrong size")
    }

    /// Render and write; the extension selects PNG or JPEG.
    pub fn save(&self, path: &Path) -> Result<()> {
        let img = self.render()?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        img.save(path).with_context(|| format!("writing {}", path.display()))?;
        info!("saved {}", path.display());
        Ok(())
    }
}

/// ROC-AUC curves over time (ms) with chance and onset reference lines.
pub fn decoding_plot(curves: &[DecodingCurve], subject: &str) -> LinePlot {
    let mut plot = LinePlot::new(1000, 500)
        .title(&format!("Decoding Accuracy for {subject}"))
        .axes("Time (ms) relative to phoneme onset", "ROC-AUC")
        .y_range(0.45, 0.75)
        .hline(0.5)
        .vline(0.0);
    for (curve, color) in curves.iter().zip(FEATURE_COLORS.iter().cycle()) {
        let ms = curve.times.iter().map(|t| t * 1000.0).collect();
        plot.add_series(&curve.label, *color, ms, curve.scores.clone());
    }
    plot
}

pub fn plot_decoding_curves(curves: &[DecodingCurve], subject: &str, path: &Path) -> Result<()> {
    decoding_plot(curves, subject).save(path)
}

/// Butterfly plot of every channel of an evoked response, plus its global
/// field power in black.
pub fn plot_evoked(evoked: &Evoked, title: &str, path: &Path) -> Result<()> {
    let times: Vec<f64> = evoked.times().iter().map(|t| t * 1000.0).collect();
    let mut plot = LinePlot::new(1000, 500)
        .title(title)
        .axes("Time (ms)", "Amplitude")
        .hline(0.0)
        .vline(0.0)
        .without_legend();
    for (name, row) in evoked.ch_names.iter().zip(evoked.data.axis_iter(Axis(0))) {
        plot.add_series(name, STEELBLUE, times.clone(), row.to_vec());
    }
    plot.add_series("GFP", BLACK, times, evoked.global_field_power().to_vec());
    plot.save(path)
}

/// Component time courses stacked vertically, each scaled to unit range.
pub fn plot_sources(sources: &Array2<f64>, sfreq: f64, title: &str, path: &Path) -> Result<()> {
    let n_t = sources.ncols();
    let times: Vec<f64> = (0..n_t).map(|t| t as f64 / sfreq).collect();
    let k = sources.nrows();
    let mut plot = LinePlot::new(1000, (60 * k as u32).max(200) + 100)
        .title(title)
        .axes("Time (s)", "Component")
        .y_range(-1.0, k as f64)
        .without_legend();
    for (i, row) in sources.axis_iter(Axis(0)).enumerate() {
        let peak = row.iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(f64::MIN_POSITIVE);
        let offset = (k - 1 - i) as f64;
        let y: Vec<f64> = row.iter().map(|v| offset + 0.45 * v / peak).collect();
        plot.add_series(&format!("ICA{i:03}"), INDIGO, times.clone(), y);
    }
    plot.save(path)
}
