//! Artifact detection: statistical thresholding, artifact spans, noisy
//! electrodes and eye blinks.
//!
//! All thresholds compare with a strict `>`, so a value exactly at the limit
//! is never flagged. Moments are population moments (`ddof = 0`).
//!
//! # Window step
//!
//! The span extractor slides a window of `T / 2` samples. Historically the
//! procedure was described as using 50 % overlap but stepped by the full
//! window length. Both behaviours are available through [`WindowStep`] and
//! the active one is logged on every call.
use log::{debug, info, warn};
use ndarray::{s, Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::config::ArtifactConfig;
use crate::recording::Recording;
use crate::stats::{channel_stats, mean_std, pearson, ChannelStats};

// ── Thresholder ───────────────────────────────────────────────────────────

/// Recording-wide limit of one channel: `|x − mean| > k · std` is flagged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelThreshold {
    pub mean:  f64,
    pub std:   f64,
    pub limit: f64,
}

impl ChannelThreshold {
    pub fn new(stats: ChannelStats, k: f64) -> Self {
        Self { mean: stats.mean, std: stats.std, limit: k * stats.std }
    }

    #[inline]
    pub fn exceeds(&self, x: f64) -> bool {
        (x - self.mean).abs() > self.limit
    }
}

/// Per-channel thresholds for a `[C, T]` matrix.
///
/// A zero-variance channel gets a zero limit; its deviations are all exactly
/// zero, so it is never flagged.
pub fn channel_thresholds(data: &Array2<f64>, k: f64) -> Vec<ChannelThreshold> {
    channel_stats(data).into_iter().map(|s| ChannelThreshold::new(s, k)).collect()
}

/// Sample indices of `row` that exceed `threshold`.
pub fn flagged_samples(row: ArrayView1<'_, f64>, threshold: &ChannelThreshold) -> Vec<usize> {
    row.iter()
        .enumerate()
        .filter(|(_, &x)| threshold.exceeds(x))
        .map(|(t, _)| t)
        .collect()
}

/// Channels whose variance exceeds `mean(var) + k · std(var)` across channels.
pub fn high_variance_channels(data: &Array2<f64>, k: f64) -> Vec<usize> {
    let vars: Array1<f64> = channel_stats(data).iter().map(|s| s.var).collect();
    let (mean, std) = mean_std(&vars);
    let limit = mean + k * std;
    vars.iter()
        .enumerate()
        .filter(|(_, &v)| v > limit)
        .map(|(c, _)| c)
        .collect()
}

// ── Artifact span ─────────────────────────────────────────────────────────

/// Half-open sample range `[start, end)` holding detected artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArtifactSpan {
    pub start: usize,
    pub end:   usize,
}

impl ArtifactSpan {
    pub fn start_secs(&self, sfreq: f64) -> f64 {
        self.start as f64 / sfreq
    }

    pub fn end_secs(&self, sfreq: f64) -> f64 {
        self.end as f64 / sfreq
    }

    pub fn contains(&self, sample: usize) -> bool {
        self.start <= sample && sample < self.end
    }

    /// Whether the span intersects the inclusive range `[lo, hi]`.
    pub fn overlaps(&self, lo: usize, hi: usize) -> bool {
        self.start <= hi && lo < self.end
    }
}

/// How far the detection window advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStep {
    /// Step by the full window length (windows do not overlap).
    #[default]
    Contiguous,
    /// Step by half a window (50 % overlap).
    HalfOverlap,
}

/// Which channels are inspected window by window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelScreen {
    /// Every channel with non-zero variance.
    #[default]
    AllChannels,
    /// Only channels selected by [`high_variance_channels`].
    VarianceOutliers,
}

/// Where the per-channel mean and std of the threshold come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdScope {
    /// Whole-recording moments; a short burst cannot raise its own limit.
    #[default]
    Recording,
    /// Moments of the samples inside each window.
    Window,
}

/// Start offsets of the detection windows over `n` samples.
pub fn window_starts(n: usize, step: WindowStep) -> (usize, Vec<usize>) {
    let len = (n / 2).max(1);
    let stride = match step {
        WindowStep::Contiguous => len,
        WindowStep::HalfOverlap => (len / 2).max(1),
    };
    (len, (0..n).step_by(stride).collect())
}

/// Report the first-to-last range of flagged windows.
///
/// Windows are `T / 2` samples long; a window is flagged when any screened
/// channel has a sample beyond its limit. Disjoint artifacts collapse into a
/// single span. Returns `None` when no window is flagged.
pub fn detect_artifact_span(data: &Array2<f64>, cfg: &ArtifactConfig) -> Option<ArtifactSpan> {
    let n = data.ncols();
    if n == 0 {
        return None;
    }
    info!("artifact span: window step {:?}, screen {:?}, threshold scope {:?}, k = {}",
        cfg.window_step, cfg.screen, cfg.scope, cfg.threshold_factor);

    let k = cfg.threshold_factor;
    let global = channel_thresholds(data, k);
    let channels: Vec<usize> = match cfg.screen {
        ChannelScreen::AllChannels => (0..data.nrows()).filter(|&c| global[c].std > 0.0).collect(),
        ChannelScreen::VarianceOutliers => high_variance_channels(data, k),
    };
    debug!("screened channels: {channels:?}");

    let (len, starts) = window_starts(n, cfg.window_step);
    let mut span: Option<ArtifactSpan> = None;
    for start in starts {
        let end = (start + len).min(n);
        let hit = channels.iter().any(|&c| {
            let window = data.slice(s![c, start..end]);
            let threshold = match cfg.scope {
                ThresholdScope::Recording => global[c],
                ThresholdScope::Window => ChannelThreshold::new(ChannelStats::of(window), k),
            };
            window.iter().any(|&x| threshold.exceeds(x))
        });
        if hit {
            span = Some(match span {
                None => ArtifactSpan { start, end },
                Some(prev) => ArtifactSpan { start: prev.start, end },
            });
        }
    }
    span
}

// ── Abnormal segments ─────────────────────────────────────────────────────

/// First and last flagged sample of one channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbnormalSegment {
    pub channel:  usize,
    pub start:    usize,
    pub end:      usize,
}

impl AbnormalSegment {
    pub fn start_ms(&self, sfreq: f64) -> f64 {
        self.start as f64 * 1000.0 / sfreq
    }

    pub fn end_ms(&self, sfreq: f64) -> f64 {
        self.end as f64 * 1000.0 / sfreq
    }
}

/// Per channel, the first and last sample beyond `k · std` of that channel.
pub fn abnormal_segments(data: &Array2<f64>, k: f64) -> Vec<AbnormalSegment> {
    channel_thresholds(data, k)
        .iter()
        .zip(data.axis_iter(Axis(0)))
        .enumerate()
        .filter_map(|(channel, (th, row))| {
            let hits = flagged_samples(row, th);
            Some(AbnormalSegment { channel, start: *hits.first()?, end: *hits.last()? })
        })
        .collect()
}

// ── Bad electrodes ────────────────────────────────────────────────────────

/// Names of channels whose absolute mean exceeds `k` times the average
/// channel standard deviation.
pub fn detect_bad_channels(rec: &Recording, k: f64) -> Vec<String> {
    let stats = channel_stats(&rec.data);
    if stats.is_empty() {
        return Vec::new();
    }
    let avg_std = stats.iter().map(|s| s.std).sum::<f64>() / stats.len() as f64;
    let limit = k * avg_std;
    let bad: Vec<String> = stats.iter()
        .zip(&rec.channels)
        .filter(|(s, _)| s.mean.abs() > limit)
        .map(|(_, ch)| ch.name.clone())
        .collect();
    info!("bad electrodes (|mean| > {limit:.3e}): {bad:?}");
    bad
}

// ── Blinks ────────────────────────────────────────────────────────────────

/// Result of [`detect_blinks`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlinkReport {
    /// Channels with `|r| > corr_threshold` to any blink channel (the blink
    /// channels themselves included), ascending and unique.
    pub correlated: Vec<usize>,
    /// Samples where a blink channel exceeds the amplitude threshold,
    /// ascending and unique.
    pub samples:    Vec<usize>,
}

/// Locate blinks from dedicated frontal channels (`E127`, `E128` on EGI
/// nets). A blink channel that is missing or flat is reported with a warning
/// and skipped; the rest of the report is still produced.
pub fn detect_blinks(
    rec: &Recording,
    blink_channels: &[String],
    corr_threshold: f64,
    amp_threshold: f64,
) -> BlinkReport {
    let mut correlated = Vec::new();
    let mut samples = Vec::new();

    for name in blink_channels {
        let idx = match rec.index_of(name) {
            Ok(i) => i,
            Err(e) => {
                warn!("blink channel {name}: {e}");
                continue;
            }
        };
        let reference = rec.data.row(idx);
        for (c, row) in rec.data.axis_iter(Axis(0)).enumerate() {
            match pearson(reference, row) {
                Some(r) if r.abs() > corr_threshold => correlated.push(c),
                Some(_) => {}
                None => warn!("correlation of {name} with {} undefined (zero variance)",
                    rec.channels[c].name),
            }
        }
        samples.extend(reference.iter()
            .enumerate()
            .filter(|(_, &v)| v > amp_threshold)
            .map(|(t, _)| t));
    }

    correlated.sort_unstable();
    correlated.dedup();
    samples.sort_unstable();
    samples.dedup();
    BlinkReport { correlated, samples }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn constant_channel_never_flagged() {
        let data = Array2::from_elem((1, 200), 4.2);
        let th = channel_thresholds(&data, 3.0);
        assert!(flagged_samples(data.row(0), &th[0]).is_empty());
    }

    #[test]
    fn equality_at_limit_is_not_flagged() {
        let th = ChannelThreshold { mean: 0.0, std: 1.0, limit: 3.0 };
        assert!(!th.exceeds(3.0));
        assert!(!th.exceeds(-3.0));
        assert!(th.exceeds(3.0001));
    }

    #[test]
    fn window_layouts() {
        assert_eq!(window_starts(1000, WindowStep::Contiguous), (500, vec![0, 500]));
        assert_eq!(window_starts(1000, WindowStep::HalfOverlap), (500, vec![0, 250, 500, 750]));
        assert_eq!(window_starts(1, WindowStep::Contiguous), (1, vec![0]));
    }

    #[test]
    fn variance_outlier_screen() {
        let mut data = Array2::from_shape_fn((10, 100), |(c, t)| ((c + t) % 3) as f64);
        for t in 0..100 {
            data[[7, t]] = if t % 2 == 0 { 50.0 } else { -50.0 };
        }
        assert_eq!(high_variance_channels(&data, 2.0), vec![7]);
    }

    #[test]
    fn span_collapses_disjoint_artifacts() {
        let mut data = Array2::zeros((1, 4000));
        for t in 0..4000 {
            data[[0, t]] = (t as f64 * 0.3).sin();
        }
        data[[0, 100]] = 80.0;
        data[[0, 3900]] = 80.0;
        let cfg = ArtifactConfig { threshold_factor: 5.0, ..ArtifactConfig::default() };
        let span = detect_artifact_span(&data, &cfg).unwrap();
        assert_eq!(span, ArtifactSpan { start: 0, end: 4000 });
    }

    #[test]
    fn clean_signal_has_no_span() {
        let data = Array2::from_shape_fn((4, 1000), |(c, t)| ((c + 1) as f64 * t as f64 * 0.01).sin());
        let cfg = ArtifactConfig { threshold_factor: 5.0, ..ArtifactConfig::default() };
        assert_eq!(detect_artifact_span(&data, &cfg), None);
    }

    #[test]
    fn abnormal_segment_bounds() {
        let mut data = Array2::zeros((2, 500));
        for t in 200..220 {
            data[[1, t]] = 10.0;
        }
        let segs = abnormal_segments(&data, 3.0);
        assert_eq!(segs, vec![AbnormalSegment { channel: 1, start: 200, end: 219 }]);
        approx::assert_abs_diff_eq!(segs[0].start_ms(500.0), 400.0);
    }
}
