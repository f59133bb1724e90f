//! Z-score normalisation and epoch baseline correction.
//!
//! `zscore_channels_inplace` — per channel, `(x − μ_c) / σ_c` with `ddof = 0`;
//! flat channels are only centred.
//!
//! `baseline_correct_inplace` — for each epoch and channel, subtract the mean
//! over the baseline sample range.
use ndarray::{s, Array2, Array3, Axis};

use crate::stats::ChannelStats;

/// Per-channel z-score. Returns the `(mean, std)` of each channel.
pub fn zscore_channels_inplace(data: &mut Array2<f64>) -> Vec<(f64, f64)> {
    data.axis_iter_mut(Axis(0))
        .map(|mut row| {
            let st = ChannelStats::of(row.view());
            if st.std > 0.0 {
                row.mapv_inplace(|v| (v - st.mean) / st.std);
            } else {
                row.mapv_inplace(|v| v - st.mean);
            }
            (st.mean, st.std)
        })
        .collect()
}

/// `epochs[e, c, :] -= mean(epochs[e, c, start..stop])`.
///
/// `stop` is clamped to the epoch length; an empty range leaves the data
/// unchanged.
pub fn baseline_correct_inplace(epochs: &mut Array3<f64>, start: usize, stop: usize) {
    let (n_e, n_c, n_t) = epochs.dim();
    let stop = stop.min(n_t);
    if start >= stop {
        return;
    }
    for e in 0..n_e {
        for c in 0..n_c {
            let m = epochs.slice(s![e, c, start..stop]).mean().unwrap_or(0.0);
            epochs.slice_mut(s![e, c, ..]).mapv_inplace(|v| v - m);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn zscore_each_channel() {
        let mut data = Array2::from_shape_fn((4, 512), |(c, t)| {
            (c as f64 * 3.7 + t as f64 * 0.1).sin() * 50.0 * (c + 1) as f64 + c as f64
        });
        let params = zscore_channels_inplace(&mut data);
        assert_eq!(params.len(), 4);
        for row in data.axis_iter(Axis(0)) {
            let st = ChannelStats::of(row);
            assert_abs_diff_eq!(st.mean, 0.0, epsilon = 1e-10);
            assert_abs_diff_eq!(st.std, 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn flat_channel_is_centred() {
        let mut data = Array2::from_elem((1, 16), 7.0);
        let params = zscore_channels_inplace(&mut data);
        assert_eq!(params[0], (7.0, 0.0));
        assert!(data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn baseline_uses_only_the_window() {
        let mut epochs = Array3::from_shape_fn((2, 3, 10), |(e, c, t)| {
            if t < 5 { (e * 10 + c) as f64 } else { 100.0 }
        });
        baseline_correct_inplace(&mut epochs, 0, 5);
        assert_abs_diff_eq!(epochs[[1, 2, 0]], 0.0);
        assert_abs_diff_eq!(epochs[[1, 2, 9]], 88.0);
    }
}
