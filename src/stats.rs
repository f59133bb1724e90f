//! Per-channel summary statistics (population moments, `ddof = 0`).
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::Serialize;

/// Mean, variance and standard deviation of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelStats {
    pub mean: f64,
    pub var:  f64,
    pub std:  f64,
}

impl ChannelStats {
    /// A constant row yields its value as the mean and exactly zero spread,
    /// whether or not the value is representable in binary.
    pub fn of(row: ArrayView1<'_, f64>) -> Self {
        let n = row.len();
        let Some(&first) = row.first() else {
            return Self { mean: 0.0, var: 0.0, std: 0.0 };
        };
        if row.iter().all(|&v| v == first) {
            return Self { mean: first, var: 0.0, std: 0.0 };
        }
        let mean = row.sum() / n as f64;
        let var = row.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;
        Self { mean, var, std: var.sqrt() }
    }
}

/// Statistics of every row of `data` ([C, T]).
pub fn channel_stats(data: &Array2<f64>) -> Vec<ChannelStats> {
    data.axis_iter(Axis(0)).map(ChannelStats::of).collect()
}

/// Population mean and standard deviation of a 1-D set of values.
pub fn mean_std(values: &Array1<f64>) -> (f64, f64) {
    let s = ChannelStats::of(values.view());
    (s.mean, s.std)
}

/// One row of the summary-statistics table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    #[serde(rename = "Channel")]
    pub channel: String,
    #[serde(rename = "Mean")]
    pub mean: f64,
    #[serde(rename = "Standard Deviation")]
    pub std: f64,
}

/// Channel / mean / std table for a recording.
pub fn summary_table(names: &[String], data: &Array2<f64>) -> Vec<SummaryRow> {
    names.iter()
        .zip(channel_stats(data))
        .map(|(name, s)| SummaryRow { channel: name.clone(), mean: s.mean, std: s.std })
        .collect()
}

/// Pearson correlation between two equally long series, `None` when
/// either has zero variance.
pub fn pearson(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let sa = ChannelStats::of(a);
    let sb = ChannelStats::of(b);
    if sa.std == 0.0 || sb.std == 0.0 {
        return None;
    }
    let cov = a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x - sa.mean) * (y - sb.mean))
        .sum::<f64>() / a.len() as f64;
    Some(cov / (sa.std * sb.std))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn population_moments() {
        let s = ChannelStats::of(array![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].view());
        assert_abs_diff_eq!(s.mean, 5.0);
        assert_abs_diff_eq!(s.var, 4.0);
        assert_abs_diff_eq!(s.std, 2.0);
    }

    #[test]
    fn constant_rows_have_zero_spread() {
        for v in [0.1, 0.7, 1e-6, 3.3e-5] {
            let s = ChannelStats::of(Array1::from_elem(1000, v).view());
            assert_eq!(s.mean, v);
            assert_eq!(s.std, 0.0);
        }
    }

    #[test]
    fn pearson_of_scaled_copy_is_one() {
        let a = array![1.0, 2.0, 3.0, 5.0];
        let b = a.mapv(|v| -3.0 * v + 1.0);
        assert_abs_diff_eq!(pearson(a.view(), b.view()).unwrap(), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn pearson_undefined_for_flat_series() {
        let a = array![1.0, 1.0, 1.0];
        let b = array![1.0, 2.0, 3.0];
        assert_eq!(pearson(a.view(), b.view()), None);
    }
}
