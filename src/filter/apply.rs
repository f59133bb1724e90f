//! Zero-phase FIR application by FFT overlap-add.
//!
//! The linear-phase kernel delay of `(N − 1) / 2` samples is removed by
//! shifting the output, and edge transients are reduced with odd
//! (reflect-limited) padding of `N − 1` samples on each side.
use anyhow::Result;
use log::debug;
use ndarray::{Array2, ArrayViewMut1, Axis};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Filter every row of `data` ([C, T]) in place.
pub fn apply_fir_zero_phase(data: &mut Array2<f64>, h: &[f64]) -> Result<()> {
    let plan = OverlapAdd::new(h, data.ncols());
    for row in data.axis_iter_mut(Axis(0)) {
        plan.filter_row(row);
    }
    Ok(())
}

/// Filter only the listed rows.
pub fn apply_fir_rows(data: &mut Array2<f64>, rows: &[usize], h: &[f64]) {
    let plan = OverlapAdd::new(h, data.ncols());
    for &r in rows {
        plan.filter_row(data.row_mut(r));
    }
}

/// Filter one signal; the output has the input's length.
pub fn filter_1d(x: &[f64], h: &[f64]) -> Vec<f64> {
    let plan = OverlapAdd::new(h, x.len());
    let mut y = ndarray::Array1::from(x.to_vec());
    plan.filter_row(y.view_mut());
    y.to_vec()
}

/// FFTs and kernel spectrum shared by all rows of one call.
struct OverlapAdd {
    n_h:   usize,
    n_fft: usize,
    h_fft: Vec<Complex<f64>>,
    fwd:   Arc<dyn Fft<f64>>,
    inv:   Arc<dyn Fft<f64>>,
}

impl OverlapAdd {
    fn new(h: &[f64], n_x: usize) -> Self {
        let n_h = h.len();
        let n_fft = choose_fft_len(n_h, n_x + 2 * (n_h - 1));
        let mut planner = FftPlanner::<f64>::new();
        let fwd = planner.plan_fft_forward(n_fft);
        let inv = planner.plan_fft_inverse(n_fft);
        let mut h_fft = zero_padded(h, n_fft);
        fwd.process(&mut h_fft);
        debug!("overlap-add: {n_h} taps, FFT length {n_fft}");
        Self { n_h, n_fft, h_fft, fwd, inv }
    }

    fn filter_row(&self, mut row: ArrayViewMut1<'_, f64>) {
        let n_x = row.len();
        if n_x == 0 {
            return;
        }
        let n_edge = self.n_h - 1;
        let shift = n_edge / 2;
        let x: Vec<f64> = row.to_vec();
        let x_ext = reflect_limited_pad(&x, n_edge, n_edge);
        let n_ext = x_ext.len();

        let n_seg = self.n_fft - self.n_h + 1;
        let scale = 1.0 / self.n_fft as f64;
        let mut acc = vec![0.0; n_ext];

        for start in (0..n_ext).step_by(n_seg) {
            let stop = (start + n_seg).min(n_ext);
            let mut buf = zero_padded(&x_ext[start..stop], self.n_fft);
            self.fwd.process(&mut buf);
            buf.iter_mut().zip(&self.h_fft).for_each(|(b, &hf)| *b *= hf);
            self.inv.process(&mut buf);

            let out_start = start.saturating_sub(shift);
            let skip = shift.saturating_sub(start);
            for (o, b) in (out_start..n_ext).zip(buf.iter().skip(skip)) {
                acc[o] += b.re * scale;
            }
        }
        for (dst, &v) in row.iter_mut().zip(&acc[n_edge..n_edge + n_x]) {
            *dst = v;
        }
    }
}

fn zero_padded(x: &[f64], n: usize) -> Vec<Complex<f64>> {
    x.iter()
        .map(|&v| Complex::new(v, 0.0))
        .chain(std::iter::repeat(Complex::default()))
        .take(n)
        .collect()
}

/// Odd reflection about the end samples; padding beyond `len − 1` samples
/// is zero.
fn reflect_limited_pad(x: &[f64], n_l: usize, n_r: usize) -> Vec<f64> {
    let n = x.len();
    let real_l = n_l.min(n - 1);
    let real_r = n_r.min(n - 1);
    let (first, last) = (x[0], x[n - 1]);

    let mut out = vec![0.0; n_l - real_l];
    out.extend((1..=real_l).rev().map(|i| 2.0 * first - x[i]));
    out.extend_from_slice(x);
    out.extend((1..=real_r).map(|i| 2.0 * last - x[n - 1 - i]));
    out.resize(out.len() + (n_r - real_r), 0.0);
    out
}

/// Power-of-two block size minimising
/// `ceil(n_x / (N − n_h + 1)) · N · (log2 N + 1) + 4e-5 · N · n_x`.
fn choose_fft_len(n_h: usize, n_x: usize) -> usize {
    let min_fft = 2 * n_h - 1;
    let min_pow = (min_fft as f64).log2().ceil() as u32;
    let max_pow = ((n_x as f64).log2().ceil() as u32 + 1).max(min_pow);

    (min_pow..=max_pow)
        .map(|p| {
            let n = 1usize << p;
            let cost = (n_x as f64 / (n - n_h + 1) as f64).ceil() * n as f64 * (p as f64 + 1.0)
                + 4e-5 * n as f64 * n_x as f64;
            (n, cost)
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map_or(1 << max_pow, |(n, _)| n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::design::{design_bandpass, design_highpass};

    #[test]
    fn preserves_length_and_removes_dc() {
        let x = vec![1.0; 4096];
        let h = design_highpass(0.5, 256.0).unwrap();
        let y = filter_1d(&x, &h);
        assert_eq!(y.len(), x.len());
        let max = y[h.len()..y.len() - h.len()].iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        assert!(max < 1e-6, "DC not removed: {max}");
    }

    #[test]
    fn in_band_sine_passes_without_delay() {
        let sf = 250.0;
        let x: Vec<f64> = (0..5000).map(|t| (2.0 * std::f64::consts::PI * 8.0 * t as f64 / sf).sin()).collect();
        let h = design_bandpass(1.0, 15.0, sf).unwrap();
        let y = filter_1d(&x, &h);
        for t in 1000..4000 {
            approx::assert_abs_diff_eq!(y[t], x[t], epsilon = 0.02);
        }
    }

    #[test]
    fn reflect_pad_with_zero_fill() {
        let x = [1.0, 2.0, 3.0];
        assert_eq!(reflect_limited_pad(&x, 3, 1), vec![0.0, -1.0, 0.0, 1.0, 2.0, 3.0, 4.0]);
    }
}
