//! FFT resampling along the time axis.
//!
//! Each signal is padded (odd reflection) to about a power-of-two length,
//! transformed, truncated or zero-extended in frequency, scaled by the length
//! ratio and transformed back; the resampled padding is then stripped. The
//! Nyquist bin of the shorter spectrum is doubled when downsampling and
//! halved when upsampling.
//!
//! For rational ratios the padding is trimmed so that both the left pad and
//! the padded length map to whole output samples. Output sample `j` then
//! lands exactly on input time `j / ratio` with no drift along the signal.
use anyhow::{bail, Result};
use log::debug;
use ndarray::{Array1, Array2, Array3, Axis};
use rustfft::{num_complex::Complex, FftPlanner};

/// Padding that brings `n` to the next power of two, with at least
/// `2 · min(n / 8, 100)` extra samples.
pub fn auto_npad(n: usize) -> (usize, usize) {
    let min_add = (n / 8).min(100) * 2;
    let next_pow2 = (n + min_add).next_power_of_two();
    let total = next_pow2 - n;
    (total / 2, total - total / 2)
}

/// Output length `round(n · dst / src)`.
pub fn final_length(n: usize, src_sfreq: f64, dst_sfreq: f64) -> usize {
    (n as f64 * dst_sfreq / src_sfreq).round() as usize
}

fn check_rates(src_sfreq: f64, dst_sfreq: f64) -> Result<()> {
    if !(src_sfreq > 0.0 && dst_sfreq > 0.0) {
        bail!("sampling rates must be positive, got {src_sfreq} → {dst_sfreq}");
    }
    Ok(())
}

/// Resample the rows of `data` ([C, T]).
pub fn resample(data: &Array2<f64>, src_sfreq: f64, dst_sfreq: f64) -> Result<Array2<f64>> {
    check_rates(src_sfreq, dst_sfreq)?;
    if (src_sfreq - dst_sfreq).abs() < 1e-9 {
        return Ok(data.clone());
    }
    let ratio = dst_sfreq / src_sfreq;
    let n_out = final_length(data.ncols(), src_sfreq, dst_sfreq);
    let mut out = Array2::zeros((data.nrows(), n_out));
    for (src, mut dst) in data.axis_iter(Axis(0)).zip(out.axis_iter_mut(Axis(0))) {
        let y = resample_1d(&src.to_vec(), ratio);
        dst.assign(&Array1::from(y));
    }
    debug!("resampled {} → {} samples ({src_sfreq} → {dst_sfreq} Hz)", data.ncols(), n_out);
    Ok(out)
}

/// Resample every epoch of an `[E, C, T]` set.
pub fn resample_epochs(data: &Array3<f64>, src_sfreq: f64, dst_sfreq: f64) -> Result<Array3<f64>> {
    check_rates(src_sfreq, dst_sfreq)?;
    let (n_e, n_c, n_t) = data.dim();
    let n_out = final_length(n_t, src_sfreq, dst_sfreq);
    let mut out = Array3::zeros((n_e, n_c, n_out));
    for (src, mut dst) in data.axis_iter(Axis(0)).zip(out.axis_iter_mut(Axis(0))) {
        dst.assign(&resample(&src.to_owned(), src_sfreq, dst_sfreq)?);
    }
    Ok(out)
}

/// `ratio · m` is a whole number (to rounding error).
fn maps_to_whole(m: usize, ratio: f64) -> bool {
    let r = ratio * m as f64;
    (r - r.round()).abs() < 1e-6
}

/// Largest `m ≤ max` with `ratio · (base + m)` whole, if any.
fn aligned_pad(base: usize, max: usize, ratio: f64) -> Option<usize> {
    (0..=max).rev().find(|&m| maps_to_whole(base + m, ratio))
}

/// Resample one signal by `ratio = dst / src`.
pub fn resample_1d(x: &[f64], ratio: f64) -> Vec<f64> {
    let n_in = x.len();
    if n_in == 0 {
        return Vec::new();
    }
    let final_len = (ratio * n_in as f64).round() as usize;
    let (npad_l, npad_r) = auto_npad(n_in);
    let (max_l, max_r) = (npad_l.min(n_in - 1), npad_r.min(n_in - 1));
    // m = 0 always maps to a whole sample, so the left search never fails.
    let pad_l = aligned_pad(0, max_l, ratio).unwrap_or(0);
    let pad_r = aligned_pad(pad_l + n_in, max_r, ratio).unwrap_or(max_r);

    let (first, last) = (x[0], x[n_in - 1]);
    let padded: Vec<f64> = (1..=pad_l).rev().map(|i| 2.0 * first - x[i])
        .chain(x.iter().copied())
        .chain((1..=pad_r).map(|i| 2.0 * last - x[n_in - 1 - i]))
        .collect();
    let old_len = padded.len();
    let new_len = ((ratio * old_len as f64).round() as usize).max(1);

    let mut planner = FftPlanner::<f64>::new();
    let mut spectrum: Vec<Complex<f64>> = padded.iter().map(|&v| Complex::new(v, 0.0)).collect();
    planner.plan_fft_forward(old_len).process(&mut spectrum);
    spectrum.truncate(old_len / 2 + 1);

    let shorter = new_len < old_len;
    let use_len = if shorter { new_len } else { old_len };
    if use_len % 2 == 0 {
        if let Some(bin) = spectrum.get_mut(use_len / 2) {
            *bin *= if shorter { 2.0 } else { 0.5 };
        }
    }
    let scale = new_len as f64 / old_len as f64;

    // Hermitian spectrum of the new length.
    let half = new_len / 2 + 1;
    let mut full = vec![Complex::<f64>::default(); new_len];
    for (dst, src) in full.iter_mut().zip(spectrum.iter().take(half)) {
        *dst = *src * scale;
    }
    for i in 1..half {
        let j = new_len - i;
        if j >= half {
            full[j] = full[i].conj();
        }
    }
    planner.plan_fft_inverse(new_len).process(&mut full);

    let inv = 1.0 / new_len as f64;
    // Left pad in output samples, at the ratio the FFT lengths realise.
    let strip_l = (pad_l as f64 * new_len as f64 / old_len as f64).round() as usize;
    let mut out: Vec<f64> = full.iter()
        .skip(strip_l)
        .take(final_len)
        .map(|c| c.re * inv)
        .collect();
    out.resize(final_len, 0.0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn same_rate_is_passthrough() {
        let data = Array2::from_shape_fn((2, 512), |(_, t)| t as f64 / 512.0);
        assert_eq!(resample(&data, 256.0, 256.0).unwrap(), data);
    }

    #[test]
    fn output_lengths() {
        assert_eq!(resample(&Array2::zeros((1, 1024)), 512.0, 256.0).unwrap().ncols(), 512);
        let epochs = Array3::zeros((3, 2, 501));
        assert_eq!(resample_epochs(&epochs, 250.0, 100.0).unwrap().dim(), (3, 2, 200));
    }

    #[test]
    fn preserves_dc_and_slow_sine() {
        let data = Array2::from_elem((1, 1024), 3.14);
        for &v in resample(&data, 512.0, 256.0).unwrap().iter() {
            assert_abs_diff_eq!(v, 3.14, epsilon = 1e-6);
        }
        let sf = 500.0;
        let x = Array2::from_shape_fn((1, 2000), |(_, t)| (2.0 * std::f64::consts::PI * 3.0 * t as f64 / sf).sin());
        let y = resample(&x, sf, 100.0).unwrap();
        for t in 50..350 {
            let expect = (2.0 * std::f64::consts::PI * 3.0 * t as f64 / 100.0).sin();
            assert_abs_diff_eq!(y[[0, t]], expect, epsilon = 1e-3);
        }
    }

    #[test]
    fn integer_decimation_keeps_sample_times() {
        // Every 5th input sample is an output sample; no offset, no drift.
        let sf = 500.0;
        let x = Array2::from_shape_fn((1, 1501), |(_, t)| (2.0 * std::f64::consts::PI * 2.0 * t as f64 / sf).cos());
        let y = resample(&x, sf, 100.0).unwrap();
        assert_eq!(y.ncols(), 300);
        for t in 40..260 {
            assert_abs_diff_eq!(y[[0, t]], x[[0, 5 * t]], epsilon = 1e-3);
        }
    }

    #[test]
    fn padding_alignment() {
        assert_eq!(aligned_pad(0, 1048, 0.2), Some(1045));
        assert_eq!(aligned_pad(3045, 1048, 0.2), Some(1045));
        assert_eq!(aligned_pad(0, 7, 0.4), Some(5));
        assert!(maps_to_whole(1024, 0.5));
    }

    #[test]
    fn auto_npad_power_of_two() {
        assert_eq!(auto_npad(15360), (512, 512));
        assert_eq!(auto_npad(30720), (1024, 1024));
    }
}
