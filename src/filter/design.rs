//! Windowed-sinc FIR design (Hamming window, linear phase, odd length).
//!
//! Transition bandwidths follow the usual automatic rule:
//!   • low edge  `min(max(0.25 · l_freq, 2), l_freq)`
//!   • high edge `min(max(0.25 · h_freq, 2), sfreq / 2 − h_freq)`
//!   • length    `ceil(3.3 / min(tb) · sfreq)`, rounded up to odd
//!
//! Each cutoff sits in the middle of its transition band. Band filters are
//! built from differences of unit-DC lowpass kernels.
use anyhow::{bail, Result};
use std::f64::consts::PI;

/// Automatic transition bandwidth of a highpass edge at `l_freq`.
pub fn auto_trans_bandwidth(l_freq: f64) -> f64 {
    (0.25 * l_freq).max(2.0).min(l_freq)
}

/// Automatic transition bandwidth of a lowpass edge at `h_freq`.
pub fn auto_trans_bandwidth_high(h_freq: f64, sfreq: f64) -> f64 {
    (0.25 * h_freq).max(2.0).min(sfreq / 2.0 - h_freq)
}

/// Odd number of taps for a transition bandwidth.
pub fn auto_filter_length(trans_bw: f64, sfreq: f64) -> usize {
    let n = (3.3 / trans_bw * sfreq).ceil() as usize;
    if n % 2 == 0 { n + 1 } else { n }
}

/// Lowpass windowed sinc with `-6 dB` point at `cutoff_hz`, normalised to
/// unit DC gain. `pass_zero = false` returns the spectral inverse.
pub fn firwin(n: usize, cutoff_hz: f64, sfreq: f64, pass_zero: bool) -> Vec<f64> {
    debug_assert!(n % 2 == 1, "firwin requires odd N");
    let alpha = (n - 1) as f64 / 2.0;
    let fc = cutoff_hz / (sfreq / 2.0);
    let win = hamming(n);

    let mut h: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64 - alpha;
            let sinc = if x == 0.0 { fc } else { (PI * fc * x).sin() / (PI * x) };
            sinc * win[i]
        })
        .collect();
    let s: f64 = h.iter().sum();
    h.iter_mut().for_each(|v| *v /= s);

    if !pass_zero {
        h.iter_mut().for_each(|v| *v = -*v);
        h[n / 2] += 1.0;
    }
    h
}

pub fn hamming(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

fn check_freq(f: f64, sfreq: f64) -> Result<()> {
    if !(f > 0.0 && f < sfreq / 2.0) {
        bail!("cutoff {f} Hz outside (0, {}) Hz", sfreq / 2.0);
    }
    Ok(())
}

pub fn design_highpass(l_freq: f64, sfreq: f64) -> Result<Vec<f64>> {
    check_freq(l_freq, sfreq)?;
    let tb = auto_trans_bandwidth(l_freq);
    Ok(firwin(auto_filter_length(tb, sfreq), l_freq - tb / 2.0, sfreq, false))
}

pub fn design_lowpass(h_freq: f64, sfreq: f64) -> Result<Vec<f64>> {
    check_freq(h_freq, sfreq)?;
    let tb = auto_trans_bandwidth_high(h_freq, sfreq);
    Ok(firwin(auto_filter_length(tb, sfreq), h_freq + tb / 2.0, sfreq, true))
}

/// Passband `[l_freq, h_freq]`.
pub fn design_bandpass(l_freq: f64, h_freq: f64, sfreq: f64) -> Result<Vec<f64>> {
    check_freq(l_freq, sfreq)?;
    check_freq(h_freq, sfreq)?;
    if l_freq >= h_freq {
        bail!("bandpass needs l_freq < h_freq, got {l_freq} and {h_freq}");
    }
    let l_tb = auto_trans_bandwidth(l_freq);
    let h_tb = auto_trans_bandwidth_high(h_freq, sfreq);
    let n = auto_filter_length(l_tb.min(h_tb), sfreq);
    let hi = firwin(n, h_freq + h_tb / 2.0, sfreq, true);
    let lo = firwin(n, l_freq - l_tb / 2.0, sfreq, true);
    Ok(hi.iter().zip(&lo).map(|(a, b)| a - b).collect())
}

/// Narrow band-stop around `freq` (line noise). The stop band is
/// `freq ± freq / 400` with 1 Hz transitions.
pub fn design_notch(freq: f64, sfreq: f64) -> Result<Vec<f64>> {
    check_freq(freq, sfreq)?;
    let half_width = freq / 400.0;
    let tb = 1.0;
    let n = auto_filter_length(tb, sfreq);
    let hi = firwin(n, freq + half_width + tb / 2.0, sfreq, true);
    let lo = firwin(n, freq - half_width - tb / 2.0, sfreq, true);
    let mut h: Vec<f64> = hi.iter().zip(&lo).map(|(a, b)| b - a).collect();
    h[n / 2] += 1.0;
    Ok(h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn gain(h: &[f64], f: f64, sfreq: f64) -> f64 {
        let (re, im) = h.iter().enumerate().fold((0.0, 0.0), |(re, im), (i, &v)| {
            let w = 2.0 * PI * f / sfreq * i as f64;
            (re + v * w.cos(), im - v * w.sin())
        });
        (re * re + im * im).sqrt()
    }

    #[test]
    fn lengths_are_odd() {
        for l in [0.5, 1.0, 2.0, 5.0] {
            assert!(auto_filter_length(auto_trans_bandwidth(l), 256.0) % 2 == 1);
        }
    }

    #[test]
    fn highpass_known_length_and_zero_dc() {
        let h = design_highpass(0.5, 256.0).unwrap();
        assert_eq!(h.len(), 1691);
        assert_abs_diff_eq!(h.iter().sum::<f64>(), 0.0, epsilon = 1e-9);
        let n = h.len();
        for i in 0..n / 2 {
            assert_abs_diff_eq!(h[i], h[n - 1 - i], epsilon = 1e-12);
        }
    }

    #[test]
    fn bandpass_passes_middle_blocks_edges() {
        let sf = 250.0;
        let h = design_bandpass(1.0, 15.0, sf).unwrap();
        assert_abs_diff_eq!(gain(&h, 8.0, sf), 1.0, epsilon = 0.01);
        assert!(gain(&h, 0.0, sf) < 1e-6);
        assert!(gain(&h, 40.0, sf) < 0.01);
    }

    #[test]
    fn notch_kills_line_frequency() {
        let sf = 500.0;
        let h = design_notch(60.0, sf).unwrap();
        assert!(gain(&h, 60.0, sf) < 0.05);
        assert_abs_diff_eq!(gain(&h, 30.0, sf), 1.0, epsilon = 0.01);
        assert_abs_diff_eq!(gain(&h, 0.0, sf), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn rejects_cutoff_above_nyquist() {
        assert!(design_lowpass(200.0, 250.0).is_err());
        assert!(design_bandpass(20.0, 10.0, 250.0).is_err());
    }
}
