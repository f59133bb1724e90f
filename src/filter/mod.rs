//! FIR filter design and zero-phase application.
//!
//! - [`design`]: Hamming-windowed sinc highpass, lowpass, bandpass and notch.
//! - [`apply`]: FFT overlap-add convolution with delay compensation.
//!
//! [`filter_recording`] and [`notch_recording`] run them over the data
//! channels of a [`Recording`]; the trigger channel is never filtered.

pub mod apply;
pub mod design;

pub use apply::{apply_fir_rows, apply_fir_zero_phase, filter_1d};
pub use design::{
    auto_filter_length, auto_trans_bandwidth, auto_trans_bandwidth_high,
    design_bandpass, design_highpass, design_lowpass, design_notch, firwin, hamming,
};

use anyhow::Result;
use log::info;

use crate::fiff::ChannelKind;
use crate::recording::Recording;

fn data_channels(rec: &Recording) -> Vec<usize> {
    rec.channels.iter()
        .enumerate()
        .filter(|(_, c)| c.kind != ChannelKind::Stim)
        .map(|(i, _)| i)
        .collect()
}

/// Band-limit the data channels. `None` leaves that edge open; both `None`
/// is a no-op.
pub fn filter_recording(rec: &mut Recording, l_freq: Option<f64>, h_freq: Option<f64>) -> Result<()> {
    let h = match (l_freq, h_freq) {
        (Some(l), Some(hf)) => design_bandpass(l, hf, rec.sfreq)?,
        (Some(l), None) => design_highpass(l, rec.sfreq)?,
        (None, Some(hf)) => design_lowpass(hf, rec.sfreq)?,
        (None, None) => return Ok(()),
    };
    info!("filter {l_freq:?}–{h_freq:?} Hz, {} taps", h.len());
    let picks = data_channels(rec);
    apply_fir_rows(&mut rec.data, &picks, &h);
    if let Some(l) = l_freq {
        rec.highpass = Some(rec.highpass.map_or(l, |old| old.max(l)));
    }
    if let Some(hf) = h_freq {
        rec.lowpass = Some(rec.lowpass.map_or(hf, |old| old.min(hf)));
    }
    Ok(())
}

/// Remove line noise at `freq` from the data channels.
pub fn notch_recording(rec: &mut Recording, freq: f64) -> Result<()> {
    let h = design_notch(freq, rec.sfreq)?;
    info!("notch {freq} Hz, {} taps", h.len());
    let picks = data_channels(rec);
    apply_fir_rows(&mut rec.data, &picks, &h);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn recording_filters_skip_the_trigger_channel() {
        let data = Array2::from_shape_fn((2, 2000), |(c, t)| if c == 1 { (t % 500 == 0) as u8 as f64 } else { 1.0 });
        let mut rec = Recording::from_names(data, 250.0, &["E1", "STI 014"]).unwrap();
        rec.set_channel_kind(&["STI 014".into()], ChannelKind::Stim).unwrap();
        let stim = rec.data.row(1).to_owned();

        filter_recording(&mut rec, Some(1.0), Some(40.0)).unwrap();
        notch_recording(&mut rec, 60.0).unwrap();
        assert_eq!(rec.data.row(1), stim);
        assert!(rec.data[[0, 1000]].abs() < 1e-3);
        assert_eq!((rec.highpass, rec.lowpass), (Some(1.0), Some(40.0)));
    }
}
