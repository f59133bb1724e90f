//! Re-referencing of EEG channels.
//!
//! `data[c, t] -= ref[t]` for every good EEG channel `c`, where `ref` is the
//! mean of either the named reference channels or all good EEG channels.
//! Channels of other kinds and bad channels are left untouched.
use anyhow::Result;
use log::debug;
use ndarray::{Array1, Array2, Axis};

use crate::channels::indices_of;
use crate::fiff::ChannelKind;
use crate::recording::Recording;
use crate::Error;

/// Subtract the per-timepoint channel mean from every row of `data`.
pub fn average_reference_inplace(data: &mut Array2<f64>) {
    let Some(means) = data.mean_axis(Axis(0)) else { return };
    for mut row in data.rows_mut() {
        row -= &means;
    }
}

fn subtract_from(rec: &mut Recording, picks: &[usize], reference: &Array1<f64>) {
    for &c in picks {
        let mut row = rec.data.row_mut(c);
        row -= reference;
    }
}

/// Common average reference over the good EEG channels.
pub fn set_average_reference(rec: &mut Recording) -> Result<()> {
    let picks = rec.picks_by_kind(ChannelKind::Eeg);
    if picks.is_empty() {
        return Err(Error::Degenerate("no good EEG channels to average".into()).into());
    }
    let reference = rec.data_for(&picks).mean_axis(Axis(0)).ok_or(Error::EmptyRecording)?;
    subtract_from(rec, &picks, &reference);
    debug!("average reference over {} channels", picks.len());
    Ok(())
}

/// Reference the good EEG channels to the mean of `names` (e.g. `["VREF"]`).
/// The reference channels themselves end up at zero when they are EEG.
pub fn set_reference_channels(rec: &mut Recording, names: &[String]) -> Result<()> {
    let ref_idx = indices_of(&rec.ch_names(), names)?;
    let reference = rec.data_for(&ref_idx).mean_axis(Axis(0)).ok_or(Error::EmptyRecording)?;
    let picks = rec.picks_by_kind(ChannelKind::Eeg);
    subtract_from(rec, &picks, &reference);
    debug!("referenced {} channels to {names:?}", picks.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn channel_sum_is_zero_after_reference() {
        let mut data = Array2::from_shape_fn((8, 512), |(c, t)| ((c * 7 + t * 3) as f64).sin());
        average_reference_inplace(&mut data);
        for &s in data.sum_axis(Axis(0)).iter() {
            assert_abs_diff_eq!(s, 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn vref_reference_zeroes_vref_and_spares_bads() {
        let data = Array2::from_shape_fn((3, 10), |(c, t)| (c + 1) as f64 * 10.0 + t as f64);
        let mut rec = Recording::from_names(data, 100.0, &["E1", "E2", "VREF"]).unwrap();
        rec.bads.insert("E2");
        set_reference_channels(&mut rec, &["VREF".into()]).unwrap();
        assert_abs_diff_eq!(rec.data[[0, 4]], -20.0);
        assert_abs_diff_eq!(rec.data[[1, 4]], 24.0);
        assert_abs_diff_eq!(rec.data[[2, 4]], 0.0);
    }

    #[test]
    fn car_skips_non_eeg() {
        let data = Array2::from_shape_fn((3, 4), |(c, _)| c as f64);
        let mut rec = Recording::from_names(data, 100.0, &["E1", "E2", "STI 014"]).unwrap();
        rec.set_channel_kind(&["STI 014".into()], ChannelKind::Stim).unwrap();
        set_average_reference(&mut rec).unwrap();
        assert_abs_diff_eq!(rec.data[[0, 0]], -0.5);
        assert_abs_diff_eq!(rec.data[[1, 0]], 0.5);
        assert_abs_diff_eq!(rec.data[[2, 0]], 2.0);
    }
}
