//! In-memory continuous recording.
use anyhow::{bail, Result};
use ndarray::{s, Array1, Array2, Axis};

use crate::channels::{indices_of, select_by_prefix, ChannelFlagSet};
use crate::fiff::{ChannelInfo, ChannelKind};
use crate::Error;

/// A `[C, T]` recording with its channel descriptors.
///
/// Processing steps mutate `data` in place, one after the other; every
/// other field only changes through the methods below.
#[derive(Debug, Clone)]
pub struct Recording {
    pub data:       Array2<f64>,
    pub sfreq:      f64,
    pub channels:   Vec<ChannelInfo>,
    pub bads:       ChannelFlagSet,
    /// Index of the first sample in acquisition time.
    pub first_samp: u64,
    pub highpass:   Option<f64>,
    pub lowpass:    Option<f64>,
    pub line_freq:  Option<f64>,
}

impl Recording {
    pub fn new(data: Array2<f64>, sfreq: f64, channels: Vec<ChannelInfo>) -> Result<Self> {
        if data.nrows() != channels.len() {
            return Err(Error::ShapeMismatch {
                expected: format!("{} channel rows", channels.len()),
                got: format!("{} rows", data.nrows()),
            }.into());
        }
        if !(sfreq > 0.0) {
            bail!("sampling rate must be positive, got {sfreq}");
        }
        Ok(Self {
            data,
            sfreq,
            channels,
            bads: ChannelFlagSet::new(),
            first_samp: 0,
            highpass: None,
            lowpass: None,
            line_freq: None,
        })
    }

    /// Build EEG-typed channel descriptors from bare names.
    pub fn from_names(data: Array2<f64>, sfreq: f64, names: &[&str]) -> Result<Self> {
        let chs = names.iter()
            .enumerate()
            .map(|(i, n)| ChannelInfo::new(n, ChannelKind::Eeg, i))
            .collect();
        Self::new(data, sfreq, chs)
    }

    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    pub fn duration_secs(&self) -> f64 {
        self.n_times() as f64 / self.sfreq
    }

    pub fn ch_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name.clone()).collect()
    }

    pub fn index_of(&self, name: &str) -> Result<usize> {
        Ok(indices_of(&self.ch_names(), &[name.to_string()])?[0])
    }

    /// Sample times in seconds, starting at 0.
    pub fn times(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.n_times(), |t| t as f64 / self.sfreq)
    }

    /// Indices of channels of `kind` that are not flagged bad.
    pub fn picks_by_kind(&self, kind: ChannelKind) -> Vec<usize> {
        self.channels.iter()
            .enumerate()
            .filter(|(_, c)| c.kind == kind && !self.bads.contains(&c.name))
            .map(|(i, _)| i)
            .collect()
    }

    /// Indices of good channels whose name starts with `prefix`.
    pub fn picks_by_prefix(&self, prefix: &str) -> Vec<usize> {
        select_by_prefix(&self.ch_names(), prefix, &self.bads)
    }

    /// Keep only `picks` (in the given order). Bad flags of dropped channels
    /// are dropped with them.
    pub fn pick(&mut self, picks: &[usize]) -> Result<()> {
        if let Some(&bad) = picks.iter().find(|&&p| p >= self.n_channels()) {
            bail!("pick index {bad} out of range for {} channels", self.n_channels());
        }
        self.data = self.data.select(Axis(0), picks);
        self.channels = picks.iter().map(|&p| self.channels[p].clone()).collect();
        let kept: ChannelFlagSet = self.bads.names().iter()
            .filter(|b| self.channels.iter().any(|c| crate::channels::same_channel(&c.name, b)))
            .collect();
        self.bads = kept;
        Ok(())
    }

    /// Change the kind of the named channels (e.g. mark `E126` as EOG).
    pub fn set_channel_kind(&mut self, names: &[String], kind: ChannelKind) -> Result<()> {
        for idx in indices_of(&self.ch_names(), names)? {
            self.channels[idx].kind = kind;
        }
        Ok(())
    }

    /// Copy of the half-open sample range `[start, stop)`; `first_samp` is
    /// advanced so acquisition times stay correct.
    pub fn crop_samples(&self, start: usize, stop: usize) -> Result<Self> {
        let stop = stop.min(self.n_times());
        if start >= stop {
            bail!("empty crop {start}..{stop} of {} samples", self.n_times());
        }
        let mut out = self.clone();
        out.data = self.data.slice(s![.., start..stop]).to_owned();
        out.first_samp = self.first_samp + start as u64;
        Ok(out)
    }

    /// Crop by seconds; samples are truncated toward zero like
    /// `int(t * sfreq)`.
    pub fn crop_secs(&self, tmin: f64, tmax: f64) -> Result<Self> {
        if tmin > tmax {
            return Err(Error::InvalidWindow { tmin, tmax }.into());
        }
        let start = (tmin.max(0.0) * self.sfreq) as usize;
        let stop = (tmax.max(0.0) * self.sfreq) as usize;
        self.crop_samples(start, stop)
    }

    /// Rows of the listed channels as a `[k, T]` copy.
    pub fn data_for(&self, picks: &[usize]) -> Array2<f64> {
        self.data.select(Axis(0), picks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec() -> Recording {
        let data = Array2::from_shape_fn((3, 100), |(c, t)| (c * 100 + t) as f64);
        Recording::from_names(data, 100.0, &["E1", "E2", "VREF"]).unwrap()
    }

    #[test]
    fn pick_reorders_and_drops_bads() {
        let mut r = rec();
        r.bads.insert("E1");
        r.bads.insert("E2");
        r.pick(&[1, 2]).unwrap();
        assert_eq!(r.ch_names(), vec!["E2", "VREF"]);
        assert_eq!(r.bads.names(), &["E2".to_string()]);
        assert_eq!(r.data[[0, 0]], 100.0);
    }

    #[test]
    fn crop_advances_first_samp() {
        let r = rec().crop_secs(0.25, 0.5).unwrap();
        assert_eq!(r.n_times(), 25);
        assert_eq!(r.first_samp, 25);
        assert_eq!(r.data[[0, 0]], 25.0);
        assert_eq!(r.duration_secs(), 0.25);
    }

    #[test]
    fn mismatched_rows_rejected() {
        let err = Recording::from_names(Array2::zeros((2, 5)), 10.0, &["E1"]).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn set_kind_and_pick_by_kind() {
        let mut r = rec();
        r.set_channel_kind(&["E2".into()], ChannelKind::Eog).unwrap();
        assert_eq!(r.picks_by_kind(ChannelKind::Eog), vec![1]);
        assert_eq!(r.picks_by_kind(ChannelKind::Eeg), vec![0, 2]);
        assert_eq!(r.picks_by_prefix("E"), vec![0, 1]);
    }
}
