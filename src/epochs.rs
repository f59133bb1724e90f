//! Stimulus-locked epochs.
//!
//! One epoch per annotation onset, covering the inclusive sample window
//! `round(tmin · sfreq) ..= round(tmax · sfreq)` around the onset. Epochs
//! that fall outside the recording and repeated onsets are dropped; the
//! indices of the kept annotation rows are stored in `selection` and the
//! metadata is aligned through it.
use anyhow::Result;
use log::{debug, info, warn};
use ndarray::{s, Array1, Array2, Array3, Axis};
use std::collections::HashSet;

use crate::config::EpochConfig;
use crate::events::{onset_to_sample, EventTable};
use crate::evoked::Evoked;
use crate::normalize::baseline_correct_inplace;
use crate::recording::Recording;
use crate::resample::resample_epochs;
use crate::Error;

/// An `[E, C, T]` epoch set with one metadata row per epoch.
#[derive(Debug, Clone)]
pub struct Epochs {
    pub data:      Array3<f64>,
    /// Time of the first sample relative to the onset, in seconds.
    pub tmin:      f64,
    pub sfreq:     f64,
    pub ch_names:  Vec<String>,
    pub metadata:  EventTable,
    /// Annotation row of each epoch.
    pub selection: Vec<usize>,
}

impl Epochs {
    /// Cut epochs around the onsets of `table`.
    ///
    /// Rows with a negative onset have no sample and are dropped.
    pub fn from_events(rec: &Recording, table: &EventTable, cfg: &EpochConfig) -> Result<Self> {
        let onsets: Vec<Option<usize>> = table.onsets().iter()
            .map(|&o| onset_to_sample(o, rec.sfreq))
            .collect();
        Self::cut(rec, &onsets, table, cfg)
    }

    /// Cut epochs around event samples found independently of `table`
    /// (e.g. on the trigger channel), pairing event `i` with row `i`.
    ///
    /// Event and row counts are truncated to the shorter of the two before
    /// cutting; a mismatch is logged.
    pub fn from_onsets(rec: &Recording, onsets: &[usize], table: &EventTable, cfg: &EpochConfig) -> Result<Self> {
        let onsets: Vec<Option<usize>> = onsets.iter().copied().map(Some).collect();
        Self::cut(rec, &onsets, table, cfg)
    }

    fn cut(rec: &Recording, onsets: &[Option<usize>], table: &EventTable, cfg: &EpochConfig) -> Result<Self> {
        if cfg.tmin > cfg.tmax {
            return Err(Error::InvalidWindow { tmin: cfg.tmin, tmax: cfg.tmax }.into());
        }
        if rec.n_times() == 0 {
            return Err(Error::EmptyRecording.into());
        }
        let n = onsets.len().min(table.len());
        if onsets.len() != table.len() {
            warn!("{} events but {} annotation rows; using {n}", onsets.len(), table.len());
        } else {
            info!("{n} events");
        }

        let start_off = (cfg.tmin * rec.sfreq).round() as i64;
        let stop_off = (cfg.tmax * rec.sfreq).round() as i64;
        let n_t = (stop_off - start_off + 1) as usize;
        let n_total = rec.n_times() as i64;

        let mut seen = HashSet::new();
        let mut selection = Vec::new();
        let mut starts = Vec::new();
        for (i, &onset) in onsets.iter().take(n).enumerate() {
            let Some(onset) = onset else {
                warn!("row {i} has a negative onset; dropped");
                continue;
            };
            let first = onset as i64 + start_off;
            if first < 0 || first + n_t as i64 > n_total {
                debug!("epoch {i} at sample {onset} outside the recording; dropped");
                continue;
            }
            if !seen.insert(onset) {
                debug!("epoch {i} repeats onset sample {onset}; dropped");
                continue;
            }
            selection.push(i);
            starts.push(first as usize);
        }
        if selection.len() < n {
            info!("dropped {} of {n} epochs", n - selection.len());
        }

        let mut data = Array3::zeros((starts.len(), rec.n_channels(), n_t));
        for (mut epoch, &first) in data.axis_iter_mut(Axis(0)).zip(&starts) {
            epoch.assign(&rec.data.slice(s![.., first..first + n_t]));
        }

        let mut epochs = Self {
            data,
            tmin: start_off as f64 / rec.sfreq,
            sfreq: rec.sfreq,
            ch_names: rec.ch_names(),
            metadata: table.select(&selection),
            selection,
        };
        if let Some((b0, b1)) = cfg.baseline {
            epochs.apply_baseline(b0, b1);
        }
        Ok(epochs)
    }

    pub fn len(&self) -> usize {
        self.data.dim().0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn n_channels(&self) -> usize {
        self.data.dim().1
    }

    pub fn n_times(&self) -> usize {
        self.data.dim().2
    }

    /// Epoch-relative sample times in seconds.
    pub fn times(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.n_times(), |t| self.tmin + t as f64 / self.sfreq)
    }

    /// `[E, C]` voltages at sample offset `tt`.
    pub fn timepoint(&self, tt: usize) -> Array2<f64> {
        self.data.index_axis(Axis(2), tt).to_owned()
    }

    /// Epochs at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            data: self.data.select(Axis(0), indices),
            tmin: self.tmin,
            sfreq: self.sfreq,
            ch_names: self.ch_names.clone(),
            metadata: self.metadata.select(indices),
            selection: indices.iter().map(|&i| self.selection[i]).collect(),
        }
    }

    /// Epochs whose metadata `column` equals `value`.
    pub fn filter_by(&self, column: &str, value: &str) -> Result<Self> {
        let keep: Vec<usize> = self.metadata.matches(column, value)?
            .into_iter()
            .enumerate()
            .filter_map(|(i, m)| m.then_some(i))
            .collect();
        debug!("{column} == {value:?}: {} of {} epochs", keep.len(), self.len());
        Ok(self.select(&keep))
    }

    /// Stack epoch sets with identical channels, rate and window.
    pub fn concatenate(parts: &[Epochs]) -> Result<Self> {
        let Some(first) = parts.first() else {
            return Err(Error::Degenerate("nothing to concatenate".into()).into());
        };
        for p in &parts[1..] {
            if p.ch_names != first.ch_names
                || p.n_times() != first.n_times()
                || (p.sfreq - first.sfreq).abs() > 1e-9
            {
                return Err(Error::ShapeMismatch {
                    expected: format!("{} ch × {} @ {} Hz", first.n_channels(), first.n_times(), first.sfreq),
                    got: format!("{} ch × {} @ {} Hz", p.n_channels(), p.n_times(), p.sfreq),
                }.into());
            }
        }
        let views: Vec<_> = parts.iter().map(|p| p.data.view()).collect();
        let data = ndarray::concatenate(Axis(0), &views)?;
        let mut metadata = first.metadata.clone();
        for p in &parts[1..] {
            metadata.extend(&p.metadata)?;
        }
        Ok(Self {
            data,
            tmin: first.tmin,
            sfreq: first.sfreq,
            ch_names: first.ch_names.clone(),
            metadata,
            selection: parts.iter().flat_map(|p| p.selection.iter().copied()).collect(),
        })
    }

    /// Change the sampling rate of every epoch; `tmin` is kept.
    pub fn resample(&mut self, sfreq: f64) -> Result<()> {
        self.data = resample_epochs(&self.data, self.sfreq, sfreq)?;
        info!("epochs resampled {} → {sfreq} Hz, {} samples", self.sfreq, self.n_times());
        self.sfreq = sfreq;
        Ok(())
    }

    /// Subtract the mean over `[b0, b1]` seconds (epoch-relative) from each
    /// epoch and channel.
    pub fn apply_baseline(&mut self, b0: f64, b1: f64) {
        let to_idx = |t: f64| ((t - self.tmin) * self.sfreq).round().max(0.0) as usize;
        let (start, stop) = (to_idx(b0), to_idx(b1) + 1);
        baseline_correct_inplace(&mut self.data, start, stop);
    }

    /// Sample-wise average over epochs.
    pub fn average(&self) -> Result<Evoked> {
        Evoked::from_epochs(self)
    }
}
