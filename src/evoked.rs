//! Evoked response: the sample-wise mean over epochs.
use anyhow::Result;
use ndarray::{Array1, Array2, Axis};

use crate::epochs::Epochs;
use crate::Error;

#[derive(Debug, Clone)]
pub struct Evoked {
    /// `[C, T]` average.
    pub data:     Array2<f64>,
    pub tmin:     f64,
    pub sfreq:    f64,
    pub ch_names: Vec<String>,
    /// Number of epochs averaged.
    pub nave:     usize,
}

impl Evoked {
    pub fn from_epochs(epochs: &Epochs) -> Result<Self> {
        let data = epochs.data
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::Degenerate("cannot average zero epochs".into()))?;
        Ok(Self {
            data,
            tmin: epochs.tmin,
            sfreq: epochs.sfreq,
            ch_names: epochs.ch_names.clone(),
            nave: epochs.len(),
        })
    }

    pub fn times(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.data.ncols(), |t| self.tmin + t as f64 / self.sfreq)
    }

    /// Root-mean-square across channels at each time point.
    pub fn global_field_power(&self) -> Array1<f64> {
        self.data.map_axis(Axis(0), |col| {
            (col.iter().map(|v| v * v).sum::<f64>() / col.len() as f64).sqrt()
        })
    }
}
