//! Ocular artifact removal by linear regression on EOG channels.
//!
//! Coefficients `β = Y Xᵀ (X Xᵀ)⁻¹` are fitted over all epochs and samples,
//! where `X` stacks the centred EOG channels and `Y` the centred remaining
//! channels. Applying the model subtracts `β X` from every epoch.
use anyhow::{anyhow, Result};
use log::info;
use ndarray::{s, Array2, Axis};

use crate::channels::indices_of;
use crate::epochs::Epochs;
use crate::linalg::{to_array2, to_dmatrix};

#[derive(Debug, Clone)]
pub struct EogRegression {
    pub eog_channels: Vec<String>,
    /// `[n_targets, n_eog]`.
    pub coef:         Array2<f64>,
    eog_idx:          Vec<usize>,
    target_idx:       Vec<usize>,
}

/// Concatenate `[E, C, T]` rows `idx` into `[k, E·T]`, centred per row.
fn stacked(epochs: &Epochs, idx: &[usize]) -> Array2<f64> {
    let (n_e, _, n_t) = epochs.data.dim();
    let mut out = Array2::zeros((idx.len(), n_e * n_t));
    for (e, epoch) in epochs.data.axis_iter(Axis(0)).enumerate() {
        out.slice_mut(s![.., e * n_t..(e + 1) * n_t]).assign(&epoch.select(Axis(0), idx));
    }
    if let Some(mean) = out.mean_axis(Axis(1)) {
        out -= &mean.insert_axis(Axis(1));
    }
    out
}

impl EogRegression {
    pub fn fit(epochs: &Epochs, eog_channels: &[String]) -> Result<Self> {
        let eog_idx = indices_of(&epochs.ch_names, eog_channels)?;
        let target_idx: Vec<usize> = (0..epochs.n_channels()).filter(|i| !eog_idx.contains(i)).collect();
        let x = to_dmatrix(&stacked(epochs, &eog_idx));
        let y = to_dmatrix(&stacked(epochs, &target_idx));
        let xxt = &x * x.transpose();
        let inv = xxt.try_inverse()
            .ok_or_else(|| anyhow!("EOG channels {eog_channels:?} are linearly dependent"))?;
        let coef = to_array2(&(&y * x.transpose() * inv));
        info!("EOG regression on {eog_channels:?}: {} target channels", target_idx.len());
        Ok(Self { eog_channels: eog_channels.to_vec(), coef, eog_idx, target_idx })
    }

    /// Remove the fitted EOG contribution; EOG channels are left as they are.
    pub fn apply(&self, epochs: &Epochs) -> Result<Epochs> {
        let mut out = epochs.clone();
        for mut epoch in out.data.axis_iter_mut(Axis(0)) {
            let eog = epoch.select(Axis(0), &self.eog_idx);
            let fitted = self.coef.dot(&eog);
            for (row, &ch) in fitted.axis_iter(Axis(0)).zip(&self.target_idx) {
                let mut target = epoch.row_mut(ch);
                target -= &row;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventTable;
    use approx::assert_abs_diff_eq;
    use ndarray::Array3;

    #[test]
    fn removes_propagated_eog() {
        let (n_e, n_t) = (6, 200);
        let data = Array3::from_shape_fn((n_e, 3, n_t), |(e, c, t)| {
            let blink = ((t + 17 * e) as f64 * 0.07).sin().powi(3) * 50.0;
            let brain = ((t * (c + 2) + e) as f64 * 0.31).cos();
            match c {
                0 => brain + 0.4 * blink,
                1 => brain - 0.1 * blink,
                _ => blink,
            }
        });
        let epochs = Epochs {
            data,
            tmin: 0.0,
            sfreq: 100.0,
            ch_names: vec!["E1".into(), "E2".into(), "E126".into()],
            metadata: EventTable::default(),
            selection: (0..n_e).collect(),
        };
        let model = EogRegression::fit(&epochs, &["E126".into()]).unwrap();
        assert_abs_diff_eq!(model.coef[[0, 0]], 0.4, epsilon = 0.01);
        assert_abs_diff_eq!(model.coef[[1, 0]], -0.1, epsilon = 0.01);
        let clean = model.apply(&epochs).unwrap();
        assert_eq!(clean.data.slice(s![.., 2, ..]), epochs.data.slice(s![.., 2, ..]));
    }
}
