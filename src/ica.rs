//! Independent component analysis (FastICA, symmetric, `logcosh`).
//!
//! Channels are centred, reduced to `n_components` principal components and
//! whitened; the unmixing matrix is then found with the parallel FastICA
//! fixed-point iteration from a seeded Gaussian start. Removing components
//! subtracts only their back-projection, so variance outside the retained
//! subspace is untouched.
//!
//! ```no_run
//! use eegspeech::ica::{Ica, IcaParams};
//! # let data = ndarray::Array2::<f64>::zeros((32, 1000));
//! let ica = Ica::fit(&data, &IcaParams { n_components: 20, seed: 35, ..IcaParams::default() })?;
//! let cleaned = ica.apply(&data, &[17])?;
//! # Ok::<(), anyhow::Error>(())
//! ```
use anyhow::Result;
use log::{debug, info, warn};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, Axis};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::linalg::{sorted_eigen, standard_normal, symmetric_decorrelation, to_array2, to_dmatrix};
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IcaParams {
    pub n_components: usize,
    pub seed:         u64,
    pub max_iter:     usize,
    pub tol:          f64,
}

impl Default for IcaParams {
    fn default() -> Self {
        Self { n_components: 20, seed: 35, max_iter: 200, tol: 1e-4 }
    }
}

/// A fitted decomposition of `C` channels into `K` sources.
#[derive(Debug, Clone)]
pub struct Ica {
    /// Channel means removed before unmixing.
    pub mean:       Array1<f64>,
    /// `[K, C]`: sources = unmixing · (x − mean).
    pub unmixing:   Array2<f64>,
    /// `[C, K]`: back-projection of the sources.
    pub mixing:     Array2<f64>,
    /// Variance explained by each retained principal component.
    pub pca_var:    Vec<f64>,
    pub n_iter:     usize,
    pub converged:  bool,
}

impl Ica {
    /// Fit on a `[C, T]` matrix.
    pub fn fit(data: &Array2<f64>, params: &IcaParams) -> Result<Self> {
        let (n_ch, n_t) = data.dim();
        if n_t < 2 || n_ch == 0 {
            return Err(Error::EmptyRecording.into());
        }
        let mut k = params.n_components;
        if k == 0 {
            return Err(Error::Degenerate("ICA needs at least one component".into()).into());
        }
        if k > n_ch {
            warn!("n_components {k} > {n_ch} channels; using {n_ch}");
            k = n_ch;
        }
        let mean = data.mean_axis(Axis(1)).ok_or(Error::EmptyRecording)?;
        let centred = data - &mean.view().insert_axis(Axis(1));
        let x = to_dmatrix(&centred);

        // PCA whitening.
        let cov = &x * x.transpose() / n_t as f64;
        let (vals, vecs) = sorted_eigen(cov);
        let floor = vals[0].abs() * 1e-12;
        if vals[k - 1] <= floor {
            return Err(Error::Degenerate(format!(
                "data rank below {k} components (eigenvalue {:.3e})", vals[k - 1]
            )).into());
        }
        let basis = vecs.columns(0, k).into_owned();
        let whitening = DMatrix::from_fn(k, n_ch, |i, j| basis[(j, i)] / vals[i].sqrt());
        let dewhitening = DMatrix::from_fn(n_ch, k, |i, j| basis[(i, j)] * vals[j].sqrt());
        let z = &whitening * &x;

        // Parallel FastICA.
        let mut rng = StdRng::seed_from_u64(params.seed);
        let w0 = DMatrix::from_fn(k, k, |_, _| standard_normal(&mut rng));
        let mut w = symmetric_decorrelation(&w0);
        let mut converged = false;
        let mut n_iter = 0;
        for it in 0..params.max_iter {
            n_iter = it + 1;
            let wz = &w * &z;
            let g = wz.map(f64::tanh);
            let g_prime_mean: Vec<f64> = (0..k)
                .map(|r| g.row(r).iter().map(|v| 1.0 - v * v).sum::<f64>() / n_t as f64)
                .collect();
            let mut w_new = &g * z.transpose() / n_t as f64;
            for r in 0..k {
                for c in 0..k {
                    w_new[(r, c)] -= g_prime_mean[r] * w[(r, c)];
                }
            }
            let w_new = symmetric_decorrelation(&w_new);
            let change = (&w_new * w.transpose())
                .diagonal()
                .iter()
                .map(|d| (d.abs() - 1.0).abs())
                .fold(0.0_f64, f64::max);
            w = w_new;
            if change < params.tol {
                converged = true;
                break;
            }
        }
        if converged {
            info!("ICA: {k} components, converged after {n_iter} iterations");
        } else {
            warn!("ICA did not converge in {} iterations", params.max_iter);
        }

        let unmixing = &w * &whitening;
        let mixing = &dewhitening * w.transpose();
        Ok(Self {
            mean,
            unmixing: to_array2(&unmixing),
            mixing: to_array2(&mixing),
            pca_var: vals[..k].to_vec(),
            n_iter,
            converged,
        })
    }

    pub fn n_components(&self) -> usize {
        self.unmixing.nrows()
    }

    fn check_channels(&self, data: &Array2<f64>) -> Result<()> {
        if data.nrows() != self.mean.len() {
            return Err(Error::ShapeMismatch {
                expected: format!("{} channels", self.mean.len()),
                got: format!("{} channels", data.nrows()),
            }.into());
        }
        Ok(())
    }

    /// `[K, T]` component time courses.
    pub fn sources(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_channels(data)?;
        let centred = data - &self.mean.view().insert_axis(Axis(1));
        Ok(self.unmixing.dot(&centred))
    }

    /// Remove the `exclude` components from `data`.
    pub fn apply(&self, data: &Array2<f64>, exclude: &[usize]) -> Result<Array2<f64>> {
        let k = self.n_components();
        if let Some(&bad) = exclude.iter().find(|&&c| c >= k) {
            return Err(Error::Degenerate(format!("component {bad} out of range for {k} components")).into());
        }
        let sources = self.sources(data)?;
        let mut out = data.clone();
        for &c in exclude {
            let col = self.mixing.column(c).insert_axis(Axis(1));
            let src = sources.row(c).insert_axis(Axis(0));
            out -= &col.dot(&src);
        }
        debug!("ICA removed components {exclude:?}");
        Ok(out)
    }
}

/// Record of the components removed for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcaExclusion {
    pub subject:             String,
    pub segment:             String,
    pub stimulus:            String,
    pub excluded_components: Vec<usize>,
}
