//! Per-timepoint decoding of binary labels from epochs.
//!
//! At every sample offset the features are the cross-channel voltages of
//! each epoch. A [`StandardScaler`] followed by an L2-regularised
//! [`LogisticRegression`] is scored with ROC-AUC under shuffled [`KFold`]
//! cross-validation; the score of the offset is the mean over folds.
//!
//! Folds whose test split holds a single class have no AUC and are skipped
//! with a warning; an offset where every fold is skipped scores `NaN`.
//!
//! This departs from scikit-learn's `cross_val_score(...).mean()`, where a
//! single unscorable fold makes the whole offset `NaN`. Here the offset
//! keeps the mean over the folds that could be scored.
use anyhow::Result;
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::{DecodeConfig, FeatureTarget};
use crate::epochs::Epochs;
use crate::Error;

// ── Scaler ────────────────────────────────────────────────────────────────

/// Per-feature standardisation; constant features get unit scale.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    pub mean:  Array1<f64>,
    pub scale: Array1<f64>,
}

impl StandardScaler {
    /// Fit on `[n_samples, n_features]`.
    pub fn fit(x: ArrayView2<'_, f64>) -> Result<Self> {
        let mean = x.mean_axis(Axis(0)).ok_or(Error::Degenerate("no samples to scale".into()))?;
        let scale = x.std_axis(Axis(0), 0.0).mapv(|s| if s > 0.0 { s } else { 1.0 });
        Ok(Self { mean, scale })
    }

    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        (&x - &self.mean) / &self.scale
    }
}

// ── Logistic regression ───────────────────────────────────────────────────

/// Binary logistic regression minimising
/// `C · Σ logloss + ½‖w‖²` (intercept unpenalised) by Newton's method.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    pub c:         f64,
    pub max_iter:  usize,
    pub tol:       f64,
    pub coef:      Option<Array1<f64>>,
    pub intercept: f64,
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

impl LogisticRegression {
    pub fn new(c: f64) -> Self {
        Self { c, max_iter: 100, tol: 1e-8, coef: None, intercept: 0.0 }
    }

    pub fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[bool]) -> Result<()> {
        let (n, p) = x.dim();
        if n != y.len() {
            return Err(Error::ShapeMismatch {
                expected: format!("{n} labels"),
                got: format!("{} labels", y.len()),
            }.into());
        }
        // Design matrix with a trailing intercept column.
        let xd = DMatrix::from_fn(n, p + 1, |i, j| if j < p { x[[i, j]] } else { 1.0 });
        let yd = DVector::from_iterator(n, y.iter().map(|&b| if b { 1.0 } else { 0.0 }));
        let mut beta = DVector::<f64>::zeros(p + 1);

        for it in 0..self.max_iter {
            let prob = (&xd * &beta).map(sigmoid);
            let mut grad = xd.transpose() * (&prob - &yd) * self.c;
            for j in 0..p {
                grad[j] += beta[j];
            }
            let weights = prob.map(|q| (q * (1.0 - q)).max(1e-12));
            let weighted = DMatrix::from_fn(n, p + 1, |i, j| xd[(i, j)] * weights[i]);
            let mut hess = xd.transpose() * weighted * self.c;
            for j in 0..p {
                hess[(j, j)] += 1.0;
            }
            hess[(p, p)] += 1e-10;
            let step = hess.cholesky()
                .map(|ch| ch.solve(&grad))
                .ok_or_else(|| Error::Degenerate("logistic Hessian not positive definite".into()))?;
            beta -= &step;
            if step.amax() < self.tol {
                debug!("logistic regression converged in {} iterations", it + 1);
                break;
            }
        }
        self.coef = Some(Array1::from_iter(beta.iter().take(p).copied()));
        self.intercept = beta[p];
        Ok(())
    }

    /// Signed distance to the decision boundary, `x · w + b`.
    pub fn decision_function(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let coef = self.coef.as_ref().ok_or(Error::NotFitted("LogisticRegression"))?;
        Ok(x.dot(coef) + self.intercept)
    }

    pub fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }
}

// ── Cross-validation ──────────────────────────────────────────────────────

/// K-fold splitter; the first `n % k` folds hold one extra sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KFold {
    pub n_splits: usize,
    pub shuffle:  bool,
    pub seed:     u64,
}

impl KFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self { n_splits, shuffle: true, seed }
    }

    /// `(train, test)` index pairs over `n` samples.
    pub fn split(&self, n: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
        if self.n_splits < 2 || n < self.n_splits {
            return Err(Error::Degenerate(format!(
                "cannot split {n} samples into {} folds", self.n_splits
            )).into());
        }
        let mut idx: Vec<usize> = (0..n).collect();
        if self.shuffle {
            idx.shuffle(&mut StdRng::seed_from_u64(self.seed));
        }
        let (base, extra) = (n / self.n_splits, n % self.n_splits);
        let mut start = 0;
        Ok((0..self.n_splits)
            .map(|f| {
                let len = base + usize::from(f < extra);
                let test = idx[start..start + len].to_vec();
                let train = idx[..start].iter().chain(&idx[start + len..]).copied().collect();
                start += len;
                (train, test)
            })
            .collect())
    }
}

/// Area under the ROC curve, ties counted half. `None` when only one class
/// is present.
pub fn roc_auc(y: &[bool], scores: &[f64]) -> Option<f64> {
    let n_pos = y.iter().filter(|&&b| b).count();
    let n_neg = y.len() - n_pos;
    if n_pos == 0 || n_neg == 0 || y.len() != scores.len() {
        return None;
    }
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // Average 1-based ranks over tie groups.
    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            ranks[k] = avg;
        }
        i = j + 1;
    }
    let pos_rank_sum: f64 = ranks.iter().zip(y).filter(|(_, &b)| b).map(|(r, _)| r).sum();
    let u = pos_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Some(u / (n_pos * n_neg) as f64)
}

fn fit_score_fold(x: ArrayView2<'_, f64>, y: &[bool], train: &[usize], test: &[usize], c: f64) -> Result<Option<f64>> {
    let y_test: Vec<bool> = test.iter().map(|&i| y[i]).collect();
    let y_train: Vec<bool> = train.iter().map(|&i| y[i]).collect();
    if y_train.iter().all(|&b| b == y_train[0]) {
        return Ok(None);
    }
    let x_train = x.select(Axis(0), train);
    let x_test = x.select(Axis(0), test);
    let scaler = StandardScaler::fit(x_train.view())?;
    let mut clf = LogisticRegression::new(c);
    clf.fit(scaler.transform(x_train.view()).view(), &y_train)?;
    let scores = clf.decision_function(scaler.transform(x_test.view()).view())?;
    Ok(roc_auc(&y_test, &scores.to_vec()))
}

/// Mean ROC-AUC over the folds of `splits`; folds without both classes are
/// skipped. `None` when no fold can be scored.
pub fn cross_val_auc(
    x: ArrayView2<'_, f64>,
    y: &[bool],
    splits: &[(Vec<usize>, Vec<usize>)],
    c: f64,
) -> Result<Option<f64>> {
    let scores: Vec<Option<f64>> = splits.par_iter()
        .map(|(train, test)| fit_score_fold(x, y, train, test, c))
        .collect::<Result<_>>()?;
    let valid: Vec<f64> = scores.iter().flatten().copied().collect();
    if valid.len() < scores.len() {
        warn!("{} of {} folds had a single class and were skipped",
            scores.len() - valid.len(), scores.len());
    }
    Ok((!valid.is_empty()).then(|| valid.iter().sum::<f64>() / valid.len() as f64))
}

/// Binary labels `metadata[target.column] == target.value`.
pub fn labels_for(epochs: &Epochs, target: &FeatureTarget) -> Result<Vec<bool>> {
    Ok(epochs.metadata.matches(&target.column, &target.value)?)
}

/// Decoding curve of one feature.
#[derive(Debug, Clone, Serialize)]
pub struct DecodingCurve {
    pub feature: String,
    pub label:   String,
    pub times:   Vec<f64>,
    pub scores:  Vec<f64>,
}

impl DecodingCurve {
    pub fn peak(&self) -> Option<(f64, f64)> {
        self.times.iter()
            .zip(&self.scores)
            .filter(|(_, s)| s.is_finite())
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(&t, &s)| (t, s))
    }
}

/// Cross-validated AUC at every sample offset of `epochs`.
pub fn decode_over_time(epochs: &Epochs, y: &[bool], cfg: &DecodeConfig) -> Result<Array1<f64>> {
    if y.len() != epochs.len() {
        return Err(Error::ShapeMismatch {
            expected: format!("{} labels", epochs.len()),
            got: format!("{} labels", y.len()),
        }.into());
    }
    let splits = KFold::new(cfg.n_folds, cfg.seed).split(epochs.len())?;
    let scores: Vec<f64> = (0..epochs.n_times())
        .into_par_iter()
        .map(|tt| -> Result<f64> {
            let x = epochs.data.index_axis(Axis(2), tt);
            Ok(cross_val_auc(x, y, &splits, cfg.c)?.unwrap_or(f64::NAN))
        })
        .collect::<Result<_>>()?;
    Ok(Array1::from(scores))
}

/// Decode every feature of `cfg.features` from the same epochs.
pub fn decode_features(epochs: &Epochs, cfg: &DecodeConfig) -> Result<Vec<DecodingCurve>> {
    let times = epochs.times().to_vec();
    cfg.features.iter()
        .map(|target| -> Result<DecodingCurve> {
            let y = labels_for(epochs, target)?;
            let n_pos = y.iter().filter(|&&b| b).count();
            info!("decoding {} == {:?}: {n_pos} positive of {}", target.column, target.value, y.len());
            let scores = decode_over_time(epochs, &y, cfg)?;
            Ok(DecodingCurve {
                feature: target.column.clone(),
                label: target.label.clone(),
                times: times.clone(),
                scores: scores.to_vec(),
            })
        })
        .collect()
}

/// Mean of a score row, ignoring `NaN`.
pub fn nan_mean(scores: ArrayView1<'_, f64>) -> Option<f64> {
    let valid: Vec<f64> = scores.iter().copied().filter(|v| v.is_finite()).collect();
    (!valid.is_empty()).then(|| valid.iter().sum::<f64>() / valid.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn auc_perfect_inverted_and_tied() {
        let y = [false, false, true, true];
        assert_eq!(roc_auc(&y, &[0.1, 0.2, 0.8, 0.9]), Some(1.0));
        assert_eq!(roc_auc(&y, &[0.9, 0.8, 0.2, 0.1]), Some(0.0));
        assert_eq!(roc_auc(&y, &[0.5; 4]), Some(0.5));
        assert_eq!(roc_auc(&[true, true], &[0.1, 0.2]), None);
    }

    #[test]
    fn auc_counts_ties_half() {
        let y = [false, true, false, true];
        // pairs (pos, neg): (0.5,0.5) tie, (0.5,0.1) win, (0.9,0.5) win, (0.9,0.1) win
        assert_abs_diff_eq!(roc_auc(&y, &[0.5, 0.5, 0.1, 0.9]).unwrap(), 3.5 / 4.0);
    }

    #[test]
    fn kfold_partitions_all_samples() {
        let folds = KFold::new(5, 0).split(23).unwrap();
        let sizes: Vec<usize> = folds.iter().map(|(_, t)| t.len()).collect();
        assert_eq!(sizes, vec![5, 5, 5, 4, 4]);
        let mut all: Vec<usize> = folds.iter().flat_map(|(_, t)| t.clone()).collect();
        all.sort_unstable();
        assert_eq!(all, (0..23).collect::<Vec<_>>());
        for (train, test) in &folds {
            assert_eq!(train.len() + test.len(), 23);
        }
        assert!(KFold::new(5, 0).split(3).is_err());
    }

    #[test]
    fn scaler_handles_constant_feature() {
        let x = array![[1.0, 5.0], [3.0, 5.0]];
        let s = StandardScaler::fit(x.view()).unwrap();
        let z = s.transform(x.view());
        assert_eq!(z, array![[-1.0, 0.0], [1.0, 0.0]]);
    }

    #[test]
    fn logistic_separates_shifted_classes() {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| {
            let shift = if i < 20 { -1.0 } else { 1.0 };
            shift + ((i * 7 + j * 3) % 11) as f64 * 0.05
        });
        let y: Vec<bool> = (0..40).map(|i| i >= 20).collect();
        let mut clf = LogisticRegression::new(1.0);
        clf.fit(x.view(), &y).unwrap();
        let p = clf.predict_proba(x.view()).unwrap();
        assert!(p[0] < 0.5 && p[39] > 0.5);
        assert!(LogisticRegression::new(1.0).decision_function(x.view()).is_err());
    }

    #[test]
    fn single_class_folds_are_skipped() {
        let x = Array2::from_shape_fn((10, 2), |(i, j)| (i + j) as f64);
        let y: Vec<bool> = (0..10).map(|i| i == 0).collect();
        let splits = KFold::new(5, 1).split(10).unwrap();
        // The fold testing sample 0 trains on one class; every other fold
        // tests on one class.
        assert_eq!(cross_val_auc(x.view(), &y, &splits, 1.0).unwrap(), None);
        let y: Vec<bool> = (0..10).map(|i| i % 2 == 0).collect();
        assert!(cross_val_auc(x.view(), &y, &splits, 1.0).unwrap().is_some());
    }

    #[test]
    fn unscorable_fold_leaves_mean_of_the_rest() {
        let x = Array2::from_shape_fn((8, 1), |(i, _)| i as f64);
        let y: Vec<bool> = (0..8).map(|i| i >= 4).collect();
        let splits = vec![
            (vec![0, 1, 2, 5, 6, 7], vec![3, 4]),
            (vec![2, 3, 4, 5, 6, 7], vec![0, 1]),
        ];
        assert_eq!(cross_val_auc(x.view(), &y, &splits, 1.0).unwrap(), Some(1.0));
    }
}
