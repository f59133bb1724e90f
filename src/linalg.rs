//! Conversions between `ndarray` and `nalgebra`, plus the few dense kernels
//! the decompositions share.
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::Array2;
use rand::{Rng, RngCore};

pub(crate) fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
    let (r, c) = a.dim();
    DMatrix::from_fn(r, c, |i, j| a[[i, j]])
}

pub(crate) fn to_array2(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

/// Eigenpairs of a symmetric matrix, sorted by descending eigenvalue.
pub(crate) fn sorted_eigen(m: DMatrix<f64>) -> (Vec<f64>, DMatrix<f64>) {
    let eig = SymmetricEigen::new(m);
    let mut order: Vec<usize> = (0..eig.eigenvalues.len()).collect();
    order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));
    let values = order.iter().map(|&i| eig.eigenvalues[i]).collect();
    let vectors = DMatrix::from_fn(eig.eigenvectors.nrows(), order.len(), |r, c| {
        eig.eigenvectors[(r, order[c])]
    });
    (values, vectors)
}

/// `(W Wᵀ)^{-1/2} W`: rows of the result are orthonormal.
pub(crate) fn symmetric_decorrelation(w: &DMatrix<f64>) -> DMatrix<f64> {
    let eig = SymmetricEigen::new(w * w.transpose());
    let d = DMatrix::from_diagonal(&eig.eigenvalues.map(|v| 1.0 / v.max(1e-300).sqrt()));
    &eig.eigenvectors * d * eig.eigenvectors.transpose() * w
}

/// Standard normal draw (Box–Muller).
pub(crate) fn standard_normal<R: RngCore>(rng: &mut R) -> f64 {
    let u1: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn eigen_sorted_descending() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 5.0]);
        let (vals, vecs) = sorted_eigen(m);
        assert_abs_diff_eq!(vals[0], 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(vecs[(1, 0)].abs(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn decorrelated_rows_are_orthonormal() {
        let w = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 0.5, 3.0]);
        let d = symmetric_decorrelation(&w);
        let id = &d * d.transpose();
        assert_abs_diff_eq!(id[(0, 0)], 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(id[(0, 1)], 0.0, epsilon = 1e-10);
    }

    #[test]
    fn normal_draws_have_unit_variance() {
        let mut rng = StdRng::seed_from_u64(7);
        let xs: Vec<f64> = (0..20_000).map(|_| standard_normal(&mut rng)).collect();
        let mean = xs.iter().sum::<f64>() / xs.len() as f64;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / xs.len() as f64;
        assert!(mean.abs() < 0.05);
        assert!((var - 1.0).abs() < 0.05);
    }
}
