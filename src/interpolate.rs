//! Spherical-spline interpolation of bad EEG channels.
//!
//! Electrode positions are projected onto the unit sphere around the centre
//! of the least-squares sphere through them. With
//! `g(x) = 1/4π · Σₙ (2n + 1) / (n(n + 1))⁴ · Pₙ(x)` over the first seven
//! Legendre terms, the bad channels are
//! `[G_to, 1] · pinv([[G_from, 1], [1ᵀ, 0]])[:, ..n_good] · x_good`.
use anyhow::{anyhow, Result};
use log::{info, warn};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array2, Axis};

use crate::fiff::ChannelKind;
use crate::linalg::to_array2;
use crate::recording::Recording;
use crate::Error;

const STIFFNESS: i32 = 4;
const LEGENDRE_TERMS: usize = 7;

/// Legendre-series spline kernel `g(cos θ)`.
pub fn spline_kernel(x: f64) -> f64 {
    let (mut p_prev, mut p) = (1.0, x);
    let mut sum = 0.0;
    for n in 1..=LEGENDRE_TERMS {
        let nf = n as f64;
        sum += (2.0 * nf + 1.0) / (nf * (nf + 1.0)).powi(STIFFNESS) * p;
        let next = ((2.0 * nf + 1.0) * x * p - nf * p_prev) / (nf + 1.0);
        p_prev = p;
        p = next;
    }
    sum / (4.0 * std::f64::consts::PI)
}

/// Centre of the least-squares sphere through `pts`; the centroid when the
/// fit is underdetermined.
pub fn fit_sphere_centre(pts: &[[f64; 3]]) -> [f64; 3] {
    let centroid = [0, 1, 2].map(|k| pts.iter().map(|p| p[k]).sum::<f64>() / pts.len().max(1) as f64);
    if pts.len() < 4 {
        return centroid;
    }
    // |p|² = 2 p·c + (r² − |c|²)
    let a = DMatrix::from_fn(pts.len(), 4, |i, j| if j < 3 { 2.0 * pts[i][j] } else { 1.0 });
    let b = DVector::from_iterator(pts.len(), pts.iter().map(|p| p[0] * p[0] + p[1] * p[1] + p[2] * p[2]));
    match a.svd(true, true).solve(&b, 1e-12) {
        Ok(x) if x.iter().all(|v| v.is_finite()) => [x[0], x[1], x[2]],
        _ => centroid,
    }
}

fn unit_positions(pos: &[[f64; 3]], centre: [f64; 3]) -> Vec<[f64; 3]> {
    pos.iter()
        .map(|p| {
            let d = [p[0] - centre[0], p[1] - centre[1], p[2] - centre[2]];
            let norm = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt().max(1e-12);
            [d[0] / norm, d[1] / norm, d[2] / norm]
        })
        .collect()
}

fn kernel_matrix(a: &[[f64; 3]], b: &[[f64; 3]]) -> DMatrix<f64> {
    DMatrix::from_fn(a.len(), b.len(), |i, j| {
        let cos = (a[i][0] * b[j][0] + a[i][1] * b[j][1] + a[i][2] * b[j][2]).clamp(-1.0, 1.0);
        spline_kernel(cos)
    })
}

/// `[n_to, n_from]` matrix mapping good-channel values to the targets.
pub fn interpolation_matrix(from: &[[f64; 3]], to: &[[f64; 3]]) -> Result<Array2<f64>> {
    let n = from.len();
    let all: Vec<[f64; 3]> = from.iter().chain(to).copied().collect();
    let centre = fit_sphere_centre(&all);
    let from = unit_positions(from, centre);
    let to = unit_positions(to, centre);

    let g_from = kernel_matrix(&from, &from);
    let mut c = DMatrix::from_element(n + 1, n + 1, 1.0);
    c.view_mut((0, 0), (n, n)).copy_from(&g_from);
    c[(n, n)] = 0.0;
    let c_inv = c.pseudo_inverse(1e-12).map_err(|e| anyhow!("interpolation pseudo-inverse: {e}"))?;

    let g_to = kernel_matrix(&to, &from);
    let mut g_to_ext = DMatrix::from_element(to.len(), n + 1, 1.0);
    g_to_ext.view_mut((0, 0), (to.len(), n)).copy_from(&g_to);
    let m = g_to_ext * c_inv.columns(0, n);
    Ok(to_array2(&m))
}

/// Replace bad EEG channels with spline estimates from the good ones and
/// clear their bad flags. A no-op without bad EEG channels.
pub fn interpolate_bads(rec: &mut Recording) -> Result<()> {
    let eeg: Vec<usize> = rec.channels.iter()
        .enumerate()
        .filter(|(_, c)| c.kind == ChannelKind::Eeg)
        .map(|(i, _)| i)
        .collect();
    let (bad, good): (Vec<usize>, Vec<usize>) =
        eeg.into_iter().partition(|&i| rec.bads.contains(&rec.channels[i].name));
    if bad.is_empty() {
        return Ok(());
    }
    let positions = |idx: &[usize]| -> Result<Vec<[f64; 3]>> {
        idx.iter()
            .map(|&i| rec.channels[i].position().ok_or_else(|| anyhow::Error::from(
                Error::Degenerate(format!("channel {} has no electrode position", rec.channels[i].name))
            )))
            .collect()
    };
    if good.len() < 3 {
        return Err(Error::Degenerate(format!("only {} good EEG channels to interpolate from", good.len())).into());
    }
    let from = positions(&good)?;
    let to = positions(&bad)?;
    let m = interpolation_matrix(&from, &to)?;

    let estimate = m.dot(&rec.data.select(Axis(0), &good));
    for (row, &ch) in estimate.axis_iter(Axis(0)).zip(&bad) {
        rec.data.row_mut(ch).assign(&row);
    }
    let names: Vec<String> = bad.iter().map(|&i| rec.channels[i].name.clone()).collect();
    for n in &names {
        rec.bads.remove(n);
    }
    if !rec.bads.is_empty() {
        warn!("non-EEG bad channels left untouched: {:?}", rec.bads.names());
    }
    info!("interpolated {} channels from {}: {names:?}", bad.len(), good.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiff::ChannelInfo;

    fn sphere_points(n: usize) -> Vec<[f64; 3]> {
        // Fibonacci lattice over the upper hemisphere.
        let golden = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
        (0..n)
            .map(|i| {
                let z = 1.0 - i as f64 / (n - 1) as f64 * 0.9;
                let r = (1.0 - z * z).sqrt();
                let th = golden * i as f64;
                [r * th.cos(), r * th.sin(), z]
            })
            .collect()
    }

    #[test]
    fn sphere_fit_finds_offset_centre() {
        let pts: Vec<[f64; 3]> = sphere_points(30).iter()
            .map(|p| [p[0] * 0.09 + 0.01, p[1] * 0.09, p[2] * 0.09 - 0.02])
            .collect();
        let c = fit_sphere_centre(&pts);
        approx::assert_abs_diff_eq!(c[0], 0.01, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(c[2], -0.02, epsilon = 1e-9);
    }

    #[test]
    fn kernel_is_decreasing_in_angle() {
        assert!(spline_kernel(1.0) > spline_kernel(0.5));
        assert!(spline_kernel(0.5) > spline_kernel(-0.5));
    }

    #[test]
    fn rows_reproduce_constant_field() {
        let pts = sphere_points(20);
        let m = interpolation_matrix(&pts[..18], &pts[18..]).unwrap();
        for row in m.axis_iter(Axis(0)) {
            approx::assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn smooth_field_is_recovered() {
        let pts = sphere_points(32);
        let names: Vec<String> = (0..32).map(|i| format!("E{}", i + 1)).collect();
        let chs: Vec<ChannelInfo> = names.iter()
            .enumerate()
            .map(|(i, n)| {
                let mut c = ChannelInfo::new(n, ChannelKind::Eeg, i);
                c.loc[..3].copy_from_slice(&pts[i].map(|v| v as f32));
                c
            })
            .collect();
        let data = Array2::from_shape_fn((32, 4), |(c, t)| pts[c][0] * (t + 1) as f64);
        let mut rec = Recording::new(data.clone(), 100.0, chs).unwrap();
        rec.bads.insert("E10");
        rec.data.row_mut(9).fill(500.0);
        interpolate_bads(&mut rec).unwrap();
        assert!(rec.bads.is_empty());
        for t in 0..4 {
            approx::assert_abs_diff_eq!(rec.data[[9, t]], data[[9, t]], epsilon = 0.1 * (t + 1) as f64);
        }
    }
}
