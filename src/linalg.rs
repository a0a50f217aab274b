//! Small dense linear algebra helpers for per-gene model fits
//!
//! Design matrices are held as `ndarray` arrays throughout the crate; the
//! p x p normal-equation systems built from them are solved with `nalgebra`.

use nalgebra::{DMatrix, DVector};
use ndarray::Array2;

/// Convert an ndarray matrix to an nalgebra matrix
pub fn to_dmatrix(m: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(m.nrows(), m.ncols(), |i, j| m[[i, j]])
}

/// X'WX + ridge * I
pub fn weighted_gram(design: &Array2<f64>, weights: &[f64], ridge: f64) -> DMatrix<f64> {
    let p = design.ncols();
    let mut xtwx = DMatrix::zeros(p, p);
    for (i, &w) in weights.iter().enumerate() {
        for j in 0..p {
            let xij = design[[i, j]];
            if xij == 0.0 {
                continue;
            }
            for k in 0..p {
                xtwx[(j, k)] += w * xij * design[[i, k]];
            }
        }
    }
    for j in 0..p {
        xtwx[(j, j)] += ridge;
    }
    xtwx
}

/// X'W z
pub fn weighted_cross(design: &Array2<f64>, weights: &[f64], z: &[f64]) -> DVector<f64> {
    let p = design.ncols();
    let mut out = DVector::zeros(p);
    for (i, (&w, &zi)) in weights.iter().zip(z.iter()).enumerate() {
        for j in 0..p {
            out[j] += w * design[[i, j]] * zi;
        }
    }
    out
}

/// Solve a symmetric positive-definite system, falling back to LU
pub fn solve_spd(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    if let Some(chol) = a.clone().cholesky() {
        return Some(chol.solve(b));
    }
    a.clone().lu().solve(b)
}

/// Inverse of a symmetric positive-definite matrix
pub fn invert_spd(a: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    match a.clone().cholesky() {
        Some(chol) => Some(chol.inverse()),
        None => a.clone().try_inverse(),
    }
}

/// log |A| for a symmetric positive-definite matrix
pub fn log_det_spd(a: &DMatrix<f64>) -> Option<f64> {
    let chol = a.clone().cholesky()?;
    let l = chol.l();
    Some(2.0 * l.diagonal().iter().map(|d| d.ln()).sum::<f64>())
}

/// Numerical rank from singular values, tolerance as in R's qr()
pub fn rank(m: &Array2<f64>) -> usize {
    if m.is_empty() {
        return 0;
    }
    let svd = to_dmatrix(m).svd(false, false);
    let max_sv = svd.singular_values.iter().cloned().fold(0.0_f64, f64::max);
    let tol = m.nrows().max(m.ncols()) as f64 * f64::EPSILON * max_sv;
    svd.singular_values.iter().filter(|&&s| s > tol).count()
}
