//! Principal component analysis of samples

use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array2, Axis};

use crate::error::{DeseqError, Result};
use crate::stats::{cmp_nan_last, sample_variance};

/// First two principal components of the samples
#[derive(Debug, Clone)]
pub struct PcaResult {
    pub pc1: Vec<f64>,
    pub pc2: Vec<f64>,
    /// Share of total variance, in percent, for PC1 and PC2
    pub percent_variance: [f64; 2],
    /// Genes that entered the decomposition
    pub n_genes: usize,
}

/// Row indices of the `n` highest-variance rows, ties broken by index
fn most_variable(data: &Array2<f64>, n: usize) -> Vec<usize> {
    let variances: Vec<f64> = data.rows().into_iter().map(|r| sample_variance(&r.to_vec())).collect();
    let mut idx: Vec<usize> = (0..data.nrows()).collect();
    idx.sort_by(|&a, &b| cmp_nan_last(-variances[a], -variances[b]));
    idx.truncate(n);
    idx
}

/// PCA on the `top_genes` most variable rows of a genes x samples matrix.
///
/// Rows are centred and the sample Gram matrix is eigen-decomposed, which
/// is equivalent to an SVD of the centred data and cheap when samples are
/// few. Each component's sign is fixed so its largest-magnitude score is
/// positive.
pub fn pca(data: &Array2<f64>, top_genes: usize) -> Result<PcaResult> {
    let n_samples = data.ncols();
    if n_samples < 2 {
        return Err(DeseqError::fit(format!("PCA needs at least 2 samples, got {}", n_samples)));
    }
    let genes = most_variable(data, top_genes);
    if genes.is_empty() {
        return Err(DeseqError::fit("PCA needs at least one gene"));
    }

    let mut x = data.select(Axis(0), &genes);
    for mut row in x.rows_mut() {
        let m = row.mean().unwrap_or(0.0);
        row.mapv_inplace(|v| v - m);
    }
    let gram = DMatrix::from_fn(n_samples, n_samples, |i, j| x.column(i).dot(&x.column(j)));
    let eig = SymmetricEigen::new(gram);

    let mut order: Vec<usize> = (0..n_samples).collect();
    order.sort_by(|&a, &b| cmp_nan_last(-eig.eigenvalues[a], -eig.eigenvalues[b]));
    let total: f64 = eig.eigenvalues.iter().map(|l| l.max(0.0)).sum();

    let component = |k: usize| -> (Vec<f64>, f64) {
        let lambda = eig.eigenvalues[order[k]].max(0.0);
        let vector = eig.eigenvectors.column(order[k]);
        let mut scores: Vec<f64> = vector.iter().map(|v| v * lambda.sqrt()).collect();
        let pivot = scores.iter().cloned().fold(0.0_f64, |acc, s| if s.abs() > acc.abs() { s } else { acc });
        if pivot < 0.0 {
            scores.iter_mut().for_each(|s| *s = -*s);
        }
        let percent = if total > 0.0 { 100.0 * lambda / total } else { 0.0 };
        (scores, percent)
    };
    let (pc1, pct1) = component(0);
    let (pc2, pct2) = component(1);
    log::debug!("PCA on {} genes: PC1 {:.1}%, PC2 {:.1}%", genes.len(), pct1, pct2);

    Ok(PcaResult {
        pc1,
        pc2,
        percent_variance: [pct1, pct2],
        n_genes: genes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_two_groups_separate_on_pc1() {
        let data = array![
            [1.0, 1.2, 0.9, 8.0, 8.1, 7.9],
            [2.0, 2.1, 1.9, 9.0, 9.2, 8.8],
            [5.0, 5.0, 5.0, 5.0, 5.0, 5.0],
            [3.0, 3.1, 2.9, 3.0, 3.05, 2.95],
        ];
        let res = pca(&data, 500).unwrap();
        assert_eq!(res.n_genes, 4);
        assert!(res.percent_variance[0] > 95.0);
        assert!(res.percent_variance[0] + res.percent_variance[1] <= 100.0 + 1e-9);
        let sign = res.pc1[0].signum();
        assert!(res.pc1[..3].iter().all(|&s| s.signum() == sign));
        assert!(res.pc1[3..].iter().all(|&s| s.signum() == -sign));
    }

    #[test]
    fn test_top_genes_limits_rows() {
        let data = array![[1.0, 9.0, 1.0], [1.0, 1.1, 1.0], [0.0, 0.0, 0.0]];
        let res = pca(&data, 1).unwrap();
        assert_eq!(res.n_genes, 1);
        assert!(res.pc2.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn test_single_sample_is_fit_error() {
        assert!(matches!(pca(&array![[1.0], [2.0]], 10), Err(DeseqError::Fit { .. })));
    }
}
