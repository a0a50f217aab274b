//! Size factor estimation using the median of ratios method

use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::error::{DeseqError, Result};
use crate::stats::median;

/// Estimate size factors by the median of ratios.
///
/// Only genes with a positive count in every sample contribute a reference
/// (geometric mean). Each sample's factor is the median of its ratios to
/// that reference.
pub fn estimate_size_factors(counts: ArrayView2<f64>) -> Result<Array1<f64>> {
    let (n_genes, n_samples) = counts.dim();
    if n_genes == 0 || n_samples == 0 {
        return Err(DeseqError::fit("count matrix is empty"));
    }

    let log_geo_means: Vec<Option<f64>> = counts
        .axis_iter(Axis(0))
        .map(|row| {
            if row.iter().all(|&x| x > 0.0) {
                Some(row.iter().map(|&x| x.ln()).sum::<f64>() / n_samples as f64)
            } else {
                None
            }
        })
        .collect();

    let n_ref = log_geo_means.iter().filter(|g| g.is_some()).count();
    if n_ref == 0 {
        return Err(DeseqError::fit(
            "every gene contains at least one zero; size factors cannot be estimated",
        ));
    }
    log::debug!("Size factors: {} reference genes with no zero counts", n_ref);

    let mut size_factors = Array1::zeros(n_samples);
    for j in 0..n_samples {
        let log_ratios: Vec<f64> = log_geo_means
            .iter()
            .enumerate()
            .filter_map(|(i, g)| g.map(|lg| counts[[i, j]].ln() - lg))
            .collect();
        size_factors[j] = median(&log_ratios).exp();
    }

    if size_factors.iter().any(|&x| x <= 0.0 || !x.is_finite()) {
        return Err(DeseqError::fit("invalid size factors computed"));
    }
    Ok(size_factors)
}

/// Counts divided by each sample's size factor
pub fn normalized_counts(counts: ArrayView2<f64>, size_factors: &Array1<f64>) -> Array2<f64> {
    let mut out = counts.to_owned();
    for (mut col, &sf) in out.axis_iter_mut(Axis(1)).zip(size_factors.iter()) {
        col.mapv_inplace(|x| x / sf);
    }
    out
}
