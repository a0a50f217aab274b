//! Row-wise standardization for the z-score heatmap

use ndarray::Array2;

use crate::stats::{mean, sample_variance};

#[derive(Debug, Clone)]
pub struct ZScoreMatrix {
    /// Standardized rows that had non-zero spread
    pub data: Array2<f64>,
    pub gene_ids: Vec<String>,
    /// Genes dropped because their sample SD is zero
    pub excluded: Vec<String>,
}

/// `(x - mean) / sd` per row, with `sd` the sample standard deviation.
///
/// Rows whose SD is zero or non-finite cannot be standardized and are
/// left out.
pub fn zscore_rows(data: &Array2<f64>, gene_ids: &[String]) -> ZScoreMatrix {
    let mut kept_rows = Vec::new();
    let mut kept_ids = Vec::new();
    let mut excluded = Vec::new();

    for (row, id) in data.rows().into_iter().zip(gene_ids) {
        let values = row.to_vec();
        let sd = sample_variance(&values).sqrt();
        if !(sd > 0.0) || !sd.is_finite() {
            excluded.push(id.clone());
            continue;
        }
        let m = mean(&values);
        kept_rows.extend(values.iter().map(|v| (v - m) / sd));
        kept_ids.push(id.clone());
    }

    if !excluded.is_empty() {
        log::warn!(
            "{} gene(s) have zero variance across samples and are left out of the z-score heatmap: {}",
            excluded.len(),
            excluded.join(", ")
        );
    }

    let data = Array2::from_shape_vec((kept_ids.len(), data.ncols()), kept_rows)
        .unwrap_or_else(|_| Array2::zeros((0, data.ncols())));
    ZScoreMatrix {
        data,
        gene_ids: kept_ids,
        excluded,
    }
}
