//! Low-count gene filtering ahead of model fitting

use serde::Serialize;

use crate::data::DESeqDataSet;
use crate::error::{DeseqError, Result};

/// Genes kept and removed by [`filter_low_counts`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountFilterSummary {
    pub kept: usize,
    pub removed: usize,
    /// Samples that must exceed the count threshold
    pub min_samples: usize,
}

/// Keep genes whose count exceeds `min_count` in at least as many samples
/// as the smallest treatment group.
pub fn filter_low_counts(dds: &DESeqDataSet, min_count: u64) -> Result<(DESeqDataSet, CountFilterSummary)> {
    let min_samples = dds.design().smallest_group_size();
    let threshold = min_count as f64;
    let counts = dds.counts().counts();

    let keep: Vec<usize> = counts
        .rows()
        .into_iter()
        .enumerate()
        .filter(|(_, row)| row.iter().filter(|&&c| c > threshold).count() >= min_samples)
        .map(|(i, _)| i)
        .collect();

    let summary = CountFilterSummary {
        kept: keep.len(),
        removed: dds.n_genes() - keep.len(),
        min_samples,
    };
    if keep.is_empty() {
        return Err(DeseqError::fit(format!(
            "no gene has counts above {} in at least {} samples",
            min_count, min_samples
        )));
    }
    log::info!(
        "Count filter: kept {} genes, removed {} (count > {} in >= {} samples)",
        summary.kept,
        summary.removed,
        min_count,
        min_samples
    );
    Ok((dds.subset_genes(&keep), summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CountMatrix, LibraryLayout, SampleDesign, SampleRecord, Treatment};
    use ndarray::array;

    fn dataset(counts: ndarray::Array2<f64>) -> DESeqDataSet {
        let records = ["u1", "u2", "t1", "t2", "t3"]
            .iter()
            .map(|s| SampleRecord {
                sample_id: s.to_string(),
                layout: LibraryLayout::Paired,
                treatment: if s.starts_with('u') {
                    Treatment::Untreated
                } else {
                    Treatment::Treated
                },
            })
            .collect();
        let genes = (0..counts.nrows()).map(|i| format!("g{}", i)).collect();
        let samples = ["u1", "u2", "t1", "t2", "t3"].iter().map(|s| s.to_string()).collect();
        let counts = CountMatrix::new(counts, genes, samples).unwrap();
        DESeqDataSet::new(counts, SampleDesign::new(records).unwrap()).unwrap()
    }

    #[test]
    fn test_boundary_is_strictly_greater() {
        // smallest group has 2 samples
        let dds = dataset(array![
            [11.0, 11.0, 0.0, 0.0, 0.0],
            [10.0, 10.0, 10.0, 10.0, 10.0],
            [11.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 50.0, 60.0, 0.0],
        ]);
        let (kept, summary) = filter_low_counts(&dds, 10).unwrap();
        assert_eq!(kept.gene_ids(), &["g0".to_string(), "g3".into()]);
        assert_eq!(summary.kept, 2);
        assert_eq!(summary.removed, 2);
        assert_eq!(summary.min_samples, 2);
    }

    #[test]
    fn test_nothing_survives_is_fit_error() {
        let dds = dataset(array![[1.0, 2.0, 3.0, 4.0, 5.0]]);
        let err = filter_low_counts(&dds, 10).unwrap_err();
        assert!(matches!(err, DeseqError::Fit { .. }));
    }
}
