//! Count matrix representation for RNA-seq data

use std::collections::{HashMap, HashSet};

use ndarray::{Array2, ArrayView2, Axis};

use crate::error::{DeseqError, Result};

/// A count matrix of raw read counts
/// Rows are genes, columns are samples
#[derive(Debug, Clone)]
pub struct CountMatrix {
    /// Raw count data (genes x samples), integral values
    counts: Array2<f64>,
    gene_ids: Vec<String>,
    sample_ids: Vec<String>,
}

fn first_duplicate(ids: &[String]) -> Option<&str> {
    let mut seen = HashSet::new();
    ids.iter().find(|id| !seen.insert(id.as_str())).map(|s| s.as_str())
}

impl CountMatrix {
    /// Create a new count matrix from raw data
    pub fn new(counts: Array2<f64>, gene_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let (n_genes, n_samples) = counts.dim();

        if gene_ids.len() != n_genes {
            return Err(DeseqError::schema(format!(
                "expected {} gene ids, got {}",
                n_genes,
                gene_ids.len()
            )));
        }
        if sample_ids.len() != n_samples {
            return Err(DeseqError::schema(format!(
                "expected {} sample ids, got {}",
                n_samples,
                sample_ids.len()
            )));
        }
        if counts.iter().any(|&x| x < 0.0 || !x.is_finite() || x != x.round()) {
            return Err(DeseqError::schema(
                "counts must be non-negative integers",
            ));
        }
        if let Some(dup) = first_duplicate(&gene_ids) {
            return Err(DeseqError::schema(format!("duplicate gene id '{}'", dup)));
        }
        if let Some(dup) = first_duplicate(&sample_ids) {
            return Err(DeseqError::schema(format!("duplicate sample id '{}'", dup)));
        }

        Ok(Self {
            counts,
            gene_ids,
            sample_ids,
        })
    }

    pub fn n_genes(&self) -> usize {
        self.counts.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.counts.ncols()
    }

    pub fn counts(&self) -> ArrayView2<f64> {
        self.counts.view()
    }

    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Reorder columns to `order`, dropping any sample not listed.
    ///
    /// Fails if a requested sample is missing from the matrix.
    pub fn select_samples(&self, order: &[String]) -> Result<Self> {
        let index: HashMap<&str, usize> = self
            .sample_ids
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i))
            .collect();

        let missing: Vec<&str> = order
            .iter()
            .filter(|s| !index.contains_key(s.as_str()))
            .map(|s| s.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(DeseqError::schema(format!(
                "samples in design table but not in count matrix: {:?}",
                missing
            )));
        }

        let cols: Vec<usize> = order.iter().map(|s| index[s.as_str()]).collect();
        Ok(Self {
            counts: self.counts.select(Axis(1), &cols),
            gene_ids: self.gene_ids.clone(),
            sample_ids: order.to_vec(),
        })
    }

    /// Keep only the genes at `rows`, in the given order
    pub fn subset_genes(&self, rows: &[usize]) -> Self {
        Self {
            counts: self.counts.select(Axis(0), rows),
            gene_ids: rows.iter().map(|&i| self.gene_ids[i].clone()).collect(),
            sample_ids: self.sample_ids.clone(),
        }
    }
}
