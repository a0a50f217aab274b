//! DESeqDataSet: counts bound to the sample design and its model matrix

use ndarray::Array2;

use super::{CountMatrix, SampleDesign};
use crate::error::{DeseqError, Result};
use crate::glm::{build_design_matrix, DesignMatrix};

/// Reorder count columns to the design's sample order.
///
/// Columns with no design row are dropped with a warning; design rows with
/// no count column are a schema error.
pub fn align_to_design(counts: &CountMatrix, design: &SampleDesign) -> Result<CountMatrix> {
    let order = design.sample_ids();
    let extra: Vec<&String> = counts
        .sample_ids()
        .iter()
        .filter(|s| !order.contains(s))
        .collect();
    if !extra.is_empty() {
        log::warn!(
            "Dropping {} count column(s) absent from the design table: {:?}",
            extra.len(),
            extra
        );
    }
    counts.select_samples(&order)
}

/// Counts aligned to the design table plus the `~ layout + treatment` model
#[derive(Debug, Clone)]
pub struct DESeqDataSet {
    counts: CountMatrix,
    design: SampleDesign,
    model: DesignMatrix,
}

impl DESeqDataSet {
    /// Bind counts to a design; see [`align_to_design`].
    pub fn new(counts: CountMatrix, design: SampleDesign) -> Result<Self> {
        let counts = align_to_design(&counts, &design)?;
        if counts.n_genes() == 0 {
            return Err(DeseqError::schema("count matrix has no genes"));
        }
        let model = build_design_matrix(&design)?;

        Ok(Self {
            counts,
            design,
            model,
        })
    }

    pub fn counts(&self) -> &CountMatrix {
        &self.counts
    }

    pub fn design(&self) -> &SampleDesign {
        &self.design
    }

    pub fn model(&self) -> &DesignMatrix {
        &self.model
    }

    pub fn design_matrix(&self) -> &Array2<f64> {
        self.model.matrix()
    }

    pub fn n_genes(&self) -> usize {
        self.counts.n_genes()
    }

    pub fn n_samples(&self) -> usize {
        self.counts.n_samples()
    }

    pub fn gene_ids(&self) -> &[String] {
        self.counts.gene_ids()
    }

    pub fn sample_ids(&self) -> &[String] {
        self.counts.sample_ids()
    }

    /// Dataset restricted to the genes at `rows`
    pub fn subset_genes(&self, rows: &[usize]) -> Self {
        Self {
            counts: self.counts.subset_genes(rows),
            design: self.design.clone(),
            model: self.model.clone(),
        }
    }

    /// Same counts with treated and untreated labels exchanged
    pub fn with_swapped_treatments(&self) -> Result<Self> {
        Self::new(self.counts.clone(), self.design.with_swapped_treatments())
    }
}
