//! Fitting stage: size factors, dispersions and the per-gene NB GLM

use ndarray::{Array1, Array2, Axis};

use crate::data::{DESeqDataSet, SampleDesign};
use crate::dispersion::{estimate_dispersions, DispersionFit, DispersionParams};
use crate::error::{DeseqError, Result};
use crate::glm::{fit_glm, DesignMatrix, GlmFit, GlmFitParams};
use crate::normalization::{estimate_size_factors, normalized_counts};

/// Everything produced by [`fit_model`]; read-only once built
#[derive(Debug, Clone)]
pub struct FittedModel {
    gene_ids: Vec<String>,
    sample_ids: Vec<String>,
    design: SampleDesign,
    model: DesignMatrix,
    size_factors: Array1<f64>,
    normalized_counts: Array2<f64>,
    base_means: Array1<f64>,
    dispersions: DispersionFit,
    glm: GlmFit,
}

impl FittedModel {
    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn design(&self) -> &SampleDesign {
        &self.design
    }

    pub fn model(&self) -> &DesignMatrix {
        &self.model
    }

    pub fn size_factors(&self) -> &Array1<f64> {
        &self.size_factors
    }

    /// Counts divided by size factors (genes x samples)
    pub fn normalized_counts(&self) -> &Array2<f64> {
        &self.normalized_counts
    }

    pub fn base_means(&self) -> &Array1<f64> {
        &self.base_means
    }

    pub fn dispersions(&self) -> &DispersionFit {
        &self.dispersions
    }

    pub fn glm(&self) -> &GlmFit {
        &self.glm
    }

    pub fn n_genes(&self) -> usize {
        self.gene_ids.len()
    }
}

/// Fit the negative binomial model for every gene of `dds`.
///
/// Per-gene non-convergence is logged; global degeneracy (no usable size
/// factors, no residual degrees of freedom, no finite dispersion) is a
/// fit error.
pub fn fit_model(dds: &DESeqDataSet, dispersion: &DispersionParams, glm: &GlmFitParams) -> Result<FittedModel> {
    let model = dds.model().clone();
    if model.residual_df() == 0 {
        return Err(DeseqError::fit(format!(
            "{} samples cannot support {} coefficients; replicates are required",
            dds.n_samples(),
            model.n_coefs()
        )));
    }
    let counts = dds.counts().counts();

    let size_factors = estimate_size_factors(counts)?;
    log::info!(
        "Size factors: {}",
        dds.sample_ids()
            .iter()
            .zip(size_factors.iter())
            .map(|(s, f)| format!("{}={:.4}", s, f))
            .collect::<Vec<_>>()
            .join(", ")
    );
    let normalized = normalized_counts(counts, &size_factors);
    let base_means = normalized.mean_axis(Axis(1)).unwrap_or_else(|| Array1::zeros(0));
    let sf = size_factors.to_vec();
    let means = base_means.to_vec();

    let dispersions = estimate_dispersions(counts, &sf, &means, &model, dispersion)?;
    log::info!(
        "Dispersion trend {:?}, prior variance {:.4}",
        dispersions.function,
        dispersions.prior.prior_var
    );

    log::info!("Fitting negative binomial GLMs");
    let final_disp = dispersions.final_dispersions.to_vec();
    let glm_fit = fit_glm(counts, &sf, &model, &final_disp, glm)?;

    Ok(FittedModel {
        gene_ids: dds.gene_ids().to_vec(),
        sample_ids: dds.sample_ids().to_vec(),
        design: dds.design().clone(),
        model,
        size_factors,
        normalized_counts: normalized,
        base_means,
        dispersions,
        glm: glm_fit,
    })
}
