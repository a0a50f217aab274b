//! Dispersion estimation for negative binomial models

mod gene_wise;
mod map;
mod trend;

pub use gene_wise::{
    d_log_posterior, estimate_gene_dispersion, estimate_gene_dispersions, log_posterior, max_dispersion,
    GeneWiseEstimates, LogNormalPrior,
};
pub use map::{estimate_map_dispersions, estimate_prior_variance, fit_map_dispersion, MapEstimates, PriorVariance};
pub use trend::fit_dispersion_trend;

use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::glm::DesignMatrix;

/// Configurable parameters for dispersion estimation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispersionParams {
    /// Lower bound on any dispersion estimate
    pub min_disp: f64,
    /// Log-posterior change that ends the line search
    pub disp_tol: f64,
    /// Initial line-search step size
    pub kappa_0: f64,
    pub maxit: usize,
    /// Robust SDs above the trend beyond which a gene keeps its gene-wise estimate
    pub outlier_sd: f64,
}

impl Default for DispersionParams {
    fn default() -> Self {
        Self {
            min_disp: 1e-8,
            disp_tol: 1e-6,
            kappa_0: 1.0,
            maxit: 100,
            outlier_sd: 2.0,
        }
    }
}

/// Fitted dispersion-mean relationship
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispersionFunction {
    /// asympt_disp + extra_pois / mean
    Parametric { asympt_disp: f64, extra_pois: f64 },
    /// Constant fallback
    Mean { alpha: f64 },
}

impl DispersionFunction {
    pub fn eval(&self, mean: f64) -> f64 {
        match *self {
            DispersionFunction::Parametric {
                asympt_disp,
                extra_pois,
            } => {
                if mean > 0.0 {
                    asympt_disp + extra_pois / mean
                } else {
                    asympt_disp
                }
            }
            DispersionFunction::Mean { alpha } => alpha,
        }
    }
}

/// All three dispersion layers for a dataset
#[derive(Debug, Clone)]
pub struct DispersionFit {
    pub gene_wise: Array1<f64>,
    pub trended: Array1<f64>,
    /// Dispersions used by the final GLM fit
    pub final_dispersions: Array1<f64>,
    pub function: DispersionFunction,
    pub prior: PriorVariance,
    pub outliers: Vec<bool>,
}

/// Gene-wise estimates, trend, then MAP shrinkage.
///
/// `base_means` are the row means of the normalized counts.
pub fn estimate_dispersions(
    counts: ArrayView2<f64>,
    size_factors: &[f64],
    base_means: &[f64],
    model: &DesignMatrix,
    params: &DispersionParams,
) -> Result<DispersionFit> {
    log::info!("Estimating gene-wise dispersions for {} genes", counts.nrows());
    let gene = estimate_gene_dispersions(counts, size_factors, model, params)?;

    log::info!("Fitting the dispersion-mean trend");
    let gene_wise_vec = gene.dispersions.to_vec();
    let function = fit_dispersion_trend(base_means, &gene_wise_vec, params.min_disp)?;
    let trended: Array1<f64> = base_means.iter().map(|&m| function.eval(m)).collect();

    log::info!("Shrinking dispersions toward the trend");
    let map = estimate_map_dispersions(counts, model.matrix(), &gene.mu, &gene.dispersions, &trended, params);

    Ok(DispersionFit {
        gene_wise: gene.dispersions,
        trended,
        final_dispersions: map.dispersions,
        function,
        prior: map.prior,
        outliers: map.outliers,
    })
}
