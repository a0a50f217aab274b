//! Empirical Bayes shrinkage of gene-wise dispersions toward the trend

use ndarray::{Array1, Array2, ArrayView2};
use rayon::prelude::*;

use super::gene_wise::{grid_search, line_search, max_dispersion, LogNormalPrior};
use super::DispersionParams;
use crate::stats::{mad_squared, trigamma};

/// Floor on the log-dispersion prior variance
const MIN_PRIOR_VAR: f64 = 0.25;
/// Gene-wise estimates below this do not inform the prior
const MIN_RESIDUAL_DISPERSION: f64 = 1e-6;

/// Prior variance of log dispersion around the trend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorVariance {
    /// Variance used by the MAP step
    pub prior_var: f64,
    /// Squared MAD of the log residuals, used for outlier detection
    pub var_log_disp_ests: f64,
}

/// Estimate the prior variance from log(gene-wise / trend) residuals.
///
/// The sampling variance of a log dispersion estimate with `df` residual
/// degrees of freedom is trigamma(df / 2); it is subtracted from the
/// observed spread.
pub fn estimate_prior_variance(
    gene_wise: &[f64],
    trended: &[f64],
    n_samples: usize,
    n_coefs: usize,
) -> PriorVariance {
    let residuals: Vec<f64> = gene_wise
        .iter()
        .zip(trended)
        .filter(|(&g, &t)| g.is_finite() && g >= MIN_RESIDUAL_DISPERSION && t > 0.0)
        .map(|(&g, &t)| g.ln() - t.ln())
        .collect();

    if residuals.len() < 3 {
        log::warn!(
            "Only {} genes inform the dispersion prior; using variance {}",
            residuals.len(),
            MIN_PRIOR_VAR
        );
        return PriorVariance {
            prior_var: MIN_PRIOR_VAR,
            var_log_disp_ests: MIN_PRIOR_VAR,
        };
    }

    let var_log_disp_ests = mad_squared(&residuals);
    let df = n_samples.saturating_sub(n_coefs);
    let prior_var = if df > 3 {
        (var_log_disp_ests - trigamma(df as f64 / 2.0)).max(MIN_PRIOR_VAR)
    } else {
        MIN_PRIOR_VAR
    };
    PriorVariance {
        prior_var,
        var_log_disp_ests,
    }
}

/// MAP dispersion for one gene given its trend value
pub fn fit_map_dispersion(
    counts: &[f64],
    design: &Array2<f64>,
    mu: &[f64],
    gene_disp: f64,
    trend_disp: f64,
    prior_var: f64,
    params: &DispersionParams,
) -> f64 {
    let max_disp = max_dispersion(counts.len());
    let start = if gene_disp.is_finite() && gene_disp > 0.1 * trend_disp {
        gene_disp
    } else {
        trend_disp
    };
    let prior = Some(LogNormalPrior {
        log_mean: trend_disp.ln(),
        variance: prior_var,
    });

    let search = line_search(counts, design, mu, start.ln(), prior, max_disp, params);
    let alpha = if search.converged(params.maxit) {
        search.log_alpha.exp()
    } else {
        grid_search(counts, design, mu, prior, params.min_disp, max_disp)
    };
    alpha.clamp(params.min_disp, max_disp)
}

/// Final dispersions and the genes kept at their gene-wise value
#[derive(Debug, Clone)]
pub struct MapEstimates {
    pub dispersions: Array1<f64>,
    pub outliers: Vec<bool>,
    pub prior: PriorVariance,
}

/// Shrink every gene toward the trend.
///
/// Genes whose gene-wise estimate lies more than `outlier_sd` robust SDs
/// above the trend keep the gene-wise estimate.
pub fn estimate_map_dispersions(
    counts: ArrayView2<f64>,
    design: &Array2<f64>,
    mu: &Array2<f64>,
    gene_wise: &Array1<f64>,
    trended: &Array1<f64>,
    params: &DispersionParams,
) -> MapEstimates {
    let (n_genes, n_samples) = counts.dim();
    let gw = gene_wise.to_vec();
    let tr = trended.to_vec();
    let prior = estimate_prior_variance(&gw, &tr, n_samples, design.ncols());
    log::debug!(
        "Dispersion prior variance {:.4} (varLogDispEsts {:.4})",
        prior.prior_var,
        prior.var_log_disp_ests
    );

    let threshold = params.outlier_sd * prior.var_log_disp_ests.sqrt();
    let fitted: Vec<(f64, bool)> = (0..n_genes)
        .into_par_iter()
        .map(|i| {
            let g = gw[i];
            let t = tr[i];
            if g.is_finite() && g > 0.0 && t > 0.0 && g.ln() - t.ln() > threshold {
                return (g, true);
            }
            let y = counts.row(i).to_vec();
            let m = mu.row(i).to_vec();
            (fit_map_dispersion(&y, design, &m, g, t, prior.prior_var, params), false)
        })
        .collect();

    let outliers: Vec<bool> = fitted.iter().map(|&(_, o)| o).collect();
    let n_out = outliers.iter().filter(|&&o| o).count();
    if n_out > 0 {
        log::info!("{} genes are dispersion outliers and keep their gene-wise estimate", n_out);
    }
    MapEstimates {
        dispersions: fitted.into_iter().map(|(a, _)| a).collect(),
        outliers,
        prior,
    }
}
