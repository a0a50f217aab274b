//! GLM fitting using Iteratively Reweighted Least Squares (IRLS)

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::design::DesignMatrix;
use super::negative_binomial::{nb_deviance, nb_mean, nb_weight, ridge_lambda, MAX_BETA, MIN_MU};
use crate::error::{DeseqError, Result};
use crate::linalg;

/// Configurable parameters for GLM fitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlmFitParams {
    /// Maximum IRLS iterations
    pub maxit: usize,
    /// Relative deviance change that counts as converged
    pub beta_tol: f64,
}

impl Default for GlmFitParams {
    fn default() -> Self {
        Self {
            maxit: 100,
            beta_tol: 1e-8,
        }
    }
}

/// Outcome of IRLS for one gene
#[derive(Debug, Clone)]
pub struct GeneFit {
    /// Coefficients on the natural-log scale
    pub coefficients: Vec<f64>,
    pub standard_errors: Vec<f64>,
    /// Fitted means, floored at `MIN_MU`
    pub mu: Vec<f64>,
    pub converged: bool,
    pub iterations: usize,
}

/// Per-gene GLM fit for the whole dataset
#[derive(Debug, Clone)]
pub struct GlmFit {
    /// Coefficients (genes x coefs), natural-log scale
    pub coefficients: Array2<f64>,
    pub standard_errors: Array2<f64>,
    /// Fitted means (genes x samples)
    pub mu: Array2<f64>,
    pub converged: Vec<bool>,
}

impl GlmFit {
    pub fn n_not_converged(&self) -> usize {
        self.converged.iter().filter(|&&c| !c).count()
    }
}

fn linear_predictor(design: &Array2<f64>, beta: &[f64], row: usize) -> f64 {
    beta.iter().enumerate().map(|(j, b)| design[[row, j]] * b).sum()
}

fn fitted_means(design: &Array2<f64>, beta: &[f64], size_factors: &[f64]) -> Vec<f64> {
    size_factors
        .iter()
        .enumerate()
        .map(|(i, &s)| nb_mean(linear_predictor(design, beta, i), s).max(MIN_MU))
        .collect()
}

/// Starting coefficients from least squares on log(normalized + 0.1)
fn initial_beta(counts: &[f64], size_factors: &[f64], design: &Array2<f64>) -> Vec<f64> {
    let log_norm: Vec<f64> = counts
        .iter()
        .zip(size_factors)
        .map(|(&c, &s)| (c / s + 0.1).ln())
        .collect();
    let ones = vec![1.0; counts.len()];
    let xtx = linalg::weighted_gram(design, &ones, 0.0);
    let xty = linalg::weighted_cross(design, &ones, &log_norm);

    match linalg::solve_spd(&xtx, &xty) {
        Some(b) if b.iter().all(|v| v.is_finite()) => b.iter().copied().collect(),
        _ => {
            let mut beta = vec![0.0; design.ncols()];
            let mean_norm = counts.iter().zip(size_factors).map(|(&c, &s)| c / s).sum::<f64>()
                / counts.len() as f64;
            beta[0] = mean_norm.max(0.1).ln();
            beta
        }
    }
}

/// Run IRLS for a single gene at fixed dispersion `alpha`.
///
/// Convergence follows the relative deviance change
/// `|dev - dev_old| / (|dev| + 0.1) < tol`. Any |beta| above `MAX_BETA`
/// stops the iteration and marks the gene as not converged.
pub fn irls(
    counts: &[f64],
    size_factors: &[f64],
    design: &Array2<f64>,
    alpha: f64,
    maxit: usize,
    tol: f64,
) -> (Vec<f64>, Vec<f64>, bool, usize) {
    let n = counts.len();
    let lambda = ridge_lambda();
    let mut beta = initial_beta(counts, size_factors, design);
    let mut mu = fitted_means(design, &beta, size_factors);
    let mut dev_old = 0.0_f64;
    let mut converged = false;
    let mut iterations = 0;

    let mut weights = vec![0.0; n];
    let mut z = vec![0.0; n];

    for t in 0..maxit {
        iterations = t + 1;
        for i in 0..n {
            weights[i] = nb_weight(mu[i], alpha);
            z[i] = (mu[i] / size_factors[i]).ln() + (counts[i] - mu[i]) / mu[i];
        }
        let xtwx = linalg::weighted_gram(design, &weights, lambda);
        let xtwz = linalg::weighted_cross(design, &weights, &z);
        let next = match linalg::solve_spd(&xtwx, &xtwz) {
            Some(b) => b,
            None => break,
        };
        if next.iter().any(|b| b.abs() > MAX_BETA || !b.is_finite()) {
            break;
        }
        beta = next.iter().copied().collect();
        mu = fitted_means(design, &beta, size_factors);

        let dev = nb_deviance(counts, &mu, alpha);
        let conv_test = (dev - dev_old).abs() / (dev.abs() + 0.1);
        if conv_test.is_nan() {
            break;
        }
        if t > 0 && conv_test < tol {
            converged = true;
            break;
        }
        dev_old = dev;
    }

    (beta, mu, converged, iterations)
}

/// Sandwich standard errors for the ridge-penalized fit
fn standard_errors(design: &Array2<f64>, mu: &[f64], alpha: f64) -> Vec<f64> {
    let p = design.ncols();
    let weights: Vec<f64> = mu.iter().map(|&m| nb_weight(m, alpha)).collect();
    let xtwx = linalg::weighted_gram(design, &weights, 0.0);
    let mut ridged = xtwx.clone();
    for j in 0..p {
        ridged[(j, j)] += ridge_lambda();
    }
    match linalg::invert_spd(&ridged) {
        Some(inv) => {
            let sigma = &inv * &xtwx * &inv;
            (0..p)
                .map(|j| {
                    let v = sigma[(j, j)];
                    if v > 0.0 {
                        v.sqrt()
                    } else {
                        f64::NAN
                    }
                })
                .collect()
        }
        None => vec![f64::NAN; p],
    }
}

/// Fit the NB GLM for one gene
pub fn fit_single_gene(
    counts: &[f64],
    size_factors: &[f64],
    design: &Array2<f64>,
    alpha: f64,
    params: &GlmFitParams,
) -> GeneFit {
    let (coefficients, mu, converged, iterations) =
        irls(counts, size_factors, design, alpha, params.maxit, params.beta_tol);
    let standard_errors = standard_errors(design, &mu, alpha);
    GeneFit {
        coefficients,
        standard_errors,
        mu,
        converged,
        iterations,
    }
}

/// Fit the GLM for every gene in parallel using final dispersions
pub fn fit_glm(
    counts: ArrayView2<f64>,
    size_factors: &[f64],
    model: &DesignMatrix,
    dispersions: &[f64],
    params: &GlmFitParams,
) -> Result<GlmFit> {
    let (n_genes, n_samples) = counts.dim();
    if dispersions.len() != n_genes || size_factors.len() != n_samples {
        return Err(DeseqError::fit(format!(
            "GLM inputs disagree: {} genes / {} dispersions, {} samples / {} size factors",
            n_genes,
            dispersions.len(),
            n_samples,
            size_factors.len()
        )));
    }
    let design = model.matrix();
    let p = model.n_coefs();

    let fits: Vec<GeneFit> = (0..n_genes)
        .into_par_iter()
        .map(|i| {
            let y: Vec<f64> = counts.row(i).to_vec();
            fit_single_gene(&y, size_factors, design, dispersions[i], params)
        })
        .collect();

    let mut coefficients = Array2::zeros((n_genes, p));
    let mut standard_errors = Array2::zeros((n_genes, p));
    let mut mu = Array2::zeros((n_genes, n_samples));
    let mut converged = Vec::with_capacity(n_genes);
    for (i, fit) in fits.into_iter().enumerate() {
        for j in 0..p {
            coefficients[[i, j]] = fit.coefficients[j];
            standard_errors[[i, j]] = fit.standard_errors[j];
        }
        for j in 0..n_samples {
            mu[[i, j]] = fit.mu[j];
        }
        converged.push(fit.converged);
    }

    let glm = GlmFit {
        coefficients,
        standard_errors,
        mu,
        converged,
    };
    let not_conv = glm.n_not_converged();
    if not_conv > 0 {
        log::warn!("{} rows did not converge in beta", not_conv);
    }
    Ok(glm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_single_gene_recovers_fold_change() {
        let design = array![[1.0, 0.0], [1.0, 0.0], [1.0, 1.0], [1.0, 1.0]];
        let counts = [100.0, 100.0, 400.0, 400.0];
        let sf = [1.0; 4];
        let fit = fit_single_gene(&counts, &sf, &design, 0.01, &GlmFitParams::default());
        assert!(fit.converged);
        assert!((fit.coefficients[0] - 100.0_f64.ln()).abs() < 1e-4);
        assert!((fit.coefficients[1] - 4.0_f64.ln()).abs() < 1e-4);
        assert!(fit.standard_errors.iter().all(|s| s.is_finite() && *s > 0.0));
    }

    #[test]
    fn test_size_factors_enter_offset() {
        let design = array![[1.0, 0.0], [1.0, 0.0], [1.0, 1.0], [1.0, 1.0]];
        let counts = [100.0, 200.0, 100.0, 200.0];
        let sf = [1.0, 2.0, 1.0, 2.0];
        let fit = fit_single_gene(&counts, &sf, &design, 0.01, &GlmFitParams::default());
        assert!(fit.coefficients[1].abs() < 1e-4);
    }

    #[test]
    fn test_fit_glm_dimensions() {
        use crate::data::{LibraryLayout, SampleDesign, SampleRecord, Treatment};
        let design = SampleDesign::new(
            [Treatment::Untreated, Treatment::Untreated, Treatment::Treated, Treatment::Treated]
                .iter()
                .enumerate()
                .map(|(i, &t)| SampleRecord {
                    sample_id: format!("s{}", i),
                    layout: LibraryLayout::Paired,
                    treatment: t,
                })
                .collect(),
        )
        .unwrap();
        let model = crate::glm::build_design_matrix(&design).unwrap();
        let counts = array![[10.0, 12.0, 30.0, 33.0], [50.0, 55.0, 52.0, 48.0]];
        let fit = fit_glm(counts.view(), &[1.0; 4], &model, &[0.05, 0.05], &GlmFitParams::default()).unwrap();
        assert_eq!(fit.coefficients.dim(), (2, 2));
        assert_eq!(fit.mu.dim(), (2, 4));
        assert!(fit.coefficients[[0, 1]] > 0.0);
    }
}
