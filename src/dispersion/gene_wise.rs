//! Gene-wise dispersion estimation using Cox-Reid adjusted profile likelihood
//!
//! The same Armijo line search maximizes both the gene-wise likelihood and
//! the MAP posterior; the latter only adds a log-normal prior term.

use ndarray::{Array1, Array2, ArrayView2};
use rayon::prelude::*;
use statrs::function::gamma::{digamma, ln_gamma};

use super::DispersionParams;
use crate::error::{DeseqError, Result};
use crate::glm::{irls, DesignMatrix, MIN_MU};
use crate::linalg;

/// Hard lower bound on proposed log dispersion
const MIN_LOG_ALPHA_PROPOSAL: f64 = -30.0;
/// Hard upper bound on proposed log dispersion
const MAX_LOG_ALPHA_PROPOSAL: f64 = 10.0;
/// Sufficient-decrease constant of the Armijo rule
const ARMIJO_EPSILON: f64 = 1.0e-4;
/// Relative deviance tolerance for the IRLS fit that supplies mu
const MU_FIT_TOL: f64 = 1e-6;

/// Log-normal prior on the dispersion, centred on the trend
#[derive(Debug, Clone, Copy)]
pub struct LogNormalPrior {
    pub log_mean: f64,
    pub variance: f64,
}

/// Result of one line search
#[derive(Debug, Clone, Copy)]
pub struct LineSearch {
    pub log_alpha: f64,
    pub initial_lp: f64,
    pub final_lp: f64,
    pub iterations: usize,
}

impl LineSearch {
    /// Converged unless the search stalled at the first step or hit maxit
    pub fn converged(&self, maxit: usize) -> bool {
        self.iterations < maxit && self.iterations != 1
    }

    /// Final value improved on the starting value by a meaningful amount
    pub fn increased(&self) -> bool {
        self.final_lp >= self.initial_lp + self.initial_lp.abs() / 1e6
    }
}

/// Gene-wise estimates and the means they were computed at
#[derive(Debug, Clone)]
pub struct GeneWiseEstimates {
    pub dispersions: Array1<f64>,
    /// Fitted means (genes x samples) reused by the MAP step
    pub mu: Array2<f64>,
}

/// Upper bound on dispersion for `n_samples`
pub fn max_dispersion(n_samples: usize) -> f64 {
    (n_samples as f64).max(10.0)
}

/// Cox-Reid adjusted log posterior of log(alpha) at fixed mu
pub fn log_posterior(
    counts: &[f64],
    design: &Array2<f64>,
    mu: &[f64],
    log_alpha: f64,
    prior: Option<LogNormalPrior>,
) -> f64 {
    let alpha = log_alpha.exp();
    let alpha_inv = 1.0 / alpha;

    let mut ll = 0.0;
    let mut weights = Vec::with_capacity(counts.len());
    for (&y, &m) in counts.iter().zip(mu) {
        let m = m.max(1e-10);
        ll += ln_gamma(y + alpha_inv) - ln_gamma(alpha_inv)
            - y * (m + alpha_inv).ln()
            - alpha_inv * (1.0 + m * alpha).ln();
        weights.push(1.0 / (1.0 / m + alpha));
    }

    let cr = linalg::log_det_spd(&linalg::weighted_gram(design, &weights, 0.0))
        .map(|ld| -0.5 * ld)
        .unwrap_or(0.0);

    let prior_term = prior
        .map(|p| -0.5 * (log_alpha - p.log_mean).powi(2) / p.variance)
        .unwrap_or(0.0);

    ll + cr + prior_term
}

/// Derivative of [`log_posterior`] with respect to log(alpha)
pub fn d_log_posterior(
    counts: &[f64],
    design: &Array2<f64>,
    mu: &[f64],
    log_alpha: f64,
    prior: Option<LogNormalPrior>,
) -> f64 {
    let alpha = log_alpha.exp();
    let alpha_inv = 1.0 / alpha;
    let alpha_sq = alpha * alpha;

    let mut dll = 0.0;
    let mut weights = Vec::with_capacity(counts.len());
    let mut d_weights = Vec::with_capacity(counts.len());
    for (&y, &m) in counts.iter().zip(mu) {
        let m = m.max(1e-10);
        dll += (digamma(alpha_inv) - digamma(y + alpha_inv)) / alpha_sq
            + y / (alpha_sq * (m + alpha_inv))
            + (1.0 + m * alpha).ln() / alpha_sq
            - m / (alpha * (1.0 + m * alpha));
        let w = 1.0 / (1.0 / m + alpha);
        weights.push(w);
        d_weights.push(-w * w);
    }

    // d/dalpha of -0.5 log|X'WX| = -0.5 tr((X'WX)^-1 X'(dW)X)
    let b = linalg::weighted_gram(design, &weights, 0.0);
    let db = linalg::weighted_gram(design, &d_weights, 0.0);
    let dcr = linalg::invert_spd(&b)
        .map(|inv| -0.5 * (inv * db).trace())
        .unwrap_or(0.0);

    let prior_term = prior
        .map(|p| -(log_alpha - p.log_mean) / p.variance)
        .unwrap_or(0.0);

    (dll + dcr) * alpha + prior_term
}

/// Armijo line search on log(alpha)
pub fn line_search(
    counts: &[f64],
    design: &Array2<f64>,
    mu: &[f64],
    log_alpha_init: f64,
    prior: Option<LogNormalPrior>,
    max_disp: f64,
    params: &DispersionParams,
) -> LineSearch {
    let min_log_alpha = (params.min_disp / 10.0).ln();
    let mut log_alpha = log_alpha_init
        .max(MIN_LOG_ALPHA_PROPOSAL)
        .min(max_disp.ln());

    let initial_lp = log_posterior(counts, design, mu, log_alpha, prior);
    let mut lp = initial_lp;
    let mut dlp = d_log_posterior(counts, design, mu, log_alpha, prior);
    let mut kappa = params.kappa_0;
    let mut accepted = 0usize;
    let mut iterations = params.maxit;

    for iter in 0..params.maxit {
        let raw = log_alpha + kappa * dlp;
        if raw < MIN_LOG_ALPHA_PROPOSAL {
            kappa = (MIN_LOG_ALPHA_PROPOSAL - log_alpha) / dlp;
        }
        if raw > MAX_LOG_ALPHA_PROPOSAL {
            kappa = (MAX_LOG_ALPHA_PROPOSAL - log_alpha) / dlp;
        }
        let proposal = log_alpha + kappa * dlp;
        let lp_proposal = log_posterior(counts, design, mu, proposal, prior);

        if -lp_proposal <= -lp - kappa * ARMIJO_EPSILON * dlp * dlp {
            accepted += 1;
            log_alpha = proposal;
            let change = lp_proposal - lp;
            lp = lp_proposal;
            if change < params.disp_tol || log_alpha < min_log_alpha {
                iterations = iter + 1;
                break;
            }
            dlp = d_log_posterior(counts, design, mu, log_alpha, prior);
            kappa = (kappa * 1.1).min(params.kappa_0);
            if accepted % 5 == 0 {
                kappa /= 2.0;
            }
        } else {
            kappa /= 2.0;
        }
    }

    LineSearch {
        log_alpha,
        initial_lp,
        final_lp: lp,
        iterations,
    }
}

/// Coarse-then-fine grid maximization of the log posterior
pub fn grid_search(
    counts: &[f64],
    design: &Array2<f64>,
    mu: &[f64],
    prior: Option<LogNormalPrior>,
    min_disp: f64,
    max_disp: f64,
) -> f64 {
    const N_GRID: usize = 20;
    let argmax = |grid: &[f64]| -> f64 {
        grid.iter()
            .map(|&la| (la, log_posterior(counts, design, mu, la, prior)))
            .fold((grid[0], f64::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best })
            .0
    };
    let spaced = |lo: f64, hi: f64| -> Vec<f64> {
        (0..N_GRID)
            .map(|i| lo + (hi - lo) * i as f64 / (N_GRID - 1) as f64)
            .collect()
    };

    let lo = min_disp.ln();
    let hi = max_disp.ln();
    let delta = (hi - lo) / (N_GRID - 1) as f64;
    let coarse = argmax(&spaced(lo, hi));
    argmax(&spaced(coarse - delta, coarse + delta)).exp()
}

/// Least-squares fitted values of `y` on the design
fn linear_model_mu(y: &[f64], design: &Array2<f64>) -> Vec<f64> {
    let ones = vec![1.0; y.len()];
    let xtx = linalg::weighted_gram(design, &ones, 0.0);
    let xty = linalg::weighted_cross(design, &ones, y);
    match linalg::solve_spd(&xtx, &xty) {
        Some(beta) => (0..y.len())
            .map(|i| (0..design.ncols()).map(|j| design[[i, j]] * beta[j]).sum())
            .collect(),
        None => {
            let m = y.iter().sum::<f64>() / y.len() as f64;
            vec![m; y.len()]
        }
    }
}

/// Moment estimate from residuals around the linear-model fit
fn rough_dispersion(normalized: &[f64], design: &Array2<f64>) -> f64 {
    let df = normalized.len().saturating_sub(design.ncols());
    if df == 0 {
        return 0.0;
    }
    let mu = linear_model_mu(normalized, design);
    let total: f64 = normalized
        .iter()
        .zip(mu.iter())
        .map(|(&y, &m)| {
            let m = m.max(1.0);
            ((y - m).powi(2) - m) / (m * m)
        })
        .sum();
    (total / df as f64).max(0.0)
}

/// (variance - xim * mean) / mean^2 over normalized counts
fn moments_dispersion(normalized: &[f64], xim: f64) -> f64 {
    let n = normalized.len() as f64;
    let mean = normalized.iter().sum::<f64>() / n;
    if mean <= 1e-10 || n < 2.0 {
        return f64::INFINITY;
    }
    let var = normalized.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (var - xim * mean) / (mean * mean)
}

/// Gene-wise estimate for a single gene; returns (alpha, mu)
pub fn estimate_gene_dispersion(
    counts: &[f64],
    size_factors: &[f64],
    model: &DesignMatrix,
    xim: f64,
    params: &DispersionParams,
) -> (f64, Vec<f64>) {
    let n = counts.len();
    if counts.iter().all(|&c| c == 0.0) {
        return (f64::NAN, vec![0.0; n]);
    }
    let design = model.matrix();
    let max_disp = max_dispersion(n);

    let normalized: Vec<f64> = counts.iter().zip(size_factors).map(|(&c, &s)| c / s).collect();
    let alpha_init = rough_dispersion(&normalized, design)
        .min(moments_dispersion(&normalized, xim))
        .clamp(params.min_disp, max_disp);

    let mu: Vec<f64> = if model.is_group_design() {
        linear_model_mu(&normalized, design)
            .iter()
            .zip(size_factors)
            .map(|(&m, &s)| (m * s).max(MIN_MU))
            .collect()
    } else {
        irls(counts, size_factors, design, alpha_init, params.maxit, MU_FIT_TOL).1
    };

    let search = line_search(counts, design, &mu, alpha_init.ln(), None, max_disp, params);
    let mut alpha = if search.increased() {
        search.log_alpha.exp()
    } else {
        alpha_init
    };
    if !search.converged(params.maxit) && alpha > params.min_disp * 10.0 {
        alpha = grid_search(counts, design, &mu, None, params.min_disp, max_disp);
    }

    (alpha.clamp(params.min_disp, max_disp), mu)
}

/// Estimate gene-wise dispersions for all genes in parallel
pub fn estimate_gene_dispersions(
    counts: ArrayView2<f64>,
    size_factors: &[f64],
    model: &DesignMatrix,
    params: &DispersionParams,
) -> Result<GeneWiseEstimates> {
    let (n_genes, n_samples) = counts.dim();
    if model.residual_df() == 0 {
        return Err(DeseqError::fit(
            "the design has as many coefficients as samples; no replicates for dispersion estimation",
        ));
    }
    let xim = size_factors.iter().map(|&s| 1.0 / s).sum::<f64>() / n_samples as f64;

    let fits: Vec<(f64, Vec<f64>)> = (0..n_genes)
        .into_par_iter()
        .map(|i| {
            let y = counts.row(i).to_vec();
            estimate_gene_dispersion(&y, size_factors, model, xim, params)
        })
        .collect();

    let mut mu = Array2::zeros((n_genes, n_samples));
    let mut dispersions = Array1::zeros(n_genes);
    for (i, (alpha, m)) in fits.into_iter().enumerate() {
        dispersions[i] = alpha;
        for (j, v) in m.into_iter().enumerate() {
            mu[[i, j]] = v;
        }
    }

    if dispersions.iter().all(|d| !d.is_finite()) {
        return Err(DeseqError::fit("no gene yielded a finite dispersion estimate"));
    }
    Ok(GeneWiseEstimates { dispersions, mu })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{LibraryLayout, SampleDesign, SampleRecord, Treatment};
    use crate::glm::build_design_matrix;
    use ndarray::array;

    fn two_group_model(n_per_group: usize) -> DesignMatrix {
        let records = (0..2 * n_per_group)
            .map(|i| SampleRecord {
                sample_id: format!("s{}", i),
                layout: LibraryLayout::Paired,
                treatment: if i < n_per_group {
                    Treatment::Untreated
                } else {
                    Treatment::Treated
                },
            })
            .collect();
        build_design_matrix(&SampleDesign::new(records).unwrap()).unwrap()
    }

    #[test]
    fn test_overdispersed_gene_gets_larger_dispersion() {
        let model = two_group_model(3);
        let sf = [1.0; 6];
        let params = DispersionParams::default();
        let (tight, _) = estimate_gene_dispersion(&[100.0, 105.0, 98.0, 101.0, 97.0, 103.0], &sf, &model, 1.0, &params);
        let (noisy, _) = estimate_gene_dispersion(&[40.0, 180.0, 90.0, 150.0, 30.0, 110.0], &sf, &model, 1.0, &params);
        assert!(noisy > tight, "noisy={} tight={}", noisy, tight);
        assert!(noisy > 0.05);
        assert!(tight >= params.min_disp);
    }

    #[test]
    fn test_all_zero_gene_is_nan() {
        let model = two_group_model(2);
        let (alpha, mu) = estimate_gene_dispersion(&[0.0; 4], &[1.0; 4], &model, 1.0, &DispersionParams::default());
        assert!(alpha.is_nan());
        assert_eq!(mu, vec![0.0; 4]);
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let design = array![[1.0, 0.0], [1.0, 0.0], [1.0, 1.0], [1.0, 1.0]];
        let counts = [20.0, 35.0, 60.0, 41.0];
        let mu = [27.5, 27.5, 50.5, 50.5];
        let prior = Some(LogNormalPrior {
            log_mean: (0.1_f64).ln(),
            variance: 0.5,
        });
        let la = (0.08_f64).ln();
        let h = 1e-5;
        let numeric = (log_posterior(&counts, &design, &mu, la + h, prior)
            - log_posterior(&counts, &design, &mu, la - h, prior))
            / (2.0 * h);
        let analytic = d_log_posterior(&counts, &design, &mu, la, prior);
        assert!((numeric - analytic).abs() < 1e-4, "numeric={} analytic={}", numeric, analytic);
    }

    #[test]
    fn test_max_dispersion() {
        assert_eq!(max_dispersion(4), 10.0);
        assert_eq!(max_dispersion(25), 25.0);
    }

    #[test]
    fn test_no_residual_df_is_fit_error() {
        let model = two_group_model(1);
        let counts = array![[10.0, 20.0]];
        let err = estimate_gene_dispersions(counts.view(), &[1.0, 1.0], &model, &DispersionParams::default())
            .unwrap_err();
        assert!(matches!(err, DeseqError::Fit { .. }));
    }
}
