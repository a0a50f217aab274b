//! Adaptive shrinkage (ashr) of log2 fold changes
//!
//! The true LFCs are modelled as a mixture of a point mass at zero and
//! zero-centred normals with a data-adaptive grid of SDs. Mixture weights are
//! fitted by EM under a Dirichlet penalty that favours the null component;
//! each gene then gets the posterior mean, posterior SD and local false sign
//! rate (lfsr).
//!
//! Reference: Stephens (2017), "False discovery rates: a new deal".

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;

/// Parameters for the ashr fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AshrParams {
    pub max_iter: usize,
    /// Largest absolute change in mixture weights that counts as converged
    pub tol: f64,
    /// Dirichlet concentration on the null component
    pub null_weight: f64,
    /// Ratio between consecutive grid SDs
    pub grid_mult: f64,
}

impl Default for AshrParams {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tol: 1e-6,
            null_weight: 10.0,
            grid_mult: std::f64::consts::SQRT_2,
        }
    }
}

/// Fitted prior and per-gene posterior summaries
#[derive(Debug, Clone)]
pub struct AshrFit {
    pub posterior_mean: Vec<f64>,
    pub posterior_sd: Vec<f64>,
    pub lfsr: Vec<f64>,
    /// Mixture weights, null component first
    pub pi: Vec<f64>,
    /// Mixture SDs; `sigma[0] == 0` is the point mass
    pub sigma: Vec<f64>,
}

fn std_normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

fn normal_ln_pdf(x: f64, sd: f64) -> f64 {
    let z = x / sd;
    -0.5 * z * z - sd.ln() - 0.5 * (2.0 * std::f64::consts::PI).ln()
}

/// Point mass plus a geometric grid of SDs from min(se)/10 up to
/// 2 * sqrt(max(betahat^2 - se^2)).
pub fn mixture_grid(betahat: &[f64], se: &[f64], mult: f64) -> Vec<f64> {
    let se_min = se.iter().cloned().fold(f64::INFINITY, f64::min);
    let sd_min = se_min / 10.0;
    let excess = betahat
        .iter()
        .zip(se)
        .map(|(b, s)| b * b - s * s)
        .fold(0.0_f64, f64::max);
    let mut sd_max = 2.0 * excess.sqrt();
    if sd_max < sd_min {
        sd_max = 8.0 * sd_min;
    }

    let n_point = ((sd_max / sd_min).log2() / mult.log2()).ceil().max(0.0) as usize;
    let mut sigma = vec![0.0];
    sigma.extend((0..=n_point).rev().map(|i| sd_max / mult.powi(i as i32)));
    sigma
}

/// Log marginal likelihood of each observation under each component
fn component_log_lik(betahat: &[f64], se: &[f64], sigma: &[f64]) -> Vec<Vec<f64>> {
    betahat
        .par_iter()
        .zip(se.par_iter())
        .map(|(&b, &s)| {
            sigma
                .iter()
                .map(|&g| normal_ln_pdf(b, (s * s + g * g).sqrt()))
                .collect()
        })
        .collect()
}

/// Posterior membership probabilities for one observation
fn responsibilities(log_lik: &[f64], pi: &[f64]) -> Vec<f64> {
    let logs: Vec<f64> = log_lik
        .iter()
        .zip(pi)
        .map(|(l, p)| if *p > 0.0 { l + p.ln() } else { f64::NEG_INFINITY })
        .collect();
    let max = logs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let weights: Vec<f64> = logs.iter().map(|l| (l - max).exp()).collect();
    let total: f64 = weights.iter().sum();
    weights.iter().map(|w| w / total).collect()
}

fn fit_mixture(log_lik: &[Vec<f64>], k: usize, params: &AshrParams) -> Vec<f64> {
    let mut pi = vec![1.0 / k as f64; k];
    // Dirichlet(null_weight, 1, ..., 1) adds null_weight - 1 pseudo-counts to the null
    let null_bonus = params.null_weight - 1.0;

    for iter in 0..params.max_iter {
        let mut totals = vec![0.0; k];
        for row in log_lik {
            for (t, r) in totals.iter_mut().zip(responsibilities(row, &pi)) {
                *t += r;
            }
        }
        totals[0] += null_bonus;
        let sum: f64 = totals.iter().sum();
        let next: Vec<f64> = totals.iter().map(|t| t / sum).collect();
        let change = pi.iter().zip(&next).map(|(a, b)| (a - b).abs()).fold(0.0, f64::max);
        pi = next;
        if change < params.tol {
            log::debug!("ashr EM converged after {} iterations", iter + 1);
            break;
        }
    }
    pi
}

/// Shrink `betahat` given standard errors `se`.
///
/// Entries with a non-finite estimate or a non-positive SE are passed
/// through as NaN and do not inform the prior.
pub fn shrink_lfc_ashr(betahat: &[f64], se: &[f64], params: &AshrParams) -> AshrFit {
    let n = betahat.len();
    let valid: Vec<usize> = (0..n)
        .filter(|&i| betahat[i].is_finite() && se[i].is_finite() && se[i] > 0.0)
        .collect();

    let mut fit = AshrFit {
        posterior_mean: vec![f64::NAN; n],
        posterior_sd: vec![f64::NAN; n],
        lfsr: vec![f64::NAN; n],
        pi: vec![1.0],
        sigma: vec![0.0],
    };
    if valid.is_empty() {
        return fit;
    }

    let b: Vec<f64> = valid.iter().map(|&i| betahat[i]).collect();
    let s: Vec<f64> = valid.iter().map(|&i| se[i]).collect();
    let sigma = mixture_grid(&b, &s, params.grid_mult);
    let log_lik = component_log_lik(&b, &s, &sigma);
    let pi = fit_mixture(&log_lik, sigma.len(), params);

    for (idx, &i) in valid.iter().enumerate() {
        let post = responsibilities(&log_lik[idx], &pi);
        let (bi, s2) = (b[idx], s[idx] * s[idx]);
        let (mut mean, mut second, mut p_neg, mut p_zero) = (0.0, 0.0, 0.0, 0.0);
        for (w, &g) in post.iter().zip(&sigma) {
            if g == 0.0 {
                p_zero += w;
                continue;
            }
            let g2 = g * g;
            let m = g2 / (g2 + s2) * bi;
            let v = g2 * s2 / (g2 + s2);
            mean += w * m;
            second += w * (v + m * m);
            p_neg += w * std_normal_cdf(-m / v.sqrt());
        }
        let p_pos = (1.0 - p_neg - p_zero).max(0.0);
        fit.posterior_mean[i] = mean;
        fit.posterior_sd[i] = (second - mean * mean).max(0.0).sqrt();
        fit.lfsr[i] = (p_neg + p_zero).min(p_pos + p_zero);
    }
    fit.pi = pi;
    fit.sigma = sigma;
    fit
}
