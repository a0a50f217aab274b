//! Negative binomial likelihood pieces shared by the GLM and dispersion fits

use statrs::function::gamma::ln_gamma;

/// Lower bound on fitted means during IRLS
pub const MIN_MU: f64 = 0.5;

/// |beta| above this (natural-log scale) aborts IRLS for the gene
pub const MAX_BETA: f64 = 30.0;

/// Cap on the linear predictor before exponentiation
pub const MAX_ETA: f64 = 700.0;

/// Ridge added to the diagonal of X'WX, 1e-6 on the log2 scale
pub fn ridge_lambda() -> f64 {
    let ln2 = std::f64::consts::LN_2;
    1e-6 / (ln2 * ln2)
}

/// mu = s * exp(eta)
pub fn nb_mean(eta: f64, size_factor: f64) -> f64 {
    size_factor * eta.clamp(-MAX_ETA, MAX_ETA).exp()
}

/// IRLS working weight mu / (1 + alpha mu)
pub fn nb_weight(mu: f64, alpha: f64) -> f64 {
    mu / (1.0 + alpha * mu)
}

/// log P(Y = y) for NB with mean mu and dispersion alpha
pub fn nb_log_likelihood(y: f64, mu: f64, alpha: f64) -> f64 {
    if mu <= 0.0 || alpha <= 0.0 {
        return if y == 0.0 && mu == 0.0 { 0.0 } else { f64::NEG_INFINITY };
    }
    let size = 1.0 / alpha;
    let prob = size / (size + mu);
    ln_gamma(y + size) - ln_gamma(size) - ln_gamma(y + 1.0) + size * prob.ln() + y * (1.0 - prob).ln()
}

/// -2 log likelihood summed over samples
pub fn nb_deviance(counts: &[f64], mu: &[f64], alpha: f64) -> f64 {
    counts
        .iter()
        .zip(mu.iter())
        .map(|(&y, &m)| -2.0 * nb_log_likelihood(y, m, alpha))
        .sum()
}
