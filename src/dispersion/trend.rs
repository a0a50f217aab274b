//! Dispersion-mean trend fitting

use super::DispersionFunction;
use crate::error::{DeseqError, Result};

/// Gene-wise estimates at or below this are excluded from the parametric fit
const MIN_FIT_DISPERSION: f64 = 1e-6;
const MAX_OUTER_ITER: usize = 11;
const GAMMA_IRLS_MAXIT: usize = 25;
const GAMMA_IRLS_TOL: f64 = 1e-8;

/// Fit `a0 + a1 / mean` to the gene-wise dispersions.
///
/// Falls back to a constant (the mean of the usable gene-wise estimates)
/// when the parametric fit fails to converge or yields a non-positive
/// coefficient.
pub fn fit_dispersion_trend(base_means: &[f64], gene_wise: &[f64], min_disp: f64) -> Result<DispersionFunction> {
    match fit_parametric(base_means, gene_wise) {
        Ok((a0, a1)) => {
            log::debug!("Dispersion trend: asymptDisp={:.6}, extraPois={:.6}", a0, a1);
            Ok(DispersionFunction::Parametric {
                asympt_disp: a0,
                extra_pois: a1,
            })
        }
        Err(e) => {
            log::warn!("{}; using the mean of gene-wise dispersion estimates instead", e);
            let alpha = mean_dispersion(gene_wise, min_disp)?;
            Ok(DispersionFunction::Mean { alpha })
        }
    }
}

/// Mean of gene-wise estimates above 10 * `min_disp`
fn mean_dispersion(gene_wise: &[f64], min_disp: f64) -> Result<f64> {
    let above: Vec<f64> = gene_wise
        .iter()
        .copied()
        .filter(|d| d.is_finite() && *d > 10.0 * min_disp)
        .collect();
    let pool: Vec<f64> = if above.is_empty() {
        gene_wise.iter().copied().filter(|d| d.is_finite()).collect()
    } else {
        above
    };
    if pool.is_empty() {
        return Err(DeseqError::fit("no finite gene-wise dispersion to fit a trend"));
    }
    Ok((pool.iter().sum::<f64>() / pool.len() as f64).max(min_disp))
}

fn fit_parametric(base_means: &[f64], gene_wise: &[f64]) -> Result<(f64, f64)> {
    let data: Vec<(f64, f64)> = base_means
        .iter()
        .zip(gene_wise)
        .filter(|(&m, &d)| m > 0.0 && d.is_finite() && d > MIN_FIT_DISPERSION)
        .map(|(&m, &d)| (m, d))
        .collect();
    if data.len() < 3 {
        return Err(DeseqError::fit(format!(
            "parametric dispersion fit needs at least 3 usable genes, found {}",
            data.len()
        )));
    }

    let mut coefs = (0.1_f64, 1.0_f64);
    for iter in 0..MAX_OUTER_ITER {
        let old = coefs;
        let good: Vec<(f64, f64)> = data
            .iter()
            .copied()
            .filter(|&(m, d)| {
                let fitted = coefs.0 + coefs.1 / m;
                let ratio = d / fitted;
                fitted > 0.0 && ratio > 1e-4 && ratio < 15.0
            })
            .collect();
        if good.len() < 3 {
            return Err(DeseqError::fit("too few genes within the residual window of the dispersion trend"));
        }

        let (next, glm_converged) = gamma_identity_glm(&good, coefs);
        coefs = next;
        log::debug!(
            "Trend iteration {}: {} genes, a0={:.6}, a1={:.6}",
            iter + 1,
            good.len(),
            coefs.0,
            coefs.1
        );
        if coefs.0 <= 0.0 || coefs.1 <= 0.0 || !coefs.0.is_finite() || !coefs.1.is_finite() {
            return Err(DeseqError::fit(format!(
                "parametric dispersion fit produced non-positive coefficients (a0={:.4}, a1={:.4})",
                coefs.0, coefs.1
            )));
        }
        let change = (coefs.0 / old.0).ln().powi(2) + (coefs.1 / old.1).ln().powi(2);
        if change < 1e-6 && glm_converged {
            return Ok(coefs);
        }
    }
    Err(DeseqError::fit("parametric dispersion fit did not converge"))
}

fn gamma_deviance(data: &[(f64, f64)], a0: f64, a1: f64) -> f64 {
    data.iter()
        .map(|&(m, d)| {
            let mu = (a0 + a1 / m).max(1e-8);
            2.0 * (-(d / mu).ln() + (d - mu) / mu)
        })
        .sum()
}

/// Gamma-family GLM with identity link, `disp ~ 1 + I(1/mean)`.
///
/// With the identity link the working response is the observation itself
/// and the working weight is 1 / mu^2.
fn gamma_identity_glm(data: &[(f64, f64)], start: (f64, f64)) -> ((f64, f64), bool) {
    let (mut a0, mut a1) = start;
    let mut dev_old = gamma_deviance(data, a0, a1);

    for _ in 0..GAMMA_IRLS_MAXIT {
        let (mut sw, mut swx, mut swz, mut swxx, mut swxz) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for &(m, d) in data {
            let x = 1.0 / m;
            let mu = (a0 + a1 * x).max(1e-8);
            let w = 1.0 / (mu * mu);
            sw += w;
            swx += w * x;
            swz += w * d;
            swxx += w * x * x;
            swxz += w * x * d;
        }
        let det = sw * swxx - swx * swx;
        if det.abs() < 1e-10 {
            return ((a0, a1), false);
        }
        a0 = (swxx * swz - swx * swxz) / det;
        a1 = (sw * swxz - swx * swz) / det;

        let dev = gamma_deviance(data, a0, a1);
        if (dev_old - dev).abs() / (0.1 + dev.abs()) < GAMMA_IRLS_TOL {
            return ((a0, a1), true);
        }
        dev_old = dev;
    }
    ((a0, a1), false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovers_exact_parametric_curve() {
        let means: Vec<f64> = (1..=200).map(|i| i as f64 * 5.0).collect();
        let disps: Vec<f64> = means.iter().map(|m| 0.05 + 2.0 / m).collect();
        match fit_dispersion_trend(&means, &disps, 1e-8).unwrap() {
            DispersionFunction::Parametric {
                asympt_disp,
                extra_pois,
            } => {
                assert!((asympt_disp - 0.05).abs() < 1e-4);
                assert!((extra_pois - 2.0).abs() < 1e-2);
            }
            other => panic!("expected parametric trend, got {:?}", other),
        }
    }

    #[test]
    fn test_too_few_genes_falls_back_to_mean() {
        let f = fit_dispersion_trend(&[10.0, 20.0], &[0.2, 0.4], 1e-8).unwrap();
        match f {
            DispersionFunction::Mean { alpha } => assert!((alpha - 0.3).abs() < 1e-12),
            other => panic!("expected mean fallback, got {:?}", other),
        }
    }

    #[test]
    fn test_mean_fallback_ignores_boundary_estimates() {
        let alpha = mean_dispersion(&[1e-8, 0.2, 0.4, f64::NAN], 1e-8).unwrap();
        assert!((alpha - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_all_boundary_estimates_clamp_to_min() {
        let alpha = mean_dispersion(&[1e-8, 1e-8], 1e-8).unwrap();
        assert_eq!(alpha, 1e-8);
    }

    #[test]
    fn test_no_finite_estimate_is_fit_error() {
        assert!(mean_dispersion(&[f64::NAN], 1e-8).is_err());
    }
}
