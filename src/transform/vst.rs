//! Variance Stabilizing Transformation (VST)
//!
//! Maps normalized counts onto a log2-like scale on which variance no longer
//! depends on the mean, using the closed form implied by the fitted
//! dispersion function. Used for PCA, clustering and heatmaps.

use ndarray::Array2;

use crate::dispersion::DispersionFunction;
use crate::error::{DeseqError, Result};
use crate::model::FittedModel;

/// Variance-stabilized matrix with its row and column labels
#[derive(Debug, Clone)]
pub struct VstResult {
    /// Transformed data (genes x samples)
    pub data: Array2<f64>,
    pub gene_ids: Vec<String>,
    pub sample_ids: Vec<String>,
}

/// VST of one normalized count under `function`.
///
/// Parametric: log2((1 + a1 + 2 a0 q + 2 sqrt(a0 q (1 + a1 + a0 q))) / (4 a0)).
/// Constant alpha: (2 asinh(sqrt(alpha q)) - ln(alpha) - ln(4)) / ln(2).
pub fn vst_value(q: f64, function: &DispersionFunction) -> f64 {
    match *function {
        DispersionFunction::Parametric {
            asympt_disp: a0,
            extra_pois: a1,
        } => {
            let inner = 1.0 + a1 + 2.0 * a0 * q + 2.0 * (a0 * q * (1.0 + a1 + a0 * q)).sqrt();
            (inner / (4.0 * a0)).log2()
        }
        DispersionFunction::Mean { alpha } => {
            (2.0 * (alpha * q).sqrt().asinh() - alpha.ln() - 4.0_f64.ln()) / std::f64::consts::LN_2
        }
    }
}

/// Apply the VST to every normalized count of `fit`, using the dispersion
/// trend fitted with the full design.
pub fn vst(fit: &FittedModel) -> Result<VstResult> {
    let function = fit.dispersions().function;
    let valid = match function {
        DispersionFunction::Parametric {
            asympt_disp,
            extra_pois,
        } => asympt_disp > 0.0 && extra_pois > 0.0,
        DispersionFunction::Mean { alpha } => alpha > 0.0,
    };
    if !valid {
        return Err(DeseqError::fit(format!(
            "dispersion function {:?} cannot define a variance stabilizing transform",
            function
        )));
    }

    let data = fit.normalized_counts().mapv(|q| vst_value(q, &function));
    Ok(VstResult {
        data,
        gene_ids: fit.gene_ids().to_vec(),
        sample_ids: fit.sample_ids().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parametric_vst_approaches_log2_for_large_counts() {
        let f = DispersionFunction::Parametric {
            asympt_disp: 0.01,
            extra_pois: 1.0,
        };
        let hi = vst_value(1e6, &f);
        assert!((hi - 1e6_f64.log2()).abs() < 0.05);
        assert!(vst_value(0.0, &f).is_finite());
    }

    #[test]
    fn test_vst_is_monotone() {
        for f in [
            DispersionFunction::Parametric {
                asympt_disp: 0.05,
                extra_pois: 2.0,
            },
            DispersionFunction::Mean { alpha: 0.1 },
        ] {
            let mut prev = f64::NEG_INFINITY;
            for q in [0.0, 0.5, 1.0, 10.0, 100.0, 1000.0] {
                let v = vst_value(q, &f);
                assert!(v > prev);
                prev = v;
            }
        }
    }

    #[test]
    fn test_mean_vst_at_zero() {
        let v = vst_value(0.0, &DispersionFunction::Mean { alpha: 0.25 });
        // (0 - ln 0.25 - ln 4) / ln 2 = 0
        assert!(v.abs() < 1e-12);
    }
}
