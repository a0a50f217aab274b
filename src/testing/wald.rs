//! Wald test on a single model coefficient

use std::f64::consts::LN_2;

use super::pvalue::calculate_pvalue;
use crate::glm::GlmFit;

/// Per-gene Wald statistics on the log2 scale
#[derive(Debug, Clone, Default)]
pub struct WaldStats {
    pub log2_fold_changes: Vec<f64>,
    pub lfc_se: Vec<f64>,
    pub stat: Vec<f64>,
    pub pvalues: Vec<f64>,
}

/// Test coefficient `coef` of every gene against zero.
///
/// Genes with a zero base mean report LFC and SE of 0 and NaN statistics.
pub fn wald_test(glm: &GlmFit, coef: usize, base_means: &[f64]) -> WaldStats {
    let n_genes = glm.coefficients.nrows();
    let mut out = WaldStats::default();
    for i in 0..n_genes {
        if base_means[i] == 0.0 {
            out.log2_fold_changes.push(0.0);
            out.lfc_se.push(0.0);
            out.stat.push(f64::NAN);
            out.pvalues.push(f64::NAN);
            continue;
        }
        let beta = glm.coefficients[[i, coef]];
        let se = glm.standard_errors[[i, coef]];
        let stat = if se > 0.0 && se.is_finite() {
            beta / se
        } else {
            f64::NAN
        };
        out.log2_fold_changes.push(beta / LN_2);
        out.lfc_se.push(se / LN_2);
        out.stat.push(stat);
        out.pvalues.push(calculate_pvalue(stat));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn glm() -> GlmFit {
        GlmFit {
            coefficients: array![[3.0, LN_2], [2.0, -2.0 * LN_2], [0.0, 0.0]],
            standard_errors: array![[0.1, LN_2 / 2.0], [0.1, f64::NAN], [0.0, 0.0]],
            mu: array![[1.0], [1.0], [0.0]],
            converged: vec![true, true, true],
        }
    }

    #[test]
    fn test_log2_scale_and_statistic() {
        let w = wald_test(&glm(), 1, &[10.0, 10.0, 0.0]);
        assert!((w.log2_fold_changes[0] - 1.0).abs() < 1e-12);
        assert!((w.lfc_se[0] - 0.5).abs() < 1e-12);
        assert!((w.stat[0] - 2.0).abs() < 1e-12);
        assert!((w.pvalues[0] - 0.04550026389635842).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_rows() {
        let w = wald_test(&glm(), 1, &[10.0, 10.0, 0.0]);
        assert!((w.log2_fold_changes[1] + 2.0).abs() < 1e-12);
        assert!(w.stat[1].is_nan() && w.pvalues[1].is_nan());
        assert_eq!(w.log2_fold_changes[2], 0.0);
        assert!(w.pvalues[2].is_nan());
    }
}
