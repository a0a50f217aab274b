//! Benjamini-Hochberg false discovery rate adjustment

use crate::stats::cmp_nan_last;

/// Step-up BH adjustment; NaN p-values stay NaN and do not count as tests.
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let m = pvalues.iter().filter(|p| !p.is_nan()).count();
    let mut padj = vec![f64::NAN; pvalues.len()];
    if m == 0 {
        return padj;
    }

    let mut order: Vec<usize> = (0..pvalues.len()).filter(|&i| !pvalues[i].is_nan()).collect();
    order.sort_by(|&a, &b| cmp_nan_last(pvalues[a], pvalues[b]));

    let mut running_min = 1.0_f64;
    for (rank, &i) in order.iter().enumerate().rev() {
        let adj = pvalues[i] * m as f64 / (rank + 1) as f64;
        running_min = running_min.min(adj);
        padj[i] = running_min;
    }
    padj
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bh_known_values() {
        // p.adjust(c(0.01, 0.04, 0.03, 0.02), "BH") = 0.04 0.04 0.04 0.04
        let padj = benjamini_hochberg(&[0.01, 0.04, 0.03, 0.02]);
        for p in padj {
            assert!((p - 0.04).abs() < 1e-12);
        }
    }

    #[test]
    fn test_bh_is_monotone_and_capped() {
        let p = [0.001, 0.01, 0.05, 0.1, 0.9];
        let padj = benjamini_hochberg(&p);
        for w in padj.windows(2) {
            assert!(w[0] <= w[1]);
        }
        assert!(padj.iter().all(|&q| q <= 1.0));
        for (q, p) in padj.iter().zip(p.iter()) {
            assert!(q >= p);
        }
    }

    #[test]
    fn test_bh_with_nan() {
        let padj = benjamini_hochberg(&[0.01, f64::NAN, 0.02]);
        assert!((padj[0] - 0.02).abs() < 1e-12);
        assert!(padj[1].is_nan());
        assert!((padj[2] - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_bh_empty() {
        assert!(benjamini_hochberg(&[]).is_empty());
    }
}
