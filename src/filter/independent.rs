//! Independent filtering on mean expression before BH adjustment

use crate::stats::{cmp_nan_last, median, quantile_sorted};
use crate::testing::benjamini_hochberg;

const N_THETA: usize = 50;
const LOWESS_SPAN: f64 = 0.2;
const LOWESS_ITER: usize = 3;

/// Outcome of independent filtering
#[derive(Debug, Clone)]
pub struct IndependentFilter {
    /// Adjusted p-values; NaN for genes below the chosen cutoff
    pub padj: Vec<f64>,
    /// Quantile of base means that was filtered out
    pub theta: f64,
    /// Base-mean threshold at `theta`
    pub cutoff: f64,
    pub rejections: usize,
}

/// Pick the base-mean quantile that (nearly) maximizes rejections at `alpha`.
///
/// Rejection counts over 50 quantiles are smoothed with lowess; the first
/// quantile whose count exceeds `max(fit) - rmse(residuals)` is chosen. With
/// 10 or fewer rejections anywhere, nothing is filtered.
pub fn independent_filtering(pvalues: &[f64], base_means: &[f64], alpha: f64) -> IndependentFilter {
    let n = pvalues.len();
    let mut sorted: Vec<f64> = base_means.iter().copied().filter(|m| m.is_finite()).collect();
    if n == 0 || sorted.is_empty() {
        return IndependentFilter {
            padj: benjamini_hochberg(pvalues),
            theta: 0.0,
            cutoff: 0.0,
            rejections: 0,
        };
    }
    sorted.sort_by(|a, b| cmp_nan_last(*a, *b));

    let lower = base_means.iter().filter(|&&m| m == 0.0).count() as f64 / n as f64;
    let upper = if lower < 0.95 { 0.95 } else { 1.0 };
    let thetas: Vec<f64> = (0..N_THETA)
        .map(|i| lower + (upper - lower) * i as f64 / (N_THETA - 1) as f64)
        .collect();
    let cutoffs: Vec<f64> = thetas.iter().map(|&t| quantile_sorted(&sorted, t)).collect();

    let adjusted: Vec<Vec<f64>> = cutoffs
        .iter()
        .map(|&cutoff| {
            let kept: Vec<f64> = pvalues
                .iter()
                .zip(base_means)
                .map(|(&p, &m)| if m >= cutoff { p } else { f64::NAN })
                .collect();
            benjamini_hochberg(&kept)
        })
        .collect();
    let num_rej: Vec<f64> = adjusted
        .iter()
        .map(|padj| padj.iter().filter(|&&p| p < alpha).count() as f64)
        .collect();

    let max_rej = num_rej.iter().cloned().fold(0.0, f64::max);
    let chosen = if max_rej <= 10.0 {
        0
    } else {
        choose_theta(&thetas, &num_rej)
    };
    log::debug!(
        "Independent filtering: max {} rejections, chose theta {:.3}",
        max_rej,
        thetas[chosen]
    );

    IndependentFilter {
        theta: thetas[chosen],
        cutoff: cutoffs[chosen],
        rejections: num_rej[chosen] as usize,
        padj: adjusted.into_iter().nth(chosen).unwrap_or_default(),
    }
}

fn choose_theta(thetas: &[f64], num_rej: &[f64]) -> usize {
    let fit = lowess(thetas, num_rej, LOWESS_SPAN, LOWESS_ITER);
    let max_fit = fit.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let residuals: Vec<f64> = num_rej
        .iter()
        .zip(&fit)
        .filter(|(&r, _)| r > 0.0)
        .map(|(&r, &f)| r - f)
        .collect();
    let rmse = if residuals.is_empty() {
        0.0
    } else {
        (residuals.iter().map(|r| r * r).sum::<f64>() / residuals.len() as f64).sqrt()
    };

    [max_fit - rmse, 0.9 * max_fit, 0.8 * max_fit]
        .iter()
        .find_map(|&thresh| num_rej.iter().position(|&r| r > thresh))
        .unwrap_or(0)
}

/// Locally weighted linear smoother with bisquare robustness iterations.
///
/// `x` must be sorted ascending.
pub fn lowess(x: &[f64], y: &[f64], span: f64, robustness_iter: usize) -> Vec<f64> {
    let n = x.len();
    if n < 2 {
        return y.to_vec();
    }
    let ns = ((span * n as f64).round() as usize).clamp(2, n);
    let mut robustness = vec![1.0; n];
    let mut fitted = vec![0.0; n];

    for pass in 0..=robustness_iter {
        let mut left = 0usize;
        for i in 0..n {
            // slide the window of ns nearest neighbours
            while left + ns < n && x[i] - x[left] > x[left + ns] - x[i] {
                left += 1;
            }
            let right = left + ns - 1;
            let h = (x[i] - x[left]).max(x[right] - x[i]);
            fitted[i] = local_linear(x, y, &robustness, i, left, right, h);
        }
        if pass == robustness_iter {
            break;
        }

        let abs_res: Vec<f64> = y.iter().zip(&fitted).map(|(a, b)| (a - b).abs()).collect();
        let scale = 6.0 * median(&abs_res);
        if scale <= 0.0 {
            break;
        }
        for (w, r) in robustness.iter_mut().zip(&abs_res) {
            let u = r / scale;
            *w = if u < 1.0 { (1.0 - u * u).powi(2) } else { 0.0 };
        }
    }
    fitted
}

fn local_linear(x: &[f64], y: &[f64], robustness: &[f64], i: usize, left: usize, right: usize, h: f64) -> f64 {
    let mut weights = vec![0.0; right - left + 1];
    for (k, j) in (left..=right).enumerate() {
        let d = (x[j] - x[i]).abs();
        let tricube = if h <= 0.0 || d <= 0.001 * h {
            1.0
        } else if d < 0.999 * h {
            (1.0 - (d / h).powi(3)).powi(3)
        } else {
            0.0
        };
        weights[k] = tricube * robustness[j];
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return y[i];
    }

    let xbar: f64 = (left..=right).zip(&weights).map(|(j, w)| w * x[j]).sum::<f64>() / total;
    let ybar: f64 = (left..=right).zip(&weights).map(|(j, w)| w * y[j]).sum::<f64>() / total;
    let sxx: f64 = (left..=right).zip(&weights).map(|(j, w)| w * (x[j] - xbar).powi(2)).sum();
    if h > 0.0 && sxx.sqrt() > 0.001 * (x[x.len() - 1] - x[0]) {
        let sxy: f64 = (left..=right)
            .zip(&weights)
            .map(|(j, w)| w * (x[j] - xbar) * (y[j] - ybar))
            .sum();
        ybar + sxy / sxx * (x[i] - xbar)
    } else {
        ybar
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowess_reproduces_a_line() {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();
        let fit = lowess(&x, &y, 0.3, 3);
        for (f, t) in fit.iter().zip(&y) {
            assert!((f - t).abs() < 1e-8);
        }
    }

    #[test]
    fn test_few_rejections_means_plain_bh() {
        let pvalues = vec![0.01, 0.2, 0.5, 0.9];
        let means = vec![1.0, 2.0, 3.0, 4.0];
        let res = independent_filtering(&pvalues, &means, 0.1);
        assert_eq!(res.theta, 0.0);
        assert_eq!(res.padj, benjamini_hochberg(&pvalues));
    }

    #[test]
    fn test_low_mean_noise_is_filtered() {
        // 100 moderate signals at high mean, 400 uniform nulls at low mean;
        // unfiltered BH rejects none of the signals
        let mut pvalues = Vec::new();
        let mut means = Vec::new();
        for i in 0..400 {
            pvalues.push((i as f64 + 0.5) / 400.0);
            means.push(1.0 + i as f64 / 100.0);
        }
        for i in 0..100 {
            pvalues.push(3e-4 * (i as f64 + 1.0));
            means.push(100.0 + i as f64);
        }
        let unfiltered = benjamini_hochberg(&pvalues);
        assert!(unfiltered.iter().all(|&p| p >= 0.1));

        let res = independent_filtering(&pvalues, &means, 0.1);
        assert!(res.theta > 0.0);
        assert_eq!(res.rejections, 100);
        assert!(res.padj[0].is_nan());
        assert!(res.padj[450].is_finite());
    }

    #[test]
    fn test_all_zero_means() {
        let res = independent_filtering(&[0.5, 0.5], &[0.0, 0.0], 0.1);
        assert_eq!(res.padj.len(), 2);
    }
}
