//! Statistical testing for differential expression

mod fdr;
mod pvalue;
mod wald;

pub use fdr::benjamini_hochberg;
pub use pvalue::calculate_pvalue;
pub use wald::{wald_test, WaldStats};

use crate::filter::independent_filtering;
use crate::io::{DeResults, DeRow};
use crate::model::FittedModel;

/// Wald test on the treatment coefficient with BH adjustment.
///
/// With `independent_filtering` the BH step runs after dropping the
/// low-mean genes that maximize rejections at `alpha`; otherwise every
/// tested gene enters plain BH.
pub fn results(fit: &FittedModel, alpha: f64, independent_filtering_enabled: bool) -> DeResults {
    let coef = fit.model().treatment_coef();
    let base_means = fit.base_means().to_vec();
    let wald = wald_test(fit.glm(), coef, &base_means);

    let (padj, cutoff) = if independent_filtering_enabled {
        let filt = independent_filtering(&wald.pvalues, &base_means, alpha);
        log::info!(
            "Independent filtering at alpha {}: base mean cutoff {:.3}, {} rejections",
            alpha,
            filt.cutoff,
            filt.rejections
        );
        let cutoff = if filt.theta > 0.0 { filt.cutoff } else { 0.0 };
        (filt.padj, cutoff)
    } else {
        (benjamini_hochberg(&wald.pvalues), 0.0)
    };

    let rows = fit
        .gene_ids()
        .iter()
        .enumerate()
        .map(|(i, id)| DeRow {
            gene_id: id.clone(),
            base_mean: base_means[i],
            log2_fold_change: wald.log2_fold_changes[i],
            lfc_se: wald.lfc_se[i],
            stat: wald.stat[i],
            pvalue: wald.pvalues[i],
            padj: padj[i],
        })
        .collect();

    let outliers = fit.dispersions().outliers.iter().filter(|&&o| o).count();
    DeResults::new(rows, cutoff, outliers)
}
