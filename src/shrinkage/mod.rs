//! Log fold change shrinkage and the UP/DOWN/NO labelling

mod ashr;

pub use ashr::{mixture_grid, shrink_lfc_ashr, AshrFit, AshrParams};

use serde::Serialize;

use crate::config::SignificanceThresholds;
use crate::io::DeResults;

/// Regulation call for one gene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
    No,
}

impl Direction {
    /// UP when lfc > t and padj < p; DOWN when lfc < -t and padj < p
    pub fn classify(lfc: f64, padj: f64, thresholds: &SignificanceThresholds) -> Self {
        if !(padj < thresholds.padj) {
            return Direction::No;
        }
        if lfc > thresholds.abs_lfc {
            Direction::Up
        } else if lfc < -thresholds.abs_lfc {
            Direction::Down
        } else {
            Direction::No
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
            Direction::No => "NO",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One gene of the shrunken table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShrunkenRow {
    pub gene_id: String,
    pub base_mean: f64,
    /// Posterior mean of the log2 fold change
    pub log2_fold_change: f64,
    /// Posterior SD
    pub lfc_se: f64,
    pub lfsr: f64,
    /// Unchanged from the unshrunken table
    pub pvalue: f64,
    pub padj: f64,
    pub direction: Direction,
}

/// ashr-shrunken fold changes, in the gene order of the source table
#[derive(Debug, Clone, Serialize)]
pub struct ShrunkenResults {
    rows: Vec<ShrunkenRow>,
    thresholds: SignificanceThresholds,
}

impl ShrunkenResults {
    pub fn rows(&self) -> &[ShrunkenRow] {
        &self.rows
    }

    pub fn thresholds(&self) -> &SignificanceThresholds {
        &self.thresholds
    }

    pub fn count(&self, direction: Direction) -> usize {
        self.rows.iter().filter(|r| r.direction == direction).count()
    }

    /// Up to `n` non-NO rows with the smallest padj, for chart labels
    pub fn top_labelled(&self, n: usize) -> Vec<&ShrunkenRow> {
        let mut rows: Vec<&ShrunkenRow> = self.rows.iter().filter(|r| r.direction != Direction::No).collect();
        rows.sort_by(|a, b| crate::stats::cmp_nan_last(a.padj, b.padj));
        rows.truncate(n);
        rows
    }
}

/// Shrink the LFCs of `results` with ashr and label each gene
pub fn shrink_results(results: &DeResults, params: &AshrParams, thresholds: &SignificanceThresholds) -> ShrunkenResults {
    let lfc: Vec<f64> = results.rows().iter().map(|r| r.log2_fold_change).collect();
    let se: Vec<f64> = results.rows().iter().map(|r| r.lfc_se).collect();
    let fit = shrink_lfc_ashr(&lfc, &se, params);
    log::debug!("ashr mixture: {} components, null weight {:.4}", fit.sigma.len(), fit.pi[0]);

    let rows: Vec<ShrunkenRow> = results
        .rows()
        .iter()
        .enumerate()
        .map(|(i, r)| ShrunkenRow {
            gene_id: r.gene_id.clone(),
            base_mean: r.base_mean,
            log2_fold_change: fit.posterior_mean[i],
            lfc_se: fit.posterior_sd[i],
            lfsr: fit.lfsr[i],
            pvalue: r.pvalue,
            padj: r.padj,
            direction: Direction::classify(fit.posterior_mean[i], r.padj, thresholds),
        })
        .collect();

    let shrunken = ShrunkenResults {
        rows,
        thresholds: thresholds.clone(),
    };
    log::info!(
        "Shrunken LFCs with |lfc| > {} and padj < {}: {} UP, {} DOWN",
        thresholds.abs_lfc,
        thresholds.padj,
        shrunken.count(Direction::Up),
        shrunken.count(Direction::Down)
    );
    shrunken
}
