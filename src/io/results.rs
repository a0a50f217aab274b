//! Differential-expression results table and its ranking views

use serde::{Deserialize, Serialize};

use crate::stats::cmp_nan_last;

/// One gene of the differential-expression table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeRow {
    pub gene_id: String,
    /// Mean of normalized counts over all samples
    pub base_mean: f64,
    /// Treated relative to untreated
    pub log2_fold_change: f64,
    pub lfc_se: f64,
    pub stat: f64,
    pub pvalue: f64,
    pub padj: f64,
}

impl DeRow {
    /// padj < `padj_max` and |LFC| > `abs_lfc_min`
    pub fn is_significant(&self, padj_max: f64, abs_lfc_min: f64) -> bool {
        self.padj < padj_max && self.log2_fold_change.abs() > abs_lfc_min
    }
}

/// Full results for the treatment coefficient, one row per tested gene
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeResults {
    rows: Vec<DeRow>,
    /// Base-mean cutoff chosen by independent filtering (0 when disabled)
    mean_count_cutoff: f64,
    /// Genes that kept their gene-wise dispersion
    dispersion_outliers: usize,
}

impl DeResults {
    pub fn new(rows: Vec<DeRow>, mean_count_cutoff: f64, dispersion_outliers: usize) -> Self {
        Self {
            rows,
            mean_count_cutoff,
            dispersion_outliers,
        }
    }

    /// Rows in gene order
    pub fn rows(&self) -> &[DeRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, gene_id: &str) -> Option<&DeRow> {
        self.rows.iter().find(|r| r.gene_id == gene_id)
    }

    pub fn mean_count_cutoff(&self) -> f64 {
        self.mean_count_cutoff
    }

    /// Stable ascending sort by p-value, NaN last
    pub fn sorted_by_pvalue(&self) -> Vec<&DeRow> {
        let mut rows: Vec<&DeRow> = self.rows.iter().collect();
        rows.sort_by(|a, b| cmp_nan_last(a.pvalue, b.pvalue));
        rows
    }

    /// Rows passing both thresholds, in p-value order. Values are untouched.
    pub fn significant(&self, padj_max: f64, abs_lfc_min: f64) -> Vec<&DeRow> {
        self.sorted_by_pvalue()
            .into_iter()
            .filter(|r| r.is_significant(padj_max, abs_lfc_min))
            .collect()
    }

    /// The `n` rows with the smallest padj (stable, NaN last)
    pub fn top_by_padj(&self, n: usize) -> Vec<&DeRow> {
        let mut rows: Vec<&DeRow> = self.rows.iter().collect();
        rows.sort_by(|a, b| cmp_nan_last(a.padj, b.padj));
        rows.truncate(n);
        rows
    }

    pub fn summary(&self, alpha: f64) -> ResultsSummary {
        let count = |pred: &dyn Fn(&DeRow) -> bool| self.rows.iter().filter(|r| pred(r)).count();
        ResultsSummary {
            total: self.rows.len(),
            alpha,
            up: count(&|r| r.padj < alpha && r.log2_fold_change > 0.0),
            down: count(&|r| r.padj < alpha && r.log2_fold_change < 0.0),
            outliers: self.dispersion_outliers,
            low_counts: count(&|r| r.padj.is_nan() && !r.pvalue.is_nan()),
            mean_count_cutoff: self.mean_count_cutoff,
        }
    }
}

/// Counts printed by `DeResults::summary`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsSummary {
    pub total: usize,
    pub alpha: f64,
    pub up: usize,
    pub down: usize,
    pub outliers: usize,
    /// Removed by independent filtering
    pub low_counts: usize,
    pub mean_count_cutoff: f64,
}

impl std::fmt::Display for ResultsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pct = |n: usize| {
            if self.total == 0 {
                0.0
            } else {
                100.0 * n as f64 / self.total as f64
            }
        };
        writeln!(f, "out of {} genes passing the count filter", self.total)?;
        writeln!(f, "adjusted p-value < {}", self.alpha)?;
        writeln!(f, "LFC > 0 (up)       : {}, {:.2}%", self.up, pct(self.up))?;
        writeln!(f, "LFC < 0 (down)     : {}, {:.2}%", self.down, pct(self.down))?;
        writeln!(f, "outliers [1]       : {}, {:.2}%", self.outliers, pct(self.outliers))?;
        writeln!(f, "low counts [2]     : {}, {:.2}%", self.low_counts, pct(self.low_counts))?;
        writeln!(f, "(mean count < {:.0})", self.mean_count_cutoff)?;
        writeln!(f, "[1] dispersion outliers keep their gene-wise estimate")?;
        write!(f, "[2] see independent filtering")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, lfc: f64, pvalue: f64, padj: f64) -> DeRow {
        DeRow {
            gene_id: id.to_string(),
            base_mean: 100.0,
            log2_fold_change: lfc,
            lfc_se: 0.2,
            stat: lfc / 0.2,
            pvalue,
            padj,
        }
    }

    fn table() -> DeResults {
        DeResults::new(
            vec![
                row("a", 2.0, 0.01, 0.02),
                row("b", -3.0, f64::NAN, f64::NAN),
                row("c", 0.5, 0.001, 0.004),
                row("d", -1.5, 0.01, 0.02),
                row("e", 1.2, 0.2, f64::NAN),
            ],
            5.0,
            1,
        )
    }

    #[test]
    fn test_sorted_by_pvalue_is_stable_nan_last() {
        let t = table();
        let ids: Vec<&str> = t.sorted_by_pvalue().iter().map(|r| r.gene_id.as_str()).collect();
        // a and d tie and keep input order
        assert_eq!(ids, vec!["c", "a", "d", "e", "b"]);
    }

    #[test]
    fn test_significant_is_subset_with_identical_values() {
        let t = table();
        let sig = t.significant(0.05, 1.0);
        let ids: Vec<&str> = sig.iter().map(|r| r.gene_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d"]);
        for r in sig {
            assert_eq!(Some(r), t.get(&r.gene_id));
        }
    }

    #[test]
    fn test_top_by_padj_length() {
        let t = table();
        assert_eq!(t.top_by_padj(10).len(), 5);
        let top2: Vec<&str> = t.top_by_padj(2).iter().map(|r| r.gene_id.as_str()).collect();
        assert_eq!(top2, vec!["c", "a"]);
    }

    #[test]
    fn test_summary_counts() {
        let s = table().summary(0.1);
        assert_eq!(s.up, 2);
        assert_eq!(s.down, 1);
        assert_eq!(s.low_counts, 1);
        assert_eq!(s.outliers, 1);
        assert!(s.to_string().contains("LFC > 0 (up)       : 2, 40.00%"));
    }
}
