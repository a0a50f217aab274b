//! pasilla_deseq: negative binomial differential expression for a
//! two-arm RNA-seq study
//!
//! Counts are filtered, normalized by median-of-ratios size factors and
//! fitted gene by gene with a negative binomial GLM `~ layout + treatment`
//! using empirically shrunken dispersions. Treated vs untreated is tested
//! with a Wald test, fold changes are shrunk with ashr, and results are
//! written as CSV tables and SVG charts.
//!
//! # Example
//!
//! ```ignore
//! use pasilla_deseq::prelude::*;
//!
//! let counts = read_count_matrix("pasilla_gene_counts.tsv")?;
//! let design = read_sample_design("pasilla_sample_annotation.csv")?;
//! let dds = DESeqDataSet::new(counts, design)?;
//!
//! let config = PipelineConfig::default();
//! let analysis = analyze(&dds, &config)?;
//! println!("{}", analysis.results.summary(config.alpha));
//! export_tables(&analysis, "out".as_ref(), &config)?;
//! ```

pub mod analysis;
pub mod cli;
pub mod config;
pub mod data;
pub mod dispersion;
pub mod error;
pub mod filter;
pub mod glm;
pub mod io;
pub mod linalg;
pub mod model;
pub mod normalization;
pub mod pipeline;
pub mod plot;
pub mod shrinkage;
pub mod stats;
pub mod testing;
pub mod transform;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{DisplayConfig, PipelineConfig, SignificanceThresholds};
    pub use crate::data::{CountMatrix, DESeqDataSet, LibraryLayout, SampleDesign, SampleRecord, Treatment};
    pub use crate::dispersion::{estimate_dispersions, DispersionFunction, DispersionParams};
    pub use crate::error::{DeseqError, ErrorClass, Result};
    pub use crate::filter::{filter_low_counts, independent_filtering};
    pub use crate::glm::{fit_glm, GlmFitParams};
    pub use crate::io::{read_count_matrix, read_sample_design, DeResults, DeRow, ResultsSummary};
    pub use crate::model::{fit_model, FittedModel};
    pub use crate::normalization::estimate_size_factors;
    pub use crate::pipeline::{analyze, export_tables, render_charts, run, Analysis, PipelineReport};
    pub use crate::shrinkage::{shrink_results, AshrParams, Direction, ShrunkenResults};
    pub use crate::testing::{benjamini_hochberg, results, wald_test};
    pub use crate::transform::{vst, VstResult};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use crate::analysis::zscore_rows;
    use crate::io::export;
    use crate::plot;
    use ndarray::{array, Array2};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn design(samples: &[(&str, LibraryLayout, Treatment)]) -> SampleDesign {
        SampleDesign::new(
            samples
                .iter()
                .map(|&(id, layout, treatment)| SampleRecord {
                    sample_id: id.to_string(),
                    layout,
                    treatment,
                })
                .collect(),
        )
        .unwrap()
    }

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    /// 3 genes x 4 samples; gene "up" is ~10x higher under treatment
    fn toy_dataset() -> DESeqDataSet {
        use LibraryLayout::*;
        use Treatment::*;
        let counts = array![
            [100.0, 110.0, 1000.0, 1050.0],
            [200.0, 190.0, 210.0, 205.0],
            [50.0, 60.0, 55.0, 45.0],
        ];
        let genes = vec!["up".to_string(), "flat".into(), "low".into()];
        let samples = vec!["u1".to_string(), "u2".into(), "t1".into(), "t2".into()];
        let matrix = CountMatrix::new(counts, genes, samples).unwrap();
        let d = design(&[
            ("u1", Single, Untreated),
            ("u2", Single, Untreated),
            ("t1", Single, Treated),
            ("t2", Single, Treated),
        ]);
        DESeqDataSet::new(matrix, d).unwrap()
    }

    const SAMPLES: [(&str, LibraryLayout, Treatment); 7] = [
        ("untreated1", LibraryLayout::Single, Treatment::Untreated),
        ("untreated2", LibraryLayout::Single, Treatment::Untreated),
        ("untreated3", LibraryLayout::Paired, Treatment::Untreated),
        ("untreated4", LibraryLayout::Paired, Treatment::Untreated),
        ("treated1", LibraryLayout::Single, Treatment::Treated),
        ("treated2", LibraryLayout::Paired, Treatment::Treated),
        ("treated3", LibraryLayout::Paired, Treatment::Treated),
    ];

    /// Deterministic overdispersed counts: every tenth gene up 4x, every
    /// tenth (offset 5) down 4x
    fn simulated_counts(n_genes: usize) -> Array2<f64> {
        let size_factors = [0.8, 1.1, 1.0, 1.3, 0.9, 1.2, 1.0];
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut uniform = move || {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 11) as f64 / (1u64 << 53) as f64
        };
        Array2::from_shape_fn((n_genes, SAMPLES.len()), |(g, j)| {
            let base = 20.0 * (1.0 + (g % 50) as f64).powf(1.5);
            let (_, layout, treatment) = SAMPLES[j];
            let fold = match (treatment, g % 10) {
                (Treatment::Treated, 0) => 4.0,
                (Treatment::Treated, 5) => 0.25,
                _ => 1.0,
            };
            let layout_effect = if layout == LibraryLayout::Single { 1.2 } else { 1.0 };
            let mu = base * fold * layout_effect * size_factors[j];
            let spread = uniform() + uniform() + uniform() - 1.5;
            let noisy = mu * (0.35 * spread).exp() + mu.sqrt() * (uniform() - 0.5) * 2.0;
            noisy.round().max(0.0)
        })
    }

    fn simulated_dataset(n_genes: usize) -> DESeqDataSet {
        let samples: Vec<String> = SAMPLES.iter().map(|s| s.0.to_string()).collect();
        let matrix = CountMatrix::new(simulated_counts(n_genes), ids("FBgn", n_genes), samples).unwrap();
        DESeqDataSet::new(matrix, design(&SAMPLES)).unwrap()
    }

    fn write_inputs(dir: &Path, counts: &Array2<f64>, genes: &[String]) -> (std::path::PathBuf, std::path::PathBuf) {
        let counts_path = dir.join("counts.tsv");
        let mut text = String::from("gene_id");
        for s in SAMPLES.iter() {
            text.push('\t');
            text.push_str(s.0);
        }
        text.push('\n');
        for (gene, row) in genes.iter().zip(counts.rows()) {
            text.push_str(gene);
            for v in row {
                text.push_str(&format!("\t{}", v));
            }
            text.push('\n');
        }
        fs::write(&counts_path, text).unwrap();

        let design_path = dir.join("design.csv");
        let mut text = String::from("file,condition,type\n");
        for (id, layout, treatment) in SAMPLES.iter() {
            let layout = if *layout == LibraryLayout::Single { "single-read" } else { "paired-end" };
            text.push_str(&format!("{},{},{}\n", id, treatment, layout));
        }
        fs::write(&design_path, text).unwrap();
        (counts_path, design_path)
    }

    #[test]
    fn test_toy_scenario_ranks_induced_gene_first() {
        let analysis = analyze(&toy_dataset(), &PipelineConfig::default()).unwrap();
        let rows = analysis.results.rows();
        assert_eq!(rows.len(), 3);
        let up = rows.iter().find(|r| r.gene_id == "up").unwrap();
        assert!(up.log2_fold_change > 2.5, "lfc {}", up.log2_fold_change);
        assert_eq!(analysis.results.sorted_by_pvalue()[0].gene_id, "up");
        assert_eq!(analysis.results.top_by_padj(10).len(), 3);
    }

    #[test]
    fn test_swapping_treatment_labels_negates_fold_changes() {
        let dds = simulated_dataset(120);
        let swapped = dds.with_swapped_treatments().unwrap();
        let config = PipelineConfig::default();
        let a = analyze(&dds, &config).unwrap();
        let b = analyze(&swapped, &config).unwrap();

        for (x, y) in a.results.rows().iter().zip(b.results.rows()) {
            assert_eq!(x.gene_id, y.gene_id);
            assert!(
                (x.log2_fold_change + y.log2_fold_change).abs() < 1e-3,
                "{}: {} vs {}",
                x.gene_id,
                x.log2_fold_change,
                y.log2_fold_change
            );
            assert!((x.stat + y.stat).abs() <= 1e-3 * x.stat.abs().max(1.0), "{}", x.gene_id);
            if x.pvalue > 1e-8 {
                assert!((x.pvalue - y.pvalue).abs() <= 1e-3 * x.pvalue, "{}", x.gene_id);
            }
        }
    }

    #[test]
    fn test_filtered_table_is_subset_of_full_table() {
        let analysis = analyze(&simulated_dataset(200), &PipelineConfig::default()).unwrap();
        let full = analysis.results.sorted_by_pvalue();
        let filtered = analysis.results.significant(0.05, 1.0);
        assert!(!filtered.is_empty());
        for row in &filtered {
            assert!(row.padj < 0.05 && row.log2_fold_change.abs() > 1.0);
            let same = full.iter().find(|r| r.gene_id == row.gene_id).unwrap();
            assert_eq!(*same, *row);
        }
        // induced genes are found in the right direction
        for row in &filtered {
            let g: usize = row.gene_id[4..].parse().unwrap();
            match g % 10 {
                0 => assert!(row.log2_fold_change > 0.0),
                5 => assert!(row.log2_fold_change < 0.0),
                _ => {}
            }
        }
    }

    #[test]
    fn test_full_table_sort_is_stable_with_nan_last() {
        let analysis = analyze(&simulated_dataset(100), &PipelineConfig::default()).unwrap();
        let position = |id: &str| analysis.results.rows().iter().position(|r| r.gene_id == id).unwrap();
        let sorted = analysis.results.sorted_by_pvalue();
        for w in sorted.windows(2) {
            let (a, b) = (w[0], w[1]);
            if a.pvalue.is_nan() {
                assert!(b.pvalue.is_nan());
            } else if !b.pvalue.is_nan() {
                assert!(a.pvalue <= b.pvalue);
            }
            if a.pvalue == b.pvalue || (a.pvalue.is_nan() && b.pvalue.is_nan()) {
                assert!(position(&a.gene_id) < position(&b.gene_id));
            }
        }
    }

    #[test]
    fn test_export_is_idempotent() {
        let config = PipelineConfig::default();
        let dds = simulated_dataset(80);
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let a = export_tables(&analyze(&dds, &config).unwrap(), first.path(), &config).unwrap();
        let b = export_tables(&analyze(&dds, &config).unwrap(), second.path(), &config).unwrap();
        assert_eq!(a.len(), 6);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(fs::read(x).unwrap(), fs::read(y).unwrap(), "{}", x.display());
        }
        // and rewriting in place changes nothing
        let again = export_tables(&analyze(&dds, &config).unwrap(), first.path(), &config).unwrap();
        for (x, y) in again.iter().zip(&b) {
            assert_eq!(fs::read(x).unwrap(), fs::read(y).unwrap());
        }
    }

    #[test]
    fn test_run_from_files_applies_count_filter_boundary() {
        let dir = TempDir::new().unwrap();
        let mut genes = ids("FBgn", 60);
        let mut counts = simulated_counts(60);
        // exceeds 10 in exactly 3 samples (the treated group size): kept
        genes.push("boundary".into());
        // exceeds 10 in only 2 samples: removed
        genes.push("below".into());
        let extra = array![
            [11.0, 30.0, 0.0, 2.0, 15.0, 3.0, 10.0],
            [11.0, 30.0, 10.0, 10.0, 10.0, 3.0, 10.0]
        ];
        counts = ndarray::concatenate(ndarray::Axis(0), &[counts.view(), extra.view()]).unwrap();
        let (counts_path, design_path) = write_inputs(dir.path(), &counts, &genes);

        let out = dir.path().join("out");
        let report = run(&counts_path, &design_path, &out, &PipelineConfig::default(), false).unwrap();
        assert_eq!(report.filter.min_samples, 3);
        assert_eq!(report.files.len(), 6);

        let normalized = fs::read_to_string(out.join(export::NORMALIZED_COUNTS)).unwrap();
        assert!(normalized.lines().any(|l| l.starts_with("boundary,")));
        assert!(!normalized.lines().any(|l| l.starts_with("below,")));

        let top = fs::read_to_string(out.join(export::TOP_GENES)).unwrap();
        assert_eq!(top.lines().count(), 1 + 10.min(report.filter.kept));
        let shrunken = fs::read_to_string(out.join(export::RESULTS_SHRUNKEN)).unwrap();
        assert!(shrunken.starts_with("gene_id,baseMean,log2FoldChange,lfcSE,pvalue,padj,direction\n"));
    }

    #[test]
    fn test_missing_design_aborts_before_fitting() {
        let dir = TempDir::new().unwrap();
        let (counts_path, _) = write_inputs(dir.path(), &simulated_counts(5), &ids("g", 5));
        let err = run(
            &counts_path,
            &dir.path().join("nope.csv"),
            &dir.path().join("out"),
            &PipelineConfig::default(),
            false,
        )
        .unwrap_err();
        assert!(!dir.path().join("out").exists());
        assert_ne!(err.class(), ErrorClass::Fit);
    }

    #[test]
    fn test_constant_row_is_excluded_from_zscores() {
        let analysis = analyze(&simulated_dataset(60), &PipelineConfig::default()).unwrap();
        let mut rows = analysis.vst.data.slice(ndarray::s![0..3, ..]).to_owned();
        rows.row_mut(1).fill(7.5);
        let genes = analysis.vst.gene_ids[..3].to_vec();
        let z = zscore_rows(&rows, &genes);
        assert_eq!(z.excluded, vec![genes[1].clone()]);
        assert_eq!(z.gene_ids.len(), 2);
        assert!(z.data.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_top_list_length_tracks_filtered_genes() {
        let config = PipelineConfig::default();
        let small = analyze(&toy_dataset(), &config).unwrap();
        assert_eq!(small.results.top_by_padj(config.top_n).len(), 3.min(small.filter.kept));
        let large = analyze(&simulated_dataset(50), &config).unwrap();
        assert_eq!(large.results.top_by_padj(config.top_n).len(), 10);
    }

    #[test]
    fn test_charts_are_rendered() {
        let config = PipelineConfig::default();
        let analysis = analyze(&simulated_dataset(150), &config).unwrap();
        let dir = TempDir::new().unwrap();
        let files = render_charts(&analysis, dir.path(), &config).unwrap();
        assert_eq!(files.len(), 7);
        for name in [
            plot::DISPERSION_PLOT,
            plot::PCA_PLOT,
            plot::SAMPLE_DISTANCE_HEATMAP,
            plot::TOP_GENES_HEATMAP,
            plot::ZSCORE_HEATMAP,
            plot::MA_PLOT,
            plot::VOLCANO_PLOT,
        ] {
            let svg = fs::read_to_string(dir.path().join(name)).unwrap();
            assert!(svg.contains("<svg"), "{}", name);
        }
    }
}
