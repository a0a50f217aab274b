//! End-to-end run: load, filter, fit, test, shrink, transform, export, chart

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ndarray::{Array2, Axis};

use crate::analysis::{complete_linkage, euclidean_distances, pca, zscore_rows};
use crate::config::PipelineConfig;
use crate::data::DESeqDataSet;
use crate::error::Result;
use crate::filter::{filter_low_counts, CountFilterSummary};
use crate::io::export::{self, NORMALIZED_COUNTS, RESULTS_FILTERED, RESULTS_FULL, RESULTS_SHRUNKEN, TOP_GENES, VST_COUNTS};
use crate::io::{read_count_matrix, read_sample_design, DeResults, ResultsSummary};
use crate::model::{fit_model, FittedModel};
use crate::plot;
use crate::shrinkage::{shrink_results, ShrunkenResults};
use crate::testing;
use crate::transform::{vst, VstResult};

/// Everything computed from one dataset, before anything is written
#[derive(Debug, Clone)]
pub struct Analysis {
    pub filter: CountFilterSummary,
    pub fit: FittedModel,
    pub results: DeResults,
    pub shrunken: ShrunkenResults,
    pub vst: VstResult,
}

/// What a run produced
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub filter: CountFilterSummary,
    pub summary: ResultsSummary,
    pub files: Vec<PathBuf>,
}

/// Filter, fit, test, shrink and transform `dds`
pub fn analyze(dds: &DESeqDataSet, config: &PipelineConfig) -> Result<Analysis> {
    let (filtered, filter) = filter_low_counts(dds, config.min_count)?;
    let fit = fit_model(&filtered, &config.dispersion, &config.glm)?;

    let results = testing::results(&fit, config.alpha, config.independent_filtering);
    log::info!("Results summary:\n{}", results.summary(config.alpha));

    if config.direction.abs_lfc != config.significance.abs_lfc {
        log::warn!(
            "Direction labels use |log2FC| > {}, the filtered table uses |log2FC| > {}",
            config.direction.abs_lfc,
            config.significance.abs_lfc
        );
    } else {
        log::info!(
            "Direction labels use |log2FC| > {} and padj < {}",
            config.direction.abs_lfc,
            config.direction.padj
        );
    }
    let shrunken = shrink_results(&results, &config.ashr, &config.direction);

    log::info!("Variance-stabilizing counts");
    let vst = vst(&fit)?;

    Ok(Analysis {
        filter,
        fit,
        results,
        shrunken,
        vst,
    })
}

/// Write every result table into `dir`, overwriting earlier runs
pub fn export_tables(analysis: &Analysis, dir: &Path, config: &PipelineConfig) -> Result<Vec<PathBuf>> {
    export::ensure_output_dir(dir)?;
    let results = &analysis.results;
    let sig = &config.significance;
    let fit = &analysis.fit;

    Ok(vec![
        export::write_results_table(&dir.join(RESULTS_FULL), &results.sorted_by_pvalue())?,
        export::write_results_table(&dir.join(RESULTS_FILTERED), &results.significant(sig.padj, sig.abs_lfc))?,
        export::write_matrix(
            &dir.join(NORMALIZED_COUNTS),
            fit.gene_ids(),
            fit.sample_ids(),
            fit.normalized_counts(),
        )?,
        export::write_top_genes(&dir.join(TOP_GENES), &results.top_by_padj(config.top_n))?,
        export::write_shrunken(&dir.join(RESULTS_SHRUNKEN), &analysis.shrunken)?,
        export::write_matrix(
            &dir.join(VST_COUNTS),
            &analysis.vst.gene_ids,
            &analysis.vst.sample_ids,
            &analysis.vst.data,
        )?,
    ])
}

/// VST rows of the `top_n` genes by padj, in padj order
fn top_gene_rows(analysis: &Analysis, top_n: usize) -> (Array2<f64>, Vec<String>) {
    let index: HashMap<&str, usize> = analysis
        .vst
        .gene_ids
        .iter()
        .enumerate()
        .map(|(i, g)| (g.as_str(), i))
        .collect();
    let (rows, ids): (Vec<usize>, Vec<String>) = analysis
        .results
        .top_by_padj(top_n)
        .into_iter()
        .filter_map(|r| index.get(r.gene_id.as_str()).map(|&i| (i, r.gene_id.clone())))
        .unzip();
    (analysis.vst.data.select(Axis(0), &rows), ids)
}

/// Render every chart into `dir`. The two halves run on the rayon pool.
pub fn render_charts(analysis: &Analysis, dir: &Path, config: &PipelineConfig) -> Result<Vec<PathBuf>> {
    export::ensure_output_dir(dir)?;
    let display = &config.display;
    let design = analysis.fit.design();
    let sample_ids = &analysis.vst.sample_ids;

    let pca = pca(&analysis.vst.data, display.pca_top_genes)?;
    let distances = euclidean_distances(&analysis.vst.data);
    let tree = complete_linkage(&distances)?;
    let (top_values, top_ids) = top_gene_rows(analysis, config.top_n);
    let zscores = zscore_rows(&top_values, &top_ids);

    let path = |name: &str| dir.join(name);
    let (samples, genes) = rayon::join(
        || -> Result<()> {
            plot::dispersion_plot(&analysis.fit, display, &path(plot::DISPERSION_PLOT))?;
            plot::pca_plot(&pca, design, display, &path(plot::PCA_PLOT))?;
            plot::sample_distance_heatmap(
                &distances,
                &tree,
                sample_ids,
                display,
                &path(plot::SAMPLE_DISTANCE_HEATMAP),
            )
        },
        || -> Result<()> {
            plot::top_genes_heatmap(&top_values, &top_ids, design, display, &path(plot::TOP_GENES_HEATMAP))?;
            plot::zscore_heatmap(&zscores, sample_ids, display, &path(plot::ZSCORE_HEATMAP))?;
            plot::ma_plot(&analysis.shrunken, display, &path(plot::MA_PLOT))?;
            plot::volcano_plot(&analysis.shrunken, display, &path(plot::VOLCANO_PLOT))
        },
    );
    samples?;
    genes?;

    Ok([
        plot::DISPERSION_PLOT,
        plot::PCA_PLOT,
        plot::SAMPLE_DISTANCE_HEATMAP,
        plot::TOP_GENES_HEATMAP,
        plot::ZSCORE_HEATMAP,
        plot::MA_PLOT,
        plot::VOLCANO_PLOT,
    ]
    .into_iter()
    .map(path)
    .collect())
}

/// Run the whole pipeline from the two input tables into `output`
pub fn run(
    counts_path: &Path,
    design_path: &Path,
    output: &Path,
    config: &PipelineConfig,
    charts: bool,
) -> Result<PipelineReport> {
    config.validate()?;
    let counts = read_count_matrix(counts_path)?;
    let design = read_sample_design(design_path)?;
    let dds = DESeqDataSet::new(counts, design)?;
    export::ensure_output_dir(output)?;

    let analysis = analyze(&dds, config)?;
    let mut files = export_tables(&analysis, output, config)?;
    if charts {
        files.extend(render_charts(&analysis, output, config)?);
    } else {
        log::info!("Chart rendering skipped");
    }
    log::info!("Wrote {} files to {}", files.len(), output.display());

    Ok(PipelineReport {
        filter: analysis.filter,
        summary: analysis.results.summary(config.alpha),
        files,
    })
}
