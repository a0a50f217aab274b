//! Command-line interface for pasilla_deseq

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::PipelineConfig;
use crate::error::Result;

#[derive(Parser, Debug)]
#[command(name = "pasilla_deseq")]
#[command(version)]
#[command(about = "Negative binomial differential expression for treated vs untreated RNA-seq samples")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full analysis and write tables and charts
    #[command(
        long_about = "Run the full analysis\n\n\
            Filters low-count genes, estimates size factors and dispersions, fits\n\
            the negative binomial GLM ~ layout + treatment, runs the Wald test on\n\
            treated vs untreated, shrinks fold changes with ashr and writes result\n\
            tables, variance-stabilized counts and SVG charts.",
        after_long_help = "\
Examples:
  pasilla_deseq run -c pasilla_gene_counts.tsv -d pasilla_sample_annotation.csv -o out/

  # reproduce the notebook's volcano labelling threshold
  pasilla_deseq run -c counts.csv -d design.csv -o out/ --direction-lfc 0.1

  # tables only, four threads
  pasilla_deseq run -c counts.csv -d design.csv -o out/ --no-charts --threads 4"
    )]
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Count matrix (genes x samples, CSV or TSV)
    #[arg(short, long,
        long_help = "Count matrix file.\n\
            First column = gene ids, header = sample ids, cells = raw counts.\n\
            Comma or tab delimited (auto-detected).")]
    pub counts: PathBuf,

    /// Sample design table
    #[arg(short, long,
        long_help = "Sample design file.\n\
            First column = sample ids; needs a treatment (or condition) column and\n\
            a sequencing layout (or type) column.")]
    pub design: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "results")]
    pub output: PathBuf,

    /// JSON configuration file; flags below override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Count a gene must exceed in the smallest group's number of samples
    #[arg(long)]
    pub min_count: Option<u64>,

    /// padj cutoff of the filtered table
    #[arg(long)]
    pub padj: Option<f64>,

    /// |log2 fold change| cutoff of the filtered table
    #[arg(long)]
    pub lfc: Option<f64>,

    /// |log2 fold change| cutoff of the UP/DOWN labels
    #[arg(long)]
    pub direction_lfc: Option<f64>,

    /// Target FDR for independent filtering
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Plain Benjamini-Hochberg without independent filtering
    #[arg(long)]
    pub no_independent_filtering: bool,

    /// Skip chart rendering
    #[arg(long)]
    pub no_charts: bool,

    /// Worker threads (0 = all cores)
    #[arg(long, default_value = "0")]
    pub threads: usize,
}

impl RunArgs {
    /// Configuration file (or defaults) with command-line overrides applied
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(v) = self.min_count {
            config.min_count = v;
        }
        if let Some(v) = self.padj {
            config.significance.padj = v;
            config.direction.padj = v;
        }
        if let Some(v) = self.lfc {
            config.significance.abs_lfc = v;
            config.direction.abs_lfc = v;
        }
        if let Some(v) = self.direction_lfc {
            config.direction.abs_lfc = v;
        }
        if let Some(v) = self.alpha {
            config.alpha = v;
        }
        if self.no_independent_filtering {
            config.independent_filtering = false;
        }
        config.validate()?;
        Ok(config)
    }
}
