//! pasilla_deseq command-line interface

use clap::Parser;
use log::{info, LevelFilter};

use pasilla_deseq::cli::{Cli, Commands, RunArgs};
use pasilla_deseq::error::Result;
use pasilla_deseq::pipeline;

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Commands::Run(args) => run_analysis(&args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run_analysis(args: &RunArgs) -> Result<()> {
    if args.threads > 0 {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(args.threads).build_global() {
            log::warn!("Could not size the thread pool: {}", e);
        }
    }
    let config = args.pipeline_config()?;

    info!("Counts: {}", args.counts.display());
    info!("Design: {}", args.design.display());
    let report = pipeline::run(&args.counts, &args.design, &args.output, &config, !args.no_charts)?;

    info!(
        "Done: {} genes tested, {} up and {} down at padj < {}",
        report.summary.total, report.summary.up, report.summary.down, report.summary.alpha
    );
    Ok(())
}
