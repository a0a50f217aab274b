//! Input tables, result tables and CSV exports

mod csv;
pub mod export;
mod results;

pub use self::csv::{read_count_matrix, read_sample_design};
pub use export::{ensure_output_dir, format_float, write_matrix, write_results_table, write_shrunken, write_top_genes};
pub use results::{DeResults, DeRow, ResultsSummary};
