//! CSV exports of the result tables and transformed matrices
//!
//! Every writer truncates its destination, so re-running on identical input
//! produces byte-identical files. NaN is written as `NA`.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use ndarray::Array2;

use super::results::DeRow;
use crate::error::{DeseqError, Result};
use crate::shrinkage::ShrunkenResults;

pub const RESULTS_FULL: &str = "results_full.csv";
pub const RESULTS_FILTERED: &str = "results_filtered.csv";
pub const NORMALIZED_COUNTS: &str = "normalized_counts.csv";
pub const TOP_GENES: &str = "top10_genes.csv";
pub const RESULTS_SHRUNKEN: &str = "results_shrunken.csv";
pub const VST_COUNTS: &str = "vst_counts.csv";

const RESULT_COLUMNS: [&str; 7] = ["gene_id", "baseMean", "log2FoldChange", "lfcSE", "stat", "pvalue", "padj"];

/// Shortest round-trip representation; NaN as `NA`.
///
/// Magnitudes below 1e-5 or from 1e16 up switch to exponent notation.
pub fn format_float(v: f64) -> String {
    if v.is_nan() {
        "NA".to_string()
    } else if v == f64::INFINITY {
        "Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else if v != 0.0 && (v.abs() < 1e-5 || v.abs() >= 1e16) {
        format!("{:e}", v)
    } else {
        v.to_string()
    }
}

/// Create `dir` (and parents) if needed
pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| DeseqError::export(dir, e))
}

fn write_csv<F>(path: &Path, fill: F) -> Result<PathBuf>
where
    F: FnOnce(&mut csv::Writer<File>) -> csv::Result<()>,
{
    let mut writer = csv::Writer::from_path(path).map_err(|e| DeseqError::export(path, e))?;
    fill(&mut writer).map_err(|e| DeseqError::export(path, e))?;
    writer.flush().map_err(|e| DeseqError::export(path, e))?;
    log::info!("Wrote {}", path.display());
    Ok(path.to_path_buf())
}

/// `gene_id,baseMean,log2FoldChange,lfcSE,stat,pvalue,padj` in the given row order
pub fn write_results_table(path: &Path, rows: &[&DeRow]) -> Result<PathBuf> {
    write_csv(path, |w| {
        w.write_record(RESULT_COLUMNS)?;
        for r in rows {
            w.write_record([
                r.gene_id.clone(),
                format_float(r.base_mean),
                format_float(r.log2_fold_change),
                format_float(r.lfc_se),
                format_float(r.stat),
                format_float(r.pvalue),
                format_float(r.padj),
            ])?;
        }
        Ok(())
    })
}

/// `rank,gene_id,padj`, rank starting at 1
pub fn write_top_genes(path: &Path, rows: &[&DeRow]) -> Result<PathBuf> {
    write_csv(path, |w| {
        w.write_record(["rank", "gene_id", "padj"])?;
        for (i, r) in rows.iter().enumerate() {
            w.write_record([(i + 1).to_string(), r.gene_id.clone(), format_float(r.padj)])?;
        }
        Ok(())
    })
}

/// `gene_id,<samples...>` for a genes x samples matrix
pub fn write_matrix(path: &Path, gene_ids: &[String], sample_ids: &[String], data: &Array2<f64>) -> Result<PathBuf> {
    write_csv(path, |w| {
        let mut header = vec!["gene_id".to_string()];
        header.extend(sample_ids.iter().cloned());
        w.write_record(&header)?;
        for (gene, row) in gene_ids.iter().zip(data.rows()) {
            let mut record = vec![gene.clone()];
            record.extend(row.iter().map(|&v| format_float(v)));
            w.write_record(&record)?;
        }
        Ok(())
    })
}

/// `gene_id,baseMean,log2FoldChange,lfcSE,pvalue,padj,direction`
pub fn write_shrunken(path: &Path, shrunken: &ShrunkenResults) -> Result<PathBuf> {
    write_csv(path, |w| {
        w.write_record(["gene_id", "baseMean", "log2FoldChange", "lfcSE", "pvalue", "padj", "direction"])?;
        for r in shrunken.rows() {
            w.write_record([
                r.gene_id.clone(),
                format_float(r.base_mean),
                format_float(r.log2_fold_change),
                format_float(r.lfc_se),
                format_float(r.pvalue),
                format_float(r.padj),
                r.direction.to_string(),
            ])?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::TempDir;

    fn row(id: &str, padj: f64) -> DeRow {
        DeRow {
            gene_id: id.to_string(),
            base_mean: 12.5,
            log2_fold_change: -1.25,
            lfc_se: 0.1,
            stat: -12.5,
            pvalue: 1e-5,
            padj,
        }
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(f64::NAN), "NA");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(2.0), "2");
        assert_eq!(format_float(1e-300).parse::<f64>().unwrap(), 1e-300);
        assert_eq!(format_float(f64::NEG_INFINITY), "-Inf");
        assert_eq!(format_float(0.0), "0");
        assert_eq!(format_float(1e-5), "0.00001");
    }

    #[test]
    fn test_tiny_pvalues_use_exponent_notation() {
        assert_eq!(format_float(2.95e-200), "2.95e-200");
        assert_eq!(format_float(-3e-7), "-3e-7");
        assert_eq!(format_float(1.5e20), "1.5e20");
        let text = format_float(5e-324);
        assert!(text.len() < 12, "{}", text);
        assert_eq!(text.parse::<f64>().unwrap(), 5e-324);
    }

    #[test]
    fn test_results_table_content_and_idempotence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(RESULTS_FULL);
        let a = row("g1", 0.001);
        let b = row("g2", f64::NAN);
        write_results_table(&path, &[&a, &b]).unwrap();
        let first = fs::read(&path).unwrap();
        write_results_table(&path, &[&a, &b]).unwrap();
        assert_eq!(first, fs::read(&path).unwrap());

        let text = String::from_utf8(first).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "gene_id,baseMean,log2FoldChange,lfcSE,stat,pvalue,padj");
        assert_eq!(lines[1], "g1,12.5,-1.25,0.1,-12.5,0.00001,0.001");
        assert!(lines[2].ends_with(",NA"));
    }

    #[test]
    fn test_top_genes_and_matrix() {
        let dir = TempDir::new().unwrap();
        let a = row("g1", 0.001);
        let top = dir.path().join(TOP_GENES);
        write_top_genes(&top, &[&a]).unwrap();
        assert_eq!(fs::read_to_string(&top).unwrap(), "rank,gene_id,padj\n1,g1,0.001\n");

        let m = dir.path().join(NORMALIZED_COUNTS);
        write_matrix(&m, &["g1".into()], &["s1".into(), "s2".into()], &array![[1.5, 0.0]]).unwrap();
        assert_eq!(fs::read_to_string(&m).unwrap(), "gene_id,s1,s2\ng1,1.5,0\n");
    }

    #[test]
    fn test_unwritable_destination_is_export_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("out.csv");
        let err = write_top_genes(&path, &[]).unwrap_err();
        assert!(matches!(err, DeseqError::Export { .. }));
        assert!(err.to_string().contains("out.csv"));
    }
}
