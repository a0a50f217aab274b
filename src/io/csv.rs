//! Reading the count matrix and the sample-design table

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ndarray::Array2;

use crate::data::{CountMatrix, SampleDesign, SampleRecord};
use crate::error::{DeseqError, Result};

const TREATMENT_COLUMNS: [&str; 2] = ["treatment", "condition"];
const LAYOUT_COLUMNS: [&str; 4] = ["sequencing", "type", "layout", "library_layout"];

/// Comma, or tab when the header line contains one
fn detect_delimiter(path: &Path) -> Result<u8> {
    let mut first = String::new();
    BufReader::new(File::open(path)?).read_line(&mut first)?;
    if first.trim().is_empty() {
        return Err(DeseqError::schema(format!("{} is empty", path.display())));
    }
    Ok(if first.contains('\t') { b'\t' } else { b',' })
}

fn open_table(path: &Path) -> Result<(Vec<String>, Vec<csv::StringRecord>)> {
    let delimiter = detect_delimiter(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let header: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        if record.len() != header.len() {
            return Err(DeseqError::schema(format!(
                "{}: data row {} has {} fields, header has {}",
                path.display(),
                line + 1,
                record.len(),
                header.len()
            )));
        }
        rows.push(record);
    }
    Ok((header, rows))
}

fn parse_count(cell: &str, gene: &str, sample: &str) -> Result<f64> {
    let bad = || {
        DeseqError::schema(format!(
            "count for gene '{}' in sample '{}' is not a non-negative integer: '{}'",
            gene, sample, cell
        ))
    };
    if let Ok(v) = cell.parse::<u64>() {
        return Ok(v as f64);
    }
    let v: f64 = cell.parse().map_err(|_| bad())?;
    if v.is_finite() && v >= 0.0 && v.fract() == 0.0 {
        Ok(v)
    } else {
        Err(bad())
    }
}

/// Read a genes x samples count table.
///
/// The first column holds gene ids and the header row holds sample ids.
pub fn read_count_matrix<P: AsRef<Path>>(path: P) -> Result<CountMatrix> {
    let path = path.as_ref();
    let (header, rows) = open_table(path)?;
    if header.len() < 2 {
        return Err(DeseqError::schema(format!("{} has no sample columns", path.display())));
    }
    if rows.is_empty() {
        return Err(DeseqError::schema(format!("{} has no genes", path.display())));
    }

    let sample_ids: Vec<String> = header[1..].to_vec();
    let mut gene_ids = Vec::with_capacity(rows.len());
    let mut counts = Array2::zeros((rows.len(), sample_ids.len()));
    for (i, record) in rows.iter().enumerate() {
        let gene = record.get(0).unwrap_or_default();
        for (j, sample) in sample_ids.iter().enumerate() {
            counts[[i, j]] = parse_count(record.get(j + 1).unwrap_or_default(), gene, sample)?;
        }
        gene_ids.push(gene.to_string());
    }

    let matrix = CountMatrix::new(counts, gene_ids, sample_ids)?;
    log::info!(
        "Loaded {} genes x {} samples from {}",
        matrix.n_genes(),
        matrix.n_samples(),
        path.display()
    );
    Ok(matrix)
}

fn in_sample(sample_id: &str, err: DeseqError) -> DeseqError {
    match err {
        DeseqError::Schema { reason } => DeseqError::schema(format!("sample '{}': {}", sample_id, reason)),
        other => other,
    }
}

fn find_column(header: &[String], names: &[&str], what: &str) -> Result<usize> {
    header
        .iter()
        .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
        .ok_or_else(|| {
            DeseqError::schema(format!(
                "design table has no {} column (looked for {})",
                what,
                names.join(", ")
            ))
        })
}

/// Read the sample-design table.
///
/// The first column holds sample ids; treatment and layout columns are
/// found by name, case-insensitively.
pub fn read_sample_design<P: AsRef<Path>>(path: P) -> Result<SampleDesign> {
    let path = path.as_ref();
    let (header, rows) = open_table(path)?;
    if rows.is_empty() {
        return Err(DeseqError::schema(format!("{} has no samples", path.display())));
    }
    let treatment_col = find_column(&header, &TREATMENT_COLUMNS, "treatment")?;
    let layout_col = find_column(&header, &LAYOUT_COLUMNS, "sequencing layout")?;

    let records = rows
        .iter()
        .map(|record| {
            let sample_id = record.get(0).unwrap_or_default().to_string();
            let field = |col: usize| record.get(col).unwrap_or_default();
            let treatment = field(treatment_col).parse().map_err(|e| in_sample(&sample_id, e))?;
            let layout = field(layout_col).parse().map_err(|e| in_sample(&sample_id, e))?;
            Ok(SampleRecord {
                sample_id,
                layout,
                treatment,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let design = SampleDesign::new(records)?;
    log::info!("Loaded design for {} samples from {}", design.n_samples(), path.display());
    Ok(design)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{LibraryLayout, Treatment};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, "{}", content).unwrap();
        f
    }

    #[test]
    fn test_read_tab_separated_counts() {
        let f = file("gene_id\tu1\tt1\nFBgn01\t100\t200\nFBgn02\t5\t12.0\n");
        let m = read_count_matrix(f.path()).unwrap();
        assert_eq!(m.n_genes(), 2);
        assert_eq!(m.sample_ids(), &["u1".to_string(), "t1".into()]);
        assert_eq!(m.counts()[[1, 1]], 12.0);
    }

    #[test]
    fn test_quoted_csv_counts() {
        let f = file("\"\",\"a\",\"b\"\n\"g1\",1,2\n");
        let m = read_count_matrix(f.path()).unwrap();
        assert_eq!(m.gene_ids(), &["g1".to_string()]);
        assert_eq!(m.sample_ids(), &["a".to_string(), "b".into()]);
    }

    #[test]
    fn test_bad_count_names_gene_and_sample() {
        for cell in ["x", "-1", "2.5"] {
            let f = file(&format!("gene,a,b\ng1,1,{}\n", cell));
            let err = read_count_matrix(f.path()).unwrap_err();
            let msg = err.to_string();
            assert!(matches!(err, DeseqError::Schema { .. }));
            assert!(msg.contains("g1") && msg.contains("'b'"), "{}", msg);
        }
    }

    #[test]
    fn test_ragged_row_is_schema_error() {
        let f = file("gene,a,b\ng1,1\n");
        assert!(matches!(read_count_matrix(f.path()), Err(DeseqError::Schema { .. })));
    }

    #[test]
    fn test_empty_file_is_schema_error() {
        let f = file("");
        assert!(matches!(read_count_matrix(f.path()), Err(DeseqError::Schema { .. })));
    }

    #[test]
    fn test_read_design_with_aliases() {
        let f = file("file,Condition,type,lanes\ntreated1,treated,single-read,5\nuntreated3,untreated,paired-end,2\n");
        let d = read_sample_design(f.path()).unwrap();
        assert_eq!(d.records()[0].treatment, Treatment::Treated);
        assert_eq!(d.records()[0].layout, LibraryLayout::Single);
        assert_eq!(d.records()[1].layout, LibraryLayout::Paired);
    }

    #[test]
    fn test_unknown_treatment_is_schema_error() {
        let f = file("sample,treatment,sequencing\ns1,knockdown,single\n");
        let err = read_sample_design(f.path()).unwrap_err();
        assert!(matches!(err, DeseqError::Schema { .. }));
        assert!(err.to_string().contains("s1"));
    }

    #[test]
    fn test_missing_layout_column() {
        let f = file("sample,treatment\ns1,treated\n");
        assert!(matches!(read_sample_design(f.path()), Err(DeseqError::Schema { .. })));
    }
}
