//! Model matrix for `~ layout + treatment`

use ndarray::Array2;

use crate::data::{LibraryLayout, SampleDesign, Treatment};
use crate::error::{DeseqError, Result};
use crate::linalg;

/// Name of the tested coefficient
pub const TREATMENT_COEF: &str = "treatment_treated_vs_untreated";

/// Model matrix with named columns
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    matrix: Array2<f64>,
    coef_names: Vec<String>,
    treatment_coef: usize,
}

impl DesignMatrix {
    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn coef_names(&self) -> &[String] {
        &self.coef_names
    }

    /// Column index of the treated-vs-untreated coefficient
    pub fn treatment_coef(&self) -> usize {
        self.treatment_coef
    }

    pub fn n_coefs(&self) -> usize {
        self.matrix.ncols()
    }

    /// Residual degrees of freedom
    pub fn residual_df(&self) -> usize {
        self.matrix.nrows().saturating_sub(self.matrix.ncols())
    }

    /// True when the number of distinct rows equals the number of columns,
    /// in which case fitted means are plain group means
    pub fn is_group_design(&self) -> bool {
        let mut rows: Vec<Vec<i64>> = self
            .matrix
            .rows()
            .into_iter()
            .map(|r| r.iter().map(|&v| (v * 1000.0).round() as i64).collect())
            .collect();
        rows.sort();
        rows.dedup();
        rows.len() == self.matrix.ncols()
    }
}

/// Build the model matrix for the additive layout + treatment design.
///
/// Columns: intercept, `layout_single_vs_paired` when both layouts are
/// present, then `treatment_treated_vs_untreated`. Untreated is always the
/// reference level regardless of label order in the input.
pub fn build_design_matrix(design: &SampleDesign) -> Result<DesignMatrix> {
    let n = design.n_samples();
    for level in [Treatment::Untreated, Treatment::Treated] {
        if design.group_size(level) == 0 {
            return Err(DeseqError::schema(format!(
                "design has no '{}' samples; both treatment levels are required",
                level
            )));
        }
    }

    let layout_levels = design.layout_levels();
    let mut coef_names = vec!["Intercept".to_string()];
    let mut columns: Vec<Vec<f64>> = vec![vec![1.0; n]];

    if layout_levels.len() > 1 {
        // Reference is the first level in sorted order (paired)
        let reference = layout_levels[0];
        let other = layout_levels[1];
        coef_names.push(format!("layout_{}_vs_{}", other, reference));
        columns.push(
            design
                .layouts()
                .iter()
                .map(|&l| if l == reference { 0.0 } else { 1.0 })
                .collect(),
        );
    } else {
        log::info!(
            "Only one sequencing layout ({}) present; dropping layout term",
            layout_levels.first().copied().unwrap_or(LibraryLayout::Paired)
        );
    }

    coef_names.push(TREATMENT_COEF.to_string());
    columns.push(
        design
            .treatments()
            .iter()
            .map(|&t| if t == Treatment::Treated { 1.0 } else { 0.0 })
            .collect(),
    );

    let p = columns.len();
    let matrix = Array2::from_shape_fn((n, p), |(i, j)| columns[j][i]);
    check_full_rank(&matrix)?;

    Ok(DesignMatrix {
        matrix,
        coef_names,
        treatment_coef: p - 1,
    })
}

/// Fail with a fit error when the model matrix is rank deficient
pub fn check_full_rank(matrix: &Array2<f64>) -> Result<()> {
    let ncol = matrix.ncols();
    if matrix.nrows() == 0 || ncol == 0 {
        return Err(DeseqError::fit("design matrix has zero rows or columns"));
    }
    if linalg::rank(matrix) < ncol {
        return Err(DeseqError::fit(
            "the model matrix is not full rank: layout and treatment are confounded",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SampleRecord;

    fn design(rows: &[(&str, LibraryLayout, Treatment)]) -> SampleDesign {
        SampleDesign::new(
            rows.iter()
                .map(|&(id, layout, treatment)| SampleRecord {
                    sample_id: id.to_string(),
                    layout,
                    treatment,
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_design_matrix_creation() {
        use LibraryLayout::*;
        use Treatment::*;
        let d = design(&[
            ("a", Single, Treated),
            ("b", Paired, Untreated),
            ("c", Single, Untreated),
            ("d", Paired, Treated),
        ]);
        let dm = build_design_matrix(&d).unwrap();
        assert_eq!(
            dm.coef_names(),
            &["Intercept", "layout_single_vs_paired", TREATMENT_COEF]
        );
        assert_eq!(dm.treatment_coef(), 2);
        let m = dm.matrix();
        assert_eq!(m.row(0).to_vec(), vec![1.0, 1.0, 1.0]);
        assert_eq!(m.row(1).to_vec(), vec![1.0, 0.0, 0.0]);
        assert_eq!(dm.residual_df(), 1);
        assert!(!dm.is_group_design());
    }

    #[test]
    fn test_baseline_is_untreated_regardless_of_order() {
        use LibraryLayout::*;
        use Treatment::*;
        let d = design(&[("a", Single, Untreated), ("b", Single, Treated), ("c", Single, Treated)]);
        let dm = build_design_matrix(&d).unwrap();
        assert_eq!(dm.n_coefs(), 2);
        let col: Vec<f64> = dm.matrix().column(1).to_vec();
        assert_eq!(col, vec![0.0, 1.0, 1.0]);
        assert!(dm.is_group_design());
    }

    #[test]
    fn test_missing_treatment_level() {
        use LibraryLayout::*;
        use Treatment::*;
        let d = design(&[("a", Single, Treated), ("b", Paired, Treated)]);
        assert!(matches!(build_design_matrix(&d), Err(DeseqError::Schema { .. })));
    }

    #[test]
    fn test_confounded_design_is_fit_error() {
        use LibraryLayout::*;
        use Treatment::*;
        let d = design(&[
            ("a", Single, Treated),
            ("b", Single, Treated),
            ("c", Paired, Untreated),
            ("d", Paired, Untreated),
        ]);
        assert!(matches!(build_design_matrix(&d), Err(DeseqError::Fit { .. })));
    }
}
