//! Pipeline configuration, loadable from JSON

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dispersion::DispersionParams;
use crate::error::{DeseqError, Result};
use crate::glm::GlmFitParams;
use crate::shrinkage::AshrParams;

/// padj and |log2 fold change| cutoffs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignificanceThresholds {
    /// Strict upper bound on padj
    pub padj: f64,
    /// Strict lower bound on |log2 fold change|
    pub abs_lfc: f64,
}

impl Default for SignificanceThresholds {
    fn default() -> Self {
        Self {
            padj: 0.05,
            abs_lfc: 1.0,
        }
    }
}

/// Chart geometry and labelling, passed explicitly to every renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Pixels
    pub width: u32,
    pub height: u32,
    pub font_size: u32,
    pub point_size: u32,
    /// Genes labelled on the MA and volcano plots
    pub label_top_n: usize,
    /// Most variable genes used for PCA
    pub pca_top_genes: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            font_size: 14,
            point_size: 3,
            label_top_n: 10,
            pca_top_genes: 500,
        }
    }
}

/// All tunables of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Count a sample must exceed for the low-count filter
    pub min_count: u64,
    /// Thresholds of the filtered results table
    pub significance: SignificanceThresholds,
    /// Thresholds of the UP/DOWN/NO labels on the shrunken table
    pub direction: SignificanceThresholds,
    pub top_n: usize,
    pub independent_filtering: bool,
    /// Target FDR for independent filtering
    pub alpha: f64,
    pub dispersion: DispersionParams,
    pub glm: GlmFitParams,
    pub ashr: AshrParams,
    pub display: DisplayConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_count: 10,
            significance: SignificanceThresholds::default(),
            direction: SignificanceThresholds::default(),
            top_n: 10,
            independent_filtering: true,
            alpha: 0.1,
            dispersion: DispersionParams::default(),
            glm: GlmFitParams::default(),
            ashr: AshrParams::default(),
            display: DisplayConfig::default(),
        }
    }
}

fn unit_open(name: &str, v: f64) -> Result<()> {
    if v > 0.0 && v <= 1.0 {
        Ok(())
    } else {
        Err(DeseqError::Config {
            reason: format!("{} must lie in (0, 1], got {}", name, v),
        })
    }
}

impl PipelineConfig {
    /// Read a JSON file; absent keys take their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        unit_open("significance.padj", self.significance.padj)?;
        unit_open("direction.padj", self.direction.padj)?;
        unit_open("alpha", self.alpha)?;
        for (name, v) in [
            ("significance.abs_lfc", self.significance.abs_lfc),
            ("direction.abs_lfc", self.direction.abs_lfc),
        ] {
            if !(v >= 0.0) {
                return Err(DeseqError::Config {
                    reason: format!("{} must be non-negative, got {}", name, v),
                });
            }
        }
        if self.top_n == 0 {
            return Err(DeseqError::Config {
                reason: "top_n must be at least 1".to_string(),
            });
        }
        if self.display.width < 100 || self.display.height < 100 {
            return Err(DeseqError::Config {
                reason: format!(
                    "chart size {}x{} is too small",
                    self.display.width, self.display.height
                ),
            });
        }
        if self.display.pca_top_genes < 2 {
            return Err(DeseqError::Config {
                reason: "display.pca_top_genes must be at least 2".to_string(),
            });
        }
        if !(self.dispersion.min_disp > 0.0) || self.dispersion.maxit == 0 {
            return Err(DeseqError::Config {
                reason: "dispersion.min_disp must be positive and dispersion.maxit non-zero".to_string(),
            });
        }
        if self.ashr.grid_mult <= 1.0 || self.ashr.null_weight < 1.0 {
            return Err(DeseqError::Config {
                reason: "ashr.grid_mult must exceed 1 and ashr.null_weight must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
