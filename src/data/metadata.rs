//! Sample design: library layout and treatment per sample

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DeseqError, Result};

/// Sequencing library layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryLayout {
    Paired,
    Single,
}

impl LibraryLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            LibraryLayout::Paired => "paired",
            LibraryLayout::Single => "single",
        }
    }
}

impl FromStr for LibraryLayout {
    type Err = DeseqError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" | "single-end" | "single_end" | "single-read" => Ok(LibraryLayout::Single),
            "paired" | "paired-end" | "paired_end" => Ok(LibraryLayout::Paired),
            other => Err(DeseqError::schema(format!(
                "unrecognized sequencing layout '{}' (expected single or paired)",
                other
            ))),
        }
    }
}

impl fmt::Display for LibraryLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Treatment arm; `Untreated` is always the model baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Treatment {
    Untreated,
    Treated,
}

impl Treatment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Treatment::Untreated => "untreated",
            Treatment::Treated => "treated",
        }
    }

    /// The other arm
    pub fn swapped(&self) -> Self {
        match self {
            Treatment::Untreated => Treatment::Treated,
            Treatment::Treated => Treatment::Untreated,
        }
    }
}

impl FromStr for Treatment {
    type Err = DeseqError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "treated" => Ok(Treatment::Treated),
            "untreated" => Ok(Treatment::Untreated),
            other => Err(DeseqError::schema(format!(
                "unrecognized treatment '{}' (expected treated or untreated)",
                other
            ))),
        }
    }
}

impl fmt::Display for Treatment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the design table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub sample_id: String,
    pub layout: LibraryLayout,
    pub treatment: Treatment,
}

/// Ordered sample design; row order is the canonical sample order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleDesign {
    records: Vec<SampleRecord>,
}

impl SampleDesign {
    pub fn new(records: Vec<SampleRecord>) -> Result<Self> {
        if records.is_empty() {
            return Err(DeseqError::schema("design table has no samples"));
        }
        let mut seen = HashSet::new();
        for r in &records {
            if !seen.insert(r.sample_id.as_str()) {
                return Err(DeseqError::schema(format!(
                    "duplicate sample id '{}' in design table",
                    r.sample_id
                )));
            }
        }
        Ok(Self { records })
    }

    pub fn records(&self) -> &[SampleRecord] {
        &self.records
    }

    pub fn n_samples(&self) -> usize {
        self.records.len()
    }

    pub fn sample_ids(&self) -> Vec<String> {
        self.records.iter().map(|r| r.sample_id.clone()).collect()
    }

    pub fn treatments(&self) -> Vec<Treatment> {
        self.records.iter().map(|r| r.treatment).collect()
    }

    pub fn layouts(&self) -> Vec<LibraryLayout> {
        self.records.iter().map(|r| r.layout).collect()
    }

    /// Number of samples in the given treatment arm
    pub fn group_size(&self, treatment: Treatment) -> usize {
        self.records.iter().filter(|r| r.treatment == treatment).count()
    }

    /// Size of the smaller treatment arm
    pub fn smallest_group_size(&self) -> usize {
        self.group_size(Treatment::Treated)
            .min(self.group_size(Treatment::Untreated))
    }

    /// Distinct layouts present, in sorted order
    pub fn layout_levels(&self) -> Vec<LibraryLayout> {
        let mut levels: Vec<LibraryLayout> = self.layouts();
        levels.sort();
        levels.dedup();
        levels
    }

    /// Copy of the design with every treatment label swapped
    pub fn with_swapped_treatments(&self) -> Self {
        let records = self
            .records
            .iter()
            .map(|r| SampleRecord {
                treatment: r.treatment.swapped(),
                ..r.clone()
            })
            .collect();
        Self { records }
    }
}
