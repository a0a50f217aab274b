//! Input data structures: counts, sample design and the bound dataset

mod count_matrix;
mod dataset;
mod metadata;

pub use count_matrix::CountMatrix;
pub use dataset::{align_to_design, DESeqDataSet};
pub use metadata::{LibraryLayout, SampleDesign, SampleRecord, Treatment};
