//! Sample-level summaries of the variance-stabilized matrix

mod clustering;
mod pca;
mod zscore;

pub use clustering::{complete_linkage, euclidean_distances, Dendrogram, Merge};
pub use pca::{pca, PcaResult};
pub use zscore::{zscore_rows, ZScoreMatrix};
