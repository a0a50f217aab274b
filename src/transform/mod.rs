//! Transformations of count data for visualization

mod vst;

pub use vst::{vst, vst_value, VstResult};
