//! Gene filtering before fitting and before multiple-testing adjustment

mod counts;
mod independent;

pub use counts::{filter_low_counts, CountFilterSummary};
pub use independent::{independent_filtering, lowess, IndependentFilter};
