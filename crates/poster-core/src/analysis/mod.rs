//! Image complexity scoring and route selection.

mod complexity;
mod router;

pub use complexity::{ComplexityAnalyzer, ComplexityPolicy, WeightedComplexity};
pub use router::route;
