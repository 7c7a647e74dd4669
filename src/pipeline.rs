//! Campaign runs: products x ratios on a worker pool, merged into one report.

pub mod driver;
pub mod report;
