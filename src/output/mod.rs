//! Taming captured runner output: lossy normalization passes, summary-block
//! extraction, structured counters, and baseline diff rendering.

/// Structured counters parsed out of a summary block
pub mod counts;
/// Rendering differences between captured output and stored baselines
pub mod diff;
/// Pure text rewrites that erase nondeterministic substrings
pub mod normalize;
/// Splitting output into per-test lines and the trailing summary block
pub mod summary;

pub use counts::SummaryCounts;
pub use diff::BaselineDiff;
pub use normalize::IconMap;
pub use summary::Summary;
