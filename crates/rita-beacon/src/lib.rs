//! Beacon statistics, the bucketed scorer, and indicator derivation.
//!
//! This crate is the statistically-heavy core of the pipeline: everything here is pure,
//! synchronous, and per-record — no I/O, no async, no shared state. The pipeline crate calls
//! into it from worker tasks.

mod analyzer;
mod histogram;
mod indicators;
mod scorer;
mod statistics;

pub use analyzer::analyze;
pub use histogram::{Histogram, NUM_BINS};
pub use indicators::derive as derive_indicator_row;
pub use scorer::bucket;
pub use statistics::{bowley_skew, mad_score, quartiles, skew_score, statistical_score};
