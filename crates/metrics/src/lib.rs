//! Metric names for the toolbay host.
//!
//! Crates record through the `metrics` facade behind their own optional
//! `metrics` feature. Exporting is left to the embedding application, which
//! installs whatever recorder it already uses.
//!
//! ```rust,ignore
//! use toolbay_metrics::{content, counter};
//!
//! counter!(content::REQUESTS_TOTAL, "kind" => "html").increment(1);
//! ```

mod definitions;

pub use definitions::*;

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
