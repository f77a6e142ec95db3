//! Frame-level block analysis for L1H.
//!
//! Ties the pieces together: tile a camera frame with
//! [`l1h_core::BlockGrid`], solve each block with
//! [`l1h_solver::HomotopySolver`], and accumulate the per-block
//! solutions into one high-resolution coefficient image.

pub mod analyzer;
pub mod error;
pub mod stats;

pub use analyzer::{AnalyzerConfig, BlockAnalyzer, FrameAnalysis};
pub use error::{BatchError, Result};
pub use stats::{BatchStats, BlockOutcome, BlockStatus};
