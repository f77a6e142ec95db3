//! Error types for the homotopy solver.

use thiserror::Error;

/// Errors from homotopy path solving.
#[derive(Debug, Error)]
pub enum Error {
    /// A vector length does not match the dictionary.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// `solve` was called before any measurement vector was set.
    #[error("no measurement vector set")]
    NoMeasurement,

    /// The active-set Gram system is singular (collinear columns).
    #[error("singular Gram system on support of size {support}")]
    SingularGram { support: usize },

    /// The path did not reach a terminator within the iteration limit.
    #[error("homotopy path stalled after {iterations} iterations")]
    PathStalled { iterations: usize },

    /// Error from dictionary construction.
    #[error(transparent)]
    Core(#[from] l1h_core::CoreError),
}

/// Result type for solver operations.
pub type Result<T> = std::result::Result<T, Error>;
