//! Error types for frame analysis.

use thiserror::Error;

/// Errors from block-batch analysis.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The dictionary carries no grid layout, or it does not match the
    /// frame tiling.
    #[error("dictionary/grid mismatch: {0}")]
    LayoutMismatch(String),

    /// The frame buffer has the wrong size.
    #[error("frame size mismatch: expected {expected}, got {actual}")]
    FrameSize { expected: usize, actual: usize },

    /// Error from dictionary or grid construction.
    #[error(transparent)]
    Core(#[from] l1h_core::CoreError),

    /// Error from the homotopy solver.
    #[error(transparent)]
    Solver(#[from] l1h_solver::Error),
}

/// Result type for batch operations.
pub type Result<T> = std::result::Result<T, BatchError>;
