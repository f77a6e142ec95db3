//! Error types for core data structures.

use thiserror::Error;

/// Errors from dictionary and grid construction.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Dimensions are inconsistent with the supplied data.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The dictionary would have no rows or no columns.
    #[error("empty dictionary ({nrows} rows, {ncols} columns)")]
    EmptyDictionary { nrows: usize, ncols: usize },

    /// A dictionary entry is NaN or infinite.
    #[error("non-finite dictionary entry at column {col}, row {row}")]
    NonFinite { row: usize, col: usize },

    /// A dictionary column has (near-)zero norm and cannot be normalized.
    #[error("dictionary column {col} has zero norm")]
    ZeroColumn { col: usize },

    /// Block tiling parameters do not produce a usable grid.
    #[error("invalid block geometry: {0}")]
    BadGeometry(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
