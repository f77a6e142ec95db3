//! Core data structures for L1H sparse recovery.
//!
//! This crate holds the pieces shared by every solver backend:
//!
//! - [`Dictionary`] - the dense measurement matrix `A`, column-major.
//! - [`DictionaryBuilder`] - builds a Gaussian-PSF dictionary for a
//!   square analysis block on an upsampled grid.
//! - [`BlockGrid`] - tiles a camera frame into overlapping analysis
//!   blocks and accumulates per-block solutions into a high-resolution
//!   output image.

pub mod dictionary;
pub mod error;
pub mod grid;

pub use dictionary::{Dictionary, DictionaryBuilder, GridLayout};
pub use error::{CoreError, Result};
pub use grid::{Block, BlockGrid};
