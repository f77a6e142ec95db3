//! L1 homotopy path solver.
//!
//! Solves `min_x 0.5 * ||A x - y||^2 + lambda * ||x||_1` by following
//! the regularization path in `lambda`, the algorithm used for
//! compressed-sensing localization of point emitters.
//!
//! The path algorithm ([`HomotopySolver`]) is agnostic to how the
//! dictionary products are computed; backends plug in through the
//! [`DictionaryOperator`] trait.

pub mod active_set;
pub mod dispatch;
pub mod error;
pub mod homotopy;
pub mod operator;
pub mod sparse_operator;

pub use active_set::ActiveSet;
pub use dispatch::{ComputeBackend, DispatchConfig};
pub use error::{Error, Result};
pub use homotopy::{HomotopyConfig, HomotopySolver, SolveResult, Termination};
pub use operator::{DenseOperator, DictionaryOperator};
pub use sparse_operator::SparseOperator;
