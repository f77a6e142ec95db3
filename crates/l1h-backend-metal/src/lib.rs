//! Metal/WebGPU backend for L1H GPU-accelerated dictionary correlations.

pub mod context;
pub mod error;
pub mod operator;

pub use context::WgpuContext;
pub use error::{Result, WgpuError};
pub use operator::{GpuConfig, GpuDictionaryOperator, MIN_COLUMNS};
