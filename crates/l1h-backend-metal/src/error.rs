//! Error types for the wgpu backend.

/// Errors from GPU setup and execution.
#[derive(Debug)]
pub enum WgpuError {
    /// No suitable GPU adapter was found.
    NoAdapter,
    /// Device creation failed.
    Device(String),
    /// Buffer mapping or transfer failed.
    Buffer(String),
    /// Input dimensions do not match the uploaded dictionary.
    InvalidDimension(String),
}

impl std::fmt::Display for WgpuError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WgpuError::NoAdapter => write!(f, "no suitable GPU adapter found"),
            WgpuError::Device(msg) => write!(f, "device creation failed: {}", msg),
            WgpuError::Buffer(msg) => write!(f, "buffer operation failed: {}", msg),
            WgpuError::InvalidDimension(msg) => write!(f, "invalid dimension: {}", msg),
        }
    }
}

impl std::error::Error for WgpuError {}

/// Result type for wgpu backend operations.
pub type Result<T> = std::result::Result<T, WgpuError>;
