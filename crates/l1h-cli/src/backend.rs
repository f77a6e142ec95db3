//! Compute backend detection and selection.

use l1h_solver::ComputeBackend;

/// Detect and select the compute backend based on CLI argument.
pub fn detect_backend(name: &str) -> ComputeBackend {
    match name.to_lowercase().as_str() {
        "cpu" => ComputeBackend::Cpu,
        "gpu" | "metal" => {
            #[cfg(feature = "metal")]
            {
                if l1h_backend_metal::WgpuContext::is_available() {
                    ComputeBackend::Gpu {
                        adapter_name: String::new(),
                    }
                } else {
                    eprintln!("Warning: GPU requested but not available, falling back to CPU");
                    ComputeBackend::Cpu
                }
            }
            #[cfg(not(feature = "metal"))]
            {
                eprintln!("Warning: GPU support not compiled in, falling back to CPU");
                ComputeBackend::Cpu
            }
        }
        _ => {
            // Auto-detect: GPU if present, otherwise CPU.
            #[cfg(feature = "metal")]
            {
                if l1h_backend_metal::WgpuContext::is_available() {
                    return ComputeBackend::Gpu {
                        adapter_name: String::new(),
                    };
                }
            }
            ComputeBackend::Cpu
        }
    }
}
