//! Backend dispatch configuration.
//!
//! Selects where the dictionary correlations run:
//! - CPU (serial or rayon, depending on the operator in use)
//! - GPU (wgpu compute)
//!
//! The GPU only pays for itself above a dictionary-size threshold; the
//! dispatch decision is made per dictionary, not per solve.

/// Compute backend selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComputeBackend {
    /// Host CPU.
    Cpu,
    /// GPU through wgpu; an empty adapter name means "first available".
    Gpu { adapter_name: String },
}

impl ComputeBackend {
    /// Short backend name for logs and output.
    pub fn name(&self) -> &'static str {
        match self {
            ComputeBackend::Cpu => "CPU",
            ComputeBackend::Gpu { .. } => "GPU",
        }
    }
}

/// Dispatch configuration.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Compute backend to use.
    pub backend: ComputeBackend,
    /// Column count below which CPU is always used (even if a GPU is
    /// available). Kernel launch and readback overhead dominates for
    /// small dictionaries.
    pub gpu_threshold: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            backend: ComputeBackend::Cpu,
            gpu_threshold: 1024,
        }
    }
}

impl DispatchConfig {
    /// CPU-only configuration.
    pub fn cpu() -> Self {
        Self {
            backend: ComputeBackend::Cpu,
            ..Default::default()
        }
    }

    /// GPU configuration with an adapter name filter.
    pub fn gpu(adapter_name: impl Into<String>) -> Self {
        Self {
            backend: ComputeBackend::Gpu {
                adapter_name: adapter_name.into(),
            },
            ..Default::default()
        }
    }

    /// Set the GPU threshold.
    pub fn with_gpu_threshold(mut self, threshold: usize) -> Self {
        self.gpu_threshold = threshold;
        self
    }

    /// Decide whether to use the GPU for a dictionary with `ncols`
    /// columns.
    pub fn use_gpu(&self, ncols: usize) -> bool {
        if ncols < self.gpu_threshold {
            return false;
        }
        !matches!(self.backend, ComputeBackend::Cpu)
    }

    /// Human-readable dispatch decision for a dictionary size.
    pub fn describe(&self, ncols: usize) -> String {
        let backend = if self.use_gpu(ncols) {
            self.backend.name()
        } else {
            "CPU"
        };
        format!("homotopy with {} correlations ({} columns)", backend, ncols)
    }
}
