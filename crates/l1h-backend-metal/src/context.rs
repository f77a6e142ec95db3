//! wgpu device/queue context.

use crate::error::{Result, WgpuError};

/// Shared wgpu device and queue.
pub struct WgpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    adapter_info: wgpu::AdapterInfo,
}

impl WgpuContext {
    /// Create a context on the first available high-performance adapter.
    pub fn new() -> Result<Self> {
        Self::with_adapter_filter("")
    }

    /// Create a context, requiring the adapter name to contain `filter`
    /// (case-insensitive). An empty filter accepts any adapter.
    pub fn with_adapter_filter(filter: &str) -> Result<Self> {
        let instance = wgpu::Instance::default();

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(WgpuError::NoAdapter)?;

        let adapter_info = adapter.get_info();
        if !filter.is_empty()
            && !adapter_info
                .name
                .to_lowercase()
                .contains(&filter.to_lowercase())
        {
            return Err(WgpuError::NoAdapter);
        }

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("L1H Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))
        .map_err(|e| WgpuError::Device(e.to_string()))?;

        log::info!("wgpu context on {}", adapter_info.name);

        Ok(Self {
            device,
            queue,
            adapter_info,
        })
    }

    /// Whether any GPU adapter can be brought up.
    pub fn is_available() -> bool {
        Self::new().is_ok()
    }

    /// Name of the adapter in use.
    pub fn adapter_name(&self) -> &str {
        &self.adapter_info.name
    }
}
