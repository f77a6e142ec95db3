//! GPU-accelerated dictionary operator using wgpu compute.
//!
//! The dictionary is uploaded once as f32 and reused across all solves;
//! each `correlate` call uploads the residual, runs the compute kernel
//! (one invocation per column) and reads the correlations back through
//! a staging buffer. `synthesize` stays on the host: it touches only
//! the support columns, so the O(m*n) work the GPU is for never
//! appears there.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use l1h_core::Dictionary;
use l1h_solver::DictionaryOperator;
use wgpu::util::DeviceExt;

use crate::context::WgpuContext;
use crate::error::{Result, WgpuError};

/// Column count below which the GPU is not worth the launch overhead.
pub const MIN_COLUMNS: usize = 1024;

/// Uniform buffer layout for the correlation shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct Dims {
    nrows: u32,
    ncols: u32,
}

/// Thresholds for GPU dispatch.
#[derive(Debug, Clone)]
pub struct GpuConfig {
    /// Minimum dictionary columns to use the GPU.
    pub min_columns: usize,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            min_columns: MIN_COLUMNS,
        }
    }
}

impl GpuConfig {
    /// Whether the GPU should be used for a dictionary of this width.
    pub fn should_use_gpu(&self, ncols: usize) -> bool {
        ncols >= self.min_columns
    }
}

/// Dictionary operator whose correlations run on the GPU.
pub struct GpuDictionaryOperator {
    ctx: Arc<WgpuContext>,
    dict: Dictionary,
    config: GpuConfig,
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    residual_buffer: wgpu::Buffer,
    correlation_buffer: wgpu::Buffer,
    staging_buffer: wgpu::Buffer,
}

impl GpuDictionaryOperator {
    const SHADER_SOURCE: &'static str = include_str!("correlate.wgsl");

    /// Upload a dictionary and build the compute pipeline.
    pub fn new(ctx: Arc<WgpuContext>, dict: Dictionary) -> Result<Self> {
        Self::with_config(ctx, dict, GpuConfig::default())
    }

    /// Upload with custom dispatch thresholds.
    pub fn with_config(ctx: Arc<WgpuContext>, dict: Dictionary, config: GpuConfig) -> Result<Self> {
        let device = &ctx.device;
        let m = dict.nrows();
        let n = dict.ncols();

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Correlate Shader"),
            source: wgpu::ShaderSource::Wgsl(Self::SHADER_SOURCE.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Correlate Bind Group Layout"),
            entries: &[
                // Dims
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Dictionary (read-only, uploaded once)
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Residual (rewritten per call)
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Correlations (output)
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Correlate Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Correlate Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let dims = Dims {
            nrows: m as u32,
            ncols: n as u32,
        };
        let dims_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Correlate Dims"),
            contents: bytemuck::bytes_of(&dims),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        // f64 -> f32 for the device; most GPUs have no f64 support.
        let dict_f32: Vec<f32> = dict.data().iter().map(|&v| v as f32).collect();
        let dict_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Correlate Dictionary"),
            contents: bytemuck::cast_slice(&dict_f32),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let residual_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Correlate Residual"),
            size: (m * std::mem::size_of::<f32>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let correlation_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Correlate Output"),
            size: (n * std::mem::size_of::<f32>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Correlate Staging"),
            size: (n * std::mem::size_of::<f32>()) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Correlate Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: dims_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: dict_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: residual_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: correlation_buffer.as_entire_binding(),
                },
            ],
        });

        log::info!(
            "uploaded {}x{} dictionary to GPU ({})",
            m,
            n,
            ctx.adapter_name()
        );

        Ok(Self {
            ctx,
            dict,
            config,
            pipeline,
            bind_group,
            residual_buffer,
            correlation_buffer,
            staging_buffer,
        })
    }

    /// The dispatch thresholds.
    pub fn config(&self) -> &GpuConfig {
        &self.config
    }

    /// Whether this dictionary is large enough for the GPU to pay off.
    pub fn should_use_gpu(&self) -> bool {
        self.config.should_use_gpu(self.dict.ncols())
    }

    /// Run the correlation kernel; errors surface as [`WgpuError`].
    pub fn try_correlate(&self, r: &[f64], out: &mut [f64]) -> Result<()> {
        let m = self.dict.nrows();
        let n = self.dict.ncols();
        if r.len() != m {
            return Err(WgpuError::InvalidDimension(format!(
                "expected {} residual elements, got {}",
                m,
                r.len()
            )));
        }
        if out.len() != n {
            return Err(WgpuError::InvalidDimension(format!(
                "expected {} output elements, got {}",
                n,
                out.len()
            )));
        }

        let device = &self.ctx.device;
        let queue = &self.ctx.queue;

        let r_f32: Vec<f32> = r.iter().map(|&v| v as f32).collect();
        queue.write_buffer(&self.residual_buffer, 0, bytemuck::cast_slice(&r_f32));

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Correlate Encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Correlate Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.dispatch_workgroups((n as u32).div_ceil(64), 1, 1);
        }
        encoder.copy_buffer_to_buffer(
            &self.correlation_buffer,
            0,
            &self.staging_buffer,
            0,
            (n * std::mem::size_of::<f32>()) as u64,
        );
        queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = self.staging_buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|e| WgpuError::Buffer(format!("failed to receive map result: {}", e)))?
            .map_err(|e| WgpuError::Buffer(format!("buffer mapping failed: {:?}", e)))?;

        {
            let data = buffer_slice.get_mapped_range();
            let corr_f32: &[f32] = bytemuck::cast_slice(&data);
            for (o, &v) in out.iter_mut().zip(corr_f32.iter()) {
                *o = v as f64;
            }
        }
        self.staging_buffer.unmap();

        Ok(())
    }
}

impl DictionaryOperator for GpuDictionaryOperator {
    fn nrows(&self) -> usize {
        self.dict.nrows()
    }

    fn ncols(&self) -> usize {
        self.dict.ncols()
    }

    fn correlate(&self, r: &[f64], out: &mut [f64]) {
        if let Err(e) = self.try_correlate(r, out) {
            // The operator trait is infallible; a lost device mid-solve
            // falls back to the host loop so the path can finish.
            log::warn!("GPU correlate failed ({}), using host fallback", e);
            let m = self.dict.nrows();
            for (j, oj) in out.iter_mut().enumerate() {
                let col = self.dict.column(j);
                let mut acc = 0.0;
                for i in 0..m {
                    acc += col[i] * r[i];
                }
                *oj = acc;
            }
        }
    }

    fn synthesize(&self, entries: &[(usize, f64)], out: &mut [f64]) {
        assert_eq!(out.len(), self.dict.nrows());

        out.iter_mut().for_each(|v| *v = 0.0);
        for &(j, xj) in entries {
            if xj == 0.0 {
                continue;
            }
            let col = self.dict.column(j);
            for (oi, ci) in out.iter_mut().zip(col.iter()) {
                *oi += ci * xj;
            }
        }
    }

    fn background_index(&self) -> Option<usize> {
        self.dict.background_index()
    }
}
