//! Headless wgpu device.
//!
//! The accumulation images are `rgba32float` textures. The read image is
//! bound as a sampled texture and the write image as a write-only storage
//! texture, since read-write float storage images are not portable. The
//! settle copy is a `copy_texture_to_texture` submitted ahead of the
//! dispatch, so queue order guarantees it completes first.

use bytemuck::{Pod, Zeroable};
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use wgpu::util::DeviceExt;

use crate::render::{BufferKind, ComputeDevice, KernelArgs};
use crate::util::{Error, Result};

/// Built-in kernel.
const PREVIEW_WGSL: &str = include_str!("preview.wgsl");

/// Workgroup size (must match @workgroup_size in WGSL).
const WG_SIZE: u32 = 8;

const TEXEL_BYTES: u32 = 16;

/// Per-dispatch parameters (matches the kernel's `Batch`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct BatchUniform {
    num_sets: u32,
    start: u32,
    size: u32,
    cycle: u32,
}

pub struct WgpuImage {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

pub struct WgpuBuffer {
    buffer: wgpu::Buffer,
    label: &'static str,
}

pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    batch_buffer: wgpu::Buffer,
}

impl WgpuDevice {
    /// Acquire an adapter and build the kernel, from `kernel` if given.
    pub fn new(kernel: Option<&Path>) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            ..Default::default()
        }))
        .map_err(|e| Error::Device(format!("no adapter: {e}")))?;

        let info = adapter.get_info();
        tracing::info!(
            adapter = %info.name,
            backend = ?info.backend,
            device_type = ?info.device_type,
            driver = %info.driver,
            "GPU adapter"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("t2_device"),
            ..Default::default()
        }))
        .map_err(|e| Error::Device(e.to_string()))?;

        let (source, path) = match kernel {
            Some(path) => {
                let source = std::fs::read_to_string(path)
                    .map_err(|e| Error::Kernel { path: path.to_path_buf(), reason: e.to_string() })?;
                (source, path.to_path_buf())
            }
            None => (PREVIEW_WGSL.to_string(), PathBuf::from("preview.wgsl")),
        };

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("t2_kernel"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("t2_bind_group_layout"),
            entries: &[
                uniform_entry(0),
                uniform_entry(1),
                // @binding(2) read image, sampled
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    },
                    count: None,
                },
                // @binding(3) write image
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::Rgba32Float,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
                storage_entry(4),
                storage_entry(5),
                uniform_entry(6),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("t2_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("t2_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(Error::Kernel { path, reason: err.to_string() });
        }
        tracing::debug!(kernel = %path.display(), "compute pipeline ready");

        let batch_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("t2_batch"),
            size: std::mem::size_of::<BatchUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            device,
            queue,
            adapter_name: info.name,
            pipeline,
            bind_group_layout,
            batch_buffer,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Block until submitted work is done.
    fn wait(&self) -> Result<()> {
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map(|_| ())
            .map_err(|e| Error::Device(e.to_string()))
    }

    fn pop_scope(&self) -> Option<String> {
        pollster::block_on(self.device.pop_error_scope()).map(|e| e.to_string())
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d { width, height, depth_or_array_layers: 1 }
}

impl ComputeDevice for WgpuDevice {
    type Image = WgpuImage;
    type Buffer = WgpuBuffer;

    fn name(&self) -> &str {
        "wgpu"
    }

    fn create_image(&mut self, label: &'static str, width: u32, height: u32) -> Result<WgpuImage> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(width, height),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let validation = self.pop_scope();
        let oom = self.pop_scope();
        if let Some(reason) = validation.or(oom) {
            return Err(Error::Allocation { what: label, reason });
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(WgpuImage { texture, view })
    }

    fn copy_image(&mut self, src: &WgpuImage, dst: &WgpuImage, width: u32, height: u32) -> Result<()> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("t2_settle"),
        });
        encoder.copy_texture_to_texture(src.texture.as_image_copy(), dst.texture.as_image_copy(), extent(width, height));
        self.queue.submit(Some(encoder.finish()));
        match self.pop_scope() {
            Some(reason) => Err(Error::Copy(reason)),
            None => Ok(()),
        }
    }

    fn create_buffer(&mut self, label: &'static str, kind: BufferKind, contents: &[u8]) -> Result<WgpuBuffer> {
        let usage = match kind {
            BufferKind::Uniform => wgpu::BufferUsages::UNIFORM,
            BufferKind::Storage => wgpu::BufferUsages::STORAGE,
        } | wgpu::BufferUsages::COPY_DST;

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage,
        });
        let validation = self.pop_scope();
        let oom = self.pop_scope();
        if let Some(reason) = validation.or(oom) {
            return Err(Error::Allocation { what: label, reason });
        }
        Ok(WgpuBuffer { buffer, label })
    }

    fn write_buffer(&mut self, buffer: &WgpuBuffer, contents: &[u8]) -> Result<()> {
        if contents.len() as u64 > buffer.buffer.size() {
            return Err(Error::Transfer {
                what: buffer.label,
                reason: format!("{} bytes into a {} byte buffer", contents.len(), buffer.buffer.size()),
            });
        }
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.queue.write_buffer(&buffer.buffer, 0, contents);
        match self.pop_scope() {
            Some(reason) => Err(Error::Transfer { what: buffer.label, reason }),
            None => Ok(()),
        }
    }

    fn release_buffer(&mut self, buffer: WgpuBuffer) {
        buffer.buffer.destroy();
    }

    fn dispatch(&mut self, args: &KernelArgs<'_, Self>) -> Result<()> {
        let batch = BatchUniform {
            num_sets: args.num_sample_sets,
            start: args.sample_start,
            size: args.batch_size,
            cycle: args.cycle,
        };

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.queue.write_buffer(&self.batch_buffer, 0, bytemuck::bytes_of(&batch));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("t2_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: args.config.buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: args.state.buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(&args.read.view) },
                wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::TextureView(&args.write.view) },
                wgpu::BindGroupEntry { binding: 4, resource: args.square_samples.buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 5, resource: args.disk_samples.buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 6, resource: self.batch_buffer.as_entire_binding() },
            ],
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("t2_accumulate"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("t2_accumulate_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(args.width.div_ceil(WG_SIZE), args.height.div_ceil(WG_SIZE), 1);
        }
        self.queue.submit(Some(encoder.finish()));

        if let Some(reason) = self.pop_scope() {
            return Err(Error::Dispatch(reason));
        }
        self.wait().map_err(|e| Error::Dispatch(e.to_string()))
    }

    fn read_image(&mut self, image: &WgpuImage, width: u32, height: u32) -> Result<Vec<[f32; 4]>> {
        let bytes_per_row = (width * TEXEL_BYTES).next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("t2_readback"),
            size: bytes_per_row as u64 * height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("t2_readback"),
        });
        encoder.copy_texture_to_buffer(
            image.texture.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: None,
                },
            },
            extent(width, height),
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.wait()?;
        rx.recv()
            .map_err(|e| Error::Device(e.to_string()))?
            .map_err(|e| Error::Device(format!("readback map failed: {e}")))?;

        let data = slice.get_mapped_range();
        let texels: &[[f32; 4]] = bytemuck::cast_slice(&data);
        let row_texels = (bytes_per_row / TEXEL_BYTES) as usize;
        let pixels = texels
            .chunks_exact(row_texels)
            .flat_map(|row| row[..width as usize].iter().copied())
            .collect();
        drop(data);
        readback.unmap();
        Ok(pixels)
    }
}
