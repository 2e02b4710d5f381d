//! GPU backend on wgpu: each pass is a render pipeline drawing a full-screen
//! quad into an `Rgba32Float` target

use bytemuck::{Pod, Zeroable};
use tokio::sync::oneshot;
use wgpu::util::DeviceExt;
use wgpu::{
    BindGroupLayout, Buffer, Device, PipelineLayout, Queue, RenderPipeline, Sampler, Texture,
    TextureView,
};

use crate::backend::{Backend, PassInputs, ProgramSource, TextureHandle};
use crate::error::{FieldError, PreconditionViolation, SetupError};
use crate::grid::{Grid, Texel};
use crate::passes;

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
const TEXEL_BYTES: u32 = std::mem::size_of::<Texel>() as u32;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct PassParams {
    texel: [f32; 2],
    dt: f32,
    decay: f32,
    rate: f32,
    weight: f32,
    _padding: [f32; 2],
}

impl PassParams {
    fn from_inputs(inputs: &PassInputs) -> Self {
        Self {
            texel: [
                inputs.get_scalar(passes::DX),
                inputs.get_scalar(passes::DY),
            ],
            dt: inputs.get_scalar(passes::DT),
            decay: inputs.get_scalar(passes::DECAY),
            rate: inputs.get_scalar(passes::RATE),
            weight: inputs.get_scalar(passes::WEIGHT),
            _padding: [0.0; 2],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct QuadVertex {
    position: [f32; 2],
    uv: [f32; 2],
}

// uv (0, 0) is the top-left corner, which wgpu maps to the first texture row.
const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex { position: [-1.0, -1.0], uv: [0.0, 1.0] },
    QuadVertex { position: [1.0, -1.0], uv: [1.0, 1.0] },
    QuadVertex { position: [-1.0, 1.0], uv: [0.0, 0.0] },
    QuadVertex { position: [1.0, 1.0], uv: [1.0, 0.0] },
];

const QUAD_INDICES: [u16; 6] = [0, 1, 3, 0, 3, 2];

const QUAD_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

/// Static two-triangle quad covering the whole destination.
struct QuadGeometry {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
}

impl QuadGeometry {
    fn new(device: &Device) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Vertices"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Indices"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
        }
    }

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &QUAD_ATTRIBUTES,
        }
    }

    fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
    }
}

struct GpuTexture {
    label: String,
    grid: Grid,
    texture: Texture,
    view: TextureView,
    render_target: bool,
}

pub struct GpuProgram {
    label: &'static str,
    pipeline: RenderPipeline,
}

impl GpuProgram {
    pub fn label(&self) -> &'static str {
        self.label
    }
}

pub struct WgpuBackend {
    device: Device,
    queue: Queue,
    format_features: wgpu::TextureFormatFeatures,
    bind_group_layout: BindGroupLayout,
    pipeline_layout: PipelineLayout,
    sampler: Sampler,
    params_buffer: Buffer,
    quad: QuadGeometry,
    textures: Vec<GpuTexture>,
}

impl WgpuBackend {
    /// Picks a high-performance adapter and opens a device on it.
    pub async fn new() -> Result<Self, SetupError> {
        let instance = wgpu::Instance::default();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(SetupError::NoAdapter)?;

        Self::from_adapter(&adapter).await
    }

    pub async fn from_adapter(adapter: &wgpu::Adapter) -> Result<Self, SetupError> {
        let info = adapter.get_info();
        log::info!("Using GPU: {} ({:?})", info.name, info.backend);

        if !adapter.features().contains(wgpu::Features::FLOAT32_FILTERABLE) {
            return Err(SetupError::IncompleteTarget {
                label: format!("{TARGET_FORMAT:?}"),
                reason: "adapter cannot filter 32-bit float textures".to_string(),
            });
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("fluxgrid device"),
                    required_features: wgpu::Features::FLOAT32_FILTERABLE,
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .map_err(|err| SetupError::DeviceRequest(err.to_string()))?;

        let format_features = adapter.get_texture_format_features(TARGET_FORMAT);
        Ok(Self::from_device(device, queue, format_features))
    }

    /// Builds the backend on an existing device, e.g. one shared with a renderer.
    ///
    /// The device must have `FLOAT32_FILTERABLE` enabled.
    pub fn from_device(
        device: Device,
        queue: Queue,
        format_features: wgpu::TextureFormatFeatures,
    ) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Pass Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<PassParams>() as u64,
                        ),
                    },
                    count: None,
                },
                texture_entry(1),
                texture_entry(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Pass Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Field Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Pass Parameters"),
            size: std::mem::size_of::<PassParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let quad = QuadGeometry::new(&device);

        Self {
            device,
            queue,
            format_features,
            bind_group_layout,
            pipeline_layout,
            sampler,
            params_buffer,
            quad,
            textures: Vec::new(),
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// View of a texture, for binding the field in a visualization pass.
    pub fn texture_view(&self, texture: TextureHandle) -> Option<&TextureView> {
        self.textures.get(texture.index()).map(|t| &t.view)
    }

    fn texture(&self, texture: TextureHandle) -> Result<&GpuTexture, PreconditionViolation> {
        self.textures
            .get(texture.index())
            .ok_or(PreconditionViolation::UnknownTexture(texture.id()))
    }

    fn allocate(
        &mut self,
        grid: Grid,
        label: &str,
        usage: wgpu::TextureUsages,
        render_target: bool,
    ) -> Result<TextureHandle, SetupError> {
        let incomplete = |reason: String| SetupError::IncompleteTarget {
            label: label.to_string(),
            reason,
        };

        let max = self.device.limits().max_texture_dimension_2d;
        if grid.width() > max || grid.height() > max {
            return Err(incomplete(format!(
                "{}x{} exceeds the device limit of {max}",
                grid.width(),
                grid.height()
            )));
        }
        if !self.format_features.allowed_usages.contains(usage) {
            return Err(incomplete(format!("{TARGET_FORMAT:?} does not support {usage:?}")));
        }
        if !self
            .format_features
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE)
        {
            return Err(incomplete(format!("{TARGET_FORMAT:?} is not filterable")));
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: grid.width(),
                height: grid.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(incomplete(err.to_string()));
        }

        let handle = TextureHandle::new(self.textures.len() as u32);
        log::debug!(
            "gpu texture {} `{label}` {}x{}",
            handle.id(),
            grid.width(),
            grid.height()
        );
        self.textures.push(GpuTexture {
            label: label.to_string(),
            grid,
            texture,
            view,
            render_target,
        });
        Ok(handle)
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * TEXEL_BYTES;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

impl Backend for WgpuBackend {
    type Program = GpuProgram;

    fn create_render_target(&mut self, grid: Grid, label: &str) -> Result<TextureHandle, SetupError> {
        let usage = wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST;
        self.allocate(grid, label, usage, true)
    }

    fn create_texture(&mut self, grid: Grid, label: &str) -> Result<TextureHandle, SetupError> {
        let usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        self.allocate(grid, label, usage, false)
    }

    fn write_texture(
        &mut self,
        texture: TextureHandle,
        texels: &[Texel],
    ) -> Result<(), PreconditionViolation> {
        let target = self.texture(texture)?;
        if texels.len() != target.grid.len() {
            return Err(PreconditionViolation::FieldLength {
                expected: target.grid.len(),
                actual: texels.len(),
            });
        }

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(texels),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(target.grid.width() * TEXEL_BYTES),
                rows_per_image: Some(target.grid.height()),
            },
            wgpu::Extent3d {
                width: target.grid.width(),
                height: target.grid.height(),
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn compile_program(&mut self, source: &ProgramSource) -> Result<GpuProgram, SetupError> {
        log::debug!("compiling program `{}`", source.label);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(source.label),
            source: wgpu::ShaderSource::Wgsl(source.vertex.into()),
        });
        let fragment = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(source.label),
            source: wgpu::ShaderSource::Wgsl(source.fragment.into()),
        });

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(source.label),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex,
                    entry_point: "vs_main",
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    buffers: &[QuadGeometry::layout()],
                },
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &fragment,
                    entry_point: "fs_main",
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: TARGET_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
            });

        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(SetupError::ProgramCompile {
                label: source.label.to_string(),
                message: err.to_string(),
            });
        }

        Ok(GpuProgram {
            label: source.label,
            pipeline,
        })
    }

    fn draw_quad(
        &mut self,
        program: &GpuProgram,
        destination: TextureHandle,
        inputs: &PassInputs,
    ) -> Result<(), PreconditionViolation> {
        for (_, handle) in inputs.textures() {
            if handle == destination {
                return Err(PreconditionViolation::AliasedTarget(handle.id()));
            }
        }
        let field = self.texture(inputs.get_texture(passes::FIELD)?)?;
        let source = self.texture(inputs.get_texture(passes::SOURCE)?)?;
        let dest = self.texture(destination)?;
        if !dest.render_target {
            return Err(PreconditionViolation::UnknownTexture(destination.id()));
        }
        dest.grid.ensure_matches(field.grid)?;
        dest.grid.ensure_matches(source.grid)?;

        let params = PassParams::from_inputs(inputs);
        self.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(program.label),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&field.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&source.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Pass Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(program.label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &dest.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            self.quad.draw(&mut pass);
        }

        // One submission per pass so each sees its own uniform upload.
        self.queue.submit(std::iter::once(encoder.finish()));
        log::trace!("gpu draw `{}` -> {}", program.label, destination.id());
        Ok(())
    }

    fn read_texture(&mut self, texture: TextureHandle) -> Result<Vec<Texel>, FieldError> {
        let source = self.texture(texture)?;
        let grid = source.grid;
        let padded_row = padded_bytes_per_row(grid.width());
        let unpadded_row = (grid.width() * TEXEL_BYTES) as usize;

        let read_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Field Read Buffer"),
            size: padded_row as u64 * grid.height() as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Read Field Encoder"),
            });

        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &source.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &read_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(grid.height()),
                },
            },
            wgpu::Extent3d {
                width: grid.width(),
                height: grid.height(),
                depth_or_array_layers: 1,
            },
        );

        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = read_buffer.slice(..);
        let (sender, mut receiver) = oneshot::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        self.device.poll(wgpu::Maintain::Wait);

        match receiver.try_recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(FieldError::Readback(err.to_string())),
            Err(err) => return Err(FieldError::Readback(err.to_string())),
        }

        let mut texels = Vec::with_capacity(grid.len());
        {
            let data = buffer_slice.get_mapped_range();
            for row in data.chunks_exact(padded_row as usize) {
                texels.extend(bytemuck::pod_collect_to_vec::<u8, Texel>(&row[..unpadded_row]));
            }
        }
        read_buffer.unmap();

        log::debug!("gpu read-back of `{}`", source.label);
        Ok(texels)
    }
}
