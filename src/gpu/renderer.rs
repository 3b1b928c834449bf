//! Headless wgpu compositor for the GPU rendering strategy.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use image::RgbaImage;
use wgpu::util::DeviceExt;

use crate::error::{Result, WarpError};
use crate::gpu::mesh::{stage_positions, FaceMeshGpu, PositionVertex, UvVertex};
use crate::mesh::{FaceTopology, LandmarkFrame};
use crate::warp::{Compositor, RenderState};

/// Uniforms shared by both layers.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct Uniforms {
    /// Destination surface size in pixels.
    viewport: [f32; 2],
    /// Non-zero when the texture U coordinate is mirrored.
    mirror_u: u32,
    /// Padding for alignment.
    _padding: u32,
}

/// The GPU rendering strategy.
///
/// Renders into an offscreen color target with two layers in one pass:
/// the semi-transparent wireframe first, then the textured face mesh
/// alpha-blended over it. Neither layer uses a depth attachment — both
/// always composite fully on top of whatever the frame is overlaid on,
/// in draw order alone.
///
/// U-mirroring for mirrored capture sources happens in the fragment
/// sampler (`u' = 1 - u`), not in the geometry, so the wireframe keeps
/// its screen-space shape under mirroring.
pub struct GpuCompositor {
    device: wgpu::Device,
    queue: wgpu::Queue,
    topology: Arc<FaceTopology>,
    mesh: FaceMeshGpu,

    wireframe_pipeline: wgpu::RenderPipeline,
    textured_pipeline: wgpu::RenderPipeline,

    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_bind_group_layout: wgpu::BindGroupLayout,
    texture_bind_group: Option<wgpu::BindGroup>,

    target: wgpu::Texture,
    target_view: wgpu::TextureView,
    width: u32,
    height: u32,

    staged: Vec<PositionVertex>,
}

impl GpuCompositor {
    /// Create a compositor with an offscreen target of the given size.
    ///
    /// # Errors
    ///
    /// Returns [`WarpError::NoAdapter`] when no GPU adapter is available
    /// and [`WarpError::DeviceRequest`] when device acquisition fails.
    pub fn new(topology: Arc<FaceTopology>, width: u32, height: u32) -> Result<Self> {
        pollster::block_on(Self::new_async(topology, width, height))
    }

    async fn new_async(topology: Arc<FaceTopology>, width: u32, height: u32) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(WarpError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|e| WarpError::DeviceRequest(e.to_string()))?;

        log::info!("GPU compositor on {}", adapter.get_info().name);

        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Face Shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER_SOURCE.into()),
        });

        let uniforms = Uniforms {
            viewport: [width as f32, height as f32],
            mirror_u: 0,
            _padding: 0,
        };
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Uniform Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Uniform Bind Group"),
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let texture_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Mask Bind Group Layout"),
                entries: &[
                    // Texture
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    // Sampler
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let wireframe_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Wireframe Pipeline Layout"),
            bind_group_layouts: &[&uniform_bind_group_layout],
            push_constant_ranges: &[],
        });

        let textured_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Textured Pipeline Layout"),
            bind_group_layouts: &[&uniform_bind_group_layout, &texture_bind_group_layout],
            push_constant_ranges: &[],
        });

        let color_target = Some(wgpu::ColorTargetState {
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
            write_mask: wgpu::ColorWrites::ALL,
        });

        // Wireframe layer: line list over the shared positions, drawn
        // first (lower order), no depth attachment.
        let wireframe_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Wireframe Pipeline"),
            layout: Some(&wireframe_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_wire"),
                buffers: &[PositionVertex::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_wire"),
                targets: &[color_target.clone()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::LineList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        // Textured layer: drawn second (higher order), composites over
        // the wireframe.
        let textured_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Textured Pipeline"),
            layout: Some(&textured_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_textured"),
                buffers: &[PositionVertex::desc(), UvVertex::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_textured"),
                targets: &[color_target],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        let mesh = FaceMeshGpu::new(&device, &topology);

        Ok(Self {
            device,
            queue,
            topology,
            mesh,
            wireframe_pipeline,
            textured_pipeline,
            uniform_buffer,
            uniform_bind_group,
            texture_bind_group_layout,
            texture_bind_group: None,
            target,
            target_view,
            width,
            height,
            staged: Vec::new(),
        })
    }

    /// Positions staged by the last render call, in vertex order.
    pub fn staged_positions(&self) -> &[PositionVertex] {
        &self.staged
    }
}

impl Compositor for GpuCompositor {
    /// Upload a mask texture. Only the texture bind group is replaced;
    /// geometry, indices, and UV data are untouched.
    fn set_mask(&mut self, mask: &RgbaImage) -> Result<()> {
        let (mask_w, mask_h) = mask.dimensions();
        let size = wgpu::Extent3d {
            width: mask_w,
            height: mask_h,
            depth_or_array_layers: 1,
        };

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Mask Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            mask,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * mask_w),
                rows_per_image: Some(mask_h),
            },
            size,
        );

        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        self.texture_bind_group = Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Mask Bind Group"),
            layout: &self.texture_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        }));

        log::info!("mask texture uploaded: {mask_w}x{mask_h}");
        Ok(())
    }

    fn render(&mut self, landmarks: &LandmarkFrame, state: &RenderState) -> Result<()> {
        if landmarks.len() != self.topology.num_vertices() {
            return Err(WarpError::LandmarkCountMismatch {
                expected: self.topology.num_vertices(),
                actual: landmarks.len(),
            });
        }

        self.staged = stage_positions(landmarks, self.width as f32, self.height as f32, state.mirror);
        self.mesh.write_positions(&self.queue, &self.staged);

        let uniforms = Uniforms {
            viewport: [self.width as f32, self.height as f32],
            mirror_u: state.mirror as u32,
            _padding: 0,
        };
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Face Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Face Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target_view,
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

            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);

            if state.wireframe_visible {
                render_pass.set_pipeline(&self.wireframe_pipeline);
                render_pass.set_vertex_buffer(0, self.mesh.position_buffer.slice(..));
                render_pass.set_index_buffer(
                    self.mesh.edge_index_buffer.slice(..),
                    wgpu::IndexFormat::Uint32,
                );
                render_pass.draw_indexed(0..self.mesh.num_edge_indices, 0, 0..1);
            }

            // Textured layer visibility is recomputed every frame.
            if state.mask_present {
                if let Some(mask_bind_group) = self.texture_bind_group.as_ref() {
                    render_pass.set_pipeline(&self.textured_pipeline);
                    render_pass.set_bind_group(1, mask_bind_group, &[]);
                    render_pass.set_vertex_buffer(0, self.mesh.position_buffer.slice(..));
                    render_pass.set_vertex_buffer(1, self.mesh.uv_buffer.slice(..));
                    render_pass.set_index_buffer(
                        self.mesh.triangle_index_buffer.slice(..),
                        wgpu::IndexFormat::Uint32,
                    );
                    render_pass.draw_indexed(0..self.mesh.num_triangle_indices, 0, 0..1);
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    /// Read the offscreen target back into an RGBA image.
    fn frame(&mut self) -> Result<RgbaImage> {
        let bytes_per_row = 4 * self.width;
        let padded_bytes_per_row = bytes_per_row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: (padded_bytes_per_row * self.height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|_| WarpError::Readback {
                message: "map callback dropped".into(),
            })?
            .map_err(|e| WarpError::Readback {
                message: e.to_string(),
            })?;

        let data = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((bytes_per_row * self.height) as usize);
        for row in 0..self.height {
            let start = (row * padded_bytes_per_row) as usize;
            pixels.extend_from_slice(&data[start..start + bytes_per_row as usize]);
        }
        drop(data);
        readback.unmap();

        RgbaImage::from_raw(self.width, self.height, pixels).ok_or(WarpError::Readback {
            message: "frame buffer size mismatch".into(),
        })
    }
}

/// WGSL shader source for both layers.
const SHADER_SOURCE: &str = r#"
struct Uniforms {
    viewport: vec2<f32>,
    mirror_u: u32,
    _padding: u32,
}

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

// Mask texture and sampler (bind group 1, textured layer only)
@group(1) @binding(0)
var mask_texture: texture_2d<f32>;
@group(1) @binding(1)
var mask_sampler: sampler;

// Pixel-space positions to clip space; y grows downward on screen.
fn to_clip(position: vec3<f32>) -> vec4<f32> {
    let x = position.x / uniforms.viewport.x * 2.0 - 1.0;
    let y = 1.0 - position.y / uniforms.viewport.y * 2.0;
    return vec4<f32>(x, y, 0.0, 1.0);
}

struct WireOutput {
    @builtin(position) clip_position: vec4<f32>,
}

@vertex
fn vs_wire(@location(0) position: vec3<f32>) -> WireOutput {
    var out: WireOutput;
    out.clip_position = to_clip(position);
    return out;
}

@fragment
fn fs_wire(in: WireOutput) -> @location(0) vec4<f32> {
    // Semi-transparent silver, like the tracker's tesselation overlay.
    return vec4<f32>(0.75, 0.75, 0.75, 0.44);
}

struct TexturedOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_textured(
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
) -> TexturedOutput {
    var out: TexturedOutput;
    out.clip_position = to_clip(position);
    out.uv = uv;
    return out;
}

@fragment
fn fs_textured(in: TexturedOutput) -> @location(0) vec4<f32> {
    // Mirroring remaps U in the sampler so the geometry (and the
    // wireframe drawn from it) keeps its screen-space shape.
    var u = in.uv.x;
    if (uniforms.mirror_u != 0u) {
        u = 1.0 - u;
    }
    return textureSample(mask_texture, mask_sampler, vec2<f32>(u, in.uv.y));
}
"#;
