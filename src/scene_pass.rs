//! 3D scene rendering into an offscreen target.
//!
//! [`ScenePass`] draws every `(Transform, Renderable)` entity of a [`Scene`] with depth
//! testing. Two pipelines share one layout:
//!
//! - **standard**: ambient + directional lighting with environment reflections
//! - **normal**: view-space normals encoded as color, both faces drawn
//!
//! The pipeline is picked per draw from the scene's effective material, so a scoped override
//! switches the whole scene to the normal pipeline.
//!
//! # Bind groups
//!
//! - **Group 0**: frame uniforms (camera matrices, camera position, lights)
//! - **Group 1**: model uniforms, one 256-byte aligned slot per draw, selected by dynamic offset
//! - **Group 2**: environment cube map and sampler

use crate::camera::PerspectiveCamera;
use crate::gpu::GpuContext;
use crate::material::Material;
use crate::mesh::{Transform, Vertex3d};
use crate::render_target::{RenderContext, RenderError, RenderTarget};
use crate::scene::{MeshId, Renderable, Scene};
use crate::texture::Texture;
use std::sync::Arc;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Per-frame camera and light uniforms.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub camera_pos: [f32; 3],
    /// 1 when an environment map is bound, 0 otherwise.
    pub env_strength: f32,
    pub ambient: [f32; 4],
    /// `w` is 1 when the light is enabled.
    pub light_direction: [f32; 4],
    pub light_color: [f32; 4],
}

/// Per-draw model uniforms.
///
/// Always carries the renderable's authored material, whatever the active override. Both
/// scene passes of a frame then write identical contents, which matters because queued
/// buffer writes all land before the frame's single submission.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniforms {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// Roughness, metalness, unused, unused.
    pub surface: [f32; 4],
}

impl ModelUniforms {
    fn new(transform: &Transform, material: &Material) -> Self {
        let model = transform.matrix();
        let (color, surface) = match material {
            Material::Standard(m) => (
                [m.color[0], m.color[1], m.color[2], 1.0],
                [m.roughness, m.metalness, 0.0, 0.0],
            ),
            Material::Normal => ([1.0; 4], [1.0, 0.0, 0.0, 0.0]),
        };
        Self {
            model: model.to_cols_array_2d(),
            normal_matrix: model.inverse().transpose().to_cols_array_2d(),
            color,
            surface,
        }
    }
}

struct Draw {
    mesh: MeshId,
    material: Material,
}

/// Renders a [`Scene`] into a [`RenderTarget`] with a `Depth32Float` attachment.
pub struct ScenePass {
    format: wgpu::TextureFormat,
    standard_pipeline: wgpu::RenderPipeline,
    normal_pipeline: wgpu::RenderPipeline,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    model_layout: wgpu::BindGroupLayout,
    model_buffer: wgpu::Buffer,
    model_bind_group: wgpu::BindGroup,
    model_stride: u64,
    model_capacity: u64,
    env_layout: wgpu::BindGroupLayout,
    env_bind_group: wgpu::BindGroup,
    env_bound: Option<Arc<Texture>>,
    default_env: Texture,
}

impl ScenePass {
    /// Build both pipelines for targets of `format`.
    pub fn new(gpu: &GpuContext, format: wgpu::TextureFormat) -> Self {
        let device = &gpu.device;

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene Frame Uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Frame Bind Group Layout"),
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

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Frame Bind Group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let model_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Model Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<ModelUniforms>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let model_stride = model_stride(
            device.limits().min_uniform_buffer_offset_alignment as u64,
        );
        let model_capacity = 16;
        let (model_buffer, model_bind_group) =
            Self::create_model_slots(device, &model_layout, model_stride, model_capacity);

        let env_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Environment Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let default_env = Texture::solid_cube(gpu, [255, 255, 255, 255]);
        let env_bind_group = Self::create_env_bind_group(device, &env_layout, &default_env);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &model_layout, &env_layout],
            push_constant_ranges: &[],
        });

        let standard_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Standard Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/scene.wgsl").into()),
        });
        let normal_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Normal Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/normal.wgsl").into()),
        });

        let standard_pipeline = Self::create_pipeline(
            device,
            &pipeline_layout,
            &standard_shader,
            "Standard Pipeline",
            format,
            Some(wgpu::Face::Back),
        );
        let normal_pipeline = Self::create_pipeline(
            device,
            &pipeline_layout,
            &normal_shader,
            "Normal Pipeline",
            format,
            None,
        );

        Self {
            format,
            standard_pipeline,
            normal_pipeline,
            frame_buffer,
            frame_bind_group,
            model_layout,
            model_buffer,
            model_bind_group,
            model_stride,
            model_capacity,
            env_layout,
            env_bind_group,
            env_bound: None,
            default_env,
        }
    }

    fn create_pipeline(
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        module: &wgpu::ShaderModule,
        label: &str,
        format: wgpu::TextureFormat,
        cull_mode: Option<wgpu::Face>,
    ) -> wgpu::RenderPipeline {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs"),
                buffers: &[Vertex3d::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode,
                front_face: wgpu::FrontFace::Ccw,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }

    fn create_model_slots(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        stride: u64,
        capacity: u64,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scene Model Uniforms"),
            size: stride * capacity,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Model Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<ModelUniforms>() as u64),
                }),
            }],
        });
        (buffer, bind_group)
    }

    fn create_env_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        env: &Texture,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scene Environment Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&env.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&env.sampler),
                },
            ],
        })
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Rebind the environment map when the scene's changed since the last frame.
    fn sync_environment(&mut self, gpu: &GpuContext, environment: Option<&Arc<Texture>>) {
        let unchanged = match (environment, &self.env_bound) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }

        let texture = environment.map_or(&self.default_env, |env| env.as_ref());
        self.env_bind_group = Self::create_env_bind_group(&gpu.device, &self.env_layout, texture);
        self.env_bound = environment.cloned();
    }

    fn ensure_model_capacity(&mut self, gpu: &GpuContext, count: u64) {
        if count <= self.model_capacity {
            return;
        }
        let capacity = count.next_power_of_two();
        let (buffer, bind_group) =
            Self::create_model_slots(&gpu.device, &self.model_layout, self.model_stride, capacity);
        self.model_buffer = buffer;
        self.model_bind_group = bind_group;
        self.model_capacity = capacity;
    }

    /// Draw `scene` through `camera` into `target`, clearing it to the scene background.
    ///
    /// The target must have this pass's color format and a `Depth32Float` attachment.
    pub fn render(
        &mut self,
        ctx: &mut RenderContext,
        scene: &Scene,
        camera: &PerspectiveCamera,
        target: &RenderTarget,
    ) -> Result<(), RenderError> {
        if target.config().format != self.format {
            return Err(RenderError::IncompatibleTarget {
                label: target.label().to_string(),
                expected: self.format,
                found: target.config().format,
            });
        }
        let depth_view = match (target.depth_view(), target.config().depth_format()) {
            (Some(view), Some(format)) if format == DEPTH_FORMAT => view,
            _ => return Err(RenderError::MissingDepth(target.label().to_string())),
        };

        let gpu = ctx.gpu;
        let mut uniforms = Vec::new();
        let mut draws = Vec::new();
        for (_, (transform, renderable)) in scene.world.query::<(&Transform, &Renderable)>().iter() {
            uniforms.push(ModelUniforms::new(transform, &renderable.material));
            draws.push(Draw {
                mesh: renderable.mesh,
                material: scene.effective_material(renderable),
            });
        }

        self.ensure_model_capacity(gpu, draws.len() as u64);
        if !uniforms.is_empty() {
            let bytes = pack_strided(&uniforms, self.model_stride as usize);
            gpu.queue.write_buffer(&self.model_buffer, 0, &bytes);
        }

        let view = camera.view_matrix();
        let lighting = &scene.lighting;
        let ambient = lighting.ambient_radiance();
        let (light_direction, light_color) = match lighting.directional {
            Some(light) => (
                light.direction.normalize_or_zero().extend(1.0).to_array(),
                light.color.map(|c| c * light.intensity),
            ),
            None => ([0.0, -1.0, 0.0, 0.0], [0.0; 3]),
        };
        let frame = FrameUniforms {
            view_proj: camera.view_projection().to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            camera_pos: camera.position.to_array(),
            env_strength: if scene.environment.is_some() { 1.0 } else { 0.0 },
            ambient: [ambient[0], ambient[1], ambient[2], 1.0],
            light_direction,
            light_color: [light_color[0], light_color[1], light_color[2], 1.0],
        };
        gpu.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::cast_slice(&[frame]));

        self.sync_environment(gpu, scene.environment.as_ref());

        let [r, g, b, a] = scene.clear_color;
        let mut pass = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.view(),
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: r as f64,
                        g: g as f64,
                        b: b as f64,
                        a: a as f64,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_bind_group(0, &self.frame_bind_group, &[]);
        pass.set_bind_group(2, &self.env_bind_group, &[]);

        let mut bound_normal = None;
        for (slot, draw) in draws.iter().enumerate() {
            let Some(mesh) = scene.mesh(draw.mesh) else {
                log::warn!("skipping renderable with unknown mesh {:?}", draw.mesh);
                continue;
            };

            let normal = matches!(draw.material, Material::Normal);
            if bound_normal != Some(normal) {
                pass.set_pipeline(if normal {
                    &self.normal_pipeline
                } else {
                    &self.standard_pipeline
                });
                bound_normal = Some(normal);
            }

            let offset = (slot as u64 * self.model_stride) as u32;
            pass.set_bind_group(1, &self.model_bind_group, &[offset]);
            mesh.draw(&mut pass);
        }

        Ok(())
    }
}

/// Size of one model slot: the uniform struct rounded up to the device's offset alignment.
fn model_stride(alignment: u64) -> u64 {
    let size = std::mem::size_of::<ModelUniforms>() as u64;
    size.div_ceil(alignment.max(1)) * alignment.max(1)
}

/// Lay out `items` back to back, each starting on a `stride`-byte boundary.
fn pack_strided<T: bytemuck::Pod>(items: &[T], stride: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; items.len() * stride];
    for (chunk, item) in bytes.chunks_exact_mut(stride).zip(items) {
        let src = bytemuck::bytes_of(item);
        chunk[..src.len()].copy_from_slice(src);
    }
    bytes
}
