//! Full-screen quad passes.
//!
//! A [`QuadPass`] draws one unit quad, scaled to the output size and framed by an
//! [`OrthoCamera`] so that one quad unit covers one pixel, with a fragment stage supplied by a
//! [`QuadShader`]. It renders either into its own [`RenderTarget`] (to feed a later pass) or
//! into the frame's screen view.
//!
//! The vertex stage lives in `shaders/quad.wgsl` and binds `@group(0)`. It passes
//! `@location(0) uv: vec2<f32>` to the fragment stage, with `(0, 0)` at the top-left.
//! Shaders put their own resources in `@group(1)` and name their entry point `fs`.

use crate::camera::OrthoCamera;
use crate::gpu::GpuContext;
use crate::mesh::{Mesh, MeshData, Transform, Vertex3d};
use crate::render_target::{RenderContext, RenderTarget, TargetConfig, clamp_extent};
use glam::{Mat4, Vec3};

/// A fragment program run over a full-screen quad.
pub trait QuadShader {
    fn label(&self) -> &str;

    /// WGSL declaring `@group(1)` resources and `@fragment fn fs(in: QuadOutput)`.
    fn fragment_source(&self) -> String;

    /// Layout of the `@group(1)` bind group passed to [`QuadPass::render`].
    fn bind_group_layout(&self) -> &wgpu::BindGroupLayout;
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct QuadUniforms {
    view_proj: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
}

/// The quad's placement: camera planes and quad scale for one output size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadFraming {
    pub camera: OrthoCamera,
    pub transform: Transform,
}

impl QuadFraming {
    pub fn new(width: u32, height: u32) -> Self {
        let mut framing = Self {
            camera: OrthoCamera::framing(1.0, 1.0),
            transform: Transform::new(),
        };
        framing.set_size(width, height);
        framing
    }

    /// Scale the quad to `(w, h, 1)` and set the planes to `(-w/2, w/2, h/2, -h/2)`.
    pub fn set_size(&mut self, width: u32, height: u32) {
        let (w, h) = clamp_extent(width as i64, height as i64);
        let (w, h) = (w as f32, h as f32);
        self.transform.scale = Vec3::new(w, h, 1.0);
        self.camera.frame(w, h);
    }

    pub fn view_projection(&self) -> Mat4 {
        self.camera.view_projection()
    }

    pub fn model(&self) -> Mat4 {
        self.transform.matrix()
    }
}

pub struct QuadPass<S: QuadShader> {
    shader: S,
    pipeline: wgpu::RenderPipeline,
    quad: Mesh,
    framing: QuadFraming,
    target: RenderTarget,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
}

impl<S: QuadShader> QuadPass<S> {
    /// Build the pass with an output target of `width` x `height` in the GPU's output format.
    pub fn new(gpu: &GpuContext, shader: S, width: u32, height: u32) -> Self {
        let device = &gpu.device;
        let label = shader.label().to_string();
        let format = gpu.output_format();

        let source = format!(
            "{}\n{}",
            include_str!("shaders/quad.wgsl"),
            shader.fragment_source()
        );
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{label} Shader")),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label} Quad Uniforms")),
            size: std::mem::size_of::<QuadUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Quad Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Quad Bind Group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label} Pipeline Layout")),
            bind_group_layouts: &[&uniform_layout, shader.bind_group_layout()],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!("{label} Pipeline")),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs"),
                buffers: &[Vertex3d::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
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
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let target = RenderTarget::new(
            gpu,
            &format!("{label} Target"),
            width,
            height,
            TargetConfig::default().with_format(format).with_depth(false),
        );

        Self {
            shader,
            pipeline,
            quad: MeshData::unit_quad().upload(gpu),
            framing: QuadFraming::new(width, height),
            target,
            uniform_buffer,
            uniform_bind_group,
        }
    }

    /// Resize the output target and refit the quad and camera to `width` x `height`.
    pub fn set_size(&mut self, gpu: &GpuContext, width: u32, height: u32) {
        self.target.resize(gpu, width, height);
        self.framing.set_size(width, height);
    }

    /// Draw the quad with `bindings` at `@group(1)`.
    ///
    /// With `to_screen` the quad lands in `ctx.screen`; otherwise in this pass's own target.
    /// Either destination is attached only for the duration of this call's render pass.
    pub fn render(&mut self, ctx: &mut RenderContext, bindings: &wgpu::BindGroup, to_screen: bool) {
        let uniforms = QuadUniforms {
            view_proj: self.framing.view_projection().to_cols_array_2d(),
            model: self.framing.model().to_cols_array_2d(),
        };
        ctx.gpu
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        let destination = if to_screen {
            ctx.screen
        } else {
            self.target.view()
        };

        let mut pass = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(self.shader.label()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: destination,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        pass.set_bind_group(1, bindings, &[]);
        self.quad.draw(&mut pass);
    }

    pub fn framing(&self) -> &QuadFraming {
        &self.framing
    }

    /// The pass's own output, filled by `render(.., false)`.
    pub fn texture(&self) -> &RenderTarget {
        &self.target
    }

    pub fn shader(&self) -> &S {
        &self.shader
    }

    pub fn shader_mut(&mut self) -> &mut S {
        &mut self.shader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn set_size_fits_planes_and_quad() {
        let mut framing = QuadFraming::new(1, 1);
        framing.set_size(800, 600);
        assert_eq!(framing.camera.planes(), (-400.0, 400.0, 300.0, -300.0));
        assert_eq!(framing.transform.scale, Vec3::new(800.0, 600.0, 1.0));
    }

    #[test]
    fn zero_size_frames_one_pixel() {
        let framing = QuadFraming::new(0, 0);
        assert_eq!(framing.camera.planes(), (-0.5, 0.5, 0.5, -0.5));
        assert_eq!(framing.transform.scale, Vec3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn quad_covers_clip_space_exactly() {
        let framing = QuadFraming::new(1024, 768);
        let mvp = framing.view_projection() * framing.model();
        for (corner, expected) in [
            (Vec4::new(-0.5, -0.5, 0.0, 1.0), (-1.0, -1.0)),
            (Vec4::new(0.5, 0.5, 0.0, 1.0), (1.0, 1.0)),
        ] {
            let clip = mvp * corner;
            assert!((clip.x - expected.0).abs() < 1e-5);
            assert!((clip.y - expected.1).abs() < 1e-5);
        }
    }
}
