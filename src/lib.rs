//! # Crosshatch
//!
//! **Pen-and-ink hatching as a post-process for wgpu scenes.**
//!
//! A [`HatchPost`] draws a [`Scene`] twice, once with its materials and once as view-space
//! normals, then runs a full-screen [`QuadPass`] that turns luminance into rotated line
//! layers and normal discontinuities into contours, inked over a paper texture.
//!
//! ```no_run
//! use crosshatch::*;
//! use std::sync::Arc;
//!
//! # fn demo(window: Arc<winit::window::Window>) -> Result<(), Box<dyn std::error::Error>> {
//! let gpu = GpuContext::new(window)?;
//! let mut scene = Scene::new();
//! let cube = scene.add_mesh(&gpu, &MeshData::cube());
//! scene.spawn(cube, StandardMaterial::default().into(), Transform::new());
//!
//! let noise = Arc::new(Texture::noise(&gpu, 256, 1));
//! let mut post = HatchPost::new(&gpu, gpu.width(), gpu.height(), HatchParams::default(), noise);
//! post.set_param("thickness", ParamValue::Float(0.5))?;
//!
//! let camera = PerspectiveCamera::default();
//! # let surface_view: wgpu::TextureView = todo!();
//! let mut encoder = gpu.device.create_command_encoder(&Default::default());
//! let mut ctx = RenderContext { gpu: &gpu, encoder: &mut encoder, screen: &surface_view };
//! post.render(&mut ctx, &mut scene, &camera)?;
//! gpu.queue.submit([encoder.finish()]);
//! # Ok(())
//! # }
//! ```
//!
//! [`hatch::reference`] evaluates the same shader on the CPU, which is how the look is
//! tested without a GPU.

pub mod app;
mod camera;
pub mod config;
mod gpu;
pub mod hatch;
pub mod library;
pub mod logging;
mod material;
mod mesh;
mod orbit_camera;
pub mod params;
mod post;
mod quad_pass;
mod render_target;
pub mod scene;
mod scene_pass;
pub mod sensor;
mod texture;

pub use camera::{OrthoCamera, PerspectiveCamera};
pub use config::{ConfigError, CrosshatchConfig};
pub use gpu::{GpuContext, GpuError};
pub use hatch::{HatchParams, HatchShader, HatchUniforms};
pub use library::{
    GpuTextureLoader, LibraryError, LoadError, LoadHandle, TextureLibrary, TextureLoader,
    TextureSource,
};
pub use logging::{LoggingConfig, init_logging};
pub use material::{DirectionalLight, Lighting, Material, StandardMaterial, SurfaceParams};
pub use mesh::{Mesh, MeshData, Transform, Vertex3d};
pub use orbit_camera::OrbitCamera;
pub use params::{ParamChange, ParamError, ParamRange, ParamSpec, ParamValue, Tunable};
pub use post::HatchPost;
pub use quad_pass::{QuadFraming, QuadPass, QuadShader};
pub use render_target::{RenderContext, RenderError, RenderTarget, TargetConfig, clamp_extent};
pub use scene::{MeshId, OverrideGuard, Renderable, Scene};
pub use scene_pass::ScenePass;
pub use texture::{Texture, TextureError, TextureOptions};

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

pub use hecs::{Entity, World};
