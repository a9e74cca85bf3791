//! The interactive demo: a small scene rendered through [`HatchPost`].
//!
//! Keys: `P` next paper, `E` next environment, `O` edge overlay, `[`/`]` scale,
//! `-`/`=` thickness. Left-drag orbits, the wheel zooms.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};

use clap::Parser;
use glam::{Quat, Vec3};
use thiserror::Error;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::camera::PerspectiveCamera;
use crate::config::CrosshatchConfig;
use crate::gpu::{GpuContext, GpuError};
use crate::library::{GpuTextureLoader, LibraryError, LoadHandle, TextureLibrary};
use crate::material::{StandardMaterial, SurfaceParams};
use crate::mesh::{MeshData, Transform};
use crate::orbit_camera::OrbitCamera;
use crate::params::{ParamRange, ParamValue};
use crate::post::HatchPost;
use crate::render_target::{RenderContext, RenderError};
use crate::scene::Scene;
use crate::sensor::{Orientation, OrientationPoller};
use crate::texture::{Texture, TextureOptions};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// Render a scene through the crosshatch post-process.
#[derive(Parser, Clone, Debug, Default)]
#[command(name = "crosshatch")]
#[command(version)]
pub struct DemoOptions {
    /// Serial device (or any readable and writable file) streaming orientation lines
    #[arg(long, value_name = "PATH")]
    pub sensor: Option<PathBuf>,
}

/// Open a window and run the demo until it is closed.
pub fn run(config: CrosshatchConfig, options: DemoOptions) -> Result<(), AppError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = CrosshatchApp::Pending { config, options };
    event_loop.run_app(&mut app)?;

    match app {
        CrosshatchApp::Failed(err) => Err(err),
        _ => Ok(()),
    }
}

enum CrosshatchApp {
    Pending {
        config: CrosshatchConfig,
        options: DemoOptions,
    },
    Running(Box<Demo>),
    Failed(AppError),
}

impl ApplicationHandler for CrosshatchApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let CrosshatchApp::Pending { config, options } = self else {
            return;
        };
        *self = match Demo::start(event_loop, config, options) {
            Ok(demo) => CrosshatchApp::Running(Box::new(demo)),
            Err(err) => {
                event_loop.exit();
                CrosshatchApp::Failed(err)
            }
        };
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let CrosshatchApp::Running(demo) = self else {
            return;
        };

        if demo.orbit.handle_event(&event) {
            demo.orbit.apply(&mut demo.camera);
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => demo.resize(size.width, size.height),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => demo.key_pressed(key),
            WindowEvent::RedrawRequested => {
                demo.update();
                demo.draw();
                demo.window.request_redraw();
            }
            _ => {}
        }
    }
}

struct Demo {
    window: Arc<Window>,
    gpu: GpuContext,
    scene: Scene,
    camera: PerspectiveCamera,
    orbit: OrbitCamera,
    post: HatchPost,
    model: hecs::Entity,
    papers: TextureLibrary<Texture>,
    environments: TextureLibrary<Texture>,
    surface: SurfaceParams,
    /// Paper the shader currently shows, by name.
    shown_paper: Option<String>,
    shown_environment: Option<String>,
    sensor: Option<Receiver<Orientation>>,
}

impl Demo {
    fn start(
        event_loop: &ActiveEventLoop,
        config: &CrosshatchConfig,
        options: &DemoOptions,
    ) -> Result<Self, AppError> {
        let attrs = WindowAttributes::default()
            .with_title(&config.window.title)
            .with_inner_size(winit::dpi::LogicalSize::new(
                config.window.width,
                config.window.height,
            ));
        let window = Arc::new(event_loop.create_window(attrs)?);
        let gpu = GpuContext::new(window.clone())?;
        let (width, height) = (gpu.width(), gpu.height());

        let mut scene = Scene::new();
        let cube = scene.add_mesh(&gpu, &MeshData::cube());
        let sphere = scene.add_mesh(&gpu, &MeshData::sphere(48, 24));
        let ground = scene.add_mesh(&gpu, &MeshData::plane(12.0));

        let mut surface_material = StandardMaterial::new([0.9, 0.9, 0.9]);
        config.surface.apply_to(&mut surface_material);
        let model = scene.spawn(cube, surface_material.into(), Transform::new().uniform_scale(2.0));
        scene.spawn(
            sphere,
            surface_material.into(),
            Transform::from_position(Vec3::new(2.5, 0.0, -1.0)),
        );
        scene.spawn(
            ground,
            StandardMaterial::new([0.95, 0.95, 0.95]).into(),
            Transform::from_position(Vec3::new(0.0, -1.0, 0.0)),
        );

        let mut camera = PerspectiveCamera::default();
        camera.set_viewport(width, height);
        let orbit = OrbitCamera::from_camera(&camera);

        let noise = Arc::new(load_noise(&gpu, config));
        let post = HatchPost::new(&gpu, width, height, config.hatch.clone(), noise);

        let loader = Arc::new(GpuTextureLoader::new(&gpu));
        let papers = TextureLibrary::papers(&config.assets.paper_dir(), loader.clone());
        let environments = TextureLibrary::environments(&config.assets.envmap_dir(), loader);

        let sensor = options.sensor.clone().map(spawn_sensor);

        log::info!("demo scene ready");

        Ok(Self {
            window,
            gpu,
            scene,
            camera,
            orbit,
            post,
            model,
            papers,
            environments,
            surface: config.surface.clone(),
            shown_paper: None,
            shown_environment: None,
            sensor,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.gpu.resize(width, height);
        self.camera.set_viewport(width, height);
        self.post.set_size(&self.gpu, width, height);
    }

    fn key_pressed(&mut self, key: KeyCode) {
        match key {
            KeyCode::KeyP => {
                let current = self.post.params().paper.clone();
                if let Some(next) = self.papers.next_name(&current).map(str::to_string) {
                    self.set_param("paper", ParamValue::Choice(next));
                }
            }
            KeyCode::KeyE => {
                let current = self.surface.environment.clone();
                if let Some(next) = self.environments.next_name(&current).map(str::to_string) {
                    log::info!("environment = {next}");
                    self.surface.environment = next;
                }
            }
            KeyCode::KeyO => {
                let on = self.post.params().edge_overlay;
                self.set_param("edge_overlay", ParamValue::Toggle(!on));
            }
            KeyCode::BracketLeft => self.nudge("scale", -0.05),
            KeyCode::BracketRight => self.nudge("scale", 0.05),
            KeyCode::Minus => self.nudge("thickness", -0.02),
            KeyCode::Equal => self.nudge("thickness", 0.02),
            _ => {}
        }
    }

    fn set_param(&mut self, name: &str, value: ParamValue) {
        if let Err(err) = self.post.set_param(name, value) {
            log::warn!("{err}");
        }
    }

    /// Step a float parameter, staying inside its advertised range.
    fn nudge(&mut self, name: &str, step: f32) {
        let Some(spec) = self.post.describe().into_iter().find(|s| s.name == name) else {
            return;
        };
        if let (ParamValue::Float(value), ParamRange::Float { min, max }) = (spec.value, spec.range)
        {
            self.set_param(name, ParamValue::Float((value + step).clamp(min, max)));
        }
    }

    /// Pick up finished texture loads and the latest sensor sample.
    fn update(&mut self) {
        let paper = self.post.params().paper.clone();
        if self.shown_paper.as_ref() != Some(&paper) {
            match poll(&mut self.papers, &paper) {
                Poll::Ready(texture) => {
                    self.post.set_paper(texture);
                    log::info!("paper = {paper}");
                    self.shown_paper = Some(paper);
                }
                Poll::Pending => {}
                Poll::Failed => self.shown_paper = Some(paper),
            }
        }

        let environment = self.surface.environment.clone();
        if self.shown_environment.as_ref() != Some(&environment) {
            if environment.is_empty() {
                self.scene.environment = None;
                self.shown_environment = Some(environment);
            } else {
                match poll(&mut self.environments, &environment) {
                    Poll::Ready(texture) => {
                        self.scene.environment = Some(texture);
                        self.shown_environment = Some(environment);
                    }
                    Poll::Pending => {}
                    Poll::Failed => self.shown_environment = Some(environment),
                }
            }
        }

        let surface = &self.surface;
        self.scene.for_each_standard(|material| surface.apply_to(material));

        let latest = self
            .sensor
            .as_ref()
            .and_then(|rx| rx.try_iter().last());
        if let Some(orientation) = latest {
            self.set_model_rotation(orientation.rotation());
        }
    }

    fn set_model_rotation(&mut self, rotation: Quat) {
        if let Ok(mut transform) = self.scene.world.get::<&mut Transform>(self.model) {
            transform.rotation = rotation;
        }
    }

    fn draw(&mut self) {
        let Some(surface) = &self.gpu.surface else {
            return;
        };
        let output = match surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let (w, h) = (self.gpu.width(), self.gpu.height());
                self.gpu.resize(w, h);
                return;
            }
            Err(err) => {
                log::error!("{}", RenderError::from(err));
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        let mut ctx = RenderContext {
            gpu: &self.gpu,
            encoder: &mut encoder,
            screen: &view,
        };
        if let Err(err) = self.post.render(&mut ctx, &mut self.scene, &self.camera) {
            log::error!("frame skipped: {err}");
            return;
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
    }
}

enum Poll {
    Ready(Arc<Texture>),
    Pending,
    Failed,
}

fn poll(library: &mut TextureLibrary<Texture>, name: &str) -> Poll {
    match library.ensure_loaded(name) {
        Ok(LoadHandle::Ready(texture)) => Poll::Ready(texture),
        Ok(LoadHandle::Pending(_)) => Poll::Pending,
        Err(LibraryError::Unknown { kind, name }) => {
            log::warn!("no {kind} named '{name}'");
            Poll::Failed
        }
        Err(err) => {
            log::warn!("{err}; keeping the previous texture");
            Poll::Failed
        }
    }
}

/// The configured noise image, or generated noise when there is none.
fn load_noise(gpu: &GpuContext, config: &CrosshatchConfig) -> Texture {
    if let Some(path) = config.assets.noise_path() {
        match Texture::from_file(gpu, &path, TextureOptions::DATA) {
            Ok(texture) => return texture,
            Err(err) => log::warn!("noise image {}: {err}; generating noise", path.display()),
        }
    }
    Texture::noise(gpu, 256, 0x5eed)
}

fn spawn_sensor(path: PathBuf) -> Receiver<Orientation> {
    let (tx, rx) = mpsc::channel();
    let spawned = std::thread::Builder::new()
        .name("orientation sensor".to_string())
        .spawn(move || {
            let port = match std::fs::OpenOptions::new().read(true).write(true).open(&path) {
                Ok(port) => port,
                Err(err) => {
                    log::error!("cannot open sensor {}: {err}", path.display());
                    return;
                }
            };
            log::info!("reading orientation from {}", path.display());
            OrientationPoller::new(port).run(|sample| match tx.send(sample) {
                Ok(()) => std::ops::ControlFlow::Continue(()),
                // the demo closed
                Err(_) => std::ops::ControlFlow::Break(()),
            });
        });
    if let Err(err) = spawned {
        log::error!("cannot start sensor thread: {err}");
    }
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_flag_takes_a_path() {
        let options =
            DemoOptions::try_parse_from(["crosshatch", "--sensor", "/dev/ttyACM0"]).unwrap();
        assert_eq!(options.sensor, Some(PathBuf::from("/dev/ttyACM0")));

        let options = DemoOptions::try_parse_from(["crosshatch"]).unwrap();
        assert_eq!(options.sensor, None);
    }

    #[test]
    fn sensor_flag_without_path_is_rejected() {
        assert!(DemoOptions::try_parse_from(["crosshatch", "--sensor"]).is_err());
    }

    #[test]
    fn unknown_flags_are_rejected() {
        let err = DemoOptions::try_parse_from(["crosshatch", "--fullscreen"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        DemoOptions::command().debug_assert();
    }
}
