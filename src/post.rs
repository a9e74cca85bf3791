//! The hatching post-process: two scene passes feeding one quad pass.

use crate::camera::PerspectiveCamera;
use crate::gpu::GpuContext;
use crate::hatch::{BindingKey, HatchParams, HatchShader};
use crate::material::Material;
use crate::params::{ParamChange, ParamError, ParamListeners, ParamSpec, ParamValue, Tunable};
use crate::quad_pass::QuadPass;
use crate::render_target::{RenderContext, RenderError, RenderTarget, TargetConfig};
use crate::scene::Scene;
use crate::scene_pass::ScenePass;
use crate::texture::Texture;
use std::sync::Arc;

/// Renders a scene as ink hatching over paper.
///
/// Each frame draws the scene once with its own materials into `color_target`, once with
/// every material replaced by view-space normals into `normal_target`, then runs the hatch
/// shader over both straight to the screen.
pub struct HatchPost {
    color_target: RenderTarget,
    normal_target: RenderTarget,
    scene_pass: ScenePass,
    quad: QuadPass<HatchShader>,
    bindings: Option<(BindingKey<Texture>, wgpu::BindGroup)>,
    listeners: ParamListeners,
}

impl HatchPost {
    pub fn new(
        gpu: &GpuContext,
        width: u32,
        height: u32,
        params: HatchParams,
        noise: Arc<Texture>,
    ) -> Self {
        let config = TargetConfig::default();
        let color_target = RenderTarget::new(gpu, "Color Target", width, height, config);
        let normal_target = RenderTarget::new(gpu, "Normal Target", width, height, config);
        let scene_pass = ScenePass::new(gpu, config.format);
        let quad = QuadPass::new(gpu, HatchShader::new(gpu, params, noise), width, height);

        log::info!("hatch post-process ready at {width}x{height}");

        Self {
            color_target,
            normal_target,
            scene_pass,
            quad,
            bindings: None,
            listeners: ParamListeners::default(),
        }
    }

    /// Resize both scene targets and the quad pass.
    pub fn set_size(&mut self, gpu: &GpuContext, width: u32, height: u32) {
        self.color_target.resize(gpu, width, height);
        self.normal_target.resize(gpu, width, height);
        self.quad.set_size(gpu, width, height);
        log::debug!("hatch post-process resized to {width}x{height}");
    }

    /// Record the color pass, the normal pass and the hatch pass into `ctx`.
    ///
    /// The scene's override material is set only while the normal pass records and is
    /// restored before this returns, whether or not the pass succeeded.
    pub fn render(
        &mut self,
        ctx: &mut RenderContext,
        scene: &mut Scene,
        camera: &PerspectiveCamera,
    ) -> Result<(), RenderError> {
        self.scene_pass
            .render(ctx, scene, camera, &self.color_target)?;

        let scene_pass = &mut self.scene_pass;
        let normal_target = &self.normal_target;
        scene.with_override(Material::Normal, |scene| {
            scene_pass.render(ctx, scene, camera, normal_target)
        })?;

        let gpu = ctx.gpu;
        self.quad.shader_mut().sync(gpu);

        let shader = self.quad.shader();
        let key = BindingKey {
            color_generation: self.color_target.generation(),
            normal_generation: self.normal_target.generation(),
            paper: shader.paper().clone(),
            noise: shader.noise().clone(),
        };
        if self
            .bindings
            .as_ref()
            .is_some_and(|(cached, _)| !cached.same_as(&key))
        {
            self.bindings = None;
        }
        let (color_target, normal_target) = (&self.color_target, &self.normal_target);
        let (_, bindings) = self.bindings.get_or_insert_with(|| {
            log::trace!("rebuilding hatch bind group");
            (key, shader.bind_group(gpu, color_target, normal_target))
        });

        self.quad.render(ctx, bindings, true);
        Ok(())
    }

    pub fn params(&self) -> &HatchParams {
        self.quad.shader().params()
    }

    /// Parameter listing for an external control.
    pub fn describe(&self) -> Vec<ParamSpec> {
        self.params().describe()
    }

    /// Apply one parameter as given, then notify every listener.
    pub fn set_param(&mut self, name: &str, value: ParamValue) -> Result<(), ParamError> {
        self.quad.shader_mut().apply(name, value.clone())?;
        log::debug!("{name} = {value}");
        self.listeners.notify(&ParamChange {
            name: name.to_string(),
            value,
        });
        Ok(())
    }

    pub fn set_params(&mut self, params: HatchParams) {
        self.quad.shader_mut().set_params(params);
    }

    /// Register a callback fired after each successful [`set_param`](Self::set_param).
    pub fn on_param_change(&mut self, listener: impl FnMut(&ParamChange) + 'static) {
        self.listeners.add(listener);
    }

    /// Use `paper` from the next frame on.
    pub fn set_paper(&mut self, paper: Arc<Texture>) {
        self.quad.shader_mut().set_paper(paper);
    }

    pub fn set_noise(&mut self, noise: Arc<Texture>) {
        self.quad.shader_mut().set_noise(noise);
    }

    pub fn color_target(&self) -> &RenderTarget {
        &self.color_target
    }

    pub fn normal_target(&self) -> &RenderTarget {
        &self.normal_target
    }

    pub fn quad(&self) -> &QuadPass<HatchShader> {
        &self.quad
    }
}
