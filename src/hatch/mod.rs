//! The cross-hatching fragment program and its parameters.
//!
//! [`HatchShader`] turns a color target and a normal target into pen-and-ink hatching over
//! paper. Per pixel, in `shaders/hatch.wgsl` and mirrored by [`reference`]:
//!
//! 1. perturb the UV with low-frequency fBm noise
//! 2. take the luma of the color target and quantize it to ten levels
//! 3. find normal discontinuities with a Sobel filter and darken the luma along them
//! 4. for every level at or above the luma, multiply in a rotated line pattern
//! 5. darken the paper with the ink color where lines are, then optionally draw the outline
//!    in the edge color

pub mod reference;

use crate::gpu::GpuContext;
use crate::library::PAPERS;
use crate::params::{
    ParamError, ParamSpec, ParamValue, Tunable, set_choice, set_color, set_float, set_toggle,
};
use crate::quad_pass::QuadShader;
use crate::render_target::RenderTarget;
use crate::texture::Texture;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::sync::Arc;

/// Every tunable input of the hatching shader.
///
/// Colors are RGB in `0..=255`. `paper` names the paper the application should resolve and
/// hand to [`HatchShader::set_paper`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HatchParams {
    pub paper: String,
    pub scale: f32,
    pub thickness: f32,
    pub edge_thickness: f32,
    pub noise_scale: f32,
    pub noisiness: f32,
    pub edge_noisiness: f32,
    pub divergence: f32,
    pub angle: f32,
    pub contour: f32,
    pub ink_color: [f32; 3],
    pub edge_color: [f32; 3],
    pub edge_overlay: bool,
}

impl Default for HatchParams {
    fn default() -> Self {
        Self {
            paper: PAPERS[0].0.to_string(),
            scale: 0.5,
            thickness: 0.72,
            edge_thickness: 0.4,
            noise_scale: 0.72,
            noisiness: 0.007,
            edge_noisiness: 0.004,
            divergence: 1.0,
            angle: 2.0,
            contour: 1.2,
            ink_color: [68.0, 107.0, 147.0],
            edge_color: [32.0, 36.0, 48.0],
            edge_overlay: true,
        }
    }
}

impl Tunable for HatchParams {
    fn describe(&self) -> Vec<ParamSpec> {
        let papers: Vec<&str> = PAPERS.iter().map(|(name, _)| *name).collect();
        vec![
            ParamSpec::choice("paper", &self.paper, &papers),
            ParamSpec::float("scale", self.scale, 0.1, 2.0),
            ParamSpec::float("thickness", self.thickness, 0.0, 1.0),
            ParamSpec::float("edge_thickness", self.edge_thickness, 0.0, 1.0),
            ParamSpec::float("noise_scale", self.noise_scale, 0.1, 1.0),
            ParamSpec::float("noisiness", self.noisiness, 0.0, 0.02),
            ParamSpec::float("edge_noisiness", self.edge_noisiness, 0.0, 0.02),
            ParamSpec::float("divergence", self.divergence, 0.0, 1.0),
            ParamSpec::float("angle", self.angle, 0.0, PI),
            ParamSpec::float("contour", self.contour, 0.0, 10.0),
            ParamSpec::color("ink_color", self.ink_color),
            ParamSpec::color("edge_color", self.edge_color),
            ParamSpec::toggle("edge_overlay", self.edge_overlay),
        ]
    }

    fn apply(&mut self, name: &str, value: ParamValue) -> Result<(), ParamError> {
        match name {
            "paper" => set_choice(&mut self.paper, name, value),
            "scale" => set_float(&mut self.scale, name, value),
            "thickness" => set_float(&mut self.thickness, name, value),
            "edge_thickness" => set_float(&mut self.edge_thickness, name, value),
            "noise_scale" => set_float(&mut self.noise_scale, name, value),
            "noisiness" => set_float(&mut self.noisiness, name, value),
            "edge_noisiness" => set_float(&mut self.edge_noisiness, name, value),
            "divergence" => set_float(&mut self.divergence, name, value),
            "angle" => set_float(&mut self.angle, name, value),
            "contour" => set_float(&mut self.contour, name, value),
            "ink_color" => set_color(&mut self.ink_color, name, value),
            "edge_color" => set_color(&mut self.edge_color, name, value),
            "edge_overlay" => set_toggle(&mut self.edge_overlay, name, value),
            _ => Err(ParamError::Unknown(name.to_string())),
        }
    }
}

/// GPU layout of [`HatchParams`], matching `struct Hatch` in `shaders/hatch.wgsl`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct HatchUniforms {
    pub ink_color: [f32; 4],
    pub edge_color: [f32; 4],
    pub scale: f32,
    pub thickness: f32,
    pub edge_thickness: f32,
    pub noise_scale: f32,
    pub noisiness: f32,
    pub edge_noisiness: f32,
    pub divergence: f32,
    pub angle: f32,
    pub contour: f32,
    pub edge_overlay: f32,
    pub _padding: [f32; 2],
}

impl From<&HatchParams> for HatchUniforms {
    fn from(p: &HatchParams) -> Self {
        let [ir, ig, ib] = p.ink_color;
        let [er, eg, eb] = p.edge_color;
        Self {
            ink_color: [ir, ig, ib, 255.0],
            edge_color: [er, eg, eb, 255.0],
            scale: p.scale,
            thickness: p.thickness,
            edge_thickness: p.edge_thickness,
            noise_scale: p.noise_scale,
            noisiness: p.noisiness,
            edge_noisiness: p.edge_noisiness,
            divergence: p.divergence,
            angle: p.angle,
            contour: p.contour,
            edge_overlay: if p.edge_overlay { 1.0 } else { 0.0 },
            _padding: [0.0; 2],
        }
    }
}

/// What a hatch bind group was built from.
///
/// Holding the textures keeps them alive while the bind group is cached, so pointer identity
/// cannot be reused by a later allocation.
#[derive(Debug)]
pub(crate) struct BindingKey<T> {
    pub color_generation: u64,
    pub normal_generation: u64,
    pub paper: Arc<T>,
    pub noise: Arc<T>,
}

impl<T> BindingKey<T> {
    pub fn same_as(&self, other: &Self) -> bool {
        self.color_generation == other.color_generation
            && self.normal_generation == other.normal_generation
            && Arc::ptr_eq(&self.paper, &other.paper)
            && Arc::ptr_eq(&self.noise, &other.noise)
    }
}

/// The hatching program run by a [`QuadPass`](crate::QuadPass).
///
/// Owns the parameter uniforms and the paper and noise textures. Until a paper is set, a
/// 1x1 white texture stands in, so the effect renders as ink on white.
pub struct HatchShader {
    params: HatchParams,
    uniform_buffer: wgpu::Buffer,
    layout: wgpu::BindGroupLayout,
    target_sampler: wgpu::Sampler,
    paper: Arc<Texture>,
    noise: Arc<Texture>,
    dirty: bool,
}

impl HatchShader {
    pub fn new(gpu: &GpuContext, params: HatchParams, noise: Arc<Texture>) -> Self {
        let device = &gpu.device;

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Hatch Uniforms"),
            size: std::mem::size_of::<HatchUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let sampler_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Hatch Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // color, normal, shared target sampler
                texture_entry(1),
                texture_entry(2),
                sampler_entry(3),
                // paper
                texture_entry(4),
                sampler_entry(5),
                // noise
                texture_entry(6),
                sampler_entry(7),
            ],
        });

        let target_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Hatch Target Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let paper = Arc::new(Texture::solid(gpu, [255, 255, 255, 255], "Blank Paper"));

        let mut shader = Self {
            params,
            uniform_buffer,
            layout,
            target_sampler,
            paper,
            noise,
            dirty: true,
        };
        shader.sync(gpu);
        shader
    }

    pub fn params(&self) -> &HatchParams {
        &self.params
    }

    /// Replace the parameters. They reach the GPU on the next [`sync`](Self::sync).
    pub fn set_params(&mut self, params: HatchParams) {
        self.params = params;
        self.dirty = true;
    }

    /// Apply one named parameter.
    pub fn apply(&mut self, name: &str, value: ParamValue) -> Result<(), ParamError> {
        self.params.apply(name, value)?;
        self.dirty = true;
        Ok(())
    }

    pub fn set_paper(&mut self, paper: Arc<Texture>) {
        self.paper = paper;
    }

    pub fn paper(&self) -> &Arc<Texture> {
        &self.paper
    }

    pub fn set_noise(&mut self, noise: Arc<Texture>) {
        self.noise = noise;
    }

    pub fn noise(&self) -> &Arc<Texture> {
        &self.noise
    }

    /// Upload the parameters if they changed since the last upload.
    pub fn sync(&mut self, gpu: &GpuContext) {
        if !self.dirty {
            return;
        }
        let uniforms = HatchUniforms::from(&self.params);
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));
        self.dirty = false;
    }

    /// Bind the two scene targets with the current paper and noise.
    pub fn bind_group(
        &self,
        gpu: &GpuContext,
        color: &RenderTarget,
        normal: &RenderTarget,
    ) -> wgpu::BindGroup {
        gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Hatch Bind Group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(color.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(normal.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.target_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&self.paper.view),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(&self.paper.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::TextureView(&self.noise.view),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: wgpu::BindingResource::Sampler(&self.noise.sampler),
                },
            ],
        })
    }
}

impl QuadShader for HatchShader {
    fn label(&self) -> &str {
        "Hatch"
    }

    fn fragment_source(&self) -> String {
        include_str!("../shaders/hatch.wgsl").to_string()
    }

    fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_tuned_look() {
        let p = HatchParams::default();
        assert_eq!(p.paper, "Craft light");
        assert_eq!((p.scale, p.noise_scale, p.angle, p.divergence), (0.5, 0.72, 2.0, 1.0));
        assert_eq!((p.thickness, p.contour, p.noisiness), (0.72, 1.2, 0.007));
        assert_eq!(p.ink_color, [68.0, 107.0, 147.0]);
        assert!(p.edge_overlay);
    }

    #[test]
    fn describe_lists_every_field_with_its_value() {
        let p = HatchParams::default();
        let specs = p.describe();
        assert_eq!(specs.len(), 13);
        for spec in &specs {
            assert_eq!(p.get(spec.name), Some(spec.value.clone()));
        }
        let angle = specs.iter().find(|s| s.name == "angle").unwrap();
        assert_eq!(angle.range, crate::params::ParamRange::Float { min: 0.0, max: PI });
    }

    #[test]
    fn apply_writes_values_verbatim() {
        let mut p = HatchParams::default();
        p.apply("scale", ParamValue::Float(7.5)).unwrap();
        assert_eq!(p.scale, 7.5);

        p.apply("ink_color", ParamValue::from_unit_color([1.0, 0.0, 0.5])).unwrap();
        assert_eq!(p.ink_color, [255.0, 0.0, 127.5]);

        p.apply("paper", ParamValue::Choice("Parchment".into())).unwrap();
        assert_eq!(p.paper, "Parchment");

        assert_eq!(
            p.apply("sharpness", ParamValue::Float(1.0)),
            Err(ParamError::Unknown("sharpness".into()))
        );
        assert!(p.apply("edge_overlay", ParamValue::Float(1.0)).is_err());
    }

    #[test]
    fn uniforms_pack_to_wgsl_layout() {
        assert_eq!(std::mem::size_of::<HatchUniforms>(), 80);
        let u = HatchUniforms::from(&HatchParams {
            edge_overlay: false,
            ..Default::default()
        });
        assert_eq!(u.ink_color, [68.0, 107.0, 147.0, 255.0]);
        assert_eq!(u.edge_overlay, 0.0);
    }

    #[test]
    fn params_read_from_partial_toml() {
        let p: HatchParams = toml::from_str("scale = 1.5\nedge_overlay = false\n").unwrap();
        assert_eq!(p.scale, 1.5);
        assert!(!p.edge_overlay);
        assert_eq!(p.contour, 1.2);
    }

    #[test]
    fn binding_key_tracks_reallocations_and_swaps() {
        let (paper, noise) = (Arc::new(1u8), Arc::new(2u8));
        let key = |color_generation, paper: &Arc<u8>, noise: &Arc<u8>| BindingKey {
            color_generation,
            normal_generation: 0,
            paper: paper.clone(),
            noise: noise.clone(),
        };
        let cached = key(0, &paper, &noise);

        assert!(cached.same_as(&key(0, &paper, &noise)));
        assert!(!cached.same_as(&key(1, &paper, &noise)));
        assert!(!cached.same_as(&key(0, &Arc::new(1u8), &noise)));
        assert!(!cached.same_as(&key(0, &paper, &Arc::new(2u8))));
        assert!(!cached.same_as(&BindingKey {
            normal_generation: 3,
            ..key(0, &paper, &noise)
        }));
    }

}
