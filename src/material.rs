//! Surface materials and scene lighting.

use crate::library::ENVIRONMENTS;
use crate::params::{ParamError, ParamSpec, ParamValue, Tunable, set_choice, set_float};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// A physically-flavored lit surface.
///
/// `color` is linear RGB in `[0, 1]`. Roughness and metalness blend the diffuse term with
/// reflections of the scene's environment map, when one is set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StandardMaterial {
    pub color: [f32; 3],
    pub roughness: f32,
    pub metalness: f32,
}

impl Default for StandardMaterial {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            roughness: 1.0,
            metalness: 0.0,
        }
    }
}

impl StandardMaterial {
    pub fn new(color: [f32; 3]) -> Self {
        Self {
            color,
            ..Default::default()
        }
    }

    pub fn roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness.clamp(0.0, 1.0);
        self
    }

    pub fn metalness(mut self, metalness: f32) -> Self {
        self.metalness = metalness.clamp(0.0, 1.0);
        self
    }
}

/// How a renderable is shaded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Material {
    Standard(StandardMaterial),
    /// View-space normal encoded as `n * 0.5 + 0.5`, both faces drawn.
    Normal,
}

impl Default for Material {
    fn default() -> Self {
        Material::Standard(StandardMaterial::default())
    }
}

impl From<StandardMaterial> for Material {
    fn from(material: StandardMaterial) -> Self {
        Material::Standard(material)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels, world space.
    pub direction: Vec3,
    pub color: [f32; 3],
    pub intensity: f32,
}

/// Ambient plus an optional directional light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lighting {
    pub ambient: [f32; 3],
    pub ambient_intensity: f32,
    pub directional: Option<DirectionalLight>,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient: [1.0, 1.0, 1.0],
            ambient_intensity: 0.35,
            directional: Some(DirectionalLight {
                direction: Vec3::new(-1.0, -2.0, -1.5).normalize(),
                color: [1.0, 1.0, 1.0],
                intensity: 0.9,
            }),
        }
    }
}

impl Lighting {
    /// Flat ambient light only.
    pub fn ambient(color: [f32; 3], intensity: f32) -> Self {
        Self {
            ambient: color,
            ambient_intensity: intensity,
            directional: None,
        }
    }

    /// Premultiplied ambient color.
    pub fn ambient_radiance(&self) -> [f32; 3] {
        self.ambient.map(|c| c * self.ambient_intensity)
    }
}

/// The tunable part of the scene's standard materials.
///
/// `environment` names an entry of the environment library, or is empty for none.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceParams {
    pub environment: String,
    pub roughness: f32,
    pub metalness: f32,
}

impl Default for SurfaceParams {
    fn default() -> Self {
        Self {
            environment: ENVIRONMENTS[0].0.to_string(),
            roughness: 0.2,
            metalness: 0.1,
        }
    }
}

impl SurfaceParams {
    /// Copy roughness and metalness onto `material`.
    pub fn apply_to(&self, material: &mut StandardMaterial) {
        material.roughness = self.roughness.clamp(0.0, 1.0);
        material.metalness = self.metalness.clamp(0.0, 1.0);
    }
}

impl Tunable for SurfaceParams {
    fn describe(&self) -> Vec<ParamSpec> {
        let environments: Vec<&str> = ENVIRONMENTS.iter().map(|(name, ..)| *name).collect();
        vec![
            ParamSpec::choice("environment", &self.environment, &environments),
            ParamSpec::float("roughness", self.roughness, 0.0, 1.0),
            ParamSpec::float("metalness", self.metalness, 0.0, 1.0),
        ]
    }

    fn apply(&mut self, name: &str, value: ParamValue) -> Result<(), ParamError> {
        match name {
            "environment" => set_choice(&mut self.environment, name, value),
            "roughness" => set_float(&mut self.roughness, name, value),
            "metalness" => set_float(&mut self.metalness, name, value),
            _ => Err(ParamError::Unknown(name.to_string())),
        }
    }
}
