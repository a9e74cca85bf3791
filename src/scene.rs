//! The 3D scene: an ECS world of renderables plus lights, background and environment.
//!
//! Entities carrying a [`Transform`] and a [`Renderable`] are drawn by
//! [`ScenePass`](crate::ScenePass). A scene-wide material override replaces every
//! renderable's material for the duration of one scoped render; the normal pass of
//! [`HatchPost`](crate::HatchPost) relies on it.
//!
//! ```ignore
//! let mut scene = Scene::new();
//! let cube = scene.add_mesh(&gpu, &MeshData::cube());
//! scene.spawn(cube, StandardMaterial::new([0.8, 0.2, 0.2]).into(), Transform::new());
//!
//! scene.with_override(Material::Normal, |scene| {
//!     // every renderable draws with Material::Normal here
//! });
//! ```

use crate::gpu::GpuContext;
use crate::material::{Lighting, Material};
use crate::mesh::{Mesh, MeshData, Transform};
use crate::texture::Texture;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Type-safe handle to a mesh stored in a [`Scene`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(pub(crate) usize);

/// Component for rendering a mesh on an entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Renderable {
    pub mesh: MeshId,
    pub material: Material,
}

pub struct Scene {
    pub world: hecs::World,
    meshes: Vec<Mesh>,
    pub lighting: Lighting,
    /// Background, linear RGBA.
    pub clear_color: [f32; 4],
    /// Cube map reflected by standard materials.
    pub environment: Option<Arc<Texture>>,
    override_material: Option<Material>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// An empty scene on a white background.
    pub fn new() -> Self {
        Self {
            world: hecs::World::new(),
            meshes: Vec::new(),
            lighting: Lighting::default(),
            clear_color: [1.0, 1.0, 1.0, 1.0],
            environment: None,
            override_material: None,
        }
    }

    pub fn add_mesh(&mut self, gpu: &GpuContext, data: &MeshData) -> MeshId {
        self.meshes.push(data.upload(gpu));
        MeshId(self.meshes.len() - 1)
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id.0)
    }

    pub fn spawn(&mut self, mesh: MeshId, material: Material, transform: Transform) -> hecs::Entity {
        self.world.spawn((transform, Renderable { mesh, material }))
    }

    /// The active override, if a scoped override is in progress.
    pub fn override_material(&self) -> Option<Material> {
        self.override_material
    }

    /// The material a renderable is drawn with right now.
    pub fn effective_material(&self, renderable: &Renderable) -> Material {
        self.override_material.unwrap_or(renderable.material)
    }

    /// Replace every renderable's material until the returned guard drops.
    ///
    /// The previous override (usually none) is restored on drop, including during unwinding.
    pub fn push_override(&mut self, material: Material) -> OverrideGuard<'_> {
        let previous = self.override_material.replace(material);
        OverrideGuard {
            scene: self,
            previous,
        }
    }

    /// Run `f` with every renderable drawn as `material`.
    pub fn with_override<R>(&mut self, material: Material, f: impl FnOnce(&mut Scene) -> R) -> R {
        let mut guard = self.push_override(material);
        f(&mut *guard)
    }

    /// Apply a standard-material edit to every renderable that uses one.
    pub fn for_each_standard(&mut self, mut f: impl FnMut(&mut crate::StandardMaterial)) {
        for (_, renderable) in self.world.query_mut::<&mut Renderable>() {
            if let Material::Standard(material) = &mut renderable.material {
                f(material);
            }
        }
    }
}

/// Restores the scene's previous material override when dropped.
pub struct OverrideGuard<'a> {
    scene: &'a mut Scene,
    previous: Option<Material>,
}

impl Deref for OverrideGuard<'_> {
    type Target = Scene;

    fn deref(&self) -> &Scene {
        self.scene
    }
}

impl DerefMut for OverrideGuard<'_> {
    fn deref_mut(&mut self) -> &mut Scene {
        self.scene
    }
}

impl Drop for OverrideGuard<'_> {
    fn drop(&mut self) {
        self.scene.override_material = self.previous.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::StandardMaterial;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    fn scene_with_entity() -> Scene {
        let mut scene = Scene::new();
        scene.spawn(
            MeshId(0),
            StandardMaterial::new([0.2, 0.4, 0.6]).into(),
            Transform::new(),
        );
        scene
    }

    #[test]
    fn override_applies_inside_scope_only() {
        let mut scene = scene_with_entity();
        let renderable = Renderable {
            mesh: MeshId(0),
            material: StandardMaterial::default().into(),
        };

        scene.with_override(Material::Normal, |scene| {
            assert_eq!(scene.override_material(), Some(Material::Normal));
            assert_eq!(scene.effective_material(&renderable), Material::Normal);
        });

        assert_eq!(scene.override_material(), None);
        assert_eq!(scene.effective_material(&renderable), renderable.material);
    }

    #[test]
    fn override_restored_after_error() {
        let mut scene = scene_with_entity();
        let result: Result<(), &str> = scene.with_override(Material::Normal, |_| Err("draw failed"));
        assert!(result.is_err());
        assert_eq!(scene.override_material(), None);
    }

    #[test]
    fn override_restored_after_panic() {
        let mut scene = scene_with_entity();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            scene.with_override::<()>(Material::Normal, |_| panic!("shader exploded"));
        }));
        assert!(outcome.is_err());
        assert_eq!(scene.override_material(), None);
    }

    #[test]
    fn nested_overrides_unwind_in_order() {
        let mut scene = Scene::new();
        let outer = Material::Standard(StandardMaterial::new([1.0, 0.0, 0.0]));
        scene.with_override(outer, |scene| {
            scene.with_override(Material::Normal, |scene| {
                assert_eq!(scene.override_material(), Some(Material::Normal));
            });
            assert_eq!(scene.override_material(), Some(outer));
        });
        assert_eq!(scene.override_material(), None);
    }

    #[test]
    fn standard_edits_reach_every_renderable() {
        let mut scene = scene_with_entity();
        scene.spawn(MeshId(0), Material::Normal, Transform::new());
        scene.for_each_standard(|m| m.roughness = 0.9);

        let mut roughness = Vec::new();
        for (_, r) in scene.world.query_mut::<&Renderable>() {
            if let Material::Standard(m) = r.material {
                roughness.push(m.roughness);
            }
        }
        assert_eq!(roughness, vec![0.9]);
    }
}
