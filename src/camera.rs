//! Scene and pass cameras.
//!
//! [`PerspectiveCamera`] views the 3D scene. [`OrthoCamera`] frames the full-screen quad of a
//! [`QuadPass`](crate::QuadPass) so that one quad unit maps to one output pixel.
//!
//! Both produce wgpu-convention projections (depth in `[0, 1]`) through glam's `_rh`
//! constructors.

use glam::{Mat4, Vec3};

/// A perspective camera looking at a target point.
#[derive(Clone, Copy, Debug)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(5.0, 5.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov: 60f32.to_radians(),
            aspect: 1.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl PerspectiveCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, position: impl Into<Vec3>) -> Self {
        self.position = position.into();
        self
    }

    pub fn looking_at(mut self, target: impl Into<Vec3>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_fov(mut self, fov_degrees: f32) -> Self {
        self.fov = fov_degrees.to_radians();
        self
    }

    /// Update the aspect ratio from a viewport size. Zero heights are treated as 1.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    /// Unit vector from the camera toward its target.
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or(Vec3::NEG_Z)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

/// An orthographic camera defined by its six clipping planes.
///
/// The camera sits at `(0, 0, 1)` looking down `-Z`, so geometry on the `z = 0` plane lies
/// between `near` and `far`. After changing any plane, call
/// [`update_projection_matrix`](Self::update_projection_matrix).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrthoCamera {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub near: f32,
    pub far: f32,
    projection: Mat4,
}

impl OrthoCamera {
    /// Distance from the camera to the `z = 0` plane.
    pub const EYE_Z: f32 = 1.0;

    pub fn new(left: f32, right: f32, top: f32, bottom: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            left,
            right,
            top,
            bottom,
            near,
            far,
            projection: Mat4::IDENTITY,
        };
        camera.update_projection_matrix();
        camera
    }

    /// A camera framing a `width` x `height` rectangle centered on the origin.
    pub fn framing(width: f32, height: f32) -> Self {
        Self::new(
            -width / 2.0,
            width / 2.0,
            height / 2.0,
            -height / 2.0,
            0.00001,
            1000.0,
        )
    }

    /// Set the four side planes to frame `width` x `height` and recompute the projection.
    pub fn frame(&mut self, width: f32, height: f32) {
        self.left = -width / 2.0;
        self.right = width / 2.0;
        self.top = height / 2.0;
        self.bottom = -height / 2.0;
        self.update_projection_matrix();
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection =
            Mat4::orthographic_rh(self.left, self.right, self.bottom, self.top, self.near, self.far);
    }

    /// The four side planes as `(left, right, top, bottom)`.
    pub fn planes(&self) -> (f32, f32, f32, f32) {
        (self.left, self.right, self.top, self.bottom)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(Vec3::new(0.0, 0.0, Self::EYE_Z), Vec3::ZERO, Vec3::Y)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn ortho_framing_sets_planes() {
        let camera = OrthoCamera::framing(800.0, 600.0);
        assert_eq!(camera.planes(), (-400.0, 400.0, 300.0, -300.0));
    }

    #[test]
    fn ortho_corners_reach_clip_edges() {
        let mut camera = OrthoCamera::framing(1.0, 1.0);
        camera.frame(640.0, 480.0);

        let corner = camera.view_projection() * Vec4::new(320.0, 240.0, 0.0, 1.0);
        assert!((corner.x - 1.0).abs() < 1e-5);
        assert!((corner.y - 1.0).abs() < 1e-5);
        assert!(corner.z > 0.0 && corner.z < 1.0);

        let corner = camera.view_projection() * Vec4::new(-320.0, -240.0, 0.0, 1.0);
        assert!((corner.x + 1.0).abs() < 1e-5);
        assert!((corner.y + 1.0).abs() < 1e-5);
    }

    #[test]
    fn perspective_aspect_ignores_zero_height() {
        let mut camera = PerspectiveCamera::new();
        camera.set_viewport(300, 0);
        assert_eq!(camera.aspect, 300.0);
    }

    #[test]
    fn perspective_keeps_target_in_front() {
        let camera = PerspectiveCamera::new().at([0.0, 0.0, 5.0]).looking_at([0.0, 0.0, 0.0]);
        let clip = camera.view_projection() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }
}
