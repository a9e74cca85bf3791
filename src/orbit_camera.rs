use glam::{Vec2, Vec3};
use std::f32::consts::FRAC_PI_2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

use crate::camera::PerspectiveCamera;

const ELEVATION_LIMIT: f32 = FRAC_PI_2 - 0.01;

/// Orbits a [`PerspectiveCamera`] around its target: left-drag rotates, the wheel zooms.
///
/// ```ignore
/// let mut orbit = OrbitCamera::from_camera(&camera);
///
/// // In the event handler:
/// if orbit.handle_event(&event) {
///     orbit.apply(&mut camera);
/// }
/// ```
#[derive(Clone, Debug)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    /// Horizontal angle in radians, 0 looking down -Z.
    pub azimuth: f32,
    /// Vertical angle in radians.
    pub elevation: f32,
    pub sensitivity: f32,
    pub zoom_sensitivity: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    dragging: bool,
    cursor: Option<Vec2>,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 5.0,
            azimuth: 0.0,
            elevation: 0.3,
            sensitivity: 0.005,
            zoom_sensitivity: 0.5,
            min_distance: 0.5,
            max_distance: 50.0,
            dragging: false,
            cursor: None,
        }
    }
}

impl OrbitCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from wherever `camera` currently sits relative to its target.
    pub fn from_camera(camera: &PerspectiveCamera) -> Self {
        let offset = camera.position - camera.target;
        let distance = offset.length().max(f32::EPSILON);
        Self {
            target: camera.target,
            distance,
            azimuth: offset.x.atan2(offset.z),
            elevation: (offset.y / distance).clamp(-1.0, 1.0).asin(),
            ..Self::default()
        }
    }

    pub fn distance_limits(mut self, min: f32, max: f32) -> Self {
        self.min_distance = min;
        self.max_distance = max;
        self.distance = self.distance.clamp(min, max);
        self
    }

    /// Rotate by a cursor movement in pixels.
    pub fn rotate(&mut self, delta: Vec2) {
        self.azimuth -= delta.x * self.sensitivity;
        self.elevation = (self.elevation + delta.y * self.sensitivity)
            .clamp(-ELEVATION_LIMIT, ELEVATION_LIMIT);
    }

    /// Move toward the target by `lines` wheel steps.
    pub fn zoom(&mut self, lines: f32) {
        self.distance = (self.distance - lines * self.zoom_sensitivity)
            .clamp(self.min_distance, self.max_distance);
    }

    /// Feed a window event. Returns true when the orbit moved.
    pub fn handle_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.dragging = *state == ElementState::Pressed;
                false
            }
            WindowEvent::CursorMoved { position, .. } => {
                let position = Vec2::new(position.x as f32, position.y as f32);
                let previous = self.cursor.replace(position);
                match previous {
                    Some(previous) if self.dragging => {
                        self.rotate(position - previous);
                        true
                    }
                    _ => false,
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 120.0,
                };
                self.zoom(lines);
                true
            }
            _ => false,
        }
    }

    pub fn position(&self) -> Vec3 {
        let offset = Vec3::new(
            self.distance * self.elevation.cos() * self.azimuth.sin(),
            self.distance * self.elevation.sin(),
            self.distance * self.elevation.cos() * self.azimuth.cos(),
        );
        self.target + offset
    }

    /// Move `camera` onto the orbit, keeping its lens settings.
    pub fn apply(&self, camera: &mut PerspectiveCamera) {
        camera.position = self.position();
        camera.target = self.target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_camera_keeps_the_position() {
        let camera = PerspectiveCamera::default();
        let orbit = OrbitCamera::from_camera(&camera);
        assert!((orbit.position() - camera.position).length() < 1e-4);
        assert!((orbit.distance - 75f32.sqrt()).abs() < 1e-4);
    }

    #[test]
    fn elevation_stops_short_of_the_poles() {
        let mut orbit = OrbitCamera::new();
        orbit.rotate(Vec2::new(0.0, 1.0e6));
        assert_eq!(orbit.elevation, ELEVATION_LIMIT);
        orbit.rotate(Vec2::new(0.0, -1.0e7));
        assert_eq!(orbit.elevation, -ELEVATION_LIMIT);
    }

    #[test]
    fn zoom_respects_limits() {
        let mut orbit = OrbitCamera::new().distance_limits(1.0, 10.0);
        orbit.zoom(100.0);
        assert_eq!(orbit.distance, 1.0);
        orbit.zoom(-100.0);
        assert_eq!(orbit.distance, 10.0);
    }

    #[test]
    fn apply_moves_only_position_and_target() {
        let mut camera = PerspectiveCamera::default();
        let fov = camera.fov;
        let mut orbit = OrbitCamera::from_camera(&camera);
        orbit.rotate(Vec2::new(100.0, 0.0));
        orbit.apply(&mut camera);
        assert_eq!(camera.fov, fov);
        assert!((camera.position.length() - 75f32.sqrt()).abs() < 1e-4);
        assert!((camera.position.y - 5.0).abs() < 1e-4);
    }
}
