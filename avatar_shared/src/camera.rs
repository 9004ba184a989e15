//! Third-person camera.
//!
//! The canonical policy is a spherical orbit around the character driven by
//! captured pointer deltas:
//!
//! ```text
//! pos = target + r * (sin(e) * sin(a), cos(e), sin(e) * cos(a))
//! ```
//!
//! where `a` is azimuth around +Y and `e` is measured down from the pole, so
//! the elevation clamp keeps the camera above the ground plane and off the pole.
//! Two simpler follow styles are kept as selectable policies.

use std::f32::consts::{FRAC_PI_2, TAU};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::CameraConfig,
    input::{InputState, LookDelta},
    math::{Mat4, Vec3},
};

/// How the camera follows its target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CameraPolicy {
    /// Spherical orbit steered by pointer look.
    #[default]
    Orbit,
    /// Rigid offset from the target; pointer look is ignored.
    FixedFollow { offset: Vec3 },
    /// Orbit position approached by a fixed fraction each tick.
    SmoothChase { smoothing: f32 },
}

impl CameraPolicy {
    pub fn fixed_follow() -> Self {
        Self::FixedFollow {
            offset: Vec3::new(0.0, 5.0, 10.0),
        }
    }

    pub fn smooth_chase() -> Self {
        Self::SmoothChase { smoothing: 0.1 }
    }
}

/// Camera state read by the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub azimuth: f32,
    pub elevation: f32,
    pub radius: f32,
    pub position: Vec3,
    /// Point the camera looked at on the last update.
    pub target: Vec3,
    pub aspect: f32,
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Creates a camera already placed on its orbit around `target`.
    pub fn new(cfg: &CameraConfig, target: Vec3) -> Self {
        let [w, h] = cfg.viewport;
        let mut camera = Self {
            azimuth: cfg.initial_azimuth,
            elevation: cfg.initial_elevation,
            radius: cfg.radius,
            position: target,
            target,
            aspect: aspect_of(w, h).unwrap_or(16.0 / 9.0),
            fov_y_deg: cfg.fov_y_deg,
            near: cfg.near,
            far: cfg.far,
        };
        camera.position = match cfg.policy {
            CameraPolicy::FixedFollow { offset } => target + offset,
            CameraPolicy::Orbit | CameraPolicy::SmoothChase { .. } => camera.orbit_position(target),
        };
        camera
    }

    /// Position on the orbit sphere for the current angles.
    pub fn orbit_position(&self, target: Vec3) -> Vec3 {
        let (sin_e, cos_e) = self.elevation.sin_cos();
        let (sin_a, cos_a) = self.azimuth.sin_cos();
        target + Vec3::new(sin_e * sin_a, cos_e, sin_e * cos_a) * self.radius
    }

    /// Horizontal unit vector pointing away from the camera, through `subject`.
    ///
    /// Falls back to the azimuth direction when the camera sits directly above
    /// the subject.
    pub fn forward_basis(&self, subject: Vec3) -> Vec3 {
        let away = (subject - self.position).horizontal();
        if away.len_sq() > 1e-8 {
            away.normalize_or_zero()
        } else {
            Vec3::new(-self.azimuth.sin(), 0.0, -self.azimuth.cos())
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_deg.to_radians(), self.aspect, self.near, self.far)
    }

    /// Updates the aspect ratio. Zero-sized viewports are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if let Some(aspect) = aspect_of(width, height) {
            self.aspect = aspect;
        }
    }
}

fn aspect_of(width: u32, height: u32) -> Option<f32> {
    (width > 0 && height > 0).then(|| width as f32 / height as f32)
}

/// Applies pointer look and keeps the camera aimed at its target.
#[derive(Debug, Clone)]
pub struct CameraController {
    policy: CameraPolicy,
    sensitivity: f32,
    min_elevation: f32,
    max_elevation: f32,
}

impl CameraController {
    pub fn new(cfg: &CameraConfig) -> Self {
        Self {
            policy: cfg.policy,
            sensitivity: cfg.sensitivity,
            min_elevation: cfg.elevation_margin,
            max_elevation: FRAC_PI_2 - cfg.elevation_margin,
        }
    }

    pub fn policy(&self) -> CameraPolicy {
        self.policy
    }

    /// Elevation bounds the controller enforces.
    pub fn elevation_range(&self) -> (f32, f32) {
        (self.min_elevation, self.max_elevation)
    }

    /// Rotates the orbit by a pointer delta.
    ///
    /// Non-finite deltas are dropped. Azimuth is wrapped into `[0, TAU)`.
    pub fn apply_look(&self, camera: &mut Camera, delta: LookDelta) {
        if delta.is_zero() || !delta.dx.is_finite() || !delta.dy.is_finite() {
            return;
        }
        camera.azimuth = (camera.azimuth - delta.dx * self.sensitivity).rem_euclid(TAU);
        // Not `clamp`: bounds from an unvalidated config may be inverted.
        camera.elevation = (camera.elevation - delta.dy * self.sensitivity)
            .max(self.min_elevation)
            .min(self.max_elevation);
    }

    /// One tick: consume look input, reposition, re-aim at `target`.
    pub fn step(&self, camera: &mut Camera, input: &mut InputState, target: Vec3) {
        let look = input.take_look_delta();
        match self.policy {
            CameraPolicy::Orbit => {
                self.apply_look(camera, look);
                camera.position = camera.orbit_position(target);
            }
            CameraPolicy::SmoothChase { smoothing } => {
                self.apply_look(camera, look);
                let desired = camera.orbit_position(target);
                camera.position = camera.position.lerp(desired, smoothing);
            }
            CameraPolicy::FixedFollow { offset } => {
                if !look.is_zero() {
                    debug!(dx = look.dx, dy = look.dy, "Look input ignored by fixed camera");
                }
                camera.position = target + offset;
            }
        }
        camera.target = target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orbit_setup() -> (CameraController, Camera, InputState) {
        let cfg = CameraConfig::default();
        let controller = CameraController::new(&cfg);
        let camera = Camera::new(&cfg, Vec3::new(0.0, 0.5, 0.0));
        let mut input = InputState::default();
        input.set_pointer_locked(true);
        (controller, camera, input)
    }

    #[test]
    fn orbit_position_matches_spherical_formula() {
        let (controller, mut camera, mut input) = orbit_setup();
        let target = Vec3::new(1.0, 0.5, -2.0);
        controller.step(&mut camera, &mut input, target);

        let e = std::f32::consts::FRAC_PI_4;
        let expected = target + Vec3::new(0.0, e.cos(), e.sin()) * 10.0;
        assert!(camera.position.distance(expected) < 1e-5);
        assert_eq!(camera.target, target);
        assert!((camera.position.distance(target) - 10.0).abs() < 1e-4);
    }

    #[test]
    fn elevation_clamped_for_huge_inputs() {
        let (controller, mut camera, mut input) = orbit_setup();
        let (lo, hi) = controller.elevation_range();

        input.pointer_moved(0.0, 1.0e9);
        controller.step(&mut camera, &mut input, Vec3::ZERO);
        assert_eq!(camera.elevation, lo);

        input.pointer_moved(0.0, -1.0e9);
        controller.step(&mut camera, &mut input, Vec3::ZERO);
        assert_eq!(camera.elevation, hi);
        assert!(camera.position.y > 0.0);
    }

    #[test]
    fn inverted_elevation_bounds_do_not_panic() {
        let cfg = CameraConfig {
            elevation_margin: 0.8,
            ..CameraConfig::default()
        };
        let controller = CameraController::new(&cfg);
        let mut camera = Camera::new(&cfg, Vec3::ZERO);
        controller.apply_look(&mut camera, LookDelta { dx: 1.0, dy: 1.0 });
        assert!(camera.elevation.is_finite());
    }

    #[test]
    fn non_finite_look_is_dropped() {
        let (controller, mut camera, _) = orbit_setup();
        let before = camera.clone();
        controller.apply_look(
            &mut camera,
            LookDelta {
                dx: f32::NAN,
                dy: f32::INFINITY,
            },
        );
        assert_eq!(camera, before);
    }

    #[test]
    fn look_ignored_without_pointer_lock() {
        let (controller, mut camera, mut input) = orbit_setup();
        input.set_pointer_locked(false);
        input.pointer_moved(300.0, 300.0);
        let (a, e) = (camera.azimuth, camera.elevation);
        controller.step(&mut camera, &mut input, Vec3::ZERO);
        assert_eq!((camera.azimuth, camera.elevation), (a, e));
    }

    #[test]
    fn moving_pointer_right_decreases_azimuth() {
        let (controller, mut camera, mut input) = orbit_setup();
        camera.azimuth = 1.0;
        input.pointer_moved(100.0, 0.0);
        controller.step(&mut camera, &mut input, Vec3::ZERO);
        assert!((camera.azimuth - 0.8).abs() < 1e-6);
    }

    #[test]
    fn fixed_follow_keeps_offset() {
        let cfg = CameraConfig {
            policy: CameraPolicy::fixed_follow(),
            ..CameraConfig::default()
        };
        let controller = CameraController::new(&cfg);
        let mut camera = Camera::new(&cfg, Vec3::ZERO);
        let mut input = InputState::default();
        input.set_pointer_locked(true);
        input.pointer_moved(50.0, 50.0);

        let target = Vec3::new(3.0, 0.5, 3.0);
        controller.step(&mut camera, &mut input, target);
        assert_eq!(camera.position, target + Vec3::new(0.0, 5.0, 10.0));
        assert_eq!(camera.elevation, cfg.initial_elevation);
    }

    #[test]
    fn smooth_chase_approaches_desired_position() {
        let cfg = CameraConfig {
            policy: CameraPolicy::smooth_chase(),
            ..CameraConfig::default()
        };
        let controller = CameraController::new(&cfg);
        let mut camera = Camera::new(&cfg, Vec3::ZERO);
        let mut input = InputState::default();

        let target = Vec3::new(20.0, 0.5, 0.0);
        let desired = camera.orbit_position(target);
        let mut last = camera.position.distance(desired);
        for _ in 0..30 {
            controller.step(&mut camera, &mut input, target);
            let d = camera.position.distance(desired);
            assert!(d < last);
            last = d;
        }
        assert_eq!(camera.target, target);
    }

    #[test]
    fn forward_basis_points_away_from_camera() {
        let (_, camera, _) = orbit_setup();
        // Azimuth 0 puts the camera on +Z, so forward is -Z.
        let f = camera.forward_basis(Vec3::new(0.0, 0.5, 0.0));
        assert!(f.distance(Vec3::new(0.0, 0.0, -1.0)) < 1e-5);
    }

    #[test]
    fn resize_updates_aspect_and_ignores_zero_height() {
        let (_, mut camera, _) = orbit_setup();
        camera.resize(800, 400);
        assert_eq!(camera.aspect, 2.0);
        camera.resize(800, 0);
        assert_eq!(camera.aspect, 2.0);
    }
}
