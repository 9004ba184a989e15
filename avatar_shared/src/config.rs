//! Configuration system.
//!
//! Loads demo configuration from JSON strings/files. Every field has a default
//! equal to the tuned constants, so a partial file (or `{}`) is valid.
//!
//! The movement constants are per-tick quantities tuned for a display refresh
//! cadence; they are not scaled by elapsed time.

use std::f32::consts::FRAC_PI_4;
use std::path::Path;

use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};

use crate::{camera::CameraPolicy, interaction::ProximityPolicy, math::Vec3};

/// Root configuration for a demo session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub movement: MovementConfig,
    pub camera: CameraConfig,
    pub interaction: InteractionConfig,
    #[serde(rename = "loop")]
    pub frame_loop: LoopConfig,
}

/// Character movement and vertical physics constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// World units moved per tick while a direction key is held.
    pub move_speed: f32,
    /// Vertical velocity applied on jump.
    pub jump_power: f32,
    /// Added to vertical velocity every airborne tick (negative pulls down).
    pub gravity: f32,
    /// Resting height of the character's centre.
    pub ground_level: f32,
    /// Tolerance above `ground_level` that still counts as standing.
    pub ground_epsilon: f32,
    /// Where the character appears when the scene is set up.
    pub spawn: Vec3,
    /// Cosmetic tumble per moving tick, radians (x axis, z axis).
    pub spin_step: [f32; 2],
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            move_speed: 0.8,
            jump_power: 0.8,
            gravity: -0.04,
            ground_level: 0.5,
            ground_epsilon: 0.01,
            spawn: Vec3::new(-25.0, 0.51, -45.0),
            spin_step: [0.2, 0.1],
        }
    }
}

/// Camera constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub policy: CameraPolicy,
    pub radius: f32,
    /// Radians per pointer-delta unit.
    pub sensitivity: f32,
    pub initial_azimuth: f32,
    pub initial_elevation: f32,
    /// Elevation is kept in `[margin, PI/2 - margin]`.
    pub elevation_margin: f32,
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
    pub viewport: [u32; 2],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            policy: CameraPolicy::Orbit,
            radius: 10.0,
            sensitivity: 0.002,
            initial_azimuth: 0.0,
            initial_elevation: std::f32::consts::FRAC_PI_4,
            elevation_margin: 0.05,
            fov_y_deg: 75.0,
            near: 0.1,
            far: 1000.0,
            viewport: [1280, 720],
        }
    }
}

/// Proximity interaction constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Radius given to objects that do not specify their own.
    pub default_radius: f32,
    pub policy: ProximityPolicy,
    /// Emissive colour applied to a highlighted marker.
    pub highlight_emissive: u32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            default_radius: 2.5,
            policy: ProximityPolicy::LastMatch,
            highlight_emissive: 0x333333,
        }
    }
}

/// Headless frame loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Display refresh rate the loop is paced to.
    pub refresh_hz: u32,
    /// Stop after this many ticks (`None` runs until disposed).
    pub max_frames: Option<u64>,
    /// Seed for decorative scatter.
    pub scatter_seed: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            refresh_hz: 60,
            max_frames: None,
            scatter_seed: 7,
        }
    }
}

impl DemoConfig {
    /// Parses and validates config from JSON.
    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        let cfg: Self = serde_json::from_str(s).context("malformed config JSON")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Rejects values the controllers cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let m = &self.movement;
        ensure!(
            m.jump_power.is_finite() && m.jump_power > 0.0,
            "movement.jump_power must be positive, got {}",
            m.jump_power
        );
        ensure!(
            m.gravity.is_finite() && m.gravity < 0.0,
            "movement.gravity must be negative, got {}",
            m.gravity
        );
        ensure!(
            m.move_speed.is_finite() && m.move_speed >= 0.0,
            "movement.move_speed must be non-negative, got {}",
            m.move_speed
        );
        ensure!(
            m.ground_level.is_finite() && m.ground_epsilon.is_finite() && m.ground_epsilon >= 0.0,
            "movement.ground_level/ground_epsilon must be finite with epsilon >= 0"
        );

        let c = &self.camera;
        ensure!(
            (0.0..FRAC_PI_4).contains(&c.elevation_margin),
            "camera.elevation_margin must be in [0, PI/4), got {}",
            c.elevation_margin
        );
        ensure!(
            c.radius.is_finite() && c.radius > 0.0,
            "camera.radius must be positive, got {}",
            c.radius
        );
        ensure!(
            c.sensitivity.is_finite(),
            "camera.sensitivity must be finite, got {}",
            c.sensitivity
        );
        if let CameraPolicy::SmoothChase { smoothing } = c.policy {
            ensure!(
                (0.0..=1.0).contains(&smoothing) && smoothing > 0.0,
                "camera.policy.smooth_chase.smoothing must be in (0, 1], got {smoothing}"
            );
        }

        let r = self.interaction.default_radius;
        ensure!(
            r.is_finite() && r >= 0.0,
            "interaction.default_radius must be non-negative, got {r}"
        );
        Ok(())
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parse config {}", path.display()))
    }
}
