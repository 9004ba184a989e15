//! Character controller.
//!
//! Horizontal movement is resolved against the camera: "forward" pushes the
//! avatar away from the camera along the ground plane. Vertical motion is a
//! two-state machine (grounded / airborne) integrated with explicit Euler at
//! the display tick rate; the constants are per-tick, not per-second.

use serde::Serialize;
use tracing::trace;

use crate::{
    camera::Camera,
    config::MovementConfig,
    input::{InputState, Keys},
    math::Vec3,
};

/// Vertical physics classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalState {
    Grounded,
    Airborne,
}

/// Transition reported by a controller step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalEvent {
    Jumped,
    Landed,
}

/// The controllable avatar.
#[derive(Debug, Clone, PartialEq)]
pub struct Character {
    pub position: Vec3,
    pub velocity_y: f32,
    grounded: bool,
    /// Cosmetic tumble (radians about x and z). Never read by physics.
    pub rotation: Vec3,
}

impl Character {
    /// Places the character at `spawn`, lifted to ground level if below it.
    pub fn spawn(spawn: Vec3, cfg: &MovementConfig) -> Self {
        let position = Vec3::new(spawn.x, spawn.y.max(cfg.ground_level), spawn.z);
        Self {
            position,
            velocity_y: 0.0,
            grounded: position.y <= cfg.ground_level + cfg.ground_epsilon,
            rotation: Vec3::ZERO,
        }
    }

    pub fn is_grounded(&self) -> bool {
        self.grounded
    }

    pub fn vertical_state(&self) -> VerticalState {
        if self.grounded {
            VerticalState::Grounded
        } else {
            VerticalState::Airborne
        }
    }
}

/// Advances a `Character` one tick.
#[derive(Debug, Clone)]
pub struct CharacterController {
    cfg: MovementConfig,
}

impl CharacterController {
    pub fn new(cfg: MovementConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &MovementConfig {
        &self.cfg
    }

    /// Movement, then vertical physics, then cosmetic spin.
    pub fn step(
        &self,
        character: &mut Character,
        input: &InputState,
        camera: &Camera,
    ) -> Option<VerticalEvent> {
        if input.is_moving() {
            let forward = camera.forward_basis(character.position);
            character.position += self.resolve_movement(input.held(), forward);
        }

        let event = self.step_vertical(character, input.is_held(Keys::JUMP));

        if input.is_moving() {
            let [sx, sz] = self.cfg.spin_step;
            character.rotation.x += sx;
            character.rotation.z += sz;
        }

        event
    }

    /// Sums held direction keys on the `forward`/right basis and scales to move speed.
    ///
    /// Opposite keys cancel; a cancelled sum stays zero.
    pub fn resolve_movement(&self, held: Keys, forward: Vec3) -> Vec3 {
        let right = Vec3::new(-forward.z, 0.0, forward.x);
        let mut wish = Vec3::ZERO;
        if held.contains(Keys::FORWARD) {
            wish += forward;
        }
        if held.contains(Keys::BACK) {
            wish -= forward;
        }
        if held.contains(Keys::LEFT) {
            wish -= right;
        }
        if held.contains(Keys::RIGHT) {
            wish += right;
        }
        wish.normalize_or_zero() * self.cfg.move_speed
    }

    fn step_vertical(&self, character: &mut Character, jump_held: bool) -> Option<VerticalEvent> {
        let ground = self.cfg.ground_level;
        let mut event = None;

        let can_jump = character.grounded && character.position.y <= ground + self.cfg.ground_epsilon;
        if jump_held && can_jump && self.cfg.jump_power > 0.0 {
            character.velocity_y = self.cfg.jump_power;
            character.grounded = false;
            event = Some(VerticalEvent::Jumped);
            trace!(y = character.position.y, "Jump");
        }

        if character.position.y > ground || character.velocity_y > 0.0 {
            character.velocity_y += self.cfg.gravity;
            character.position.y += character.velocity_y;

            if character.position.y <= ground {
                character.position.y = ground;
                character.velocity_y = 0.0;
                character.grounded = true;
                event = Some(VerticalEvent::Landed);
                trace!("Landed");
            }
        }

        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CameraConfig;

    fn setup() -> (CharacterController, Character, Camera) {
        let cfg = MovementConfig::default();
        let character = Character::spawn(Vec3::new(0.0, 0.5, 0.0), &cfg);
        let camera = Camera::new(&CameraConfig::default(), character.position);
        (CharacterController::new(cfg), character, camera)
    }

    #[test]
    fn spawn_above_ground_settles_in_one_tick() {
        let cfg = MovementConfig::default();
        let controller = CharacterController::new(cfg.clone());
        let mut character = Character::spawn(cfg.spawn, &cfg);
        let camera = Camera::new(&CameraConfig::default(), character.position);

        let event = controller.step(&mut character, &InputState::default(), &camera);
        assert_eq!(event, Some(VerticalEvent::Landed));
        assert_eq!(character.position.y, 0.5);
        assert_eq!(character.velocity_y, 0.0);
    }

    #[test]
    fn spawn_below_ground_is_lifted() {
        let cfg = MovementConfig::default();
        let character = Character::spawn(Vec3::new(0.0, -3.0, 0.0), &cfg);
        assert_eq!(character.position.y, cfg.ground_level);
        assert!(character.is_grounded());
    }

    #[test]
    fn forward_moves_away_from_camera() {
        let (controller, mut character, camera) = setup();
        let mut input = InputState::default();
        input.press("KeyW");

        let before = character.position;
        controller.step(&mut character, &input, &camera);
        let moved = character.position - before;
        assert!((moved.len() - 0.8).abs() < 1e-5);
        assert!(moved.z < 0.0, "camera sits on +Z so forward is -Z");
    }

    #[test]
    fn diagonal_is_not_faster() {
        let (controller, _, _) = setup();
        let forward = Vec3::new(0.0, 0.0, -1.0);
        let v = controller.resolve_movement(Keys::FORWARD | Keys::LEFT, forward);
        assert!((v.len() - 0.8).abs() < 1e-5);
        assert!(v.x < 0.0 && v.z < 0.0);
    }

    #[test]
    fn opposite_keys_cancel() {
        let (controller, mut character, camera) = setup();
        let mut input = InputState::default();
        input.press("KeyW");
        input.press("KeyS");

        let before = character.position;
        controller.step(&mut character, &input, &camera);
        assert_eq!(character.position, before);
        // Still counts as moving for the cosmetic tumble.
        assert!(character.rotation.x > 0.0);
    }

    #[test]
    fn spin_only_while_moving() {
        let (controller, mut character, camera) = setup();
        let mut input = InputState::default();
        input.press("Space");
        controller.step(&mut character, &input, &camera);
        assert_eq!(character.rotation, Vec3::ZERO);

        input.press("KeyD");
        controller.step(&mut character, &input, &camera);
        assert!((character.rotation.x - 0.2).abs() < 1e-6);
        assert!((character.rotation.z - 0.1).abs() < 1e-6);
    }

    #[test]
    fn jump_needs_ground() {
        let (controller, mut character, camera) = setup();
        let mut input = InputState::default();
        input.press("Space");

        assert_eq!(
            controller.step(&mut character, &input, &camera),
            Some(VerticalEvent::Jumped)
        );
        let vy_after_first = character.velocity_y;
        assert!((vy_after_first - 0.76).abs() < 1e-6);

        // Holding jump mid-air does nothing extra.
        assert_eq!(controller.step(&mut character, &input, &camera), None);
        assert!((character.velocity_y - (vy_after_first - 0.04)).abs() < 1e-6);
        assert_eq!(character.vertical_state(), VerticalState::Airborne);
    }

    #[test]
    fn zero_jump_power_leaves_character_grounded() {
        let cfg = MovementConfig {
            jump_power: 0.0,
            ..MovementConfig::default()
        };
        let controller = CharacterController::new(cfg);
        let mut character = Character::spawn(Vec3::new(0.0, 0.5, 0.0), controller.config());
        let camera = Camera::new(&CameraConfig::default(), character.position);
        let mut input = InputState::default();
        input.press("Space");

        for _ in 0..5 {
            assert_eq!(controller.step(&mut character, &input, &camera), None);
        }
        assert!(character.is_grounded());
        assert_eq!((character.position.y, character.velocity_y), (0.5, 0.0));
    }
}
