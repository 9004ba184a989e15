//! `avatar_shared`
//!
//! Simulation core shared by the client loop and the test harness.
//!
//! Design goals:
//! - Deterministic per-tick stepping; no wall-clock reads inside a tick.
//! - Clear separation of concerns (input, character, camera, interaction, scene).
//! - Traits at the collaborator seams (renderer, asset loading, marker surface).
//! - No `unsafe`.

pub mod assets;
pub mod camera;
pub mod character;
pub mod config;
pub mod event;
pub mod input;
pub mod interaction;
pub mod math;
pub mod render;
pub mod scene;
