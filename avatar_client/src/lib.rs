//! `avatar_client`
//!
//! Client-side systems:
//! - Simulation context owning per-view state, with explicit disposal
//! - Platform event channel (keyboard, pointer, pointer lock, resize, unmount)
//! - Refresh-paced frame loop
//! - Scripted input playback for headless runs

pub mod context;
pub mod platform;
pub mod script;

pub use context::SimContext;
