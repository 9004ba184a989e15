//! Rendering abstraction.
//!
//! This crate intentionally does not depend on a graphics backend.
//! The frame loop hands a renderer the scene graph and the camera once per
//! tick; it never reads anything back.

use tracing::trace;

use crate::{
    camera::Camera,
    math::{Mat4, Vec3},
    scene::SceneGraph,
};

/// What the frame loop needs from a renderer.
pub trait Renderer {
    /// Draws the scene as seen from `camera`.
    fn render(&mut self, scene: &SceneGraph, camera: &Camera);

    /// Viewport size changed.
    fn resize(&mut self, _width: u32, _height: u32) {}
}

/// A no-op renderer useful for headless runs.
#[derive(Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&mut self, _scene: &SceneGraph, _camera: &Camera) {}
}

/// Logs one trace line per frame.
#[derive(Default)]
pub struct TraceRenderer {
    frames: u64,
}

impl Renderer for TraceRenderer {
    fn render(&mut self, scene: &SceneGraph, camera: &Camera) {
        self.frames += 1;
        trace!(
            frame = self.frames,
            nodes = scene.len(),
            eye = ?camera.position,
            target = ?camera.target,
            "Render"
        );
    }

    fn resize(&mut self, width: u32, height: u32) {
        trace!(width, height, "Renderer resized");
    }
}

/// Keeps the inputs of the last frame. Used by tests and the scenario runner.
#[derive(Debug, Default, Clone)]
pub struct FrameRecorder {
    pub frames: u64,
    pub last_eye: Option<Vec3>,
    pub last_target: Option<Vec3>,
    pub last_view_proj: Option<Mat4>,
    pub last_node_count: usize,
    pub viewport: Option<(u32, u32)>,
}

impl Renderer for FrameRecorder {
    fn render(&mut self, scene: &SceneGraph, camera: &Camera) {
        self.frames += 1;
        self.last_eye = Some(camera.position);
        self.last_target = Some(camera.target);
        self.last_view_proj = Some(camera.projection_matrix().mul_mat(&camera.view_matrix()));
        self.last_node_count = scene.len();
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.viewport = Some((width, height));
    }
}
