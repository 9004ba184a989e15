//! Simulation context and frame loop.
//!
//! The context owns every piece of per-view state:
//! - Input state, written only by drained platform events
//! - Character and camera (absent until `spawn_actors`)
//! - Scene graph and interactive registry, appended to by the asset queue
//! - Proximity system and the display state the UI reads
//! - The renderer
//!
//! One tick: drain platform events, drain arrived assets, then (if both actors
//! exist) character step, proximity step, camera step, render. There is no
//! pause state; the loop runs until the context is disposed.

use std::time::Duration;

use avatar_shared::{
    assets::{asset_channel, AssetQueue, AssetSender},
    camera::{Camera, CameraController},
    character::{Character, CharacterController, VerticalEvent},
    config::DemoConfig,
    event::EventBus,
    input::InputState,
    interaction::{
        DisplayEvent, InteractionDisplayState, InteractiveRegistry, ObjectId, ProximitySystem,
    },
    math::Vec3,
    render::Renderer,
    scene::{NodeId, SceneGraph, SceneSetup},
};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::platform::{
    platform_channel, DeniedPointerLock, EventReceiver, EventSender, PlatformEvent, PointerLock,
};

/// Lifecycle of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Scene exists but the character/camera have not been spawned.
    Loading,
    Running,
    Disposed,
}

/// What one call to [`SimContext::tick`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Actors not ready; nothing simulated or drawn.
    Skipped,
    Rendered(TickReport),
    Disposed,
}

/// Snapshot of a rendered tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub frame: u64,
    pub position: Vec3,
    pub velocity_y: f32,
    pub grounded: bool,
    pub azimuth: f32,
    pub elevation: f32,
    pub near: Vec<ObjectId>,
    pub resolved: Option<ObjectId>,
    pub vertical: Option<VerticalEvent>,
    pub display: Option<DisplayEvent>,
}

/// Totals for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub rendered: u64,
    pub skipped: u64,
}

/// Producer handles returned alongside a new context.
#[derive(Debug, Clone)]
pub struct ContextHandles {
    pub events: EventSender,
    pub assets: AssetSender,
}

/// Per-view simulation state.
pub struct SimContext<R: Renderer> {
    cfg: DemoConfig,
    state: ContextState,
    ticks: u64,
    frame: u64,

    input: InputState,
    character: Option<Character>,
    camera: Option<Camera>,
    character_ctl: CharacterController,
    camera_ctl: CameraController,
    proximity: ProximitySystem,

    scene: SceneGraph,
    registry: InteractiveRegistry,
    avatar: NodeId,
    spawn: Vec3,
    viewport: [u32; 2],

    bus: EventBus,
    platform: EventReceiver,
    assets: AssetQueue,
    pointer_lock: Box<dyn PointerLock>,
    renderer: R,
}

impl<R: Renderer> SimContext<R> {
    /// Builds a context around an already set-up scene.
    ///
    /// Pointer-lock requests are refused until [`Self::set_pointer_lock`] is called.
    pub fn new(cfg: DemoConfig, setup: SceneSetup, renderer: R) -> (Self, ContextHandles) {
        let (events, platform) = platform_channel();
        let (assets_tx, assets) = asset_channel(cfg.interaction.default_radius);

        info!(
            nodes = setup.graph.len(),
            interactive = setup.registry.len(),
            camera = ?cfg.camera.policy,
            proximity = ?cfg.interaction.policy,
            "Simulation context created"
        );

        let ctx = Self {
            character_ctl: CharacterController::new(cfg.movement.clone()),
            camera_ctl: CameraController::new(&cfg.camera),
            proximity: ProximitySystem::new(&cfg.interaction),
            viewport: cfg.camera.viewport,
            cfg,
            state: ContextState::Loading,
            ticks: 0,
            frame: 0,
            input: InputState::default(),
            character: None,
            camera: None,
            scene: setup.graph,
            registry: setup.registry,
            avatar: setup.avatar,
            spawn: setup.spawn,
            bus: EventBus::default(),
            platform,
            assets,
            pointer_lock: Box::new(DeniedPointerLock),
            renderer,
        };

        (
            ctx,
            ContextHandles {
                events,
                assets: assets_tx,
            },
        )
    }

    pub fn set_pointer_lock(&mut self, lock: Box<dyn PointerLock>) {
        self.pointer_lock = lock;
    }

    /// Creates the character at the spawn point and the camera around it.
    pub fn spawn_actors(&mut self) {
        if self.state != ContextState::Loading {
            return;
        }
        let character = Character::spawn(self.spawn, &self.cfg.movement);
        let mut camera_cfg = self.cfg.camera.clone();
        camera_cfg.viewport = self.viewport;
        let camera = Camera::new(&camera_cfg, character.position);
        info!(spawn = ?character.position, "Actors spawned");

        self.character = Some(character);
        self.camera = Some(camera);
        self.state = ContextState::Running;
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn config(&self) -> &DemoConfig {
        &self.cfg
    }

    pub fn character(&self) -> Option<&Character> {
        self.character.as_ref()
    }

    /// Teleports the character (debug/test hook). Ignored before spawn.
    pub fn place_character(&mut self, position: Vec3) {
        if let Some(character) = self.character.as_mut() {
            character.position = position;
        }
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn registry(&self) -> &InteractiveRegistry {
        &self.registry
    }

    pub fn display(&self) -> &InteractionDisplayState {
        self.proximity.display()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Event bus carrying `DisplayEvent`s and `VerticalEvent`s for the UI.
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    /// Rendered frames so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Detaches all listeners and stops the loop. Idempotent.
    pub fn dispose(&mut self) {
        if self.state == ContextState::Disposed {
            return;
        }
        self.platform.close();
        self.assets.close();
        self.input.clear();
        self.state = ContextState::Disposed;
        info!(ticks = self.ticks, frames = self.frame, "Simulation context disposed");
    }

    fn pump_platform_events(&mut self) {
        while let Some(event) = self.platform.try_next() {
            trace!(?event, "Platform event");
            match event {
                PlatformEvent::KeyDown(code) => {
                    self.input.press(&code);
                }
                PlatformEvent::KeyUp(code) => {
                    self.input.release(&code);
                }
                PlatformEvent::PointerMove { dx, dy } => self.input.pointer_moved(dx, dy),
                PlatformEvent::Click => {
                    if let Err(e) = self.pointer_lock.request() {
                        warn!(error = %e, "Pointer lock request failed");
                    }
                }
                PlatformEvent::PointerLockChanged(locked) => {
                    debug!(locked, "Pointer lock changed");
                    self.input.set_pointer_locked(locked);
                }
                PlatformEvent::Blur => self.input.clear(),
                PlatformEvent::Resize { width, height } => {
                    self.viewport = [width, height];
                    if let Some(camera) = self.camera.as_mut() {
                        camera.resize(width, height);
                    }
                    self.renderer.resize(width, height);
                }
                PlatformEvent::Unmount => {
                    self.dispose();
                    return;
                }
            }
        }
    }

    /// Runs one frame.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state == ContextState::Disposed {
            return TickOutcome::Disposed;
        }
        self.pump_platform_events();
        if self.state == ContextState::Disposed {
            return TickOutcome::Disposed;
        }
        self.ticks += 1;

        let arrived = self.assets.drain_into(&mut self.scene, &mut self.registry);
        if arrived > 0 {
            debug!(arrived, nodes = self.scene.len(), "Assets appended");
        }

        let (Some(character), Some(camera)) = (self.character.as_mut(), self.camera.as_mut()) else {
            trace!(tick = self.ticks, "Actors not ready, skipping tick");
            return TickOutcome::Skipped;
        };
        self.frame += 1;

        let vertical = self.character_ctl.step(character, &self.input, camera);
        self.scene.set_transform(self.avatar, character.position, character.rotation);

        let proximity = self.proximity.step(&self.registry, character.position, &mut self.scene);

        self.camera_ctl.step(camera, &mut self.input, character.position);

        self.renderer.render(&self.scene, camera);

        if let Some(event) = vertical {
            self.bus.push(event);
        }
        if let Some(event) = proximity.event.clone() {
            self.bus.push(event);
        }

        TickOutcome::Rendered(TickReport {
            frame: self.frame,
            position: character.position,
            velocity_y: character.velocity_y,
            grounded: character.is_grounded(),
            azimuth: camera.azimuth,
            elevation: camera.elevation,
            near: proximity.near,
            resolved: proximity.resolved,
            vertical,
            display: proximity.event,
        })
    }

    /// Ticks at `refresh_hz` until disposed or `max_ticks` have elapsed.
    pub async fn run(&mut self, refresh_hz: u32, max_ticks: Option<u64>) -> RunSummary {
        self.run_with(refresh_hz, max_ticks, &mut ()).await
    }

    /// Like [`Self::run`], calling `hook` around every tick.
    pub async fn run_with<H: TickHook<R>>(
        &mut self,
        refresh_hz: u32,
        max_ticks: Option<u64>,
        hook: &mut H,
    ) -> RunSummary {
        let period = Duration::from_secs_f64(1.0 / f64::from(refresh_hz.max(1)));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut summary = RunSummary::default();
        while !max_ticks.is_some_and(|max| summary.ticks >= max) {
            interval.tick().await;
            if !self.hooked_tick(hook, &mut summary) {
                break;
            }
        }
        summary
    }

    /// Runs up to `max_ticks` back to back, without pacing.
    pub fn run_unpaced<H: TickHook<R>>(&mut self, max_ticks: u64, hook: &mut H) -> RunSummary {
        let mut summary = RunSummary::default();
        while summary.ticks < max_ticks && self.hooked_tick(hook, &mut summary) {}
        summary
    }

    /// One loop iteration. Returns false once the context is disposed.
    fn hooked_tick<H: TickHook<R>>(&mut self, hook: &mut H, summary: &mut RunSummary) -> bool {
        hook.before_tick(summary.ticks + 1);
        let outcome = self.tick();
        match &outcome {
            TickOutcome::Disposed => {}
            TickOutcome::Skipped => summary.skipped += 1,
            TickOutcome::Rendered(_) => summary.rendered += 1,
        }
        let running = outcome != TickOutcome::Disposed;
        if running {
            summary.ticks += 1;
        }
        hook.after_tick(self, outcome);
        running
    }
}

/// Per-tick callbacks for [`SimContext::run_with`] and [`SimContext::run_unpaced`].
pub trait TickHook<R: Renderer> {
    /// Called before tick number `tick` (1-based), e.g. to post scripted input.
    fn before_tick(&mut self, _tick: u64) {}

    /// Called with each outcome, including the final `Disposed`.
    fn after_tick(&mut self, _ctx: &mut SimContext<R>, _outcome: TickOutcome) {}
}

impl<R: Renderer> TickHook<R> for () {}

#[cfg(test)]
mod tests {
    use super::*;
    use avatar_shared::render::FrameRecorder;

    fn context() -> (SimContext<FrameRecorder>, ContextHandles) {
        let cfg = DemoConfig::default();
        let setup = SceneSetup::canonical(&cfg);
        SimContext::new(cfg, setup, FrameRecorder::default())
    }

    #[test]
    fn ticks_skip_until_actors_spawn() {
        let (mut ctx, _handles) = context();
        assert_eq!(ctx.tick(), TickOutcome::Skipped);
        assert_eq!(ctx.renderer().frames, 0);

        ctx.spawn_actors();
        assert!(matches!(ctx.tick(), TickOutcome::Rendered(_)));
        assert_eq!(ctx.renderer().frames, 1);
        assert_eq!(ctx.state(), ContextState::Running);
    }

    #[test]
    fn keys_apply_on_next_tick() {
        let (mut ctx, handles) = context();
        ctx.spawn_actors();
        ctx.tick();

        let start = ctx.character().unwrap().position;
        handles.events.post(PlatformEvent::KeyDown("KeyW".into()));
        ctx.tick();
        let moved = ctx.character().unwrap().position - start;
        assert!((moved.horizontal().len() - 0.8).abs() < 1e-4);
    }

    #[test]
    fn avatar_node_follows_character() {
        let (mut ctx, handles) = context();
        ctx.spawn_actors();
        handles.events.post(PlatformEvent::KeyDown("KeyD".into()));
        ctx.tick();
        let character = ctx.character().unwrap().clone();
        let avatar = ctx
            .scene()
            .nodes()
            .iter()
            .find(|n| n.spec.name == "avatar")
            .unwrap();
        assert_eq!(avatar.spec.position, character.position);
        assert_eq!(avatar.spec.rotation, character.rotation);
    }

    #[test]
    fn denied_pointer_lock_keeps_running() {
        let (mut ctx, handles) = context();
        ctx.spawn_actors();
        handles.events.post(PlatformEvent::Click);
        handles.events.post(PlatformEvent::PointerMove { dx: 100.0, dy: 0.0 });
        let azimuth = ctx.camera().unwrap().azimuth;
        assert!(matches!(ctx.tick(), TickOutcome::Rendered(_)));
        assert!(!ctx.input().pointer_locked());
        assert_eq!(ctx.camera().unwrap().azimuth, azimuth);
    }

    #[test]
    fn unmount_disposes_and_detaches() {
        let (mut ctx, handles) = context();
        ctx.spawn_actors();
        handles.events.post(PlatformEvent::Unmount);
        assert_eq!(ctx.tick(), TickOutcome::Disposed);
        assert_eq!(ctx.state(), ContextState::Disposed);
        assert!(!handles.events.post(PlatformEvent::KeyDown("KeyW".into())));
        assert_eq!(ctx.tick(), TickOutcome::Disposed);
    }

    #[test]
    fn resize_reaches_camera_and_renderer() {
        let (mut ctx, handles) = context();
        handles.events.post(PlatformEvent::Resize {
            width: 1000,
            height: 500,
        });
        ctx.tick();
        ctx.spawn_actors();
        assert_eq!(ctx.camera().unwrap().aspect, 2.0);
        assert_eq!(ctx.renderer().viewport, Some((1000, 500)));
    }

    struct Recorder {
        events: EventSender,
        before: Vec<u64>,
        outcomes: Vec<TickOutcome>,
        bus_after: Vec<usize>,
    }

    impl Recorder {
        fn new(events: EventSender) -> Self {
            Self {
                events,
                before: Vec::new(),
                outcomes: Vec::new(),
                bus_after: Vec::new(),
            }
        }
    }

    impl TickHook<FrameRecorder> for Recorder {
        fn before_tick(&mut self, tick: u64) {
            self.before.push(tick);
            if tick == 2 {
                self.events.post(PlatformEvent::KeyDown("Space".into()));
            }
            if tick == 4 {
                self.events.post(PlatformEvent::Unmount);
            }
        }

        fn after_tick(&mut self, ctx: &mut SimContext<FrameRecorder>, outcome: TickOutcome) {
            ctx.events_mut().clear();
            self.bus_after.push(ctx.events_mut().total_pending());
            self.outcomes.push(outcome);
        }
    }

    #[test]
    fn unpaced_run_calls_hook_around_each_tick() {
        let (mut ctx, handles) = context();
        ctx.spawn_actors();
        let mut hook = Recorder::new(handles.events.clone());

        let summary = ctx.run_unpaced(10, &mut hook);
        assert_eq!(
            summary,
            RunSummary {
                ticks: 3,
                rendered: 3,
                skipped: 0
            }
        );
        assert_eq!(hook.before, vec![1, 2, 3, 4]);
        assert_eq!(hook.outcomes.last(), Some(&TickOutcome::Disposed));
        let jumped = hook.outcomes.iter().any(|o| {
            matches!(o, TickOutcome::Rendered(r) if r.vertical == Some(VerticalEvent::Jumped))
        });
        assert!(jumped, "input posted from the hook reaches the tick");
        assert!(hook.bus_after.iter().all(|&n| n == 0));
    }

    #[tokio::test]
    async fn paced_run_uses_the_same_hook() {
        let (mut ctx, handles) = context();
        ctx.spawn_actors();
        let mut hook = Recorder::new(handles.events.clone());

        let summary = ctx.run_with(1000, Some(10), &mut hook).await;
        assert_eq!(summary.ticks, 3);
        assert_eq!(hook.outcomes.len(), 4);
        assert_eq!(ctx.state(), ContextState::Disposed);
    }
}
