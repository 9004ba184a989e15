//! Headless demo binary.
//!
//! Usage:
//!   cargo run -p avatar_client -- [--config demo.json] [--scene scene.json]
//!       [--script walk.txt] [--frames 600] [--refresh-hz 60]
//!       [--camera orbit|fixed|chase] [--policy last-match|nearest]
//!       [--trees 10] [--deny-pointer-lock]
//!
//! Builds the canonical scene, queues the alley model and any scene file as
//! late-arriving assets, then runs the frame loop. Info-panel changes are
//! logged the way an overlay would show them.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use avatar_client::{
    context::{SimContext, TickHook, TickOutcome},
    platform::{AutoPointerLock, EventSender},
    script::InputScript,
};
use avatar_shared::{
    assets::{spawn_load, SceneAsset, SceneFileLoader, StaticLoader},
    camera::CameraPolicy,
    character::VerticalEvent,
    config::DemoConfig,
    interaction::{DisplayEvent, ProximityPolicy},
    math::Vec3,
    render::TraceRenderer,
    scene::{NodeKind, NodeSpec, SceneSetup},
};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    scene: Option<PathBuf>,
    script: Option<PathBuf>,
    frames: Option<u64>,
    refresh_hz: Option<u32>,
    camera: Option<CameraPolicy>,
    policy: Option<ProximityPolicy>,
    trees: usize,
    deny_pointer_lock: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args::default();
    let argv: Vec<String> = env::args().skip(1).collect();
    let mut it = argv.iter();
    while let Some(flag) = it.next() {
        let mut value = || {
            it.next()
                .cloned()
                .with_context(|| format!("{flag} needs a value"))
        };
        match flag.as_str() {
            "--config" => args.config = Some(value()?.into()),
            "--scene" => args.scene = Some(value()?.into()),
            "--script" => args.script = Some(value()?.into()),
            "--frames" => args.frames = Some(value()?.parse().context("--frames")?),
            "--refresh-hz" => args.refresh_hz = Some(value()?.parse().context("--refresh-hz")?),
            "--trees" => args.trees = value()?.parse().context("--trees")?,
            "--camera" => {
                args.camera = Some(match value()?.as_str() {
                    "orbit" => CameraPolicy::Orbit,
                    "fixed" => CameraPolicy::fixed_follow(),
                    "chase" => CameraPolicy::smooth_chase(),
                    other => bail!("unknown camera policy `{other}`"),
                })
            }
            "--policy" => {
                args.policy = Some(match value()?.as_str() {
                    "last-match" => ProximityPolicy::LastMatch,
                    "nearest" => ProximityPolicy::Nearest,
                    other => bail!("unknown proximity policy `{other}`"),
                })
            }
            "--deny-pointer-lock" => args.deny_pointer_lock = true,
            other => bail!("unknown argument `{other}`"),
        }
    }
    Ok(args)
}

fn build_config(args: &Args) -> anyhow::Result<DemoConfig> {
    let mut cfg = match &args.config {
        Some(path) => DemoConfig::load(path)?,
        None => DemoConfig::default(),
    };
    if let Some(frames) = args.frames {
        cfg.frame_loop.max_frames = Some(frames);
    }
    if let Some(hz) = args.refresh_hz {
        cfg.frame_loop.refresh_hz = hz;
    }
    if let Some(camera) = args.camera {
        cfg.camera.policy = camera;
    }
    if let Some(policy) = args.policy {
        cfg.interaction.policy = policy;
    }
    Ok(cfg)
}

/// Feeds the script into the loop and reports what the UI would show.
struct Driver {
    script: InputScript,
    events: EventSender,
}

impl TickHook<TraceRenderer> for Driver {
    fn before_tick(&mut self, tick: u64) {
        self.script.post_due(tick, &self.events);
    }

    fn after_tick(&mut self, ctx: &mut SimContext<TraceRenderer>, outcome: TickOutcome) {
        if let TickOutcome::Rendered(report) = outcome {
            if report.frame % 60 == 0 {
                info!(frame = report.frame, position = ?report.position, "Frame");
            }
        }

        for event in ctx.events_mut().drain::<DisplayEvent>() {
            match event {
                DisplayEvent::Shown { id, title } => {
                    let body = ctx
                        .display()
                        .active()
                        .map(|panel| panel.payload.body().to_string())
                        .unwrap_or_default();
                    info!(?id, %title, %body, "Info panel shown");
                }
                DisplayEvent::Hidden { id } => info!(?id, "Info panel hidden"),
            }
        }
        for event in ctx.events_mut().drain::<VerticalEvent>() {
            debug!(?event, "Vertical transition");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = parse_args()?;
    let cfg = build_config(&args)?;
    let script = match &args.script {
        Some(path) => InputScript::load(path)?,
        None => InputScript::default(),
    };
    info!(
        refresh_hz = cfg.frame_loop.refresh_hz,
        max_frames = ?cfg.frame_loop.max_frames,
        script_steps = script.steps().len(),
        "Starting demo"
    );

    let mut setup = SceneSetup::canonical(&cfg);
    if args.trees > 0 {
        setup.scatter_trees(args.trees, cfg.frame_loop.scatter_seed);
    }

    let (mut ctx, handles) = SimContext::new(cfg.clone(), setup, TraceRenderer::default());
    if !args.deny_pointer_lock {
        ctx.set_pointer_lock(Box::new(AutoPointerLock::new(handles.events.clone())));
    }

    // The alley model lands a few frames after the loop starts.
    let alley = NodeSpec::new(
        "melbourne_alley",
        NodeKind::Model {
            source: "melbourne.glb".to_string(),
            scale: 10.0,
        },
        Vec3::new(-25.0, 0.0, -45.0),
    )
    .with_rotation(Vec3::new(0.0, -std::f32::consts::FRAC_PI_2, 0.0));
    spawn_load(
        Arc::new(StaticLoader::new(
            "alley-model",
            vec![SceneAsset::Decoration(alley)],
            Duration::from_millis(150),
        )),
        handles.assets.clone(),
    );
    if let Some(path) = &args.scene {
        let loader = SceneFileLoader::new(path.clone(), cfg.frame_loop.scatter_seed);
        spawn_load(Arc::new(loader), handles.assets.clone());
    }

    ctx.spawn_actors();

    let max_frames = cfg
        .frame_loop
        .max_frames
        .unwrap_or_else(|| script.last_frame().max(600));
    let mut driver = Driver {
        script,
        events: handles.events.clone(),
    };
    let summary = ctx
        .run_with(cfg.frame_loop.refresh_hz, Some(max_frames), &mut driver)
        .await;
    info!(ticks = summary.ticks, rendered = summary.rendered, "Loop finished");

    ctx.dispose();
    println!("Demo finished after {} frames.", ctx.frame());
    Ok(())
}
