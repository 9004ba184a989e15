//! Scripted scenario runner.
//!
//! Replays an input script against the canonical scene without pacing and
//! writes a JSON trajectory report: every rendered frame, plus the jump,
//! landing and info-panel transitions pulled out for quick reading.
//!
//! Usage:
//!   scenario_runner --script walk.txt [--config demo.json] [--scene scene.json]
//!       [--frames 300] [--out report.json]

use std::path::PathBuf;

use anyhow::{bail, Context};
use avatar_client::{
    context::{SimContext, TickHook, TickOutcome, TickReport},
    platform::EventSender,
    script::InputScript,
};
use avatar_shared::{
    character::VerticalEvent,
    config::DemoConfig,
    interaction::DisplayEvent,
    math::Vec3,
    render::FrameRecorder,
    scene::{SceneFile, SceneSetup},
};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Default)]
struct Args {
    script: Option<PathBuf>,
    config: Option<PathBuf>,
    scene: Option<PathBuf>,
    frames: Option<u64>,
    out: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args::default();
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let mut it = argv.iter();
    while let Some(flag) = it.next() {
        let mut value = || {
            it.next()
                .cloned()
                .with_context(|| format!("{flag} needs a value"))
        };
        match flag.as_str() {
            "--script" => args.script = Some(value()?.into()),
            "--config" => args.config = Some(value()?.into()),
            "--scene" => args.scene = Some(value()?.into()),
            "--frames" => args.frames = Some(value()?.parse().context("--frames")?),
            "--out" => args.out = Some(value()?.into()),
            other => bail!("unknown argument `{other}`"),
        }
    }
    Ok(args)
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Transition {
    Vertical { frame: u64, vertical: VerticalEvent },
    Display { frame: u64, display: DisplayEvent },
}

#[derive(Debug, Default, Serialize)]
struct ScenarioReport {
    ticks: u64,
    rendered: u64,
    disposed: bool,
    final_position: Option<Vec3>,
    transitions: Vec<Transition>,
    frames: Vec<TickReport>,
}

/// Posts script input before each tick and folds outcomes into the report.
struct Recorder {
    script: InputScript,
    events: EventSender,
    report: ScenarioReport,
}

impl TickHook<FrameRecorder> for Recorder {
    fn before_tick(&mut self, tick: u64) {
        self.script.post_due(tick, &self.events);
    }

    fn after_tick(&mut self, ctx: &mut SimContext<FrameRecorder>, outcome: TickOutcome) {
        // Transitions already travel in the tick report.
        ctx.events_mut().clear();

        let report = &mut self.report;
        let frame = match outcome {
            TickOutcome::Rendered(frame) => frame,
            TickOutcome::Skipped => return,
            TickOutcome::Disposed => {
                report.disposed = true;
                return;
            }
        };
        if let Some(vertical) = frame.vertical {
            report.transitions.push(Transition::Vertical {
                frame: frame.frame,
                vertical,
            });
        }
        if let Some(display) = frame.display.clone() {
            report.transitions.push(Transition::Display {
                frame: frame.frame,
                display,
            });
        }
        report.final_position = Some(frame.position);
        report.frames.push(frame);
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;
    let Some(script_path) = &args.script else {
        bail!("--script is required");
    };
    let script = InputScript::load(script_path)?;
    let cfg = match &args.config {
        Some(path) => DemoConfig::load(path)?,
        None => DemoConfig::default(),
    };

    let mut setup = SceneSetup::canonical(&cfg);
    if let Some(path) = &args.scene {
        setup.apply(&SceneFile::load(path)?, cfg.frame_loop.scatter_seed);
    }

    let frames = args
        .frames
        .or(cfg.frame_loop.max_frames)
        .unwrap_or_else(|| script.last_frame() + 1);
    info!(frames, steps = script.steps().len(), "Running scenario");

    let (mut ctx, handles) = SimContext::new(cfg, setup, FrameRecorder::default());
    ctx.spawn_actors();

    let mut recorder = Recorder {
        script,
        events: handles.events.clone(),
        report: ScenarioReport::default(),
    };
    let summary = ctx.run_unpaced(frames, &mut recorder);
    ctx.dispose();

    let mut report = recorder.report;
    report.ticks = summary.ticks;
    report.rendered = summary.rendered;

    let json = serde_json::to_string_pretty(&report).context("serialize report")?;
    match &args.out {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
            info!(path = %path.display(), "Report written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
