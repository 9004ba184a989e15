//! Asynchronous asset arrival.
//!
//! Loaders run as tokio tasks and push finished assets into an unbounded
//! single-consumer queue. The frame loop drains the queue at the start of each
//! tick, so the scene graph and registry are only ever mutated on the loop's
//! own thread and only by appending.
//!
//! Loader failures are logged and dropped; nothing is retried.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    interaction::InteractiveRegistry,
    scene::{scattered_tree_specs, InteractiveSpec, NodeSpec, SceneFile, SceneGraph},
};

/// A finished asset ready to be appended to the scene.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneAsset {
    Decoration(NodeSpec),
    /// Registered with `spec.radius`, or the queue's default radius when unset.
    Interactive(InteractiveSpec),
}

/// Producer side of the asset queue.
#[derive(Debug, Clone)]
pub struct AssetSender {
    tx: mpsc::UnboundedSender<SceneAsset>,
}

impl AssetSender {
    /// Queues an asset. Returns false once the consumer is gone.
    pub fn send(&self, asset: SceneAsset) -> bool {
        self.tx.send(asset).is_ok()
    }
}

/// Consumer side, owned by the frame loop.
#[derive(Debug)]
pub struct AssetQueue {
    rx: mpsc::UnboundedReceiver<SceneAsset>,
    default_radius: f32,
}

/// Creates a connected sender/queue pair.
///
/// `default_radius` applies to interactive assets that carry no radius.
pub fn asset_channel(default_radius: f32) -> (AssetSender, AssetQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (AssetSender { tx }, AssetQueue { rx, default_radius })
}

impl AssetQueue {
    /// Appends everything that has arrived. Returns the number of assets applied.
    pub fn drain_into(&mut self, graph: &mut SceneGraph, registry: &mut InteractiveRegistry) -> usize {
        let mut applied = 0;
        while let Ok(asset) = self.rx.try_recv() {
            match asset {
                SceneAsset::Decoration(spec) => {
                    debug!(name = %spec.name, "Decoration arrived");
                    graph.add(spec);
                }
                SceneAsset::Interactive(spec) => {
                    let radius = spec.radius.unwrap_or(self.default_radius);
                    let marker = graph.add_marker(spec.name.clone(), spec.position);
                    registry.register(marker, spec.position, radius, spec.payload);
                }
            }
            applied += 1;
        }
        applied
    }

    /// Stops accepting new assets; already queued ones can still be drained.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

/// Source of scene assets (model import, remote content, ...).
#[async_trait]
pub trait AssetLoader: Send + Sync {
    fn name(&self) -> &str;

    async fn load(&self) -> anyhow::Result<Vec<SceneAsset>>;
}

/// Runs `loader` in the background and queues whatever it produces.
pub fn spawn_load(loader: Arc<dyn AssetLoader>, sender: AssetSender) -> JoinHandle<usize> {
    tokio::spawn(async move {
        match loader.load().await {
            Ok(assets) => {
                let total = assets.len();
                let mut queued = 0;
                for asset in assets {
                    if !sender.send(asset) {
                        debug!(loader = loader.name(), "Asset queue closed");
                        break;
                    }
                    queued += 1;
                }
                info!(loader = loader.name(), queued, total, "Assets loaded");
                queued
            }
            Err(e) => {
                warn!(loader = loader.name(), error = %e, "Asset load failed");
                0
            }
        }
    })
}

/// Reads a scene file from disk after an optional delay.
///
/// Streams decorations, then the file's scattered trees (placed with `seed`,
/// as `SceneSetup::apply` would), then interactive objects.
pub struct SceneFileLoader {
    path: PathBuf,
    seed: u64,
    delay: Duration,
}

impl SceneFileLoader {
    pub fn new(path: impl Into<PathBuf>, seed: u64) -> Self {
        Self {
            path: path.into(),
            seed,
            delay: Duration::ZERO,
        }
    }

    /// Simulates import latency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl AssetLoader for SceneFileLoader {
    fn name(&self) -> &str {
        "scene-file"
    }

    async fn load(&self) -> anyhow::Result<Vec<SceneAsset>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let path = self.path.clone();
        let file = tokio::task::spawn_blocking(move || SceneFile::load(&path))
            .await
            .context("scene loader task")??;

        let mut assets: Vec<SceneAsset> =
            file.decorations.into_iter().map(SceneAsset::Decoration).collect();
        assets.extend(
            scattered_tree_specs(file.scattered_trees, self.seed)
                .into_iter()
                .map(SceneAsset::Decoration),
        );
        assets.extend(file.interactive.into_iter().map(SceneAsset::Interactive));
        Ok(assets)
    }
}

/// Hands out a fixed list of assets after a delay.
pub struct StaticLoader {
    name: String,
    assets: Vec<SceneAsset>,
    delay: Duration,
}

impl StaticLoader {
    pub fn new(name: impl Into<String>, assets: Vec<SceneAsset>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            assets,
            delay,
        }
    }
}

#[async_trait]
impl AssetLoader for StaticLoader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> anyhow::Result<Vec<SceneAsset>> {
        tokio::time::sleep(self.delay).await;
        Ok(self.assets.clone())
    }
}
