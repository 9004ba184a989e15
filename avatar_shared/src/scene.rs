//! Scene graph and scene setup.
//!
//! The graph is append-only: nodes are never removed or reordered, so a
//! renderer may read it between frames while late assets are still arriving.
//! Nodes are decoration as far as the simulation is concerned, with two
//! exceptions: the avatar node (synced from the character each tick) and
//! marker nodes (highlighted by the proximity system).

use std::path::Path;

use anyhow::Context;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    config::DemoConfig,
    interaction::{InteractionPayload, InteractiveRegistry, ObjectId},
    math::Vec3,
};

/// Index of a node in the scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// What a node draws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Ground { size: f32 },
    AmbientLight { intensity: f32 },
    DirectionalLight { intensity: f32 },
    PointLight { intensity: f32, range: f32 },
    Cube { size: f32 },
    Cylinder { radius: f32, height: f32 },
    Sphere { radius: f32 },
    /// Imported model, referenced by source path.
    Model { source: String, scale: f32 },
}

/// A placed scene element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default)]
    pub rotation: Vec3,
    /// 0xRRGGBB
    #[serde(default = "default_color")]
    pub color: u32,
}

fn default_color() -> u32 {
    0xFFFFFF
}

impl NodeSpec {
    pub fn new(name: impl Into<String>, kind: NodeKind, position: Vec3) -> Self {
        Self {
            name: name.into(),
            kind,
            position,
            rotation: Vec3::ZERO,
            color: default_color(),
        }
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.color = color;
        self
    }

    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }
}

/// A node as stored in the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub spec: NodeSpec,
    /// Emissive colour, 0 when not highlighted.
    pub emissive: u32,
}

/// What the proximity system needs from the scene.
pub trait MarkerSurface {
    fn marker_position(&self, marker: NodeId) -> Option<Vec3>;
    fn set_highlight(&mut self, marker: NodeId, emissive: u32);
}

/// Append-only scene graph.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: Vec<Node>,
}

impl SceneGraph {
    pub fn add(&mut self, spec: NodeSpec) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            spec,
            emissive: 0,
        });
        id
    }

    /// Adds a small sphere used as an interaction marker.
    pub fn add_marker(&mut self, name: impl Into<String>, position: Vec3) -> NodeId {
        self.add(NodeSpec::new(name, NodeKind::Sphere { radius: 0.3 }, position).with_color(0x00FFFF))
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Moves a node (used for the avatar).
    pub fn set_transform(&mut self, id: NodeId, position: Vec3, rotation: Vec3) {
        if let Some(node) = self.node_mut(id) {
            node.spec.position = position;
            node.spec.rotation = rotation;
        }
    }
}

impl MarkerSurface for SceneGraph {
    fn marker_position(&self, marker: NodeId) -> Option<Vec3> {
        self.node(marker).map(|n| n.spec.position)
    }

    fn set_highlight(&mut self, marker: NodeId, emissive: u32) {
        if let Some(node) = self.node_mut(marker) {
            node.emissive = emissive;
        }
    }
}

/// An interactive object as described by scene data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractiveSpec {
    pub name: String,
    pub position: Vec3,
    /// Falls back to the configured default radius.
    #[serde(default)]
    pub radius: Option<f32>,
    pub payload: InteractionPayload,
}

/// Scene data file: extra decoration and interactive objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneFile {
    pub decorations: Vec<NodeSpec>,
    pub interactive: Vec<InteractiveSpec>,
    /// Trees scattered at random across the ground.
    pub scattered_trees: usize,
}

impl SceneFile {
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read scene {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parse scene {}", path.display()))
    }
}

/// Output of scene setup: the static world before the first tick.
#[derive(Debug, Clone)]
pub struct SceneSetup {
    pub graph: SceneGraph,
    pub registry: InteractiveRegistry,
    pub avatar: NodeId,
    pub spawn: Vec3,
    default_radius: f32,
}

impl SceneSetup {
    /// Ground, lights, the avatar, and the welcome orb.
    pub fn canonical(cfg: &DemoConfig) -> Self {
        let mut graph = SceneGraph::default();
        graph.add(
            NodeSpec::new("ground", NodeKind::Ground { size: 100.0 }, Vec3::ZERO)
                .with_color(0x88E788)
                .with_rotation(Vec3::new(-std::f32::consts::FRAC_PI_2, 0.0, 0.0)),
        );
        graph.add(
            NodeSpec::new("ambient", NodeKind::AmbientLight { intensity: 0.6 }, Vec3::ZERO)
                .with_color(0x404040),
        );
        graph.add(NodeSpec::new(
            "sun",
            NodeKind::DirectionalLight { intensity: 0.8 },
            Vec3::new(10.0, 10.0, 5.0),
        ));

        let spawn = cfg.movement.spawn;
        let avatar = graph.add(NodeSpec::new("avatar", NodeKind::Cube { size: 1.0 }, spawn));

        let mut setup = Self {
            graph,
            registry: InteractiveRegistry::default(),
            avatar,
            spawn,
            default_radius: cfg.interaction.default_radius,
        };

        let orb = Vec3::new(-25.0, 2.0, -40.0);
        setup.graph.add(
            NodeSpec::new("orb_light", NodeKind::PointLight { intensity: 1.0, range: 10.0 }, orb)
                .with_color(0x00FFFF),
        );
        setup.add_interactive(&InteractiveSpec {
            name: "melbourne_orb".to_string(),
            position: orb,
            radius: None,
            payload: InteractionPayload::text(
                "Melbourne, Australia",
                "Melbourne is where I am currently based. Here I am able to work in person as well as remotely.",
                0x00FFFF,
            ),
        });
        setup
    }

    /// Adds a marker node and registers it.
    pub fn add_interactive(&mut self, spec: &InteractiveSpec) -> ObjectId {
        let marker = self.graph.add_marker(spec.name.clone(), spec.position);
        self.registry.register(
            marker,
            spec.position,
            spec.radius.unwrap_or(self.default_radius),
            spec.payload.clone(),
        )
    }

    /// Applies a scene file on top of the current setup.
    pub fn apply(&mut self, file: &SceneFile, seed: u64) {
        for deco in &file.decorations {
            self.graph.add(deco.clone());
        }
        for spec in &file.interactive {
            self.add_interactive(spec);
        }
        if file.scattered_trees > 0 {
            self.scatter_trees(file.scattered_trees, seed);
        }
        info!(
            nodes = self.graph.len(),
            interactive = self.registry.len(),
            "Scene applied"
        );
    }

    /// Adds `count` seeded trees, see [`scattered_tree_specs`].
    pub fn scatter_trees(&mut self, count: usize, seed: u64) {
        for tree in scattered_tree_specs(count, seed) {
            self.graph.add(tree);
        }
        debug!(count, seed, "Scattered trees");
    }
}

/// `count` trunks placed uniformly over the central 80x80 area.
///
/// The same seed always yields the same layout.
pub fn scattered_tree_specs(count: usize, seed: u64) -> Vec<NodeSpec> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let x = rng.gen_range(-40.0..40.0);
            let z = rng.gen_range(-40.0..40.0);
            NodeSpec::new(
                format!("tree_{i}"),
                NodeKind::Cylinder {
                    radius: 0.5,
                    height: 4.0,
                },
                Vec3::new(x, 2.0, z),
            )
            .with_color(0x8B4513)
        })
        .collect()
}
