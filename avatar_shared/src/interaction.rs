//! Proximity interactions.
//!
//! Interactive objects are registered once by scene setup and read-only after
//! that. Every tick the proximity system:
//! - highlights each object's marker iff the character is inside its radius,
//!   re-evaluated for every object (several can be near at once);
//! - resolves one payload for the info panel;
//! - updates the display state only when the resolved object changes.
//!
//! Resolution defaults to [`ProximityPolicy::LastMatch`]: the near object
//! registered last wins, regardless of distance. [`ProximityPolicy::Nearest`]
//! is available for callers that want distance ordering instead.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::InteractionConfig,
    math::Vec3,
    scene::{MarkerSurface, NodeId},
};

/// Registration index of an interactive object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

/// What the info panel shows for an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InteractionPayload {
    /// Free-form message card.
    TextCard {
        title: String,
        body: String,
        /// 0xRRGGBB
        accent: u32,
    },
    /// Portfolio project card.
    ProjectCard {
        title: String,
        summary: String,
        #[serde(default)]
        tags: Vec<String>,
        #[serde(default)]
        link: Option<String>,
        accent: u32,
    },
}

impl InteractionPayload {
    pub fn text(title: impl Into<String>, body: impl Into<String>, accent: u32) -> Self {
        Self::TextCard {
            title: title.into(),
            body: body.into(),
            accent,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::TextCard { title, .. } | Self::ProjectCard { title, .. } => title,
        }
    }

    /// Main paragraph of the panel.
    pub fn body(&self) -> &str {
        match self {
            Self::TextCard { body, .. } => body,
            Self::ProjectCard { summary, .. } => summary,
        }
    }

    pub fn accent(&self) -> u32 {
        match self {
            Self::TextCard { accent, .. } | Self::ProjectCard { accent, .. } => *accent,
        }
    }
}

/// A point of interest with a visual marker in the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractiveObject {
    pub id: ObjectId,
    pub marker: NodeId,
    /// Position used when the marker node cannot be resolved.
    pub anchor: Vec3,
    pub radius: f32,
    pub payload: InteractionPayload,
}

/// Ordered, append-only collection of interactive objects.
#[derive(Debug, Clone, Default)]
pub struct InteractiveRegistry {
    objects: Vec<InteractiveObject>,
}

impl InteractiveRegistry {
    pub fn register(
        &mut self,
        marker: NodeId,
        anchor: Vec3,
        radius: f32,
        payload: InteractionPayload,
    ) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        debug!(?id, title = payload.title(), radius, "Registered interactive object");
        self.objects.push(InteractiveObject {
            id,
            marker,
            anchor,
            radius,
            payload,
        });
        id
    }

    pub fn get(&self, id: ObjectId) -> Option<&InteractiveObject> {
        self.objects.get(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InteractiveObject> {
        self.objects.iter()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// How a single object is chosen when several are near.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProximityPolicy {
    /// Last near object in registration order.
    #[default]
    LastMatch,
    /// Closest near object; ties go to the earlier registration.
    Nearest,
}

/// Payload currently shown by the info panel.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivePanel {
    pub id: ObjectId,
    pub payload: InteractionPayload,
}

/// State read by the UI overlay.
///
/// `visible` is true iff `active` is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionDisplayState {
    active: Option<ActivePanel>,
    visible: bool,
    revision: u64,
}

impl InteractionDisplayState {
    pub fn active(&self) -> Option<&ActivePanel> {
        self.active.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Number of times the displayed panel has changed.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn set(&mut self, active: Option<ActivePanel>) {
        self.visible = active.is_some();
        self.active = active;
        self.revision += 1;
    }
}

/// Emitted when the resolved object changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "panel", rename_all = "snake_case")]
pub enum DisplayEvent {
    Shown { id: ObjectId, title: String },
    Hidden { id: ObjectId },
}

/// Per-tick result of a proximity step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProximityOutcome {
    /// Every object inside its radius, in registration order.
    pub near: Vec<ObjectId>,
    pub resolved: Option<ObjectId>,
    pub event: Option<DisplayEvent>,
}

/// Highlights near markers and drives the display state.
#[derive(Debug, Clone)]
pub struct ProximitySystem {
    policy: ProximityPolicy,
    highlight_emissive: u32,
    display: InteractionDisplayState,
}

impl ProximitySystem {
    pub fn new(cfg: &InteractionConfig) -> Self {
        Self {
            policy: cfg.policy,
            highlight_emissive: cfg.highlight_emissive,
            display: InteractionDisplayState::default(),
        }
    }

    pub fn policy(&self) -> ProximityPolicy {
        self.policy
    }

    pub fn display(&self) -> &InteractionDisplayState {
        &self.display
    }

    /// Scans the whole registry against `position`.
    pub fn step<S: MarkerSurface + ?Sized>(
        &mut self,
        registry: &InteractiveRegistry,
        position: Vec3,
        surface: &mut S,
    ) -> ProximityOutcome {
        let mut outcome = ProximityOutcome::default();
        let mut best: Option<(ObjectId, f32)> = None;

        for object in registry.iter() {
            let anchor = surface.marker_position(object.marker).unwrap_or(object.anchor);
            let distance = position.distance(anchor);
            let near = distance < object.radius;

            surface.set_highlight(object.marker, if near { self.highlight_emissive } else { 0 });

            if !near {
                continue;
            }
            outcome.near.push(object.id);
            best = match (self.policy, best) {
                (ProximityPolicy::LastMatch, _) | (ProximityPolicy::Nearest, None) => {
                    Some((object.id, distance))
                }
                (ProximityPolicy::Nearest, Some((_, d))) if distance < d => Some((object.id, distance)),
                (ProximityPolicy::Nearest, kept) => kept,
            };
        }

        outcome.resolved = best.map(|(id, _)| id);
        let previous = self.display.active().map(|panel| panel.id);
        if outcome.resolved != previous {
            let active = outcome.resolved.and_then(|id| {
                registry.get(id).map(|object| ActivePanel {
                    id,
                    payload: object.payload.clone(),
                })
            });
            outcome.event = match (&active, previous) {
                (Some(panel), _) => Some(DisplayEvent::Shown {
                    id: panel.id,
                    title: panel.payload.title().to_string(),
                }),
                (None, Some(id)) => Some(DisplayEvent::Hidden { id }),
                (None, None) => None,
            };
            debug!(from = ?previous, to = ?outcome.resolved, "Info panel changed");
            self.display.set(active);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneGraph;

    fn world(points: &[(f32, &str)]) -> (SceneGraph, InteractiveRegistry) {
        let mut scene = SceneGraph::default();
        let mut registry = InteractiveRegistry::default();
        for (x, title) in points {
            let anchor = Vec3::new(*x, 0.5, 0.0);
            let marker = scene.add_marker(*title, anchor);
            registry.register(marker, anchor, 2.5, InteractionPayload::text(*title, "body", 0xFFD700));
        }
        (scene, registry)
    }

    #[test]
    fn show_hide_scenario() {
        let (mut scene, registry) = world(&[(0.0, "orb")]);
        let mut system = ProximitySystem::new(&InteractionConfig::default());

        let out = system.step(&registry, Vec3::new(3.0, 0.5, 0.0), &mut scene);
        assert!(out.near.is_empty());
        assert!(!system.display().is_visible());
        assert_eq!(system.display().revision(), 0);

        let out = system.step(&registry, Vec3::new(2.0, 0.5, 0.0), &mut scene);
        assert_eq!(out.near, vec![ObjectId(0)]);
        assert!(matches!(out.event, Some(DisplayEvent::Shown { .. })));
        let panel = system.display().active().unwrap();
        assert_eq!(panel.payload.title(), "orb");
        assert_eq!(panel.payload.body(), "body");
        assert!(system.display().is_visible());

        let out = system.step(&registry, Vec3::new(5.0, 0.5, 0.0), &mut scene);
        assert_eq!(out.event, Some(DisplayEvent::Hidden { id: ObjectId(0) }));
        assert!(!system.display().is_visible());
        assert!(system.display().active().is_none());
    }

    #[test]
    fn staying_near_does_not_refire() {
        let (mut scene, registry) = world(&[(0.0, "orb")]);
        let mut system = ProximitySystem::new(&InteractionConfig::default());

        system.step(&registry, Vec3::new(1.0, 0.5, 0.0), &mut scene);
        let rev = system.display().revision();
        for i in 0..10 {
            let out = system.step(&registry, Vec3::new(1.0 - i as f32 * 0.1, 0.5, 0.0), &mut scene);
            assert!(out.event.is_none());
        }
        assert_eq!(system.display().revision(), rev);
    }

    #[test]
    fn boundary_is_not_near() {
        let (mut scene, registry) = world(&[(0.0, "orb")]);
        let mut system = ProximitySystem::new(&InteractionConfig::default());
        let out = system.step(&registry, Vec3::new(2.5, 0.5, 0.0), &mut scene);
        assert!(out.near.is_empty());
    }

    #[test]
    fn highlight_tracks_each_object_independently() {
        let (mut scene, registry) = world(&[(0.0, "a"), (3.0, "b"), (20.0, "c")]);
        let mut system = ProximitySystem::new(&InteractionConfig::default());

        let out = system.step(&registry, Vec3::new(1.5, 0.5, 0.0), &mut scene);
        assert_eq!(out.near, vec![ObjectId(0), ObjectId(1)]);
        let emissive: Vec<u32> = registry
            .iter()
            .map(|o| scene.node(o.marker).unwrap().emissive)
            .collect();
        assert_eq!(emissive, vec![0x333333, 0x333333, 0]);

        system.step(&registry, Vec3::new(19.0, 0.5, 0.0), &mut scene);
        let emissive: Vec<u32> = registry
            .iter()
            .map(|o| scene.node(o.marker).unwrap().emissive)
            .collect();
        assert_eq!(emissive, vec![0, 0, 0x333333]);
    }

    #[test]
    fn last_match_wins_over_nearest() {
        let (mut scene, registry) = world(&[(0.0, "close"), (2.0, "far")]);
        let mut system = ProximitySystem::new(&InteractionConfig::default());

        // 0.2 from "close", 1.8 from "far": registration order still picks "far".
        let out = system.step(&registry, Vec3::new(0.2, 0.5, 0.0), &mut scene);
        assert_eq!(out.resolved, Some(ObjectId(1)));
    }

    #[test]
    fn nearest_policy_picks_closest() {
        let (mut scene, registry) = world(&[(0.0, "close"), (2.0, "far")]);
        let cfg = InteractionConfig {
            policy: ProximityPolicy::Nearest,
            ..InteractionConfig::default()
        };
        let mut system = ProximitySystem::new(&cfg);

        let out = system.step(&registry, Vec3::new(0.2, 0.5, 0.0), &mut scene);
        assert_eq!(out.resolved, Some(ObjectId(0)));
        let out = system.step(&registry, Vec3::new(1.9, 0.5, 0.0), &mut scene);
        assert_eq!(out.resolved, Some(ObjectId(1)));
        assert!(matches!(out.event, Some(DisplayEvent::Shown { id: ObjectId(1), .. })));
    }

    #[test]
    fn empty_registry_is_quiet() {
        let mut scene = SceneGraph::default();
        let mut system = ProximitySystem::new(&InteractionConfig::default());
        let out = system.step(&InteractiveRegistry::default(), Vec3::ZERO, &mut scene);
        assert_eq!(out, ProximityOutcome::default());
    }

    #[test]
    fn payload_kinds_deserialize_by_tag() {
        let p: InteractionPayload = serde_json::from_str(
            r#"{ "kind": "project_card", "title": "Site", "summary": "A site", "accent": 65535 }"#,
        )
        .unwrap();
        assert_eq!(p.title(), "Site");
        assert_eq!(p.body(), "A site");
        assert_eq!(p.accent(), 0x00FFFF);
    }
}
