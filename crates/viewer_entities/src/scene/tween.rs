//! Linear tweens of node properties
//!
//! Entity movement, yaw changes and the damage flash are interpolated over a
//! few frames instead of snapping. Tweens are keyed by `(node, property)`:
//! starting a new tween on the same pair replaces the running one, and tweens
//! whose node has been destroyed are silently dropped on the next update.

use super::graph::{NodeId, SceneGraph};
use super::material::Color;
use crate::foundation::math::Vec3;
use std::collections::HashMap;

/// Values that can be linearly interpolated
pub trait Interpolate: Copy {
    /// Interpolate between `self` and `other` by `t` in `0.0..=1.0`
    fn lerp(&self, other: &Self, t: f32) -> Self;
}

impl Interpolate for f32 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Interpolate for Vec3 {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        self + (other - self) * t
    }
}

impl Interpolate for Color {
    fn lerp(&self, other: &Self, t: f32) -> Self {
        Color::lerp(self, other, t)
    }
}

/// Node property driven by a tween
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TweenProperty {
    /// Local position
    Position,
    /// Local Y rotation
    RotationY,
    /// Colour of the material at this index
    MaterialColor(usize),
}

#[derive(Debug, Clone, Copy)]
struct Tween<T: Interpolate> {
    from: T,
    to: T,
    elapsed_ms: f32,
    duration_ms: f32,
}

impl<T: Interpolate> Tween<T> {
    fn advance(&mut self, dt_ms: f32) -> (T, bool) {
        self.elapsed_ms += dt_ms;
        let t = (self.elapsed_ms / self.duration_ms).clamp(0.0, 1.0);
        (self.from.lerp(&self.to, t), t >= 1.0)
    }
}

#[derive(Debug, Clone, Copy)]
enum ActiveTween {
    Position(Tween<Vec3>),
    RotationY(Tween<f32>),
    Color(Tween<Color>),
}

/// Running tweens
#[derive(Default)]
pub struct TweenSet {
    active: HashMap<(NodeId, TweenProperty), ActiveTween>,
}

impl TweenSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `node` to `to` over `duration_ms`
    pub fn tween_position(&mut self, graph: &mut SceneGraph, node: NodeId, to: Vec3, duration_ms: f32) {
        let key = (node, TweenProperty::Position);
        self.active.remove(&key);
        let Some(target) = graph.get_mut(node) else {
            return;
        };
        if duration_ms <= 0.0 {
            target.transform.position = to;
            return;
        }
        let tween = Tween { from: target.transform.position, to, elapsed_ms: 0.0, duration_ms };
        self.active.insert(key, ActiveTween::Position(tween));
    }

    /// Turn `node` to the Y rotation `to` over `duration_ms`
    pub fn tween_rotation_y(&mut self, graph: &mut SceneGraph, node: NodeId, to: f32, duration_ms: f32) {
        let key = (node, TweenProperty::RotationY);
        self.active.remove(&key);
        let Some(target) = graph.get_mut(node) else {
            return;
        };
        if duration_ms <= 0.0 {
            target.transform.rotation.y = to;
            return;
        }
        let tween = Tween { from: target.transform.rotation.y, to, elapsed_ms: 0.0, duration_ms };
        self.active.insert(key, ActiveTween::RotationY(tween));
    }

    /// Fade the colour of material `index` on `node` from `from` to `to`
    pub fn tween_color(
        &mut self,
        graph: &mut SceneGraph,
        node: NodeId,
        index: usize,
        from: Color,
        to: Color,
        duration_ms: f32,
    ) {
        let key = (node, TweenProperty::MaterialColor(index));
        self.active.remove(&key);
        let Some(target) = graph.get_mut(node) else {
            return;
        };
        let mut materials = target.materials_mut();
        let Some(material) = materials.get_mut(index) else {
            return;
        };
        if duration_ms <= 0.0 {
            material.color = to;
            return;
        }
        material.color = from;
        let tween = Tween { from, to, elapsed_ms: 0.0, duration_ms };
        self.active.insert(key, ActiveTween::Color(tween));
    }

    /// Whether any tween drives `property` of `node`
    pub fn is_active(&self, node: NodeId, property: TweenProperty) -> bool {
        self.active.contains_key(&(node, property))
    }

    /// Colour a running colour tween on material `index` of `node` ends at
    pub fn color_target(&self, node: NodeId, index: usize) -> Option<Color> {
        match self.active.get(&(node, TweenProperty::MaterialColor(index)))? {
            ActiveTween::Color(t) => Some(t.to),
            _ => None,
        }
    }

    /// Number of running tweens
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether nothing is running
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Drop every tween
    pub fn clear(&mut self) {
        self.active.clear();
    }

    /// Advance all tweens by `dt_ms` and write the values into the graph
    pub fn update(&mut self, graph: &mut SceneGraph, dt_ms: f32) {
        self.active.retain(|&(node_id, property), tween| {
            let Some(node) = graph.get_mut(node_id) else {
                return false;
            };
            match (tween, property) {
                (ActiveTween::Position(t), _) => {
                    let (value, done) = t.advance(dt_ms);
                    node.transform.position = value;
                    !done
                }
                (ActiveTween::RotationY(t), _) => {
                    let (value, done) = t.advance(dt_ms);
                    node.transform.rotation.y = value;
                    !done
                }
                (ActiveTween::Color(t), TweenProperty::MaterialColor(index)) => {
                    let (value, done) = t.advance(dt_ms);
                    match node.materials_mut().get_mut(index) {
                        Some(material) => {
                            material.color = value;
                            !done
                        }
                        None => false,
                    }
                }
                (ActiveTween::Color(_), _) => false,
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::graph::SceneNode;
    use crate::scene::material::{Geometry, Material};
    use approx::assert_relative_eq;

    fn setup() -> (SceneGraph, NodeId) {
        let mut graph = SceneGraph::new();
        let node = graph.spawn(
            graph.root(),
            SceneNode::mesh("m", Geometry::cuboid(1.0, 1.0, 1.0), vec![Material::basic(Color::WHITE)]),
        );
        (graph, node)
    }

    #[test]
    fn test_position_tween_reaches_target() {
        let (mut graph, node) = setup();
        let mut tweens = TweenSet::new();
        tweens.tween_position(&mut graph, node, Vec3::new(12.0, 0.0, 0.0), 120.0);

        tweens.update(&mut graph, 60.0);
        assert_relative_eq!(graph.get(node).unwrap().transform.position.x, 6.0, epsilon = 1e-5);
        assert!(tweens.is_active(node, TweenProperty::Position));

        tweens.update(&mut graph, 100.0);
        assert_relative_eq!(graph.get(node).unwrap().transform.position.x, 12.0);
        assert!(tweens.is_empty());
    }

    #[test]
    fn test_zero_duration_applies_immediately() {
        let (mut graph, node) = setup();
        let mut tweens = TweenSet::new();
        tweens.tween_rotation_y(&mut graph, node, 1.5, 0.0);
        assert_eq!(graph.get(node).unwrap().transform.rotation.y, 1.5);
        assert!(tweens.is_empty());
    }

    #[test]
    fn test_new_tween_replaces_running_one() {
        let (mut graph, node) = setup();
        let mut tweens = TweenSet::new();
        tweens.tween_position(&mut graph, node, Vec3::new(10.0, 0.0, 0.0), 100.0);
        tweens.update(&mut graph, 50.0);
        tweens.tween_position(&mut graph, node, Vec3::new(2.0, 0.0, 0.0), 100.0);
        assert_eq!(tweens.len(), 1);

        tweens.update(&mut graph, 50.0);
        assert_relative_eq!(graph.get(node).unwrap().transform.position.x, 3.5, epsilon = 1e-5);
        tweens.update(&mut graph, 50.0);
        assert_relative_eq!(graph.get(node).unwrap().transform.position.x, 2.0);
    }

    #[test]
    fn test_destroyed_node_drops_tween() {
        let (mut graph, node) = setup();
        let mut tweens = TweenSet::new();
        tweens.tween_color(&mut graph, node, 0, Color::RED, Color::WHITE, 500.0);
        assert_eq!(graph.get(node).unwrap().materials()[0].color, Color::RED);

        graph.destroy(node);
        tweens.update(&mut graph, 16.0);
        assert!(tweens.is_empty());
    }

    #[test]
    fn test_color_fades_back() {
        let (mut graph, node) = setup();
        let mut tweens = TweenSet::new();
        tweens.tween_color(&mut graph, node, 0, Color::RED, Color::WHITE, 500.0);
        tweens.update(&mut graph, 250.0);
        assert_eq!(graph.get(node).unwrap().materials()[0].color, Color::rgb(1.0, 0.5, 0.5));
        tweens.update(&mut graph, 250.0);
        assert_eq!(graph.get(node).unwrap().materials()[0].color, Color::WHITE);
    }
}
