//! Layered scene graph for the map.
//!
//! The scene owns six layers in fixed paint order. Each layer holds a tree of
//! [`Node`]s. Redraws are tracked per layer so a host only repaints what changed.

mod circle;
mod group;
mod image;
mod line;
mod node;
mod rectangle;
mod text;

pub use circle::Circle;
pub use group::{Clip, Group};
pub use image::{Image, ImageFormat, ImageSource, ImageState};
pub use line::{Line, LineCap, LineJoin};
pub use node::{
    Node, NodeAttrs, NodeId, NodeTrait, SerializableColor, Tag, point_to_polyline_dist,
    point_to_segment_dist,
};
pub use rectangle::Rectangle;
pub use text::Text;

use crate::sync::SceneSnapshot;
use kurbo::{Affine, Point, Rect};
use serde::{Deserialize, Serialize};

/// Scene layers, listed back to front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Background,
    Grid,
    Brush,
    Objects,
    Tokens,
    Ui,
}

impl LayerKind {
    /// All layers in paint order.
    pub const ALL: [LayerKind; 6] = [
        LayerKind::Background,
        LayerKind::Grid,
        LayerKind::Brush,
        LayerKind::Objects,
        LayerKind::Tokens,
        LayerKind::Ui,
    ];

    /// Layers carried in a snapshot, in the order a receiver merges them.
    pub const TRANSMITTED: [LayerKind; 4] = [
        LayerKind::Background,
        LayerKind::Grid,
        LayerKind::Objects,
        LayerKind::Tokens,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LayerKind::Background => "background",
            LayerKind::Grid => "grid",
            LayerKind::Brush => "brush",
            LayerKind::Objects => "objects",
            LayerKind::Tokens => "tokens",
            LayerKind::Ui => "ui",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        LayerKind::ALL.into_iter().find(|kind| kind.name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }

    pub fn is_transmitted(self) -> bool {
        LayerKind::TRANSMITTED.contains(&self)
    }
}

/// A single layer and its top-level nodes (back to front).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub kind: LayerKind,
    #[serde(default = "visible_default")]
    pub visible: bool,
    #[serde(default)]
    pub children: Vec<Node>,
}

fn visible_default() -> bool {
    true
}

impl Layer {
    pub fn new(kind: LayerKind) -> Self {
        Self {
            kind,
            visible: true,
            children: Vec::new(),
        }
    }

    /// Total number of nodes in the layer, including nested ones.
    pub fn node_count(&self) -> usize {
        self.children.iter().map(Node::subtree_len).sum()
    }

    fn find(&self, id: NodeId) -> Option<&Node> {
        self.children.iter().find_map(|n| n.find(id))
    }

    fn find_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.children.iter_mut().find_map(|n| n.find_mut(id))
    }
}

/// Result of hit testing the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub layer: LayerKind,
    /// Ids from the top-level node down to the deepest node hit.
    pub path: Vec<NodeId>,
}

impl Hit {
    /// The deepest node hit.
    pub fn target(&self) -> Option<NodeId> {
        self.path.last().copied()
    }

    /// The top-level node containing the hit.
    pub fn root(&self) -> Option<NodeId> {
        self.path.first().copied()
    }
}

/// The scene graph.
#[derive(Debug, Clone)]
pub struct Scene {
    layers: [Layer; 6],
    redraws: Vec<LayerKind>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            layers: LayerKind::ALL.map(Layer::new),
            redraws: Vec::new(),
        }
    }

    pub fn layer(&self, kind: LayerKind) -> &Layer {
        &self.layers[kind.index()]
    }

    pub(crate) fn layer_mut(&mut self, kind: LayerKind) -> &mut Layer {
        &mut self.layers[kind.index()]
    }

    /// Layers in paint order.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    /// Append a node on top of a layer.
    pub fn add_node(&mut self, kind: LayerKind, node: Node) -> NodeId {
        let id = node.id();
        log::trace!("add {} {} to {}", node.kind_name(), id, kind.name());
        self.layer_mut(kind).children.push(node);
        self.request_redraw(kind);
        id
    }

    /// Detach a node (and its subtree) from wherever it lives.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let (kind, node) = self.layers.iter_mut().find_map(|layer| {
            remove_from(&mut layer.children, id).map(|node| (layer.kind, node))
        })?;
        self.request_redraw(kind);
        Some(node)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.layers.iter().find_map(|layer| layer.find(id))
    }

    /// Mutable access to a node. Callers mutating geometry should request a redraw.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.layers.iter_mut().find_map(|layer| layer.find_mut(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Layer containing the node, at any depth.
    pub fn layer_of(&self, id: NodeId) -> Option<LayerKind> {
        self.layers
            .iter()
            .find(|layer| layer.find(id).is_some())
            .map(|layer| layer.kind)
    }

    /// Ids from the top-level ancestor down to `id`.
    pub fn path_to(&self, id: NodeId) -> Option<Vec<NodeId>> {
        self.layers
            .iter()
            .flat_map(|layer| layer.children.iter())
            .find_map(|node| node.path_to(id))
    }

    /// The top-level node that contains `id` (which may be `id` itself).
    pub fn top_level_of(&self, id: NodeId) -> Option<NodeId> {
        self.path_to(id).and_then(|path| path.first().copied())
    }

    /// All nodes carrying `tag`, in paint order, at any depth.
    pub fn find_by_tag(&self, tag: Tag) -> Vec<NodeId> {
        let mut ids = Vec::new();
        for layer in &self.layers {
            for node in &layer.children {
                node.visit(&mut |n| {
                    if n.has_tag(tag) {
                        ids.push(n.id());
                    }
                });
            }
        }
        ids
    }

    /// Topmost node under a scene-space point, skipping hidden layers.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> Option<Hit> {
        for layer in self.layers.iter().rev() {
            if !layer.visible {
                continue;
            }
            for node in layer.children.iter().rev() {
                let mut path = Vec::new();
                if node.hit_path(point, tolerance, &mut path) {
                    path.reverse();
                    return Some(Hit {
                        layer: layer.kind,
                        path,
                    });
                }
            }
        }
        None
    }

    /// Node-to-scene transform, composed along the ancestor chain.
    pub fn world_transform(&self, id: NodeId) -> Option<Affine> {
        let path = self.path_to(id)?;
        let mut transform = Affine::IDENTITY;
        for ancestor in path {
            transform *= self.node(ancestor)?.transform();
        }
        Some(transform)
    }

    /// Bounding box of a node in scene coordinates.
    pub fn bounds_of(&self, id: NodeId) -> Option<Rect> {
        let node = self.node(id)?;
        let transform = self.world_transform(id)?;
        Some(transform.transform_rect_bbox(node.local_bounds()))
    }

    pub fn set_layer_visible(&mut self, kind: LayerKind, visible: bool) {
        let layer = self.layer_mut(kind);
        if layer.visible != visible {
            layer.visible = visible;
            self.request_redraw(kind);
        }
    }

    /// Swap in a new child list and return the detached old children.
    pub fn replace_layer_children(&mut self, kind: LayerKind, children: Vec<Node>) -> Vec<Node> {
        let old = std::mem::replace(&mut self.layer_mut(kind).children, children);
        self.request_redraw(kind);
        old
    }

    /// Remove every top-level node of a layer matching `remove`.
    pub fn remove_where(
        &mut self,
        kind: LayerKind,
        mut remove: impl FnMut(&Node) -> bool,
    ) -> usize {
        let layer = self.layer_mut(kind);
        let before = layer.children.len();
        layer.children.retain(|node| !remove(node));
        let removed = before - layer.children.len();
        if removed > 0 {
            self.request_redraw(kind);
        }
        removed
    }

    /// Visit every node of a layer mutably, in pre-order.
    pub fn for_each_mut(&mut self, kind: LayerKind, mut f: impl FnMut(&mut Node)) {
        for node in &mut self.layer_mut(kind).children {
            node.visit_mut(&mut f);
        }
    }

    /// Snapshot of the transmitted layers. Calibration is filled in by the session.
    pub fn serialize(&self) -> SceneSnapshot {
        SceneSnapshot {
            layers: LayerKind::TRANSMITTED
                .iter()
                .map(|&kind| self.layer(kind).clone())
                .collect(),
            calibration: None,
        }
    }

    /// Mark a layer as needing a repaint.
    pub fn request_redraw(&mut self, kind: LayerKind) {
        if !self.redraws.contains(&kind) {
            self.redraws.push(kind);
        }
    }

    /// Drain pending layer redraws, in the order they were requested.
    pub fn take_redraws(&mut self) -> Vec<LayerKind> {
        std::mem::take(&mut self.redraws)
    }
}

fn remove_from(children: &mut Vec<Node>, id: NodeId) -> Option<Node> {
    if let Some(index) = children.iter().position(|n| n.id() == id) {
        return Some(children.remove(index));
    }
    children
        .iter_mut()
        .filter_map(Node::children_mut)
        .find_map(|nested| remove_from(nested, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_at(x: f64, y: f64) -> Node {
        let ring = Circle::new(NodeAttrs::default(), 30.0).stroked(SerializableColor::white(), 2.0);
        Group::new(
            NodeAttrs::at(Point::new(x, y)).with_tag(Tag::Token),
            vec![ring.into()],
        )
        .into()
    }

    #[test]
    fn test_layers_in_paint_order() {
        let scene = Scene::new();
        let kinds: Vec<_> = scene.layers().map(|l| l.kind).collect();
        assert_eq!(kinds, LayerKind::ALL.to_vec());
        assert_eq!(LayerKind::from_name("tokens"), Some(LayerKind::Tokens));
        assert!(!LayerKind::Ui.is_transmitted());
        assert!(!LayerKind::Brush.is_transmitted());
    }

    #[test]
    fn test_add_and_remove_subtree() {
        let mut scene = Scene::new();
        let token = token_at(100.0, 100.0);
        let ring_id = token.children()[0].id();
        let id = scene.add_node(LayerKind::Tokens, token);

        assert_eq!(scene.layer_of(ring_id), Some(LayerKind::Tokens));
        assert_eq!(scene.top_level_of(ring_id), Some(id));
        assert_eq!(scene.path_to(ring_id), Some(vec![id, ring_id]));

        let removed = scene.remove_node(id).unwrap();
        assert_eq!(removed.subtree_len(), 2);
        assert!(!scene.contains(ring_id));
        assert!(scene.remove_node(id).is_none());
    }

    #[test]
    fn test_find_by_tag_is_deep() {
        let mut scene = Scene::new();
        let a = scene.add_node(LayerKind::Tokens, token_at(0.0, 0.0));
        let b = scene.add_node(LayerKind::Tokens, token_at(200.0, 0.0));
        assert_eq!(scene.find_by_tag(Tag::Token), vec![a, b]);
        assert!(scene.find_by_tag(Tag::Object).is_empty());
    }

    #[test]
    fn test_hit_test_front_to_back() {
        let mut scene = Scene::new();
        let bottom = scene.add_node(LayerKind::Tokens, token_at(100.0, 100.0));
        let top = scene.add_node(LayerKind::Tokens, token_at(110.0, 100.0));

        let hit = scene.hit_test(Point::new(105.0, 100.0), 0.0).unwrap();
        assert_eq!(hit.root(), Some(top));
        assert_eq!(hit.layer, LayerKind::Tokens);

        let hit = scene.hit_test(Point::new(75.0, 100.0), 0.0).unwrap();
        assert_eq!(hit.root(), Some(bottom));

        scene.set_layer_visible(LayerKind::Tokens, false);
        assert!(scene.hit_test(Point::new(105.0, 100.0), 0.0).is_none());
    }

    #[test]
    fn test_bounds_in_scene_coordinates() {
        let mut scene = Scene::new();
        let token = token_at(100.0, 50.0);
        let ring = token.children()[0].id();
        scene.add_node(LayerKind::Tokens, token);
        let bounds = scene.bounds_of(ring).unwrap();
        assert!((bounds.x0 - 69.0).abs() < 1e-9);
        assert!((bounds.y1 - 81.0).abs() < 1e-9);
    }

    #[test]
    fn test_redraws_are_per_layer_and_deduplicated() {
        let mut scene = Scene::new();
        scene.add_node(LayerKind::Tokens, token_at(0.0, 0.0));
        scene.add_node(LayerKind::Tokens, token_at(1.0, 0.0));
        scene.replace_layer_children(LayerKind::Grid, Vec::new());
        assert_eq!(scene.take_redraws(), vec![LayerKind::Tokens, LayerKind::Grid]);
        assert!(scene.take_redraws().is_empty());
    }

    #[test]
    fn test_serialize_carries_transmitted_layers_only() {
        let mut scene = Scene::new();
        scene.add_node(LayerKind::Tokens, token_at(0.0, 0.0));
        scene.add_node(
            LayerKind::Ui,
            Rectangle::new(NodeAttrs::default().with_tag(Tag::Handle), 5.0, 5.0).into(),
        );
        let snapshot = scene.serialize();
        let kinds: Vec<_> = snapshot.layers.iter().map(|l| l.kind).collect();
        assert_eq!(kinds, LayerKind::TRANSMITTED.to_vec());
        assert_eq!(snapshot.layers[3].children.len(), 1);
    }
}
