//! Node definitions shared by every layer of the scene.

use super::{Circle, Group, Image, Line, Rectangle, Text};
use kurbo::{Affine, Point, Rect, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Unique identifier for nodes.
///
/// Identities are never serialized: a node rebuilt from a snapshot is a new
/// local node with a fresh id.
pub type NodeId = Uuid;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(color: &str) -> Option<Self> {
        let hex = color.trim().strip_prefix('#')?;
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let r = channel(&hex[0..1])? * 17;
                let g = channel(&hex[1..2])? * 17;
                let b = channel(&hex[2..3])? * 17;
                Some(Self::new(r, g, b, 255))
            }
            6 => Some(Self::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                255,
            )),
            8 => Some(Self::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                channel(&hex[6..8])?,
            )),
            _ => None,
        }
    }

    /// Format as `#rrggbb` (or `#rrggbbaa` when not opaque).
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Marker carried by nodes so tools can find them by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    /// A movable character/creature token (selectable).
    Token,
    /// A placed static object (selectable).
    Object,
    /// The background map image.
    Background,
    /// A finished or in-progress brush stroke.
    Stroke,
    /// Grid line geometry.
    Grid,
    /// Selection overlay geometry (ui layer only).
    Handle,
    /// Calibration rectangle preview (ui layer only).
    CalibrationPreview,
}

impl Tag {
    /// Tags that make a node a selection target.
    pub const SELECTABLE: [Tag; 2] = [Tag::Token, Tag::Object];
}

fn unit_scale() -> Vec2 {
    Vec2::new(1.0, 1.0)
}

fn listening_default() -> bool {
    true
}

/// Attributes common to every node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeAttrs {
    #[serde(skip, default = "Uuid::new_v4")]
    pub(crate) id: NodeId,
    /// Position in the parent's coordinate space.
    pub position: Point,
    /// Rotation in radians.
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "unit_scale")]
    pub scale: Vec2,
    #[serde(default)]
    pub draggable: bool,
    /// Whether the node takes part in hit testing.
    #[serde(default = "listening_default")]
    pub listening: bool,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<Tag>,
}

impl Default for NodeAttrs {
    fn default() -> Self {
        Self::at(Point::ZERO)
    }
}

impl NodeAttrs {
    /// Attributes for a fresh node at `position`.
    pub fn at(position: Point) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            rotation: 0.0,
            scale: unit_scale(),
            draggable: false,
            listening: true,
            tags: BTreeSet::new(),
        }
    }

    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.insert(tag);
        self
    }

    pub fn draggable(mut self, draggable: bool) -> Self {
        self.draggable = draggable;
        self
    }

    pub fn listening(mut self, listening: bool) -> Self {
        self.listening = listening;
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }

    /// Local-to-parent transform.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.position.to_vec2())
            * Affine::rotate(self.rotation)
            * Affine::scale_non_uniform(self.scale.x, self.scale.y)
    }

    /// Largest absolute scale factor, used to map tolerances into local space.
    pub(crate) fn max_scale(&self) -> f64 {
        self.scale.x.abs().max(self.scale.y.abs()).max(f64::EPSILON)
    }
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = Vec2::new(b.x - a.x, b.y - a.y);
    let pv = Vec2::new(point.x - a.x, point.y - a.y);
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = Point::new(a.x + t * seg.x, a.y + t * seg.y);
    ((point.x - proj.x).powi(2) + (point.y - proj.y).powi(2)).sqrt()
}

/// Minimum distance from a point to a polyline.
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    if let [only] = points {
        return (point - *only).hypot();
    }
    points
        .windows(2)
        .map(|w| point_to_segment_dist(point, w[0], w[1]))
        .fold(f64::INFINITY, f64::min)
}

/// Behaviour every node variant provides.
pub trait NodeTrait {
    fn attrs(&self) -> &NodeAttrs;

    fn attrs_mut(&mut self) -> &mut NodeAttrs;

    /// Bounding box in the node's own coordinate space.
    fn local_bounds(&self) -> Rect;

    /// Hit test against a point already mapped into local space.
    fn hit_test_local(&self, point: Point, tolerance: f64) -> bool;
}

/// Enum wrapper for all node types (for serialization).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Node {
    Image(Image),
    Line(Line),
    Rectangle(Rectangle),
    Circle(Circle),
    Text(Text),
    Group(Group),
}

impl Node {
    fn inner(&self) -> &dyn NodeTrait {
        match self {
            Node::Image(n) => n,
            Node::Line(n) => n,
            Node::Rectangle(n) => n,
            Node::Circle(n) => n,
            Node::Text(n) => n,
            Node::Group(n) => n,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn NodeTrait {
        match self {
            Node::Image(n) => n,
            Node::Line(n) => n,
            Node::Rectangle(n) => n,
            Node::Circle(n) => n,
            Node::Text(n) => n,
            Node::Group(n) => n,
        }
    }

    pub fn id(&self) -> NodeId {
        self.attrs().id
    }

    pub fn attrs(&self) -> &NodeAttrs {
        self.inner().attrs()
    }

    pub fn attrs_mut(&mut self) -> &mut NodeAttrs {
        self.inner_mut().attrs_mut()
    }

    /// Short type name, as shown in logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Image(_) => "image",
            Node::Line(_) => "line",
            Node::Rectangle(_) => "rect",
            Node::Circle(_) => "circle",
            Node::Text(_) => "text",
            Node::Group(_) => "group",
        }
    }

    pub fn has_tag(&self, tag: Tag) -> bool {
        self.attrs().has_tag(tag)
    }

    /// Whether the node is a token or object, i.e. something the select tool picks.
    pub fn is_selectable(&self) -> bool {
        Tag::SELECTABLE.iter().any(|&tag| self.has_tag(tag))
    }

    /// Local-to-parent transform.
    pub fn transform(&self) -> Affine {
        self.attrs().transform()
    }

    pub fn local_bounds(&self) -> Rect {
        self.inner().local_bounds()
    }

    /// Bounding box in the parent's coordinate space.
    pub fn bounds(&self) -> Rect {
        self.transform().transform_rect_bbox(self.local_bounds())
    }

    /// Hit test with `point` in the parent's coordinate space.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let mut path = Vec::new();
        self.hit_path(point, tolerance, &mut path)
    }

    /// Hit test that records the hit chain, deepest node first.
    pub(crate) fn hit_path(&self, point: Point, tolerance: f64, path: &mut Vec<NodeId>) -> bool {
        let attrs = self.attrs();
        if !attrs.listening {
            return false;
        }
        let local = attrs.transform().inverse() * point;
        let local_tolerance = tolerance / attrs.max_scale();
        match self {
            Node::Group(group) => {
                if !group.clip_contains(local) {
                    return false;
                }
                for child in group.children.iter().rev() {
                    if child.hit_path(local, local_tolerance, path) {
                        path.push(attrs.id);
                        return true;
                    }
                }
                false
            }
            _ => {
                if self.inner().hit_test_local(local, local_tolerance) {
                    path.push(attrs.id);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Group(g) => &g.children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Group(g) => Some(&mut g.children),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&Image> {
        match self {
            Node::Image(img) => Some(img),
            _ => None,
        }
    }

    pub fn as_image_mut(&mut self) -> Option<&mut Image> {
        match self {
            Node::Image(img) => Some(img),
            _ => None,
        }
    }

    pub fn as_line(&self) -> Option<&Line> {
        match self {
            Node::Line(line) => Some(line),
            _ => None,
        }
    }

    pub fn as_line_mut(&mut self) -> Option<&mut Line> {
        match self {
            Node::Line(line) => Some(line),
            _ => None,
        }
    }

    pub fn as_rectangle_mut(&mut self) -> Option<&mut Rectangle> {
        match self {
            Node::Rectangle(rect) => Some(rect),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Node::Group(g) => Some(g),
            _ => None,
        }
    }

    /// Number of nodes in this subtree, including this one.
    pub fn subtree_len(&self) -> usize {
        1 + self.children().iter().map(Node::subtree_len).sum::<usize>()
    }

    /// Visit this node and all descendants in pre-order.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Node)) {
        f(self);
        for child in self.children() {
            child.visit(f);
        }
    }

    /// Mutable pre-order visit.
    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut Node)) {
        f(self);
        if let Some(children) = self.children_mut() {
            for child in children {
                child.visit_mut(f);
            }
        }
    }

    /// Find a node by ID within this subtree.
    pub fn find(&self, id: NodeId) -> Option<&Node> {
        if self.id() == id {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(id))
    }

    /// Find a mutable node by ID within this subtree.
    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if self.id() == id {
            return Some(self);
        }
        self.children_mut()?
            .iter_mut()
            .find_map(|child| child.find_mut(id))
    }

    /// Chain of ids from this node down to `id` (inclusive), if present.
    pub(crate) fn path_to(&self, id: NodeId) -> Option<Vec<NodeId>> {
        if self.id() == id {
            return Some(vec![id]);
        }
        for child in self.children() {
            if let Some(mut path) = child.path_to(id) {
                path.insert(0, self.id());
                return Some(path);
            }
        }
        None
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Node {
                fn from(node: $variant) -> Self {
                    Node::$variant(node)
                }
            }
        )*
    };
}

impl_from_variant!(Image, Line, Rectangle, Circle, Text, Group);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let color = SerializableColor::from_hex("#00D2FF").unwrap();
        assert_eq!(color, SerializableColor::new(0, 210, 255, 255));
        assert_eq!(color.to_hex(), "#00d2ff");
        assert_eq!(
            SerializableColor::from_hex("#fff"),
            Some(SerializableColor::white())
        );
        assert!(SerializableColor::from_hex("blue").is_none());
    }

    #[test]
    fn test_hex_rejects_non_digits() {
        assert!(SerializableColor::from_hex("#aé").is_none());
        assert!(SerializableColor::from_hex("#aé123").is_none());
        assert!(SerializableColor::from_hex("#+f+f+f").is_none());
        assert!(SerializableColor::from_hex("#12345g").is_none());
    }

    #[test]
    fn test_peniko_conversion() {
        let color = SerializableColor::new(0, 161, 255, 128);
        let back = SerializableColor::from(Color::from(color));
        assert_eq!(back, color);
    }

    #[test]
    fn test_transform_applies_position_and_scale() {
        let mut attrs = NodeAttrs::at(Point::new(10.0, 20.0));
        attrs.scale = Vec2::new(2.0, 2.0);
        let p = attrs.transform() * Point::new(5.0, 5.0);
        assert!((p.x - 20.0).abs() < 1e-9);
        assert!((p.y - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_segment_distance() {
        let d = point_to_segment_dist(Point::new(5.0, 3.0), Point::ZERO, Point::new(10.0, 0.0));
        assert!((d - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_ids_are_not_serialized() {
        let rect = Rectangle::new(NodeAttrs::at(Point::new(1.0, 2.0)), 10.0, 10.0);
        let node = Node::from(rect);
        let json = serde_json::to_string(&node).unwrap();
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_ne!(node.id(), back.id());
        assert_eq!(json, serde_json::to_string(&back).unwrap());
    }
}
