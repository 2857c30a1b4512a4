//! Group node for combining child nodes under one transform.

use super::{Node, NodeAttrs, NodeId, NodeTrait};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Clip region applied to a group's children, in group-local space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clip {
    /// Circle centered on the group origin.
    Circle { radius: f64 },
}

/// A group of nodes that can be manipulated as a single unit.
/// Groups can contain other groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub attrs: NodeAttrs,
    pub children: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip: Option<Clip>,
}

impl Group {
    pub fn new(attrs: NodeAttrs, children: Vec<Node>) -> Self {
        Self {
            attrs,
            children,
            clip: None,
        }
    }

    pub fn clipped(mut self, clip: Clip) -> Self {
        self.clip = Some(clip);
        self
    }

    /// Get all node IDs in this group, including nested groups.
    pub fn all_node_ids(&self) -> Vec<NodeId> {
        let mut ids = vec![self.attrs.id];
        for child in &self.children {
            match child {
                Node::Group(group) => ids.extend(group.all_node_ids()),
                other => ids.push(other.id()),
            }
        }
        ids
    }

    fn clip_rect(&self) -> Option<Rect> {
        self.clip.map(|Clip::Circle { radius }| Rect::new(-radius, -radius, radius, radius))
    }

    pub(crate) fn clip_contains(&self, local: Point) -> bool {
        match self.clip {
            Some(Clip::Circle { radius }) => local.to_vec2().hypot() <= radius,
            None => true,
        }
    }
}

impl NodeTrait for Group {
    fn attrs(&self) -> &NodeAttrs {
        &self.attrs
    }

    fn attrs_mut(&mut self) -> &mut NodeAttrs {
        &mut self.attrs
    }

    fn local_bounds(&self) -> Rect {
        let mut iter = self.children.iter().map(Node::bounds);
        let Some(first) = iter.next() else {
            return Rect::ZERO;
        };
        let union = iter.fold(first, |acc, b| acc.union(b));
        match self.clip_rect() {
            Some(clip) => union.intersect(clip),
            None => union,
        }
    }

    fn hit_test_local(&self, point: Point, tolerance: f64) -> bool {
        self.clip_contains(point)
            && self
                .children
                .iter()
                .rev()
                .any(|child| child.hit_test(point, tolerance))
    }
}
