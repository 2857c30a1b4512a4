//! Freehand stroke capture.

use crate::scene::{LayerKind, Line, Node, NodeAttrs, NodeId, Scene, SerializableColor, Tag};
use kurbo::Point;

/// Smoothing applied to freehand strokes.
pub const BRUSH_TENSION: f64 = 0.5;

/// Captures one stroke at a time into the brush layer.
///
/// The in-progress stroke is a real node so it renders while drawing.
#[derive(Debug, Clone, Default)]
pub struct BrushTool {
    stroke: Option<NodeId>,
}

impl BrushTool {
    pub fn is_active(&self) -> bool {
        self.stroke.is_some()
    }

    pub fn active_stroke(&self) -> Option<NodeId> {
        self.stroke
    }

    /// Start a stroke seeded with `point`. An unfinished previous stroke is discarded.
    pub fn begin(
        &mut self,
        scene: &mut Scene,
        point: Point,
        color: SerializableColor,
        width: f64,
    ) -> NodeId {
        self.discard(scene);
        let line = Line::new(
            NodeAttrs::default().with_tag(Tag::Stroke),
            vec![point],
            color,
            width,
        )
        .smoothed(BRUSH_TENSION);
        let id = scene.add_node(LayerKind::Brush, line.into());
        self.stroke = Some(id);
        id
    }

    /// Append a point to the active stroke.
    pub fn extend(&mut self, scene: &mut Scene, point: Point) -> bool {
        let Some(id) = self.stroke else {
            return false;
        };
        let Some(line) = scene.node_mut(id).and_then(Node::as_line_mut) else {
            self.stroke = None;
            return false;
        };
        line.push_point(point);
        scene.request_redraw(LayerKind::Brush);
        true
    }

    /// Keep the stroke in the brush layer permanently.
    pub fn finish(&mut self) -> Option<NodeId> {
        self.stroke.take()
    }

    /// Remove an unfinished stroke from the scene.
    pub fn discard(&mut self, scene: &mut Scene) -> Option<Node> {
        let id = self.stroke.take()?;
        log::debug!("discarding unfinished stroke {id}");
        scene.remove_node(id)
    }
}
