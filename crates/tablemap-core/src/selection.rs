//! Selection and manipulation handle system.
//!
//! At most one node is selected. While selected it carries an overlay in the
//! `ui` layer: an outline, four corner handles that resize with a kept aspect
//! ratio, and a rotate handle above the top edge.

use crate::scene::{
    Circle, LayerKind, Line, Node, NodeAttrs, NodeId, Rectangle, Scene, SerializableColor, Tag,
};
use kurbo::{Affine, Point, Vec2};

/// Handle size in screen pixels.
pub const HANDLE_SIZE: f64 = 10.0;
/// Handle hit tolerance in screen pixels.
pub const HANDLE_HIT_TOLERANCE: f64 = 12.0;
/// Distance from the top edge to the rotate handle, in screen pixels.
pub const ROTATE_HANDLE_OFFSET: f64 = 30.0;
/// Node hit tolerance in screen pixels.
pub const NODE_HIT_TOLERANCE: f64 = 1.0;
/// Resizing never shrinks a node below this fraction of its size at drag start.
const MIN_RESIZE_FACTOR: f64 = 0.05;

const OVERLAY_COLOR: SerializableColor = SerializableColor {
    r: 0,
    g: 161,
    b: 255,
    a: 255,
};

/// Corner positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    pub fn opposite(self) -> Self {
        match self {
            Corner::TopLeft => Corner::BottomRight,
            Corner::TopRight => Corner::BottomLeft,
            Corner::BottomLeft => Corner::TopRight,
            Corner::BottomRight => Corner::TopLeft,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Type of selection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// Corner resize handle, aspect ratio kept.
    Corner(Corner),
    /// Rotation handle above the top edge.
    Rotate,
}

/// A selection handle with its position and type.
#[derive(Debug, Clone, Copy)]
pub struct Handle {
    /// Position in scene coordinates.
    pub position: Point,
    pub kind: HandleKind,
}

impl Handle {
    pub fn new(position: Point, kind: HandleKind) -> Self {
        Self { position, kind }
    }

    /// Check if a scene point hits this handle. `tolerance` is in scene units.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        (point - self.position).hypot2() <= tolerance * tolerance
    }
}

/// The event a finished manipulation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManipulationEnd {
    /// A node was moved.
    DragEnd(NodeId),
    /// A node was resized or rotated.
    TransformEnd(NodeId),
}

/// What a press in select mode did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    /// Grabbed a handle of the current selection.
    Handle(HandleKind),
    /// Selected (or kept) a token/object node.
    Selected(NodeId),
    /// Pressed on empty stage, background or grid.
    Cleared,
}

#[derive(Debug, Clone)]
enum Gesture {
    Move {
        id: NodeId,
        last: Point,
        moved: bool,
    },
    Resize {
        id: NodeId,
        anchor: Point,
        grab: Point,
        start_position: Point,
        start_scale: Vec2,
    },
    Rotate {
        id: NodeId,
        center: Point,
        start_angle: f64,
        start_position: Point,
        start_rotation: f64,
    },
}

/// Tracks the active selection and its overlay.
#[derive(Debug, Clone, Default)]
pub struct SelectionController {
    selected: Option<NodeId>,
    handles: Vec<Handle>,
    gesture: Option<Gesture>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    pub fn is_selected(&self, id: NodeId) -> bool {
        self.selected == Some(id)
    }

    /// Handles of the current selection, in scene coordinates.
    pub fn handles(&self) -> &[Handle] {
        &self.handles
    }

    pub fn is_manipulating(&self) -> bool {
        self.gesture.is_some()
    }

    /// Select a node and attach the overlay. Returns false if the node is gone.
    pub fn select(&mut self, scene: &mut Scene, id: NodeId, scale: f64) -> bool {
        if !scene.contains(id) {
            return false;
        }
        self.selected = Some(id);
        self.refresh(scene, scale);
        true
    }

    /// Drop the selection and detach the overlay.
    pub fn clear(&mut self, scene: &mut Scene) {
        self.selected = None;
        self.gesture = None;
        self.handles.clear();
        scene.remove_where(LayerKind::Ui, |n| n.has_tag(Tag::Handle));
    }

    /// Remove the selected node from the scene and clear the overlay.
    pub fn delete_selection(&mut self, scene: &mut Scene) -> Option<Node> {
        let id = self.selected?;
        let removed = scene.remove_node(id);
        self.clear(scene);
        if let Some(node) = &removed {
            log::debug!("deleted {} {} ({} nodes)", node.kind_name(), id, node.subtree_len());
        }
        removed
    }

    /// Rebuild handles and overlay from the selected node's current geometry.
    pub fn refresh(&mut self, scene: &mut Scene, scale: f64) {
        scene.remove_where(LayerKind::Ui, |n| n.has_tag(Tag::Handle));
        let Some(id) = self.selected else {
            self.handles.clear();
            return;
        };
        let Some(corners) = world_corners(scene, id) else {
            self.selected = None;
            self.gesture = None;
            self.handles.clear();
            return;
        };
        self.handles = build_handles(&corners, scale);
        for node in overlay_nodes(&corners, &self.handles, scale) {
            scene.add_node(LayerKind::Ui, node);
        }
    }

    /// Which handle of the current selection lies under a scene point.
    pub fn hit_handle(&self, point: Point, scale: f64) -> Option<HandleKind> {
        let tolerance = HANDLE_HIT_TOLERANCE / scale;
        self.handles
            .iter()
            .find(|h| h.hit_test(point, tolerance))
            .map(|h| h.kind)
    }

    /// Begin a select-mode press at a scene point.
    pub fn press(&mut self, scene: &mut Scene, point: Point, scale: f64) -> PressOutcome {
        self.gesture = None;
        if let (Some(id), Some(kind)) = (self.selected, self.hit_handle(point, scale)) {
            if let Some(gesture) = begin_handle_gesture(scene, id, kind, point) {
                self.gesture = Some(gesture);
                return PressOutcome::Handle(kind);
            }
        }

        let target = scene
            .hit_test(point, NODE_HIT_TOLERANCE / scale)
            .filter(|hit| hit.layer != LayerKind::Ui)
            .and_then(|hit| {
                hit.path
                    .iter()
                    .rev()
                    .copied()
                    .find(|&id| scene.node(id).is_some_and(Node::is_selectable))
            });

        match target {
            Some(id) => {
                if !self.is_selected(id) {
                    self.select(scene, id, scale);
                }
                if scene.node(id).is_some_and(|n| n.attrs().draggable) {
                    self.gesture = Some(Gesture::Move {
                        id,
                        last: point,
                        moved: false,
                    });
                }
                PressOutcome::Selected(id)
            }
            None => {
                self.clear(scene);
                PressOutcome::Cleared
            }
        }
    }

    /// Continue the current gesture. Returns true if geometry changed.
    pub fn drag(&mut self, scene: &mut Scene, point: Point, scale: f64) -> bool {
        let Some(gesture) = self.gesture.as_mut() else {
            return false;
        };
        let id = match gesture {
            Gesture::Move { id, last, moved } => {
                let delta = point - *last;
                if delta == Vec2::ZERO {
                    return false;
                }
                let Some(node) = scene.node_mut(*id) else {
                    return false;
                };
                node.attrs_mut().position += delta;
                *last = point;
                *moved = true;
                *id
            }
            Gesture::Resize {
                id,
                anchor,
                grab,
                start_position,
                start_scale,
            } => {
                let diagonal = *grab - *anchor;
                let len_sq = diagonal.hypot2();
                if len_sq < f64::EPSILON {
                    return false;
                }
                let factor = ((point - *anchor).dot(diagonal) / len_sq).max(MIN_RESIZE_FACTOR);
                let Some(node) = scene.node_mut(*id) else {
                    return false;
                };
                let attrs = node.attrs_mut();
                attrs.position = *anchor + (*start_position - *anchor) * factor;
                attrs.scale = *start_scale * factor;
                *id
            }
            Gesture::Rotate {
                id,
                center,
                start_angle,
                start_position,
                start_rotation,
            } => {
                let angle = (point - *center).atan2() - *start_angle;
                let Some(node) = scene.node_mut(*id) else {
                    return false;
                };
                let attrs = node.attrs_mut();
                attrs.rotation = *start_rotation + angle;
                attrs.position = Affine::rotate_about(angle, *center) * *start_position;
                *id
            }
        };
        if let Some(kind) = scene.layer_of(id) {
            scene.request_redraw(kind);
        }
        self.refresh(scene, scale);
        true
    }

    /// Finish the current gesture.
    pub fn release(&mut self) -> Option<ManipulationEnd> {
        match self.gesture.take()? {
            Gesture::Move { id, moved: true, .. } => Some(ManipulationEnd::DragEnd(id)),
            Gesture::Move { .. } => None,
            Gesture::Resize { id, .. } | Gesture::Rotate { id, .. } => {
                Some(ManipulationEnd::TransformEnd(id))
            }
        }
    }
}

/// Scene-space corners of a node's local bounds, in `Corner::ALL` order.
fn world_corners(scene: &Scene, id: NodeId) -> Option<[Point; 4]> {
    let node = scene.node(id)?;
    let transform = scene.world_transform(id)?;
    let b = node.local_bounds();
    Some([
        transform * Point::new(b.x0, b.y0),
        transform * Point::new(b.x1, b.y0),
        transform * Point::new(b.x0, b.y1),
        transform * Point::new(b.x1, b.y1),
    ])
}

fn build_handles(corners: &[Point; 4], scale: f64) -> Vec<Handle> {
    let mut handles: Vec<Handle> = Corner::ALL
        .iter()
        .map(|&c| Handle::new(corners[c.index()], HandleKind::Corner(c)))
        .collect();

    let top_left = corners[Corner::TopLeft.index()];
    let top_right = corners[Corner::TopRight.index()];
    let bottom_left = corners[Corner::BottomLeft.index()];
    let top_center = top_left.midpoint(top_right);
    let up = top_left - bottom_left;
    let up = if up.hypot2() > f64::EPSILON {
        up.normalize()
    } else {
        Vec2::new(0.0, -1.0)
    };
    handles.push(Handle::new(
        top_center + up * (ROTATE_HANDLE_OFFSET / scale),
        HandleKind::Rotate,
    ));
    handles
}

fn overlay_nodes(corners: &[Point; 4], handles: &[Handle], scale: f64) -> Vec<Node> {
    let attrs = |position: Point| {
        NodeAttrs::at(position)
            .with_tag(Tag::Handle)
            .listening(false)
    };
    let outline_points = vec![
        corners[Corner::TopLeft.index()],
        corners[Corner::TopRight.index()],
        corners[Corner::BottomRight.index()],
        corners[Corner::BottomLeft.index()],
        corners[Corner::TopLeft.index()],
    ];
    let mut nodes = vec![Node::from(Line::new(
        attrs(Point::ZERO),
        outline_points,
        OVERLAY_COLOR,
        1.0 / scale,
    ))];

    let size = HANDLE_SIZE / scale;
    for handle in handles {
        let node: Node = match handle.kind {
            HandleKind::Corner(_) => {
                let origin = handle.position - Vec2::new(size / 2.0, size / 2.0);
                Rectangle::new(attrs(origin), size, size)
                    .stroked(OVERLAY_COLOR, 1.0 / scale)
                    .filled(SerializableColor::white())
                    .into()
            }
            HandleKind::Rotate => Circle::new(attrs(handle.position), size / 2.0)
                .stroked(OVERLAY_COLOR, 1.0 / scale)
                .filled(SerializableColor::white())
                .into(),
        };
        nodes.push(node);
    }
    nodes
}

fn begin_handle_gesture(
    scene: &Scene,
    id: NodeId,
    kind: HandleKind,
    point: Point,
) -> Option<Gesture> {
    let node = scene.node(id)?;
    let corners = world_corners(scene, id)?;
    let attrs = node.attrs();
    match kind {
        HandleKind::Corner(corner) => Some(Gesture::Resize {
            id,
            anchor: corners[corner.opposite().index()],
            grab: corners[corner.index()],
            start_position: attrs.position,
            start_scale: attrs.scale,
        }),
        HandleKind::Rotate => {
            let center =
                corners[Corner::TopLeft.index()].midpoint(corners[Corner::BottomRight.index()]);
            Some(Gesture::Rotate {
                id,
                center,
                start_angle: (point - center).atan2(),
                start_position: attrs.position,
                start_rotation: attrs.rotation,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Image, ImageSource};

    fn scene_with_object() -> (Scene, NodeId) {
        let mut scene = Scene::new();
        let image = Image::new(
            NodeAttrs::at(Point::new(100.0, 100.0))
                .with_tag(Tag::Object)
                .draggable(true),
            ImageSource::Url("/asset.png".into()),
        )
        .with_size(100.0, 50.0);
        let id = scene.add_node(LayerKind::Objects, image.into());
        (scene, id)
    }

    fn handle_count(scene: &Scene) -> usize {
        scene.find_by_tag(Tag::Handle).len()
    }

    #[test]
    fn test_select_attaches_overlay() {
        let (mut scene, id) = scene_with_object();
        let mut selection = SelectionController::new();
        assert!(selection.select(&mut scene, id, 1.0));
        assert_eq!(selection.handles().len(), 5);
        // Outline, four corners, rotate handle.
        assert_eq!(handle_count(&scene), 6);
        assert_eq!(
            selection.hit_handle(Point::new(200.0, 150.0), 1.0),
            Some(HandleKind::Corner(Corner::BottomRight))
        );

        selection.clear(&mut scene);
        assert_eq!(handle_count(&scene), 0);
        assert!(selection.selected().is_none());
    }

    #[test]
    fn test_press_on_empty_stage_clears() {
        let (mut scene, id) = scene_with_object();
        let mut selection = SelectionController::new();
        selection.select(&mut scene, id, 1.0);
        let outcome = selection.press(&mut scene, Point::new(600.0, 600.0), 1.0);
        assert_eq!(outcome, PressOutcome::Cleared);
        assert_eq!(handle_count(&scene), 0);
    }

    #[test]
    fn test_move_produces_drag_end() {
        let (mut scene, id) = scene_with_object();
        let mut selection = SelectionController::new();
        assert_eq!(
            selection.press(&mut scene, Point::new(120.0, 120.0), 1.0),
            PressOutcome::Selected(id)
        );
        assert!(selection.drag(&mut scene, Point::new(130.0, 125.0), 1.0));
        assert_eq!(selection.release(), Some(ManipulationEnd::DragEnd(id)));
        let position = scene.node(id).unwrap().attrs().position;
        assert!((position.x - 110.0).abs() < 1e-9);
        assert!((position.y - 105.0).abs() < 1e-9);
    }

    #[test]
    fn test_click_without_move_is_not_a_mutation() {
        let (mut scene, _) = scene_with_object();
        let mut selection = SelectionController::new();
        selection.press(&mut scene, Point::new(120.0, 120.0), 1.0);
        assert_eq!(selection.release(), None);
    }

    #[test]
    fn test_corner_resize_keeps_ratio_and_anchor() {
        let (mut scene, id) = scene_with_object();
        let mut selection = SelectionController::new();
        selection.select(&mut scene, id, 1.0);
        assert_eq!(
            selection.press(&mut scene, Point::new(200.0, 150.0), 1.0),
            PressOutcome::Handle(HandleKind::Corner(Corner::BottomRight))
        );
        selection.drag(&mut scene, Point::new(300.0, 200.0), 1.0);
        assert_eq!(selection.release(), Some(ManipulationEnd::TransformEnd(id)));

        let bounds = scene.bounds_of(id).unwrap();
        assert!((bounds.x0 - 100.0).abs() < 1e-9);
        assert!((bounds.y0 - 100.0).abs() < 1e-9);
        assert!((bounds.width() - 200.0).abs() < 1e-9);
        assert!((bounds.height() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_rotate_about_center() {
        let (mut scene, id) = scene_with_object();
        let mut selection = SelectionController::new();
        selection.select(&mut scene, id, 1.0);
        let rotate = selection
            .handles()
            .iter()
            .find(|h| h.kind == HandleKind::Rotate)
            .unwrap()
            .position;
        assert_eq!(
            selection.press(&mut scene, rotate, 1.0),
            PressOutcome::Handle(HandleKind::Rotate)
        );
        // Quarter turn clockwise around (150, 125).
        selection.drag(&mut scene, Point::new(250.0, 125.0), 1.0);
        selection.release();

        let node = scene.node(id).unwrap();
        assert!((node.attrs().rotation - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        let center = scene.bounds_of(id).unwrap().center();
        assert!((center.x - 150.0).abs() < 1e-9);
        assert!((center.y - 125.0).abs() < 1e-9);
    }

    #[test]
    fn test_delete_selection_removes_node_and_overlay() {
        let (mut scene, id) = scene_with_object();
        let mut selection = SelectionController::new();
        selection.select(&mut scene, id, 1.0);
        let removed = selection.delete_selection(&mut scene).unwrap();
        assert_eq!(removed.id(), id);
        assert_eq!(scene.layer(LayerKind::Objects).node_count(), 0);
        assert_eq!(handle_count(&scene), 0);
        assert!(selection.delete_selection(&mut scene).is_none());
    }
}
