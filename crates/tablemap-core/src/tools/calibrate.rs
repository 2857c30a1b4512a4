//! Rectangle-drag calibration of the grid cell size.

use crate::scene::{LayerKind, Node, NodeAttrs, NodeId, Rectangle, Scene, SerializableColor, Tag};
use kurbo::Point;

/// Calibrations smaller than this many screen pixels are ignored.
pub const MIN_CALIBRATION_PX: f64 = 5.0;

const PREVIEW_STROKE_PX: f64 = 2.0;
const PREVIEW_DASH_PX: [f64; 2] = [10.0, 5.0];

/// Result of releasing the calibration rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationOutcome {
    /// New cell size in scene units.
    Committed { cell_size: f64 },
    /// Too small (or never started); nothing changes.
    Discarded,
}

#[derive(Debug, Clone)]
struct CalibrationDrag {
    origin: Point,
    preview: NodeId,
}

/// One-shot rectangle drag whose average side becomes the cell size.
#[derive(Debug, Clone, Default)]
pub struct CalibrationTool {
    drag: Option<CalibrationDrag>,
}

impl CalibrationTool {
    pub fn is_active(&self) -> bool {
        self.drag.is_some()
    }

    /// Start a rectangle at a scene point; the preview lives in the `ui` layer.
    pub fn begin(&mut self, scene: &mut Scene, point: Point, scale: f64) {
        self.cancel(scene);
        let preview = Rectangle::new(
            NodeAttrs::at(point)
                .with_tag(Tag::CalibrationPreview)
                .listening(false),
            0.0,
            0.0,
        )
        .stroked(SerializableColor::new(255, 0, 0, 255), PREVIEW_STROKE_PX / scale)
        .dashed(PREVIEW_DASH_PX.iter().map(|d| d / scale).collect());
        let id = scene.add_node(LayerKind::Ui, preview.into());
        self.drag = Some(CalibrationDrag {
            origin: point,
            preview: id,
        });
    }

    /// Stretch the rectangle to a scene point. Negative extents are allowed.
    pub fn resize(&mut self, scene: &mut Scene, point: Point) -> bool {
        let Some(drag) = &self.drag else {
            return false;
        };
        let Some(rect) = scene.node_mut(drag.preview).and_then(Node::as_rectangle_mut) else {
            return false;
        };
        rect.width = point.x - drag.origin.x;
        rect.height = point.y - drag.origin.y;
        scene.request_redraw(LayerKind::Ui);
        true
    }

    /// Remove the preview and decide whether the drag calibrates the grid.
    pub fn finish(&mut self, scene: &mut Scene, scale: f64) -> CalibrationOutcome {
        let Some(drag) = self.drag.take() else {
            return CalibrationOutcome::Discarded;
        };
        let Some(Node::Rectangle(rect)) = scene.remove_node(drag.preview) else {
            return CalibrationOutcome::Discarded;
        };
        let avg = (rect.width.abs() + rect.height.abs()) / 2.0;
        if avg * scale > MIN_CALIBRATION_PX {
            log::info!("calibrated cell size to {avg:.2}");
            CalibrationOutcome::Committed { cell_size: avg }
        } else {
            log::debug!("calibration of {avg:.2} too small, ignored");
            CalibrationOutcome::Discarded
        }
    }

    /// Abandon an in-progress rectangle.
    pub fn cancel(&mut self, scene: &mut Scene) {
        if let Some(drag) = self.drag.take() {
            scene.remove_node(drag.preview);
        }
    }
}
