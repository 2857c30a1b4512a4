//! Grid line geometry derived from the viewport and calibration.

use crate::scene::{Group, Line, Node, NodeAttrs, SerializableColor, Tag};
use crate::viewport::Viewport;
use kurbo::{Point, Rect};

/// Scene units per grid cell before any calibration.
pub const DEFAULT_CELL_SIZE: f64 = 50.0;
/// Cells smaller than this on screen are not drawn.
pub const MIN_CELL_SCREEN_PX: f64 = 5.0;

/// Visible grid lines in scene coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridGeometry {
    /// X coordinates of vertical lines.
    pub vertical: Vec<f64>,
    /// Y coordinates of horizontal lines.
    pub horizontal: Vec<f64>,
    /// Area the lines span.
    pub extent: Rect,
    /// Line width in scene units (one screen pixel).
    pub stroke_width: f64,
}

impl GridGeometry {
    pub fn is_empty(&self) -> bool {
        self.vertical.is_empty() && self.horizontal.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.vertical.len() + self.horizontal.len()
    }

    /// Grid nodes for the grid layer: a single non-listening group, or nothing.
    pub fn to_nodes(&self) -> Vec<Node> {
        if self.is_empty() {
            return Vec::new();
        }
        let line = |a: Point, b: Point| -> Node {
            Line::new(
                NodeAttrs::default().listening(false),
                vec![a, b],
                SerializableColor::black(),
                self.stroke_width,
            )
            .into()
        };
        let extent = self.extent;
        let children = self
            .vertical
            .iter()
            .map(|&x| line(Point::new(x, extent.y0), Point::new(x, extent.y1)))
            .chain(
                self.horizontal
                    .iter()
                    .map(|&y| line(Point::new(extent.x0, y), Point::new(extent.x1, y))),
            )
            .collect();
        let attrs = NodeAttrs::default().listening(false).with_tag(Tag::Grid);
        vec![Group::new(attrs, children).into()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CacheKey {
    revision: u64,
    cell_size: f64,
    enabled: bool,
}

/// Computes grid geometry, recomputing only when its inputs change.
#[derive(Debug, Clone)]
pub struct GridRenderer {
    cell_size: f64,
    enabled: bool,
    cache: Option<CacheKey>,
    geometry: GridGeometry,
}

impl Default for GridRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

impl GridRenderer {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            enabled: true,
            cache: None,
            geometry: GridGeometry::default(),
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Ignores non-positive or non-finite sizes.
    pub fn set_cell_size(&mut self, cell_size: f64) {
        if cell_size.is_finite() && cell_size > 0.0 {
            self.cell_size = cell_size;
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Disabling clears the geometry but keeps the cell size.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Recompute if the viewport or calibration changed since the last call.
    ///
    /// Returns the new geometry when it was recomputed, `None` on a cache hit.
    pub fn update(&mut self, viewport: &Viewport) -> Option<&GridGeometry> {
        let key = CacheKey {
            revision: viewport.revision(),
            cell_size: self.cell_size,
            enabled: self.enabled,
        };
        if self.cache == Some(key) {
            return None;
        }
        self.cache = Some(key);
        self.geometry = if self.enabled {
            compute(viewport, self.cell_size)
        } else {
            GridGeometry::default()
        };
        log::trace!(
            "grid recomputed: {} lines at cell {}",
            self.geometry.line_count(),
            self.cell_size
        );
        Some(&self.geometry)
    }

    /// Forget the cache so the next update recomputes.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }
}

/// Lines covering the visible scene rect plus one cell on every edge.
pub fn compute(viewport: &Viewport, cell_size: f64) -> GridGeometry {
    let scale = viewport.scale();
    if cell_size <= 0.0 || cell_size * scale < MIN_CELL_SCREEN_PX {
        return GridGeometry::default();
    }
    let visible = viewport.visible_scene_rect();
    let first_col = (visible.x0 / cell_size).floor() as i64 - 1;
    let last_col = (visible.x1 / cell_size).ceil() as i64 + 1;
    let first_row = (visible.y0 / cell_size).floor() as i64 - 1;
    let last_row = (visible.y1 / cell_size).ceil() as i64 + 1;

    let vertical: Vec<f64> = (first_col..=last_col).map(|i| i as f64 * cell_size).collect();
    let horizontal: Vec<f64> = (first_row..=last_row).map(|i| i as f64 * cell_size).collect();
    let extent = Rect::new(
        first_col as f64 * cell_size,
        first_row as f64 * cell_size,
        last_col as f64 * cell_size,
        last_row as f64 * cell_size,
    );

    GridGeometry {
        vertical,
        horizontal,
        extent,
        stroke_width: 1.0 / scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Size, Vec2};

    #[test]
    fn test_lines_cover_visible_area_plus_margin() {
        let viewport = Viewport::new(Size::new(200.0, 100.0));
        let geometry = compute(&viewport, 50.0);
        // Columns -1..=5, rows -1..=3.
        assert_eq!(geometry.vertical.len(), 7);
        assert_eq!(geometry.horizontal.len(), 5);
        assert_eq!(geometry.vertical[0], -50.0);
        assert_eq!(geometry.extent, Rect::new(-50.0, -50.0, 250.0, 150.0));
        assert!((geometry.stroke_width - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stroke_is_one_screen_pixel() {
        let mut viewport = Viewport::new(Size::new(200.0, 100.0));
        viewport.set_transform(4.0, Vec2::new(-33.0, 12.0));
        let geometry = compute(&viewport, 50.0);
        assert!((geometry.stroke_width - 0.25).abs() < f64::EPSILON);
        let visible = viewport.visible_scene_rect();
        assert!(geometry.extent.x0 <= visible.x0 - 50.0 + 1e-9);
        assert!(geometry.extent.y1 >= visible.y1 + 50.0 - 1e-9);
    }

    #[test]
    fn test_tiny_cells_render_nothing() {
        let mut viewport = Viewport::default();
        viewport.set_transform(0.09, Vec2::ZERO);
        assert!(compute(&viewport, 50.0).is_empty());
        viewport.set_transform(0.1, Vec2::ZERO);
        assert!(!compute(&viewport, 50.0).is_empty());
    }

    #[test]
    fn test_cache_and_disable() {
        let mut viewport = Viewport::new(Size::new(200.0, 100.0));
        let mut grid = GridRenderer::default();
        assert!(grid.update(&viewport).is_some());
        assert!(grid.update(&viewport).is_none());

        viewport.pan(Vec2::new(10.0, 0.0));
        assert!(grid.update(&viewport).is_some());

        grid.set_enabled(false);
        assert!(grid.update(&viewport).unwrap().is_empty());
        assert_eq!(grid.cell_size(), DEFAULT_CELL_SIZE);
        assert!(grid.geometry().to_nodes().is_empty());
    }

    #[test]
    fn test_nodes_are_one_non_listening_group() {
        let viewport = Viewport::new(Size::new(200.0, 100.0));
        let geometry = compute(&viewport, 50.0);
        let nodes = geometry.to_nodes();
        assert_eq!(nodes.len(), 1);
        assert!(!nodes[0].attrs().listening);
        assert!(nodes[0].has_tag(Tag::Grid));
        assert_eq!(nodes[0].children().len(), geometry.line_count());
    }
}
