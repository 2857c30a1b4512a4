//! Stage dragging in pan mode.

use kurbo::{Point, Vec2};

/// Tracks a stage drag in screen coordinates.
#[derive(Debug, Clone, Default)]
pub struct PanTool {
    last: Option<Point>,
}

impl PanTool {
    pub fn is_active(&self) -> bool {
        self.last.is_some()
    }

    pub fn grab(&mut self, screen_point: Point) {
        self.last = Some(screen_point);
    }

    /// Screen delta since the previous pointer position, if grabbed.
    pub fn drag(&mut self, screen_point: Point) -> Option<Vec2> {
        let last = self.last?;
        self.last = Some(screen_point);
        Some(screen_point - last)
    }

    /// Returns true if a drag was in progress.
    pub fn release(&mut self) -> bool {
        self.last.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drag_deltas() {
        let mut pan = PanTool::default();
        assert_eq!(pan.drag(Point::new(5.0, 5.0)), None);
        assert_eq!(pan.drag(Point::new(9.0, 9.0)), None);
        assert!(!pan.is_active());
        pan.grab(Point::new(10.0, 10.0));
        assert_eq!(pan.drag(Point::new(15.0, 8.0)), Some(Vec2::new(5.0, -2.0)));
        assert_eq!(pan.drag(Point::new(16.0, 8.0)), Some(Vec2::new(1.0, 0.0)));
        assert!(pan.release());
        assert!(!pan.release());
    }
}
