//! Polyline nodes, used for grid lines and brush strokes.

use super::{NodeAttrs, NodeTrait, SerializableColor, point_to_polyline_dist};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Line cap style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

/// Line join style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

/// An open or closed polyline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub attrs: NodeAttrs,
    pub points: Vec<Point>,
    pub stroke: SerializableColor,
    pub stroke_width: f64,
    #[serde(default)]
    pub cap: LineCap,
    #[serde(default)]
    pub join: LineJoin,
    /// Curve smoothing factor; 0 draws straight segments.
    #[serde(default)]
    pub tension: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dash: Vec<f64>,
}

impl Line {
    pub fn new(
        attrs: NodeAttrs,
        points: Vec<Point>,
        stroke: SerializableColor,
        stroke_width: f64,
    ) -> Self {
        Self {
            attrs,
            points,
            stroke,
            stroke_width,
            cap: LineCap::Butt,
            join: LineJoin::Miter,
            tension: 0.0,
            dash: Vec::new(),
        }
    }

    /// Round caps and joins with smoothing, as freehand strokes are drawn.
    pub fn smoothed(mut self, tension: f64) -> Self {
        self.cap = LineCap::Round;
        self.join = LineJoin::Round;
        self.tension = tension;
        self
    }

    /// Append a point to the end of the polyline.
    pub fn push_point(&mut self, point: Point) {
        self.points.push(point);
    }
}

impl NodeTrait for Line {
    fn attrs(&self) -> &NodeAttrs {
        &self.attrs
    }

    fn attrs_mut(&mut self) -> &mut NodeAttrs {
        &mut self.attrs
    }

    fn local_bounds(&self) -> Rect {
        let Some(first) = self.points.first() else {
            return Rect::ZERO;
        };
        let half = self.stroke_width / 2.0;
        self.points
            .iter()
            .fold(Rect::from_points(*first, *first), |acc, p| {
                acc.union_pt(*p)
            })
            .inflate(half, half)
    }

    fn hit_test_local(&self, point: Point, tolerance: f64) -> bool {
        if self.points.is_empty() {
            return false;
        }
        point_to_polyline_dist(point, &self.points) <= tolerance + self.stroke_width / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stroke() -> Line {
        Line::new(
            NodeAttrs::default(),
            vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0), Point::new(100.0, 50.0)],
            SerializableColor::black(),
            4.0,
        )
    }

    #[test]
    fn test_bounds_include_stroke_width() {
        let bounds = stroke().local_bounds();
        assert!((bounds.x0 + 2.0).abs() < 1e-9);
        assert!((bounds.y1 - 52.0).abs() < 1e-9);
    }

    #[test]
    fn test_hit_near_segment() {
        let line = stroke();
        assert!(line.hit_test_local(Point::new(50.0, 3.0), 2.0));
        assert!(!line.hit_test_local(Point::new(50.0, 20.0), 2.0));
    }

    #[test]
    fn test_empty_line() {
        let line = Line::new(NodeAttrs::default(), Vec::new(), SerializableColor::black(), 1.0);
        assert_eq!(line.local_bounds(), Rect::ZERO);
        assert!(!line.hit_test_local(Point::ZERO, 10.0));
    }
}
