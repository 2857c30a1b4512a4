//! Rectangle nodes (calibration preview, selection outline and handles).

use super::{NodeAttrs, NodeTrait, SerializableColor};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle anchored at its top-left corner.
///
/// Width and height may be negative while a drag is in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rectangle {
    pub attrs: NodeAttrs,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub stroke: Option<SerializableColor>,
    #[serde(default)]
    pub stroke_width: f64,
    #[serde(default)]
    pub fill: Option<SerializableColor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dash: Vec<f64>,
}

impl Rectangle {
    pub fn new(attrs: NodeAttrs, width: f64, height: f64) -> Self {
        Self {
            attrs,
            width,
            height,
            stroke: None,
            stroke_width: 0.0,
            fill: None,
            dash: Vec::new(),
        }
    }

    pub fn stroked(mut self, color: SerializableColor, width: f64) -> Self {
        self.stroke = Some(color);
        self.stroke_width = width;
        self
    }

    pub fn filled(mut self, color: SerializableColor) -> Self {
        self.fill = Some(color);
        self
    }

    pub fn dashed(mut self, dash: Vec<f64>) -> Self {
        self.dash = dash;
        self
    }

    /// Normalized rectangle in local space.
    pub fn as_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height).abs()
    }
}

impl NodeTrait for Rectangle {
    fn attrs(&self) -> &NodeAttrs {
        &self.attrs
    }

    fn attrs_mut(&mut self) -> &mut NodeAttrs {
        &mut self.attrs
    }

    fn local_bounds(&self) -> Rect {
        let half = self.stroke_width / 2.0;
        self.as_rect().inflate(half, half)
    }

    fn hit_test_local(&self, point: Point, tolerance: f64) -> bool {
        self.local_bounds().inflate(tolerance, tolerance).contains(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_extent_is_normalized() {
        let rect = Rectangle::new(NodeAttrs::default(), -20.0, -10.0);
        assert_eq!(rect.as_rect(), Rect::new(-20.0, -10.0, 0.0, 0.0));
        assert!(rect.hit_test_local(Point::new(-5.0, -5.0), 0.0));
    }
}
