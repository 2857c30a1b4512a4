//! Circle nodes, centered on their position.

use super::{NodeAttrs, NodeTrait, SerializableColor};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Circle {
    pub attrs: NodeAttrs,
    pub radius: f64,
    #[serde(default)]
    pub stroke: Option<SerializableColor>,
    #[serde(default)]
    pub stroke_width: f64,
    #[serde(default)]
    pub fill: Option<SerializableColor>,
}

impl Circle {
    pub fn new(attrs: NodeAttrs, radius: f64) -> Self {
        Self {
            attrs,
            radius,
            stroke: None,
            stroke_width: 0.0,
            fill: None,
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
}

impl NodeTrait for Circle {
    fn attrs(&self) -> &NodeAttrs {
        &self.attrs
    }

    fn attrs_mut(&mut self) -> &mut NodeAttrs {
        &mut self.attrs
    }

    fn local_bounds(&self) -> Rect {
        let r = self.radius + self.stroke_width / 2.0;
        Rect::new(-r, -r, r, r)
    }

    fn hit_test_local(&self, point: Point, tolerance: f64) -> bool {
        point.to_vec2().hypot() <= self.radius + self.stroke_width / 2.0 + tolerance
    }
}
