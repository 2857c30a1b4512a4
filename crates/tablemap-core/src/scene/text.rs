//! Text labels (ad-hoc token initials).

use super::{NodeAttrs, NodeTrait, SerializableColor};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Average glyph advance relative to font size, used for layout estimates.
const GLYPH_ADVANCE: f64 = 0.6;

/// A single-line text label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Text {
    pub attrs: NodeAttrs,
    pub content: String,
    pub font_size: f64,
    #[serde(default)]
    pub font_family: Option<String>,
    #[serde(default)]
    pub bold: bool,
    pub fill: SerializableColor,
    /// Shift applied before positioning, so `position` can be the visual center.
    #[serde(default)]
    pub offset: Vec2,
}

impl Text {
    pub fn new(attrs: NodeAttrs, content: String, font_size: f64, fill: SerializableColor) -> Self {
        Self {
            attrs,
            content,
            font_size,
            font_family: None,
            bold: false,
            fill,
            offset: Vec2::ZERO,
        }
    }

    /// Estimated layout size of the text.
    pub fn approx_size(&self) -> Vec2 {
        let chars = self.content.chars().count() as f64;
        Vec2::new(chars * self.font_size * GLYPH_ADVANCE, self.font_size)
    }

    /// Offset the label so its estimated center sits on `position`.
    pub fn centered(mut self) -> Self {
        self.offset = self.approx_size() / 2.0;
        self
    }
}

impl NodeTrait for Text {
    fn attrs(&self) -> &NodeAttrs {
        &self.attrs
    }

    fn attrs_mut(&mut self) -> &mut NodeAttrs {
        &mut self.attrs
    }

    fn local_bounds(&self) -> Rect {
        let size = self.approx_size();
        Rect::new(-self.offset.x, -self.offset.y, size.x - self.offset.x, size.y - self.offset.y)
    }

    fn hit_test_local(&self, point: Point, tolerance: f64) -> bool {
        self.local_bounds().inflate(tolerance, tolerance).contains(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_bounds_straddle_origin() {
        let text = Text::new(NodeAttrs::default(), "GO".into(), 20.0, SerializableColor::white())
            .centered();
        let bounds = text.local_bounds();
        assert!((bounds.center().x).abs() < 1e-9);
        assert!((bounds.center().y).abs() < 1e-9);
    }
}
