//! Viewport module for pan/zoom transforms.

use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// Multiplier applied per zoom step.
pub const ZOOM_STEP: f64 = 1.1;
/// Smallest allowed scale.
pub const MIN_SCALE: f64 = 0.05;
/// Largest allowed scale.
pub const MAX_SCALE: f64 = 20.0;

/// Direction of a single zoom step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

impl ZoomDirection {
    /// Wheel scrolling up (negative delta) zooms in.
    pub fn from_wheel(delta_y: f64) -> Self {
        if delta_y < 0.0 {
            ZoomDirection::In
        } else {
            ZoomDirection::Out
        }
    }
}

/// Viewport manages the view transform for the stage.
///
/// It handles panning (translation) and zooming (scaling) operations,
/// converting between screen coordinates and scene coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    /// Screen-space translation of the scene origin
    offset: Vec2,
    /// Current uniform scale
    scale: f64,
    /// Stage size in screen pixels
    size: Size,
    /// Multiplier per zoom step
    zoom_step: f64,
    #[serde(skip)]
    revision: u64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(Size::new(1280.0, 720.0))
    }
}

impl Viewport {
    pub fn new(size: Size) -> Self {
        Self {
            offset: Vec2::ZERO,
            scale: 1.0,
            size,
            zoom_step: ZOOM_STEP,
            revision: 0,
        }
    }

    pub fn with_zoom_step(mut self, step: f64) -> Self {
        if step > 1.0 {
            self.zoom_step = step;
        }
        self
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Incremented on every scale, offset or size change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn bump(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    /// Scene-to-screen transform for rendering.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.scale)
    }

    /// Screen-to-scene transform for input handling.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.scale) * Affine::translate(-self.offset)
    }

    /// Convert a screen point to scene coordinates.
    pub fn to_scene(&self, screen_point: Point) -> Point {
        self.inverse_transform() * screen_point
    }

    /// Convert a scene point to screen coordinates.
    pub fn to_screen(&self, scene_point: Point) -> Point {
        self.transform() * scene_point
    }

    /// The part of the scene currently visible on stage.
    pub fn visible_scene_rect(&self) -> Rect {
        let top_left = self.to_scene(Point::ZERO);
        let bottom_right = self.to_scene(Point::new(self.size.width, self.size.height));
        Rect::from_points(top_left, bottom_right)
    }

    /// Scene point under the center of the stage.
    pub fn scene_center(&self) -> Point {
        self.to_scene(Point::new(self.size.width / 2.0, self.size.height / 2.0))
    }

    pub fn set_size(&mut self, size: Size) {
        if size != self.size {
            self.size = size;
            self.bump();
        }
    }

    /// Replace scale and offset outright. Scale is clamped.
    pub fn set_transform(&mut self, scale: f64, offset: Vec2) {
        self.scale = scale.clamp(MIN_SCALE, MAX_SCALE);
        self.offset = offset;
        self.bump();
    }

    /// Pan by a delta in screen coordinates.
    pub fn pan(&mut self, delta: Vec2) {
        if delta == Vec2::ZERO {
            return;
        }
        self.offset += delta;
        self.bump();
    }

    /// Zoom one step, keeping the scene point under `screen_point` fixed.
    pub fn zoom_at(&mut self, screen_point: Point, direction: ZoomDirection) {
        let factor = match direction {
            ZoomDirection::In => self.zoom_step,
            ZoomDirection::Out => 1.0 / self.zoom_step,
        };
        self.zoom_by(screen_point, factor);
    }

    /// Zoom by an arbitrary factor, keeping the given screen point fixed.
    pub fn zoom_by(&mut self, screen_point: Point, factor: f64) {
        let new_scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
        if (new_scale - self.scale).abs() < f64::EPSILON {
            return;
        }

        // Convert screen point to scene before zoom
        let scene_point = self.to_scene(screen_point);

        self.scale = new_scale;

        // Adjust offset so scene_point stays at screen_point
        let new_screen = self.to_screen(scene_point);
        self.offset += Vec2::new(screen_point.x - new_screen.x, screen_point.y - new_screen.y);
        self.bump();
    }

    /// Fit an image of `image_size` into the stage without upscaling, centered.
    ///
    /// Returns the applied scale.
    pub fn fit_image(&mut self, image_size: Size) -> f64 {
        if image_size.width <= 0.0 || image_size.height <= 0.0 {
            return self.scale;
        }
        let fit = (self.size.width / image_size.width)
            .min(self.size.height / image_size.height)
            .min(1.0);
        let offset = Vec2::new(
            (self.size.width - image_size.width * fit) / 2.0,
            (self.size.height - image_size.height * fit) / 2.0,
        );
        self.set_transform(fit, offset);
        self.scale
    }
}
