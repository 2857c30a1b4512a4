//! Raster image nodes: the background map, token portraits and placed assets.

use super::{NodeAttrs, NodeTrait};
use base64::{Engine, engine::general_purpose::STANDARD};
use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};

/// Image format for inline image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    /// PNG format.
    Png,
    /// JPEG format.
    Jpeg,
    /// WebP format.
    WebP,
}

impl ImageFormat {
    /// Get MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::WebP => "image/webp",
        }
    }

    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "webp" => Some(ImageFormat::WebP),
            _ => None,
        }
    }

    /// Detect format from a MIME type such as `image/png`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_lowercase().as_str() {
            "image/png" => Some(ImageFormat::Png),
            "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
            "image/webp" => Some(ImageFormat::WebP),
            _ => None,
        }
    }

    /// Detect format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }

        // PNG: 89 50 4E 47
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            return Some(ImageFormat::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(ImageFormat::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Some(ImageFormat::WebP);
        }

        None
    }
}

/// Where an image's pixels come from.
///
/// Serialized explicitly so a receiver can re-request the pixels; the decoded
/// bitmap itself never travels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ImageSource {
    /// Absolute or server-relative URL.
    Url(String),
    /// Inline `data:` URL.
    DataUrl(String),
}

impl ImageSource {
    /// Build an inline source from raw encoded bytes.
    pub fn from_bytes(data: &[u8], format: ImageFormat) -> Self {
        ImageSource::DataUrl(format!(
            "data:{};base64,{}",
            format.mime_type(),
            STANDARD.encode(data)
        ))
    }

    /// The string a host hands to its image loader.
    pub fn as_str(&self) -> &str {
        match self {
            ImageSource::Url(url) | ImageSource::DataUrl(url) => url,
        }
    }

    /// Decode inline data back to bytes. `None` for URL sources or malformed data.
    pub fn inline_bytes(&self) -> Option<Vec<u8>> {
        let ImageSource::DataUrl(url) = self else {
            return None;
        };
        let (_, payload) = url.split_once(";base64,")?;
        STANDARD.decode(payload).ok()
    }
}

/// Local loading state of an image's pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum ImageState {
    /// Requested from the host, not yet decoded.
    #[default]
    Pending,
    /// Decoded; carries the natural pixel size.
    Ready { natural: Size },
    /// The host could not load the source.
    Failed,
}

/// An image node positioned by its top-left corner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub attrs: NodeAttrs,
    /// Display width. Zero until the natural size is known when not given up front.
    pub width: f64,
    pub height: f64,
    pub source: ImageSource,
    #[serde(skip)]
    pub state: ImageState,
}

impl Image {
    pub fn new(attrs: NodeAttrs, source: ImageSource) -> Self {
        Self {
            attrs,
            width: 0.0,
            height: 0.0,
            source,
            state: ImageState::Pending,
        }
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Mark as decoded. Unsized images adopt their natural size.
    pub fn mark_ready(&mut self, natural: Size) {
        if self.width <= 0.0 || self.height <= 0.0 {
            self.width = natural.width;
            self.height = natural.height;
        }
        self.state = ImageState::Ready { natural };
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ImageState::Ready { .. })
    }

    pub fn as_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

impl NodeTrait for Image {
    fn attrs(&self) -> &NodeAttrs {
        &self.attrs
    }

    fn attrs_mut(&mut self) -> &mut NodeAttrs {
        &mut self.attrs
    }

    fn local_bounds(&self) -> Rect {
        self.as_rect()
    }

    fn hit_test_local(&self, point: Point, tolerance: f64) -> bool {
        self.as_rect().inflate(tolerance, tolerance).contains(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&[0x89, 0x50, 0x4E, 0x47, 0x0D]),
            Some(ImageFormat::Png)
        );
        assert_eq!(ImageFormat::from_mime("image/jpg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("WEBP"), Some(ImageFormat::WebP));
    }

    #[test]
    fn test_data_url_source() {
        let source = ImageSource::from_bytes(&[1, 2, 3], ImageFormat::Png);
        assert!(source.as_str().starts_with("data:image/png;base64,"));
        assert_eq!(source.inline_bytes(), Some(vec![1, 2, 3]));
        assert_eq!(ImageSource::Url("/a.png".into()).inline_bytes(), None);
    }

    #[test]
    fn test_unsized_image_adopts_natural_size() {
        let mut image = Image::new(NodeAttrs::default(), ImageSource::Url("/a.png".into()));
        image.mark_ready(Size::new(64.0, 32.0));
        assert_eq!(image.as_rect(), Rect::new(0.0, 0.0, 64.0, 32.0));

        let mut token = Image::new(NodeAttrs::default(), ImageSource::Url("/t.png".into()))
            .with_size(60.0, 60.0);
        token.mark_ready(Size::new(512.0, 512.0));
        assert_eq!(token.width, 60.0);
        assert!(token.is_ready());
    }

    #[test]
    fn test_state_is_not_serialized() {
        let mut image = Image::new(NodeAttrs::default(), ImageSource::Url("/a.png".into()));
        image.mark_ready(Size::new(10.0, 10.0));
        let json = serde_json::to_string(&image).unwrap();
        let back: Image = serde_json::from_str(&json).unwrap();
        assert_eq!(back.state, ImageState::Pending);
        assert_eq!(back.width, 10.0);
    }
}
