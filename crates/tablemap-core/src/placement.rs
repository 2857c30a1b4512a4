//! Node construction for dropped tokens, assets and backgrounds.

use crate::scene::{
    Circle, Clip, Group, Image, ImageFormat, ImageSource, Node, NodeAttrs, SerializableColor, Tag,
    Text,
};
use kurbo::{Point, Size};
use std::io::Cursor;
use std::str::FromStr;
use thiserror::Error;

const RING_WIDTH: f64 = 2.0;
const ADHOC_FILL: SerializableColor = SerializableColor {
    r: 0x33,
    g: 0x33,
    b: 0x33,
    a: 255,
};

/// Errors from interpreting a drop.
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("unknown drop type: {0}")]
    UnknownKind(String),

    #[error("drop carries no reference")]
    EmptyReference,

    #[error("file drops carry bytes, not a reference")]
    MissingFile,

    #[error("unsupported image format")]
    UnsupportedFormat,

    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode image header: {0}")]
    Decode(#[from] image::ImageError),
}

/// Drop categories understood by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropKind {
    Token,
    Asset,
    DriveMap,
    RawFile,
}

impl FromStr for DropKind {
    type Err = PlacementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "token" => Ok(DropKind::Token),
            "asset" => Ok(DropKind::Asset),
            "drive-map" => Ok(DropKind::DriveMap),
            "rawFile" | "raw-file" => Ok(DropKind::RawFile),
            other => Err(PlacementError::UnknownKind(other.to_string())),
        }
    }
}

/// An image file dropped from the desktop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedFile {
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

/// What was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropPayload {
    Token { url: String },
    Asset { url: String },
    DriveMap { remote_id: String },
    RawFile(DroppedFile),
}

impl DropPayload {
    /// Build from a drag source's `(type, reference)` pair.
    pub fn from_parts(kind: &str, reference: &str) -> Result<Self, PlacementError> {
        let kind: DropKind = kind.parse()?;
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(PlacementError::EmptyReference);
        }
        let reference = reference.to_string();
        Ok(match kind {
            DropKind::Token => DropPayload::Token { url: reference },
            DropKind::Asset => DropPayload::Asset { url: reference },
            DropKind::DriveMap => DropPayload::DriveMap {
                remote_id: reference,
            },
            DropKind::RawFile => return Err(PlacementError::MissingFile),
        })
    }

    pub fn kind(&self) -> DropKind {
        match self {
            DropPayload::Token { .. } => DropKind::Token,
            DropPayload::Asset { .. } => DropKind::Asset,
            DropPayload::DriveMap { .. } => DropKind::DriveMap,
            DropPayload::RawFile(_) => DropKind::RawFile,
        }
    }
}

/// A drop at a screen position.
#[derive(Debug, Clone, PartialEq)]
pub struct DropEvent {
    pub payload: DropPayload,
    pub position: Point,
}

/// Read format and pixel size from encoded image bytes without decoding pixels.
pub fn image_dimensions(bytes: &[u8]) -> Result<(ImageFormat, Size), PlacementError> {
    let format = ImageFormat::from_magic_bytes(bytes).ok_or(PlacementError::UnsupportedFormat)?;
    let (width, height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()?;
    Ok((format, Size::new(f64::from(width), f64::from(height))))
}

/// A disc-clipped portrait token centered on `center`, `size` across.
pub fn image_token(url: &str, center: Point, size: f64) -> Node {
    let radius = size / 2.0;
    let portrait = Image::new(
        NodeAttrs::at(Point::new(-radius, -radius)),
        ImageSource::Url(url.to_string()),
    )
    .with_size(size, size);
    let clipped = Group::new(NodeAttrs::default(), vec![portrait.into()])
        .clipped(Clip::Circle { radius });
    let ring = Circle::new(NodeAttrs::default().listening(false), radius)
        .stroked(SerializableColor::white(), RING_WIDTH);

    Group::new(
        NodeAttrs::at(center).with_tag(Tag::Token).draggable(true),
        vec![clipped.into(), ring.into()],
    )
    .into()
}

/// A token drawn as a filled disc with the first two letters of `name`.
pub fn adhoc_token(name: &str, center: Point, size: f64) -> Node {
    let radius = size / 2.0;
    let disc = Circle::new(NodeAttrs::default(), radius)
        .stroked(SerializableColor::white(), RING_WIDTH)
        .filled(ADHOC_FILL);
    let initials: String = name.trim().chars().take(2).collect::<String>().to_uppercase();
    let mut label = Text::new(
        NodeAttrs::default().listening(false),
        initials,
        size / 3.0,
        SerializableColor::white(),
    )
    .centered();
    label.font_family = Some("Arial".to_string());
    label.bold = true;

    Group::new(
        NodeAttrs::at(center).with_tag(Tag::Token).draggable(true),
        vec![disc.into(), label.into()],
    )
    .into()
}

/// A freely transformable object image. Its size is adopted once it loads.
pub fn asset(url: &str, position: Point) -> Node {
    Image::new(
        NodeAttrs::at(position).with_tag(Tag::Object).draggable(true),
        ImageSource::Url(url.to_string()),
    )
    .into()
}

/// The background map image at the scene origin.
pub fn background(source: ImageSource, natural: Option<Size>) -> Image {
    let mut image = Image::new(NodeAttrs::default().with_tag(Tag::Background), source);
    if let Some(size) = natural {
        image.mark_ready(size);
    }
    image
}

/// Background built from dropped file bytes, already sized.
pub fn background_from_file(file: &DroppedFile) -> Result<(Image, Size), PlacementError> {
    let (detected, natural) = image_dimensions(&file.bytes)?;
    let format = file
        .mime
        .as_deref()
        .and_then(ImageFormat::from_mime)
        .unwrap_or(detected);
    let source = ImageSource::from_bytes(&file.bytes, format);
    Ok((background(source, Some(natural)), natural))
}
