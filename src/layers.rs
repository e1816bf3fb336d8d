//! Layer types for the overlay document.
//!
//! A layer is either a text overlay or a placed raster image. Stacking order is
//! the layer's index in the document: index 0 renders first (bottommost).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fonts::{FontWeight, DEFAULT_FONT_FAMILY};

/// Characters of text content shown in the layer list.
const LAYER_NAME_CHARS: usize = 20;

/// Layer identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerId(pub Uuid);

impl LayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Document-space coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Horizontal text alignment inside the bounding width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shadow {
    pub color: String,
    pub blur: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Default for Shadow {
    fn default() -> Self {
        Self {
            color: "#000000".to_string(),
            blur: 0.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

/// Text overlay content and style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLayer {
    pub content: String,
    pub font_family: String,
    pub font_weight: FontWeight,
    pub font_size: f64,
    pub opacity: f64,
    pub line_height: f64,
    pub letter_spacing: f64,
    pub align: TextAlign,
    pub fill: String,
    pub shadow: Option<Shadow>,
    /// Bounding box width; text wraps inside it.
    pub width: f64,
}

impl Default for TextLayer {
    fn default() -> Self {
        Self {
            content: "Double-click to edit".to_string(),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_weight: FontWeight::BOLD,
            font_size: 48.0,
            opacity: 1.0,
            line_height: 1.16,
            letter_spacing: 0.0,
            align: TextAlign::Center,
            fill: "#ffffff".to_string(),
            shadow: None,
            width: 300.0,
        }
    }
}

impl TextLayer {
    /// Laid-out height: one line box per line of content.
    pub fn height(&self) -> f64 {
        let lines = self.content.lines().count().max(1) as f64;
        lines * self.font_size * self.line_height
    }
}

/// Raster image placed in the layer stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLayer {
    pub data_url: String,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LayerKind {
    Text(TextLayer),
    Image(ImageLayer),
}

/// Interaction capabilities derived from the lock flag.
///
/// Kept as separate fields because the render surface reads them directly and a
/// decoded snapshot may carry values that disagree with `locked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub selectable: bool,
    pub movable: bool,
    pub editable: bool,
    pub has_controls: bool,
}

impl Interaction {
    pub fn for_lock(locked: bool) -> Self {
        Self {
            selectable: !locked,
            movable: !locked,
            editable: !locked,
            has_controls: !locked,
        }
    }
}

impl Default for Interaction {
    fn default() -> Self {
        Self::for_lock(false)
    }
}

/// A positioned visual element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub id: LayerId,
    pub name: Option<String>,
    #[serde(flatten)]
    pub kind: LayerKind,
    /// Top-left corner.
    pub position: Point,
    pub visible: bool,
    pub locked: bool,
    pub interaction: Interaction,
}

impl Layer {
    pub fn new(kind: LayerKind, position: Point) -> Self {
        Self {
            id: LayerId::new(),
            name: None,
            kind,
            position,
            visible: true,
            locked: false,
            interaction: Interaction::default(),
        }
    }

    pub fn text(text: TextLayer, position: Point) -> Self {
        Self::new(LayerKind::Text(text), position)
    }

    pub fn as_text(&self) -> Option<&TextLayer> {
        match &self.kind {
            LayerKind::Text(text) => Some(text),
            LayerKind::Image(_) => None,
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut TextLayer> {
        match &mut self.kind {
            LayerKind::Text(text) => Some(text),
            LayerKind::Image(_) => None,
        }
    }

    /// Set the lock flag and every capability derived from it in one step.
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
        self.interaction = Interaction::for_lock(locked);
    }

    /// Re-derive interaction capabilities from `locked`.
    pub fn sanitize(&mut self) {
        self.interaction = Interaction::for_lock(self.locked);
    }

    pub fn size(&self) -> (f64, f64) {
        match &self.kind {
            LayerKind::Text(text) => (text.width, text.height()),
            LayerKind::Image(image) => (image.width, image.height),
        }
    }

    pub fn center(&self) -> Point {
        let (w, h) = self.size();
        Point::new(self.position.x + w / 2.0, self.position.y + h / 2.0)
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.position.x += dx;
        self.position.y += dy;
    }

    /// Label shown in the layer list.
    pub fn display_name(&self) -> String {
        match &self.kind {
            LayerKind::Text(text) => {
                let label: String = text.content.chars().take(LAYER_NAME_CHARS).collect();
                if label.is_empty() {
                    "Text".to_string()
                } else {
                    label
                }
            }
            LayerKind::Image(_) => "image".to_string(),
        }
    }
}

/// Row of the derived layer list view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerEntry {
    pub id: LayerId,
    pub name: String,
    pub visible: bool,
    pub locked: bool,
}

impl From<&Layer> for LayerEntry {
    fn from(layer: &Layer) -> Self {
        Self {
            id: layer.id,
            name: layer.display_name(),
            visible: layer.visible,
            locked: layer.locked,
        }
    }
}
