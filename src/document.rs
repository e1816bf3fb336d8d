//! The in-memory document: background image plus the ordered layer stack.
//!
//! Every mutation goes through this type. It handles:
//! - Layer storage, ordering and per-layer flags
//! - The active selection (by id, never owning)
//! - Queuing a change notification for each mutation
//!
//! Whether a mutation becomes a history entry is decided by the editor, not here.

use crate::background::BackgroundImage;
use crate::color::normalize_hex;
use crate::error::{EditorError, Result};
use crate::events::DocumentEvent;
use crate::fonts::FontWeight;
use crate::layers::{Layer, LayerId, Point, Shadow, TextAlign, TextLayer};

/// Position of a new text layer when the caller gives no viewport center.
pub const DEFAULT_TEXT_POSITION: Point = Point { x: 100.0, y: 150.0 };

/// Direction of a one-step z-order move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward the front (higher index)
    Up,
    /// Toward the back (lower index)
    Down,
}

/// One editable field of a text layer.
#[derive(Debug, Clone, PartialEq)]
pub enum TextProperty {
    Content(String),
    FontFamily(String),
    FontWeight(FontWeight),
    FontSize(f64),
    Opacity(f64),
    LineHeight(f64),
    LetterSpacing(f64),
    Align(TextAlign),
    Fill(String),
    Shadow(Option<Shadow>),
    Width(f64),
}

impl TextProperty {
    pub fn is_content(&self) -> bool {
        matches!(self, Self::Content(_))
    }

    fn is_finite(&self) -> bool {
        match self {
            Self::FontSize(v)
            | Self::Opacity(v)
            | Self::LineHeight(v)
            | Self::LetterSpacing(v)
            | Self::Width(v) => v.is_finite(),
            Self::Shadow(Some(s)) => {
                s.blur.is_finite() && s.offset_x.is_finite() && s.offset_y.is_finite()
            }
            _ => true,
        }
    }

    /// Write the value into `text`, clamped to the editable range.
    /// Returns whether anything changed.
    fn apply(self, text: &mut TextLayer) -> bool {
        fn set<T: PartialEq>(slot: &mut T, value: T) -> bool {
            if *slot == value {
                false
            } else {
                *slot = value;
                true
            }
        }

        match self {
            Self::Content(v) => set(&mut text.content, v),
            Self::FontFamily(v) => set(&mut text.font_family, v),
            Self::FontWeight(v) => set(&mut text.font_weight, v),
            Self::FontSize(v) => set(&mut text.font_size, v.clamp(8.0, 512.0)),
            Self::Opacity(v) => set(&mut text.opacity, v.clamp(0.0, 1.0)),
            Self::LineHeight(v) => set(&mut text.line_height, v.clamp(0.6, 3.0)),
            Self::LetterSpacing(v) => set(&mut text.letter_spacing, v.clamp(-0.1, 1.0)),
            Self::Align(v) => set(&mut text.align, v),
            Self::Fill(v) => set(&mut text.fill, normalize_hex(&v)),
            Self::Shadow(v) => set(
                &mut text.shadow,
                v.map(|s| Shadow {
                    color: normalize_hex(&s.color),
                    blur: s.blur.clamp(0.0, 50.0),
                    ..s
                }),
            ),
            Self::Width(v) => set(&mut text.width, v.max(1.0)),
        }
    }
}

#[derive(Debug)]
pub struct Document {
    background: Option<BackgroundImage>,
    width: u32,
    height: u32,
    layers: Vec<Layer>,
    selection: Vec<LayerId>,
    events: Vec<DocumentEvent>,
}

impl Document {
    /// Empty document with caller-defined dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            background: None,
            width,
            height,
            layers: Vec::new(),
            selection: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn center(&self) -> Point {
        Point::new(self.width as f64 / 2.0, self.height as f64 / 2.0)
    }

    pub fn background(&self) -> Option<&BackgroundImage> {
        self.background.as_ref()
    }

    /// Layers bottom to top.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn selection(&self) -> &[LayerId] {
        &self.selection
    }

    /// Drain queued change notifications.
    pub fn take_events(&mut self) -> Vec<DocumentEvent> {
        std::mem::take(&mut self.events)
    }

    fn layer_mut(&mut self, id: LayerId) -> Result<&mut Layer> {
        self.layers
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(EditorError::UnknownLayer(id))
    }

    fn emit(&mut self, event: DocumentEvent) {
        self.events.push(event);
    }

    /// Replace the background and adopt its native dimensions.
    pub fn set_background(&mut self, background: BackgroundImage) {
        self.width = background.width;
        self.height = background.height;
        self.background = Some(background);
        self.clear_selection();
        self.emit(DocumentEvent::BackgroundChanged);
    }

    /// Append a text layer and make it the sole selection.
    ///
    /// With `center`, the layer is centered on that point (typically the
    /// viewport center); otherwise it goes to [`DEFAULT_TEXT_POSITION`].
    pub fn add_text_layer(&mut self, text: TextLayer, center: Option<Point>) -> LayerId {
        let position = match center {
            Some(c) => Point::new(c.x - text.width / 2.0, c.y - text.height() / 2.0),
            None => DEFAULT_TEXT_POSITION,
        };
        self.insert_layer(Layer::text(text, position))
    }

    /// Put a layer on top of the stack and make it the sole selection.
    pub fn insert_layer(&mut self, layer: Layer) -> LayerId {
        let id = layer.id;
        self.layers.push(layer);
        self.emit(DocumentEvent::LayerAdded(id));
        self.select_only(id);
        id
    }

    /// Remove every selected layer. Returns the removed ids; empty selection is a no-op.
    pub fn remove_selected(&mut self) -> Vec<LayerId> {
        if self.selection.is_empty() {
            return Vec::new();
        }
        let removed = std::mem::take(&mut self.selection);
        self.layers.retain(|l| !removed.contains(&l.id));
        for id in &removed {
            self.emit(DocumentEvent::LayerRemoved(*id));
        }
        self.emit(DocumentEvent::SelectionChanged);
        removed
    }

    pub fn remove_layer(&mut self, id: LayerId) -> Result<()> {
        let index = self.index_of(id).ok_or(EditorError::UnknownLayer(id))?;
        self.layers.remove(index);
        self.emit(DocumentEvent::LayerRemoved(id));
        if self.selection.contains(&id) {
            self.selection.retain(|s| *s != id);
            self.emit(DocumentEvent::SelectionChanged);
        }
        Ok(())
    }

    /// Move a layer one step in z-order and select it.
    ///
    /// Returns `false` without any notification when already at that end.
    pub fn reorder(&mut self, id: LayerId, direction: Direction) -> Result<bool> {
        let index = self.index_of(id).ok_or(EditorError::UnknownLayer(id))?;
        let target = match direction {
            Direction::Up => (index + 1).min(self.layers.len() - 1),
            Direction::Down => index.saturating_sub(1),
        };
        if target == index {
            return Ok(false);
        }
        let layer = self.layers.remove(index);
        self.layers.insert(target, layer);
        self.emit(DocumentEvent::LayerChanged(id));
        self.select_only(id);
        Ok(true)
    }

    pub fn set_visible(&mut self, id: LayerId, visible: bool) -> Result<bool> {
        let layer = self.layer_mut(id)?;
        if layer.visible == visible {
            return Ok(false);
        }
        layer.visible = visible;
        self.emit(DocumentEvent::LayerChanged(id));
        Ok(true)
    }

    /// Lock or unlock a layer together with all derived capabilities.
    ///
    /// A locked layer is no longer selectable, so it leaves the selection.
    pub fn set_locked(&mut self, id: LayerId, locked: bool) -> Result<bool> {
        let layer = self.layer_mut(id)?;
        if layer.locked == locked && layer.interaction.selectable == !locked {
            return Ok(false);
        }
        layer.set_locked(locked);
        self.emit(DocumentEvent::LayerChanged(id));
        if locked && self.selection.contains(&id) {
            self.selection.retain(|s| *s != id);
            self.emit(DocumentEvent::SelectionChanged);
        }
        Ok(true)
    }

    /// Edit one field of a text layer.
    ///
    /// Returns `false` for image layers, locked layers, non-finite numbers and
    /// values equal to the current one.
    pub fn update_text(&mut self, id: LayerId, property: TextProperty) -> Result<bool> {
        if !property.is_finite() {
            return Ok(false);
        }
        let is_content = property.is_content();
        let layer = self.layer_mut(id)?;
        if !layer.interaction.editable {
            return Ok(false);
        }
        let Some(text) = layer.as_text_mut() else {
            return Ok(false);
        };
        if !property.apply(text) {
            return Ok(false);
        }
        self.emit(if is_content {
            DocumentEvent::TextContentChanged(id)
        } else {
            DocumentEvent::LayerChanged(id)
        });
        Ok(true)
    }

    /// Translate the given layers, skipping the ones that aren't movable.
    pub fn translate(&mut self, ids: &[LayerId], dx: f64, dy: f64) -> Vec<LayerId> {
        let mut moved = Vec::new();
        for layer in self.layers.iter_mut() {
            if ids.contains(&layer.id) && layer.interaction.movable {
                layer.translate(dx, dy);
                moved.push(layer.id);
            }
        }
        for id in &moved {
            self.emit(DocumentEvent::LayerChanged(*id));
        }
        moved
    }

    /// Place a layer's top-left corner at `position`.
    ///
    /// Returns `false` when the layer isn't movable or is already there.
    pub fn move_to(&mut self, id: LayerId, position: Point) -> Result<bool> {
        let layer = self.layer_mut(id)?;
        if !layer.interaction.movable || layer.position == position {
            return Ok(false);
        }
        layer.position = position;
        self.emit(DocumentEvent::LayerChanged(id));
        Ok(true)
    }

    /// Make `id` the only selected layer. Fails for unselectable layers.
    pub fn select_only(&mut self, id: LayerId) -> bool {
        let selectable = self.layer(id).is_some_and(|l| l.interaction.selectable);
        if !selectable {
            return false;
        }
        if self.selection != [id] {
            self.selection = vec![id];
            self.emit(DocumentEvent::SelectionChanged);
        }
        true
    }

    /// Replace the selection with the selectable subset of `ids`.
    pub fn select(&mut self, ids: &[LayerId]) {
        let next: Vec<LayerId> = ids
            .iter()
            .copied()
            .filter(|id| self.layer(*id).is_some_and(|l| l.interaction.selectable))
            .collect();
        if next != self.selection {
            self.selection = next;
            self.emit(DocumentEvent::SelectionChanged);
        }
    }

    pub fn clear_selection(&mut self) {
        if !self.selection.is_empty() {
            self.selection.clear();
            self.emit(DocumentEvent::SelectionChanged);
        }
    }

    /// Drop selected ids that no longer exist or can't be selected.
    pub fn repair_selection(&mut self) {
        let layers = &self.layers;
        let before = self.selection.len();
        self.selection
            .retain(|id| layers.iter().any(|l| l.id == *id && l.interaction.selectable));
        if self.selection.len() != before {
            self.emit(DocumentEvent::SelectionChanged);
        }
    }

    /// Re-derive interaction capabilities of every layer from its lock flag.
    pub fn sanitize_locks(&mut self) {
        for layer in &mut self.layers {
            layer.sanitize();
        }
    }

    /// Swap in a whole new layer sequence. The background is untouched.
    pub fn replace_layers(&mut self, layers: Vec<Layer>) {
        self.layers = layers;
        self.emit(DocumentEvent::LayersReplaced);
        self.repair_selection();
    }

    /// Remove background, layers and selection and fall back to the given size.
    pub fn reset(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.background = None;
        self.layers.clear();
        self.selection.clear();
        self.emit(DocumentEvent::Cleared);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_layers(n: usize) -> (Document, Vec<LayerId>) {
        let mut doc = Document::new(800, 600);
        let ids = (0..n)
            .map(|_| doc.add_text_layer(TextLayer::default(), None))
            .collect();
        doc.take_events();
        (doc, ids)
    }

    #[test]
    fn added_layer_becomes_sole_selection() {
        let (mut doc, ids) = doc_with_layers(1);
        let second = doc.add_text_layer(TextLayer::default(), Some(Point::new(400.0, 300.0)));
        assert_eq!(doc.selection(), [second]);
        assert_ne!(ids[0], second);
        assert_eq!(doc.layer(second).unwrap().center(), Point::new(400.0, 300.0));
        assert_eq!(doc.layer(ids[0]).unwrap().position, DEFAULT_TEXT_POSITION);
    }

    #[test]
    fn remove_with_empty_selection_emits_nothing() {
        let (mut doc, _) = doc_with_layers(2);
        doc.clear_selection();
        doc.take_events();
        assert!(doc.remove_selected().is_empty());
        assert!(doc.take_events().is_empty());
        assert_eq!(doc.layers().len(), 2);
    }

    #[test]
    fn reorder_is_clamped_at_both_ends() {
        let (mut doc, ids) = doc_with_layers(3);
        assert!(!doc.reorder(ids[2], Direction::Up).unwrap());
        assert!(!doc.reorder(ids[0], Direction::Down).unwrap());
        assert!(doc.take_events().is_empty());

        assert!(doc.reorder(ids[0], Direction::Up).unwrap());
        let order: Vec<_> = doc.layers().iter().map(|l| l.id).collect();
        assert_eq!(order, [ids[1], ids[0], ids[2]]);
        assert!(doc.take_events().contains(&DocumentEvent::LayerChanged(ids[0])));
    }

    #[test]
    fn locking_drops_selection_and_blocks_edits() {
        let (mut doc, ids) = doc_with_layers(1);
        assert!(doc.set_locked(ids[0], true).unwrap());
        assert!(doc.selection().is_empty());
        assert!(!doc.select_only(ids[0]));
        assert!(doc.translate(&ids, 5.0, 5.0).is_empty());
        assert!(!doc.update_text(ids[0], TextProperty::Content("x".into())).unwrap());

        assert!(doc.set_locked(ids[0], false).unwrap());
        assert!(doc.select_only(ids[0]));
        assert_eq!(doc.translate(&ids, 5.0, 5.0), ids);
    }

    #[test]
    fn text_properties_are_clamped_and_normalized() {
        let (mut doc, ids) = doc_with_layers(1);
        doc.update_text(ids[0], TextProperty::Opacity(4.0)).unwrap();
        doc.update_text(ids[0], TextProperty::Fill("rgb(0, 128, 255)".into())).unwrap();
        assert!(!doc.update_text(ids[0], TextProperty::FontSize(f64::NAN)).unwrap());

        let text = doc.layer(ids[0]).unwrap().as_text().unwrap();
        assert_eq!(text.opacity, 1.0);
        assert_eq!(text.fill, "#0080ff");
        assert_eq!(text.font_size, 48.0);
    }

    #[test]
    fn move_to_reports_only_real_moves() {
        let (mut doc, ids) = doc_with_layers(1);
        assert!(!doc.move_to(ids[0], DEFAULT_TEXT_POSITION).unwrap());
        assert!(doc.take_events().is_empty());
        assert!(doc.move_to(ids[0], Point::new(1.0, 2.0)).unwrap());
        doc.set_locked(ids[0], true).unwrap();
        assert!(!doc.move_to(ids[0], Point::new(5.0, 5.0)).unwrap());
        assert_eq!(doc.layer(ids[0]).unwrap().position, Point::new(1.0, 2.0));
    }

    #[test]
    fn background_sets_dimensions_and_clears_selection() {
        let (mut doc, _) = doc_with_layers(1);
        doc.set_background(BackgroundImage {
            data_url: "data:image/png;base64,".into(),
            width: 1920,
            height: 1080,
        });
        assert_eq!(doc.size(), (1920, 1080));
        assert!(doc.selection().is_empty());
        assert_eq!(doc.layers().len(), 1);
    }

    #[test]
    fn replacing_layers_repairs_selection() {
        let (mut doc, ids) = doc_with_layers(2);
        assert_eq!(doc.selection(), [ids[1]]);
        let kept = doc.layers()[..1].to_vec();
        doc.replace_layers(kept);
        assert!(doc.selection().is_empty());
    }
}
