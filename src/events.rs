//! Change notifications and the rendering surface seam.
//!
//! The document queues a [`DocumentEvent`] for every mutation; the editor drains
//! the queue, refreshes its derived views and republishes each event on an
//! [`EventBus`] for whoever subscribed (layer panels, render surfaces).

use crate::layers::LayerId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    LayerAdded(LayerId),
    LayerRemoved(LayerId),
    /// Geometry, style, order or flags of a layer changed
    LayerChanged(LayerId),
    /// Text body of a layer changed
    TextContentChanged(LayerId),
    /// The whole layer sequence was replaced (undo, redo, restore)
    LayersReplaced,
    BackgroundChanged,
    SelectionChanged,
    /// An interactive move finished
    PointerUp,
    /// Document emptied by a reset
    Cleared,
}

/// Which vertical/horizontal center guides are visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CenterGuides {
    /// Line at x = width / 2
    pub vertical: bool,
    /// Line at y = height / 2
    pub horizontal: bool,
}

impl CenterGuides {
    pub fn any(self) -> bool {
        self.vertical || self.horizontal
    }
}

/// The drawing surface the editor renders into.
pub trait RenderSurface {
    fn request_render(&mut self);

    /// Canvas resized to the document's dimensions.
    fn resize(&mut self, width: u32, height: u32);

    fn show_guides(&mut self, guides: CenterGuides);
}

/// Surface that draws nothing, for headless use.
#[derive(Debug, Default)]
pub struct NullSurface;

impl RenderSurface for NullSurface {
    fn request_render(&mut self) {}

    fn resize(&mut self, _width: u32, _height: u32) {}

    fn show_guides(&mut self, _guides: CenterGuides) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&DocumentEvent)>;

/// Publish/subscribe fan-out for document events.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&DocumentEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns whether the subscription existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    pub fn publish(&mut self, event: &DocumentEvent) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
