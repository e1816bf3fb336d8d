//! Editor state and undo history for composing text overlays on a raster image.
//!
//! The [`Editor`] owns the document and keeps its history, autosave and
//! derived views consistent with it. A [`Controller`] turns raw input into
//! editor operations.

pub mod background;
pub mod color;
pub mod config;
pub mod controller;
pub mod document;
pub mod editor;
pub mod error;
pub mod events;
pub mod fonts;
pub mod history;
pub mod layers;
pub mod persistence;
pub mod restore;
pub mod snapshot;

pub use config::EditorConfig;
pub use controller::{Controller, InputEvent, Key, KeyEvent, Modifiers, PanelCommand};
pub use document::{Direction, Document, TextProperty};
pub use editor::Editor;
pub use error::{EditorError, Result};
pub use events::{CenterGuides, DocumentEvent, RenderSurface};
pub use fonts::{FontCatalog, FontWeight, StaticFontCatalog};
pub use layers::{Layer, LayerEntry, LayerId, Point, TextLayer};
pub use persistence::{FileStorage, MemoryStorage, PersistedDesign, Storage};
pub use snapshot::Snapshot;
