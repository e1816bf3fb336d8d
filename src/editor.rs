//! Editor context: the document, its history and everything kept in step with it.
//!
//! The editor decides which document mutations are history-significant:
//! - structural edits (add, remove, reorder, flags, background) commit at once
//! - text property edits are coalesced and commit after a quiet window
//! - interactive moves commit once, when the pointer is released
//!
//! Every committed entry is handed to the autosave task.

use std::sync::Arc;

use crate::background::BackgroundImage;
use crate::config::EditorConfig;
use crate::document::{Direction, Document, TextProperty};
use crate::error::{EditorError, Result};
use crate::events::{CenterGuides, DocumentEvent, EventBus, NullSurface, RenderSurface, SubscriptionId};
use crate::fonts::{FontCatalog, resolve_font};
use crate::history::{Debouncer, History};
use crate::layers::{LayerEntry, LayerId, Point, TextLayer};
use crate::persistence::{AutosaveHandle, PersistedDesign, PersistenceAdapter, Storage};
use crate::restore::{PreparedRestore, RestoreEpoch, RestoreTask};
use crate::snapshot;

pub struct Editor {
    config: EditorConfig,
    document: Document,
    history: History,
    debounce: Debouncer,
    persistence: PersistenceAdapter,
    autosave: AutosaveHandle,
    fonts: Arc<dyn FontCatalog>,
    epoch: RestoreEpoch,
    surface: Box<dyn RenderSurface>,
    bus: EventBus,
    /// Derived layer list, bottom to top
    layer_list: Vec<LayerEntry>,
    guides: CenterGuides,
}

impl Editor {
    /// Create an editor with an empty document and no history.
    ///
    /// Spawns the autosave task, so this must run inside a tokio runtime. Call
    /// [`Editor::restore`] next to load the last session and set the baseline.
    pub fn new(config: EditorConfig, storage: Arc<dyn Storage>, fonts: Arc<dyn FontCatalog>) -> Self {
        let persistence = PersistenceAdapter::new(storage);
        Self {
            document: Document::new(config.canvas_width, config.canvas_height),
            history: History::new(config.history_capacity),
            debounce: Debouncer::new(config.debounce()),
            autosave: AutosaveHandle::spawn(persistence.clone()),
            persistence,
            fonts,
            epoch: RestoreEpoch::new(),
            surface: Box::new(NullSurface),
            bus: EventBus::new(),
            layer_list: Vec::new(),
            guides: CenterGuides::default(),
            config,
        }
    }

    pub fn with_surface(mut self, surface: Box<dyn RenderSurface>) -> Self {
        let (width, height) = self.document.size();
        self.surface = surface;
        self.surface.resize(width, height);
        self
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn fonts(&self) -> &Arc<dyn FontCatalog> {
        &self.fonts
    }

    /// Layer list view, bottom to top.
    pub fn layers(&self) -> &[LayerEntry] {
        &self.layer_list
    }

    pub fn guides(&self) -> CenterGuides {
        self.guides
    }

    /// `(current entry number, entry count)` for the history indicator.
    pub fn history_position(&self) -> (usize, usize) {
        self.history.position()
    }

    pub fn has_pending_commit(&self) -> bool {
        self.debounce.is_pending()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&DocumentEvent) + 'static) -> SubscriptionId {
        self.bus.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Commit any coalesced edit, drop every subscription and stop autosaving.
    pub fn dispose(&mut self) {
        self.flush_pending();
        self.bus.clear();
        self.autosave.shutdown();
    }

    /// Wait until every queued autosave write has reached storage.
    pub async fn flush_autosave(&self) {
        self.autosave.flush().await;
    }

    /// Publish queued document events and refresh derived views.
    fn sync_views(&mut self) {
        let events = self.document.take_events();
        if events.is_empty() {
            return;
        }
        self.layer_list = self.document.layers().iter().map(LayerEntry::from).collect();
        for event in &events {
            self.bus.publish(event);
        }
        self.surface.request_render();
    }

    fn persisted_design(&self) -> PersistedDesign {
        PersistedDesign {
            background_data_url: self.document.background().map(|bg| bg.data_url.clone()),
            snapshot: self.history.current().cloned(),
        }
    }

    /// Record the current document as a new history entry and autosave it.
    ///
    /// Also settles any pending coalesced edit, which this entry now contains.
    pub fn commit(&mut self) {
        self.sync_views();
        self.debounce.take_pending();
        match snapshot::encode(&self.document) {
            Ok(snap) => {
                let index = self.history.commit(snap);
                tracing::debug!(index, len = self.history.len(), "history commit");
                self.autosave.save(self.persisted_design());
            }
            Err(e) => tracing::warn!("Skipping history commit: {e}"),
        }
    }

    /// Advance the commit clock; commits when a coalesced edit has settled.
    pub fn tick(&mut self, elapsed: std::time::Duration) -> bool {
        if self.debounce.advance(elapsed) {
            self.commit();
            true
        } else {
            false
        }
    }

    /// Commit a coalesced edit right away instead of waiting for its deadline.
    pub fn flush_pending(&mut self) -> bool {
        if self.debounce.is_pending() {
            self.commit();
            true
        } else {
            false
        }
    }

    pub fn set_background(&mut self, background: BackgroundImage) {
        let (width, height) = (background.width, background.height);
        self.document.set_background(background);
        self.surface.resize(width, height);
        self.commit();
    }

    /// Decode image file bytes and make them the background.
    pub async fn load_background(&mut self, bytes: Vec<u8>) -> Result<()> {
        let background = BackgroundImage::from_bytes(bytes).await?;
        self.set_background(background);
        Ok(())
    }

    /// Add a text layer with the default style, centered on `viewport_center` if given.
    pub fn add_text_layer(&mut self, viewport_center: Option<Point>) -> LayerId {
        let id = self.document.add_text_layer(TextLayer::default(), viewport_center);
        self.commit();
        id
    }

    /// Remove every selected layer. Returns how many were removed.
    pub fn remove_selection(&mut self) -> usize {
        let removed = self.document.remove_selected();
        if !removed.is_empty() {
            self.commit();
        }
        removed.len()
    }

    pub fn remove_layer(&mut self, id: LayerId) -> Result<()> {
        self.document.remove_layer(id)?;
        self.commit();
        Ok(())
    }

    /// Deep-copy a layer, offset it and select the copy. The copy starts unlocked.
    pub async fn duplicate_layer(&mut self, id: LayerId) -> Result<LayerId> {
        let source = self.document.layer(id).ok_or(EditorError::UnknownLayer(id))?;
        let mut clone = snapshot::clone_layer(source, self.fonts.as_ref()).await?;
        clone.set_locked(false);
        let offset = self.config.duplicate_offset;
        clone.translate(offset, offset);
        let clone_id = self.document.insert_layer(clone);
        self.commit();
        Ok(clone_id)
    }

    /// Duplicate the first selected layer.
    pub async fn duplicate_selection(&mut self) -> Option<LayerId> {
        let id = *self.document.selection().first()?;
        match self.duplicate_layer(id).await {
            Ok(clone) => Some(clone),
            Err(e) => {
                tracing::warn!("Duplicate failed: {e}");
                None
            }
        }
    }

    /// Move a layer one step in z-order. At either end this does nothing.
    pub fn reorder(&mut self, id: LayerId, direction: Direction) -> Result<bool> {
        let moved = self.document.reorder(id, direction)?;
        if moved {
            self.commit();
        }
        Ok(moved)
    }

    pub fn set_visible(&mut self, id: LayerId, visible: bool) -> Result<bool> {
        let changed = self.document.set_visible(id, visible)?;
        if changed {
            self.commit();
        }
        Ok(changed)
    }

    pub fn toggle_visible(&mut self, id: LayerId) -> Result<bool> {
        let visible = self.document.layer(id).ok_or(EditorError::UnknownLayer(id))?.visible;
        self.set_visible(id, !visible)
    }

    pub fn set_locked(&mut self, id: LayerId, locked: bool) -> Result<bool> {
        let changed = self.document.set_locked(id, locked)?;
        if changed {
            self.commit();
        }
        Ok(changed)
    }

    pub fn toggle_locked(&mut self, id: LayerId) -> Result<bool> {
        let locked = self.document.layer(id).ok_or(EditorError::UnknownLayer(id))?.locked;
        self.set_locked(id, !locked)
    }

    pub fn select_only(&mut self, id: LayerId) -> bool {
        let selected = self.document.select_only(id);
        self.sync_views();
        selected
    }

    pub fn clear_selection(&mut self) {
        self.document.clear_selection();
        self.sync_views();
    }

    /// Edit one field of a text layer; the history entry is coalesced.
    ///
    /// Font changes wait for the face to load and fall back to the default
    /// face when it can't be loaded.
    pub async fn update_text_property(&mut self, id: LayerId, property: TextProperty) -> Result<bool> {
        let current = self
            .document
            .layer(id)
            .ok_or(EditorError::UnknownLayer(id))?
            .as_text()
            .map(|text| (text.font_family.clone(), text.font_weight));
        let Some((family, weight)) = current else {
            return Ok(false);
        };

        let properties = match property {
            TextProperty::FontFamily(requested) => {
                let (family, weight) = resolve_font(self.fonts.as_ref(), &requested, weight).await;
                vec![TextProperty::FontFamily(family), TextProperty::FontWeight(weight)]
            }
            TextProperty::FontWeight(requested) => {
                let (family, weight) = resolve_font(self.fonts.as_ref(), &family, requested).await;
                vec![TextProperty::FontFamily(family), TextProperty::FontWeight(weight)]
            }
            other => vec![other],
        };

        let mut changed = false;
        for property in properties {
            changed |= self.document.update_text(id, property)?;
        }
        if changed {
            self.sync_views();
            self.debounce.touch();
        }
        Ok(changed)
    }

    /// Move layers by a fixed offset and commit. Locked layers stay put.
    pub fn nudge(&mut self, ids: &[LayerId], dx: f64, dy: f64) -> usize {
        let moved = self.document.translate(ids, dx, dy);
        if !moved.is_empty() {
            self.commit();
        }
        moved.len()
    }

    pub fn nudge_selection(&mut self, dx: f64, dy: f64) -> usize {
        let ids = self.document.selection().to_vec();
        self.nudge(&ids, dx, dy)
    }

    /// Position a layer during an interactive move, snapping to the center axes.
    ///
    /// Returns whether the layer moved. Not a history entry; [`Editor::finish_move`] commits.
    pub fn drag_layer(&mut self, id: LayerId, position: Point) -> Result<bool> {
        let layer = self.document.layer(id).ok_or(EditorError::UnknownLayer(id))?;
        if !layer.interaction.movable {
            return Ok(false);
        }
        let (position, guides) = self.snap_to_center(id, position)?;
        if guides != self.guides {
            self.guides = guides;
            self.surface.show_guides(guides);
        }
        let moved = self.document.move_to(id, position)?;
        if moved {
            self.sync_views();
        }
        Ok(moved)
    }

    /// End an interactive move: hide guides and commit if anything moved.
    pub fn finish_move(&mut self, moved: bool) {
        self.hide_guides();
        self.bus.publish(&DocumentEvent::PointerUp);
        if moved {
            self.commit();
        } else {
            self.surface.request_render();
        }
    }

    /// Abandon an interactive move without committing it.
    pub fn cancel_move(&mut self) {
        self.hide_guides();
        self.surface.request_render();
    }

    fn hide_guides(&mut self) {
        if self.guides.any() {
            self.guides = CenterGuides::default();
            self.surface.show_guides(self.guides);
        }
    }

    fn snap_to_center(&self, id: LayerId, mut position: Point) -> Result<(Point, CenterGuides)> {
        let layer = self.document.layer(id).ok_or(EditorError::UnknownLayer(id))?;
        let (w, h) = layer.size();
        let target = self.document.center();
        let tolerance = self.config.snap_tolerance;

        let guides = CenterGuides {
            vertical: (position.x + w / 2.0 - target.x).abs() < tolerance,
            horizontal: (position.y + h / 2.0 - target.y).abs() < tolerance,
        };
        if guides.vertical {
            position.x = target.x - w / 2.0;
        }
        if guides.horizontal {
            position.y = target.y - h / 2.0;
        }
        Ok((position, guides))
    }

    /// Step back one history entry. Does nothing at the oldest entry.
    pub async fn undo(&mut self) -> bool {
        self.flush_pending();
        let Some((index, target)) = self.history.undo_target() else {
            return false;
        };
        let target = target.clone();
        self.apply_history_entry(index, &target).await
    }

    /// Step forward one history entry. Does nothing at the newest entry.
    pub async fn redo(&mut self) -> bool {
        self.flush_pending();
        let Some((index, target)) = self.history.redo_target() else {
            return false;
        };
        let target = target.clone();
        self.apply_history_entry(index, &target).await
    }

    async fn apply_history_entry(&mut self, index: usize, target: &snapshot::Snapshot) -> bool {
        if let Err(e) = snapshot::decode_into(target, &mut self.document, self.fonts.as_ref()).await {
            tracing::warn!("Cannot restore history entry {index}: {e}");
            return false;
        }
        self.document.sanitize_locks();
        self.document.repair_selection();
        self.history.move_to(index);
        self.sync_views();
        self.autosave.save(self.persisted_design());
        true
    }

    /// Start loading the saved session. The task does not borrow the editor,
    /// so a reset can happen while it runs.
    pub fn begin_restore(&self) -> RestoreTask {
        RestoreTask::new(self.epoch.capture(), self.persistence.clone(), self.fonts.clone())
    }

    /// Apply a finished restore and commit the baseline entry.
    ///
    /// Returns `false` when the restore went stale; the document is untouched then.
    pub fn finish_restore(&mut self, prepared: Result<PreparedRestore>) -> bool {
        let prepared = match prepared {
            Ok(prepared) if prepared.token.is_current() => prepared,
            Ok(_) => {
                tracing::debug!("Discarding restore from an earlier epoch");
                return false;
            }
            Err(e) => {
                tracing::debug!("Discarding restore: {e}");
                return false;
            }
        };

        if let Some(background) = prepared.background {
            let (width, height) = (background.width, background.height);
            self.document.set_background(background);
            self.surface.resize(width, height);
        }
        if let Some(layers) = prepared.layers {
            self.document.replace_layers(layers);
        }
        self.document.sanitize_locks();
        self.document.repair_selection();
        self.commit();
        tracing::info!(layers = self.document.layers().len(), "session restored");
        true
    }

    /// Load the saved session into the document and set the history baseline.
    pub async fn restore(&mut self) -> bool {
        let prepared = self.begin_restore().run().await;
        self.finish_restore(prepared)
    }

    /// Empty the document, forget the saved session and start a new history.
    ///
    /// Any restore still in flight is invalidated.
    pub fn reset_design(&mut self) {
        let epoch = self.epoch.advance();
        self.debounce.take_pending();
        self.document.reset(self.config.canvas_width, self.config.canvas_height);
        self.surface.resize(self.config.canvas_width, self.config.canvas_height);
        self.hide_guides();
        self.autosave.clear();
        self.history.clear();
        self.commit();
        tracing::info!(epoch, "design reset");
    }
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("document", &self.document)
            .field("history", &self.history.position())
            .field("epoch", &self.epoch.current())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;
    use crate::background::png_bytes;
    use crate::fonts::{FontWeight, StaticFontCatalog};
    use crate::persistence::MemoryStorage;

    fn editor() -> (Editor, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let editor = Editor::new(
            EditorConfig::default(),
            storage.clone(),
            Arc::new(StaticFontCatalog::default()),
        );
        (editor, storage)
    }

    #[tokio::test]
    async fn restore_of_empty_storage_sets_baseline() {
        let (mut editor, _) = editor();
        assert!(editor.restore().await);
        assert_eq!(editor.history().index(), Some(0));
        assert_eq!(editor.history().len(), 1);
    }

    #[tokio::test]
    async fn structural_edits_commit_immediately() {
        let (mut editor, _) = editor();
        editor.restore().await;
        let id = editor.add_text_layer(None);
        editor.set_visible(id, false).unwrap();
        editor.set_locked(id, true).unwrap();
        assert_eq!(editor.history_position(), (4, 4));
        assert!(!editor.set_locked(id, true).unwrap());
        assert_eq!(editor.history().len(), 4);
    }

    #[tokio::test]
    async fn text_edits_wait_for_quiet_window() {
        let (mut editor, _) = editor();
        editor.restore().await;
        let id = editor.add_text_layer(None);
        for text in ["H", "He", "Hel", "Hell", "Hello"] {
            editor
                .update_text_property(id, TextProperty::Content(text.into()))
                .await
                .unwrap();
            assert!(!editor.tick(Duration::from_millis(100)));
        }
        assert_eq!(editor.history().len(), 2);
        assert!(editor.tick(Duration::from_millis(300)));
        assert_eq!(editor.history().len(), 3);
        assert_eq!(editor.layers()[0].name, "Hello");
    }

    #[tokio::test]
    async fn undo_flushes_pending_edit_first() {
        let (mut editor, _) = editor();
        editor.restore().await;
        let id = editor.add_text_layer(None);
        editor
            .update_text_property(id, TextProperty::Content("typed".into()))
            .await
            .unwrap();
        assert!(editor.undo().await);
        let text = editor.document().layers()[0].as_text().unwrap();
        assert_eq!(text.content, TextLayer::default().content);
        assert!(editor.redo().await);
        let text = editor.document().layers()[0].as_text().unwrap();
        assert_eq!(text.content, "typed");
    }

    #[tokio::test]
    async fn unavailable_weight_falls_back_to_default_face() {
        let (mut editor, _) = editor();
        editor.restore().await;
        let id = editor.add_text_layer(None);
        editor
            .update_text_property(id, TextProperty::FontFamily("Lato".into()))
            .await
            .unwrap();
        // The built-in catalog has no Lato 200.
        editor
            .update_text_property(id, TextProperty::FontWeight(FontWeight::new(200).unwrap()))
            .await
            .unwrap();
        let text = editor.document().layer(id).unwrap().as_text().unwrap();
        assert_eq!(text.font_family, "Inter");
        assert_eq!(text.font_weight, FontWeight::REGULAR);
    }

    #[tokio::test]
    async fn drag_snaps_to_center_and_commits_on_release() {
        let (mut editor, _) = editor();
        editor.restore().await;
        let id = editor.add_text_layer(None);
        let (w, h) = editor.document().layer(id).unwrap().size();
        let center = editor.document().center();

        let near = Point::new(center.x - w / 2.0 + 4.0, 10.0);
        assert!(editor.drag_layer(id, near).unwrap());
        let guides = editor.guides();
        assert!(guides.vertical && !guides.horizontal);
        let layer = editor.document().layer(id).unwrap();
        assert_eq!(layer.center().x, center.x);
        assert_eq!(layer.position.y, 10.0);
        assert_eq!(editor.history().len(), 2);

        let both = Point::new(center.x - w / 2.0 - 5.0, center.y - h / 2.0 + 5.0);
        assert!(editor.drag_layer(id, both).unwrap());
        assert_eq!(editor.guides(), CenterGuides { vertical: true, horizontal: true });

        // Still inside the tolerance: snaps to the same spot
        let jitter = Point::new(both.x + 2.0, both.y - 2.0);
        assert!(!editor.drag_layer(id, jitter).unwrap());

        editor.finish_move(true);
        assert!(!editor.guides().any());
        assert_eq!(editor.history().len(), 3);
    }

    #[tokio::test]
    async fn drag_that_ends_where_it_started_is_not_committed() {
        let (mut editor, _) = editor();
        editor.restore().await;
        let id = editor.add_text_layer(None);
        let start = editor.document().layer(id).unwrap().position;

        assert!(!editor.drag_layer(id, start).unwrap());
        editor.finish_move(false);
        assert_eq!(editor.history().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_of_locked_layer_is_unlocked_and_selected() {
        let (mut editor, _) = editor();
        editor.restore().await;
        let id = editor.add_text_layer(None);
        editor.set_locked(id, true).unwrap();

        let clone = editor.duplicate_layer(id).await.unwrap();
        assert_eq!(editor.document().selection(), [clone]);
        let copy = editor.document().layer(clone).unwrap();
        assert!(!copy.locked && copy.interaction.movable);
        assert!(editor.document().layer(id).unwrap().locked);
    }

    #[tokio::test]
    async fn background_resizes_commits_and_persists() {
        let (mut editor, storage) = editor();
        editor.restore().await;
        let len = editor.history().len();

        editor.load_background(png_bytes(64, 32)).await.unwrap();
        assert_eq!(editor.document().size(), (64, 32));
        assert_eq!(editor.history().len(), len + 1);
        editor.flush_autosave().await;

        let data_url = editor.document().background().unwrap().data_url.clone();
        let saved = PersistenceAdapter::new(storage.clone()).load().await.unwrap();
        assert_eq!(saved.background_data_url.as_deref(), Some(data_url.as_str()));

        let mut restarted = Editor::new(
            EditorConfig::default(),
            storage,
            Arc::new(StaticFontCatalog::default()),
        );
        assert!(restarted.restore().await);
        assert_eq!(restarted.document().size(), (64, 32));
        assert_eq!(restarted.document().background().unwrap().data_url, data_url);
    }

    #[tokio::test]
    async fn undecodable_background_is_rejected() {
        let (mut editor, _) = editor();
        editor.restore().await;
        let result = editor.load_background(b"plain text".to_vec()).await;
        assert!(matches!(result, Err(EditorError::InvalidImage(_))));
        assert_eq!(editor.document().size(), (1280, 720));
        assert_eq!(editor.history().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_is_offset_and_selected() {
        let (mut editor, _) = editor();
        editor.restore().await;
        let id = editor.add_text_layer(None);
        let clone = editor.duplicate_layer(id).await.unwrap();
        let source = editor.document().layer(id).unwrap().position;
        let copy = editor.document().layer(clone).unwrap().position;
        assert_eq!(copy, Point::new(source.x + 20.0, source.y + 20.0));
        assert_eq!(editor.document().selection(), [clone]);
        assert_eq!(editor.history().len(), 3);
    }

    #[tokio::test]
    async fn commits_reach_storage() {
        let (mut editor, storage) = editor();
        editor.restore().await;
        editor.add_text_layer(None);
        editor.flush_autosave().await;

        let saved = PersistenceAdapter::new(storage).load().await.unwrap();
        assert_eq!(saved.snapshot.as_ref(), editor.history().current());
        assert_eq!(saved.background_data_url, None);
    }

    #[tokio::test]
    async fn subscribers_see_events_until_disposed() {
        let (mut editor, _) = editor();
        editor.restore().await;
        let seen = Rc::new(RefCell::new(0));
        let counter = seen.clone();
        editor.subscribe(move |_| *counter.borrow_mut() += 1);

        editor.add_text_layer(None);
        let after_add = *seen.borrow();
        assert!(after_add >= 2);

        editor.dispose();
        editor.add_text_layer(None);
        assert_eq!(*seen.borrow(), after_add);
    }

    #[tokio::test]
    async fn unknown_layers_are_reported() {
        let (mut editor, _) = editor();
        let ghost = LayerId::new();
        assert!(matches!(editor.toggle_visible(ghost), Err(EditorError::UnknownLayer(_))));
        assert!(editor.duplicate_layer(ghost).await.is_err());
    }
}
