//! Translates pointer, keyboard and layer-panel input into editor operations.

use crate::document::{Direction, TextProperty};
use crate::editor::Editor;
use crate::error::Result;
use crate::layers::{LayerEntry, LayerId, Point};

/// Keys the editor reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Delete,
    Backspace,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    /// Cmd on macOS
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        meta: false,
    };

    /// Ctrl on most platforms, Cmd on macOS
    pub fn command(self) -> bool {
        self.ctrl || self.meta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    pub fn plain(key: Key) -> Self {
        Self::new(key, Modifiers::NONE)
    }
}

/// Commands from the layer list and property panel.
///
/// Layer positions are display indices: 0 is the topmost layer.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelCommand {
    AddText { viewport_center: Option<Point> },
    SelectAt(usize),
    DeleteAt(usize),
    DuplicateAt(usize),
    ToggleVisibleAt(usize),
    ToggleLockAt(usize),
    MoveAt(usize, Direction),
    SetProperty(LayerId, TextProperty),
    LoadBackground(Vec<u8>),
    DeleteSelection,
    DuplicateSelection,
    Undo,
    Redo,
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Key(KeyEvent),
    /// Press on the canvas; `layer` is the topmost layer under the pointer
    PointerDown { layer: Option<LayerId>, at: Point },
    PointerMove { at: Point },
    PointerUp,
    Panel(PanelCommand),
    /// A text-entry control gained or lost focus
    Focus(bool),
    BeginTextEdit(LayerId),
    TextInput(String),
    EndTextEdit,
}

/// State of an interactive move
#[derive(Debug, Clone, Copy, PartialEq)]
struct DragState {
    layer: LayerId,
    /// Pointer position relative to the layer's top-left corner
    grab: Point,
    moved: bool,
}

/// Routes input to the editor and tracks transient interaction state.
#[derive(Debug, Default)]
pub struct Controller {
    text_focus: bool,
    editing: Option<LayerId>,
    drag: Option<DragState>,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer being edited inline, if any
    pub fn editing(&self) -> Option<LayerId> {
        self.editing
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Handle one input event. Returns whether it changed anything.
    pub async fn handle(&mut self, editor: &mut Editor, event: InputEvent) -> Result<bool> {
        match event {
            InputEvent::Key(key) => Ok(self.handle_key(editor, key).await),
            InputEvent::PointerDown { layer, at } => Ok(self.pointer_down(editor, layer, at)),
            InputEvent::PointerMove { at } => Ok(self.pointer_move(editor, at)),
            InputEvent::PointerUp => Ok(self.pointer_up(editor)),
            InputEvent::Panel(cmd) => self.handle_panel(editor, cmd).await,
            InputEvent::Focus(focused) => {
                self.text_focus = focused;
                Ok(false)
            }
            InputEvent::BeginTextEdit(id) => {
                let editable = editor
                    .document()
                    .layer(id)
                    .is_some_and(|l| l.interaction.editable && l.as_text().is_some());
                if editable {
                    self.editing = Some(id);
                    editor.select_only(id);
                }
                Ok(editable)
            }
            InputEvent::TextInput(text) => match self.editing {
                Some(id) => editor.update_text_property(id, TextProperty::Content(text)).await,
                None => Ok(false),
            },
            InputEvent::EndTextEdit => {
                if self.editing.take().is_some() {
                    return Ok(editor.flush_pending());
                }
                Ok(false)
            }
        }
    }

    async fn handle_key(&mut self, editor: &mut Editor, event: KeyEvent) -> bool {
        if self.text_focus || self.editing.is_some() {
            return false;
        }
        let KeyEvent { key, modifiers } = event;

        if let (Key::Char(c), true) = (key, modifiers.command()) {
            return match c.to_ascii_lowercase() {
                'z' => self.step_history(editor, modifiers.shift).await,
                'd' => editor.duplicate_selection().await.is_some(),
                _ => false,
            };
        }

        let step = if modifiers.shift {
            editor.config().nudge_step_large
        } else {
            editor.config().nudge_step
        };
        match key {
            Key::ArrowUp => editor.nudge_selection(0.0, -step) > 0,
            Key::ArrowDown => editor.nudge_selection(0.0, step) > 0,
            Key::ArrowLeft => editor.nudge_selection(-step, 0.0) > 0,
            Key::ArrowRight => editor.nudge_selection(step, 0.0) > 0,
            Key::Delete | Key::Backspace => editor.remove_selection() > 0,
            Key::Char(_) => false,
        }
    }

    fn pointer_down(&mut self, editor: &mut Editor, layer: Option<LayerId>, at: Point) -> bool {
        let Some(id) = layer else {
            editor.clear_selection();
            return true;
        };
        if !editor.select_only(id) {
            return false;
        }
        self.drag = editor
            .document()
            .layer(id)
            .filter(|l| l.interaction.movable)
            .map(|l| DragState {
                layer: id,
                grab: Point::new(at.x - l.position.x, at.y - l.position.y),
                moved: false,
            });
        true
    }

    fn pointer_move(&mut self, editor: &mut Editor, at: Point) -> bool {
        let Some(drag) = self.drag.as_mut() else {
            return false;
        };
        let target = Point::new(at.x - drag.grab.x, at.y - drag.grab.y);
        match editor.drag_layer(drag.layer, target) {
            Ok(moved) => {
                drag.moved |= moved;
                moved
            }
            Err(e) => {
                tracing::debug!("Dropping drag: {e}");
                self.cancel_drag(editor);
                false
            }
        }
    }

    /// Forget an in-progress drag without committing it.
    fn cancel_drag(&mut self, editor: &mut Editor) {
        if self.drag.take().is_some() {
            editor.cancel_move();
        }
    }

    /// Undo or redo, dropping interaction state the jump may invalidate.
    async fn step_history(&mut self, editor: &mut Editor, redo: bool) -> bool {
        self.cancel_drag(editor);
        let stepped = if redo { editor.redo().await } else { editor.undo().await };
        if self.editing.is_some_and(|id| editor.document().layer(id).is_none()) {
            self.editing = None;
        }
        stepped
    }

    fn pointer_up(&mut self, editor: &mut Editor) -> bool {
        match self.drag.take() {
            Some(drag) => {
                editor.finish_move(drag.moved);
                drag.moved
            }
            None => false,
        }
    }

    async fn handle_panel(&mut self, editor: &mut Editor, cmd: PanelCommand) -> Result<bool> {
        match cmd {
            PanelCommand::AddText { viewport_center } => {
                editor.add_text_layer(viewport_center);
                Ok(true)
            }
            PanelCommand::SelectAt(pos) => Ok(layer_at(editor, pos).is_some_and(|id| editor.select_only(id))),
            PanelCommand::DeleteAt(pos) => match layer_at(editor, pos) {
                Some(id) => editor.remove_layer(id).map(|()| true),
                None => Ok(false),
            },
            PanelCommand::DuplicateAt(pos) => match layer_at(editor, pos) {
                Some(id) => editor.duplicate_layer(id).await.map(|_| true),
                None => Ok(false),
            },
            PanelCommand::ToggleVisibleAt(pos) => match layer_at(editor, pos) {
                Some(id) => editor.toggle_visible(id),
                None => Ok(false),
            },
            PanelCommand::ToggleLockAt(pos) => match layer_at(editor, pos) {
                Some(id) => editor.toggle_locked(id),
                None => Ok(false),
            },
            PanelCommand::MoveAt(pos, direction) => match layer_at(editor, pos) {
                Some(id) => editor.reorder(id, direction),
                None => Ok(false),
            },
            PanelCommand::SetProperty(id, property) => editor.update_text_property(id, property).await,
            PanelCommand::LoadBackground(bytes) => editor.load_background(bytes).await.map(|()| true),
            PanelCommand::DeleteSelection => Ok(editor.remove_selection() > 0),
            PanelCommand::DuplicateSelection => Ok(editor.duplicate_selection().await.is_some()),
            PanelCommand::Undo => Ok(self.step_history(editor, false).await),
            PanelCommand::Redo => Ok(self.step_history(editor, true).await),
            PanelCommand::Reset => {
                self.cancel_drag(editor);
                self.editing = None;
                editor.reset_design();
                Ok(true)
            }
        }
    }
}

/// Map a display index (0 = topmost) to an index into the bottom-to-top stack.
pub fn display_to_internal(len: usize, display: usize) -> Option<usize> {
    (display < len).then(|| len - 1 - display)
}

/// Layer list in display order, topmost first.
pub fn display_layers(editor: &Editor) -> Vec<LayerEntry> {
    editor.layers().iter().rev().cloned().collect()
}

fn layer_at(editor: &Editor, display: usize) -> Option<LayerId> {
    let layers = editor.document().layers();
    display_to_internal(layers.len(), display).map(|i| layers[i].id)
}
