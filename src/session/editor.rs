use crate::foundation::core::Rect;
use crate::foundation::error::LayerstackResult;
use crate::history::stack::HistoryStack;
use crate::interaction::gesture::{GestureMachine, InteractionAction, InteractionConfig, PointerEvent};
use crate::interaction::handles::HandleGeometry;
use crate::interaction::snap::{SnapConfig, SnapGuide};
use crate::render::assets::AssetSource;
use crate::render::backend::{FrameRGBA, RenderBackend};
use crate::scene::command::Command;
use crate::scene::model::{LayerId, Scene};
use crate::session::document::Document;

/// Editor tunables.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Snapping behavior.
    pub snap: SnapConfig,
    /// Side of the square hit area around each handle, in canvas pixels.
    pub handle_size_px: f64,
    /// Distance of the rotate handle beyond the top edge, in canvas pixels.
    pub rotate_handle_offset_px: f64,
    /// Maximum undo depth; `None` keeps everything.
    pub history_depth: Option<usize>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        let i = InteractionConfig::default();
        Self {
            snap: i.snap,
            handle_size_px: i.handle_size_px,
            rotate_handle_offset_px: i.rotate_handle_offset_px,
            history_depth: None,
        }
    }
}

impl EditorConfig {
    fn interaction(&self) -> InteractionConfig {
        InteractionConfig {
            snap: self.snap.clone(),
            handle_size_px: self.handle_size_px,
            rotate_handle_offset_px: self.rotate_handle_offset_px,
        }
    }
}

/// Interactive editing session: a [`Document`] driven by pointer gestures.
///
/// All calls are synchronous. Undo, redo and direct command execution first cancel any active
/// gesture so history never interleaves with an uncommitted preview.
#[derive(Debug)]
pub struct Editor {
    doc: Document,
    gestures: GestureMachine,
    config: EditorConfig,
    interaction: InteractionConfig,
}

impl Editor {
    /// Open `scene` for editing.
    pub fn new(scene: Scene, config: EditorConfig) -> LayerstackResult<Self> {
        let history = match config.history_depth {
            Some(depth) => HistoryStack::with_max_depth(depth),
            None => HistoryStack::new(),
        };
        Ok(Self {
            doc: Document::with_history(scene, history)?,
            gestures: GestureMachine::new(),
            interaction: config.interaction(),
            config,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Underlying document.
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Committed scene (without gesture preview).
    pub fn scene(&self) -> &Scene {
        self.doc.scene()
    }

    /// Selected layer ids.
    pub fn selection(&self) -> &[LayerId] {
        self.doc.selection()
    }

    /// `true` while a pointer gesture is in progress.
    pub fn is_gesture_active(&self) -> bool {
        self.gestures.is_active()
    }

    /// Feed one pointer event and apply its outcome to the document.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> LayerstackResult<Vec<InteractionAction>> {
        let mut actions = self.gestures.handle(
            event,
            self.doc.scene(),
            self.doc.selection(),
            &self.interaction,
        );
        for action in &mut actions {
            match action {
                InteractionAction::SelectionChanged(ids) => self.doc.set_selection(ids)?,
                InteractionAction::Committed(cmd) => {
                    if !self.doc.execute(cmd.clone())? {
                        *action = InteractionAction::NothingToCommit;
                    }
                }
                _ => {}
            }
        }
        Ok(actions)
    }

    /// Execute a command outside of a gesture.
    pub fn execute(&mut self, command: Command) -> LayerstackResult<bool> {
        self.cancel_gesture();
        self.doc.execute(command)
    }

    /// Undo the last command.
    pub fn undo(&mut self) -> LayerstackResult<()> {
        self.cancel_gesture();
        self.doc.undo()
    }

    /// Redo the last undone command.
    pub fn redo(&mut self) -> LayerstackResult<()> {
        self.cancel_gesture();
        self.doc.redo()
    }

    /// Replace the selection.
    pub fn set_selection(&mut self, ids: &[LayerId]) -> LayerstackResult<()> {
        self.cancel_gesture();
        self.doc.set_selection(ids)
    }

    /// Abort the active gesture, if any. Returns `true` when one was active.
    pub fn cancel_gesture(&mut self) -> bool {
        let cancelled = self.gestures.cancel();
        if cancelled {
            tracing::debug!("editor: gesture cancelled");
        }
        cancelled
    }

    /// Committed scene with the active gesture's preview transforms applied.
    pub fn preview_scene(&self) -> Scene {
        let mut scene = self.doc.scene().clone();
        for (id, transform) in self.gestures.preview() {
            if let Ok(layer) = scene.layer_mut(id) {
                layer.transform = transform;
            }
        }
        scene
    }

    /// Render the preview scene at `t_s` and canvas resolution.
    pub fn render_preview(
        &self,
        backend: &mut dyn RenderBackend,
        assets: &dyn AssetSource,
        t_s: f64,
    ) -> LayerstackResult<FrameRGBA> {
        let scene = self.preview_scene();
        backend.render_scene(&scene, t_s, scene.canvas(), assets)
    }

    /// Handle geometry for each selected layer, following the preview.
    pub fn handles(&self) -> Vec<HandleGeometry> {
        let scene = self.preview_scene();
        self.doc
            .selection()
            .iter()
            .filter_map(|id| scene.layer(*id))
            .map(|l| {
                HandleGeometry::new(
                    l.id,
                    &l.transform,
                    l.size(),
                    self.config.rotate_handle_offset_px,
                )
            })
            .collect()
    }

    /// Snap guides active in the current gesture.
    pub fn snap_guides(&self) -> &[SnapGuide] {
        self.gestures.guides()
    }

    /// Rubber-band rectangle while a marquee selection is active.
    pub fn marquee(&self) -> Option<Rect> {
        self.gestures.marquee()
    }

    /// Immutable copy of the committed scene, suitable for export.
    pub fn snapshot(&self) -> Scene {
        self.doc.scene().clone()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/editor.rs"]
mod tests;
