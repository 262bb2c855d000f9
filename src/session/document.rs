use crate::animation::keyframes::Keyframes;
use crate::foundation::error::{LayerstackError, LayerstackResult};
use crate::geometry::transform::Transform2D;
use crate::history::stack::HistoryStack;
use crate::scene::command::Command;
use crate::scene::model::{Layer, LayerContent, LayerId, Scene};

/// One editing session over a scene.
///
/// Every scene change goes through [`Document::execute`], [`Document::undo`] or
/// [`Document::redo`]; the scene is replaced only when the edit succeeds. The selection is view
/// state: it is validated but not recorded in history, and ids that stop existing are pruned after
/// every scene change.
#[derive(Clone, Debug)]
pub struct Document {
    scene: Scene,
    history: HistoryStack,
    selection: Vec<LayerId>,
    /// `None` once every id above the highest one seen is taken.
    next_layer_id: Option<u64>,
}

impl Document {
    /// Start a session with unbounded history.
    pub fn new(scene: Scene) -> LayerstackResult<Self> {
        Self::with_history(scene, HistoryStack::new())
    }

    /// Start a session with a caller-configured history.
    pub fn with_history(scene: Scene, history: HistoryStack) -> LayerstackResult<Self> {
        scene.validate()?;
        let next_layer_id = scene.max_layer_id().map_or(Some(1), |id| id.0.checked_add(1));
        Ok(Self {
            scene,
            history,
            selection: Vec::new(),
            next_layer_id,
        })
    }

    /// Current scene.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Undo/redo history.
    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    /// Selected layer ids, in selection order.
    pub fn selection(&self) -> &[LayerId] {
        &self.selection
    }

    /// Reserve a fresh layer id. Ids are never handed out twice in one session, even across undo.
    ///
    /// Fails with `Validation` once the id space above the highest id seen is used up.
    pub fn allocate_layer_id(&mut self) -> LayerstackResult<LayerId> {
        let next = self
            .next_layer_id
            .ok_or_else(|| LayerstackError::validation("layer id space exhausted"))?;
        self.next_layer_id = next.checked_add(1);
        Ok(LayerId(next))
    }

    /// Execute `command`. Returns `false` when it was a no-op.
    pub fn execute(&mut self, command: Command) -> LayerstackResult<bool> {
        if let Command::AddLayer { layer, .. } = &command {
            self.next_layer_id = self
                .next_layer_id
                .zip(layer.id.0.checked_add(1))
                .map(|(next, above)| next.max(above));
        }
        match self.history.execute(&self.scene, command)? {
            Some(next) => {
                self.commit(next);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Undo the last command.
    pub fn undo(&mut self) -> LayerstackResult<()> {
        let next = self.history.undo(&self.scene)?;
        self.commit(next);
        Ok(())
    }

    /// Redo the last undone command.
    pub fn redo(&mut self) -> LayerstackResult<()> {
        let next = self.history.redo(&self.scene)?;
        self.commit(next);
        Ok(())
    }

    /// `true` when there is something to undo.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// `true` when there is something to redo.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Add a new layer with a fresh id on top of the stack.
    pub fn add_layer(&mut self, content: LayerContent, transform: Transform2D) -> LayerstackResult<LayerId> {
        let id = self.allocate_layer_id()?;
        let layer = Layer::new(id, content).with_transform(transform);
        self.execute(Command::AddLayer { layer, index: None })?;
        Ok(id)
    }

    /// Insert a prepared layer at `index` (top when `None`).
    pub fn insert_layer(&mut self, layer: Layer, index: Option<usize>) -> LayerstackResult<()> {
        self.execute(Command::AddLayer { layer, index }).map(|_| ())
    }

    /// Remove a layer.
    pub fn remove_layer(&mut self, id: LayerId) -> LayerstackResult<()> {
        self.execute(Command::RemoveLayer { id }).map(|_| ())
    }

    /// Move a layer to z-index `to` (clamped).
    pub fn reorder(&mut self, id: LayerId, to: usize) -> LayerstackResult<bool> {
        self.execute(Command::Reorder { id, to })
    }

    /// Replace a layer's transform.
    pub fn set_transform(&mut self, id: LayerId, transform: Transform2D) -> LayerstackResult<bool> {
        self.execute(Command::SetTransform { id, transform })
    }

    /// Show or hide a layer.
    pub fn set_visibility(&mut self, id: LayerId, visible: bool) -> LayerstackResult<bool> {
        self.execute(Command::SetVisibility { id, visible })
    }

    /// Replace a layer's opacity.
    pub fn set_opacity(&mut self, id: LayerId, opacity: f64) -> LayerstackResult<bool> {
        self.execute(Command::SetOpacity { id, opacity })
    }

    /// Replace a layer's keyframes.
    pub fn set_keyframes(&mut self, id: LayerId, keyframes: Keyframes) -> LayerstackResult<bool> {
        self.execute(Command::SetKeyframes { id, keyframes })
    }

    /// Rename a layer.
    pub fn rename_layer(&mut self, id: LayerId, name: impl Into<String>) -> LayerstackResult<bool> {
        self.execute(Command::RenameLayer {
            id,
            name: name.into(),
        })
    }

    /// Replace the selection. Unknown ids are rejected and the selection is left unchanged;
    /// duplicates are collapsed.
    pub fn set_selection(&mut self, ids: &[LayerId]) -> LayerstackResult<()> {
        if let Some(missing) = ids.iter().find(|id| !self.scene.contains(**id)) {
            return Err(LayerstackError::not_found(missing.to_string()));
        }
        let mut next = Vec::with_capacity(ids.len());
        for id in ids {
            if !next.contains(id) {
                next.push(*id);
            }
        }
        self.selection = next;
        Ok(())
    }

    /// Empty the selection.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    fn commit(&mut self, next: Scene) {
        self.scene = next;
        let scene = &self.scene;
        self.selection.retain(|id| scene.contains(*id));
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/document.rs"]
mod tests;
