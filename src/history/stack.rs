use crate::foundation::error::{LayerstackError, LayerstackResult};
use crate::scene::command::{Applied, Command};
use crate::scene::model::Scene;

/// A command together with the command that undoes it.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    /// Command as executed (replayed by redo).
    pub command: Command,
    /// Command restoring the state before `command` (applied by undo).
    pub inverse: Command,
}

/// Linear undo/redo history over [`Command`]s.
///
/// The stack does not own the scene: every operation takes the current scene and returns the
/// next one, leaving the caller to commit it. Errors leave both the stack and the scene as they
/// were.
#[derive(Clone, Debug, Default)]
pub struct HistoryStack {
    past: Vec<HistoryEntry>,
    future: Vec<HistoryEntry>,
    max_depth: Option<usize>,
}

impl HistoryStack {
    /// Unbounded history.
    pub fn new() -> Self {
        Self::default()
    }

    /// History keeping at most `depth` undo steps (at least one); the oldest are evicted first.
    pub fn with_max_depth(depth: usize) -> Self {
        Self {
            max_depth: Some(depth.max(1)),
            ..Self::default()
        }
    }

    /// Configured depth bound, if any.
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Apply `command` to `scene`.
    ///
    /// Returns the new scene, or `None` when the command is a no-op for `scene`; no-ops are not
    /// recorded and keep the redo stack.
    pub fn execute(&mut self, scene: &Scene, command: Command) -> LayerstackResult<Option<Scene>> {
        match command.apply(scene)? {
            Applied::NoOp => {
                tracing::debug!(op = command.label(), "history: no-op command skipped");
                Ok(None)
            }
            Applied::Changed {
                scene: next,
                inverse,
            } => {
                tracing::debug!(
                    op = command.label(),
                    past = self.past.len() + 1,
                    dropped_redo = self.future.len(),
                    "history: execute"
                );
                self.future.clear();
                self.past.push(HistoryEntry { command, inverse });
                self.evict_overflow();
                Ok(Some(next))
            }
        }
    }

    /// Undo the most recent command.
    pub fn undo(&mut self, scene: &Scene) -> LayerstackResult<Scene> {
        let entry = self.past.pop().ok_or(LayerstackError::NothingToUndo)?;
        let next = match entry.inverse.apply(scene) {
            Ok(Applied::Changed { scene: next, .. }) => next,
            Ok(Applied::NoOp) => scene.clone(),
            Err(e) => {
                self.past.push(entry);
                return Err(e);
            }
        };
        tracing::debug!(op = entry.command.label(), "history: undo");
        self.future.push(entry);
        Ok(next)
    }

    /// Redo the most recently undone command.
    pub fn redo(&mut self, scene: &Scene) -> LayerstackResult<Scene> {
        let entry = self.future.pop().ok_or(LayerstackError::NothingToRedo)?;
        let (next, inverse) = match entry.command.apply(scene) {
            Ok(Applied::Changed {
                scene: next,
                inverse,
            }) => (next, inverse),
            Ok(Applied::NoOp) => (scene.clone(), entry.inverse.clone()),
            Err(e) => {
                self.future.push(entry);
                return Err(e);
            }
        };
        tracing::debug!(op = entry.command.label(), "history: redo");
        self.past.push(HistoryEntry {
            command: entry.command,
            inverse,
        });
        self.evict_overflow();
        Ok(next)
    }

    /// `true` when there is something to undo.
    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    /// `true` when there is something to redo.
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Number of undo steps.
    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    /// Number of redo steps.
    pub fn future_len(&self) -> usize {
        self.future.len()
    }

    /// Most recent entry, i.e. what `undo` would revert.
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.past.last()
    }

    /// Drop all history.
    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }

    fn evict_overflow(&mut self) {
        if let Some(max) = self.max_depth
            && self.past.len() > max
        {
            let overflow = self.past.len() - max;
            self.past.drain(..overflow);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/history/stack.rs"]
mod tests;
