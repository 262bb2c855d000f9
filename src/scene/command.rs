use crate::animation::keyframes::Keyframes;
use crate::foundation::error::{LayerstackError, LayerstackResult};
use crate::geometry::transform::Transform2D;
use crate::scene::model::{Layer, LayerId, Scene, sanitize_opacity};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One atomic, reversible scene edit.
///
/// Commands are plain values. [`Command::apply`] never mutates its input: it works on a clone of
/// the scene and hands back the edited copy together with the command that undoes it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    /// Insert a layer at `index` (clamped), or on top when `index` is `None`.
    AddLayer {
        /// Layer to insert.
        layer: Layer,
        /// Target z-index.
        #[serde(default)]
        index: Option<usize>,
    },
    /// Remove a layer.
    RemoveLayer {
        /// Layer to remove.
        id: LayerId,
    },
    /// Move a layer to z-index `to`, clamped into range.
    Reorder {
        /// Layer to move.
        id: LayerId,
        /// Target z-index.
        to: usize,
    },
    /// Replace a layer's base transform.
    SetTransform {
        /// Target layer.
        id: LayerId,
        /// New transform.
        transform: Transform2D,
    },
    /// Show or hide a layer.
    SetVisibility {
        /// Target layer.
        id: LayerId,
        /// New flag.
        visible: bool,
    },
    /// Replace a layer's base opacity (clamped into `[0, 1]`).
    SetOpacity {
        /// Target layer.
        id: LayerId,
        /// New opacity.
        opacity: f64,
    },
    /// Replace the transforms of several layers at once.
    BatchTransform {
        /// `(layer, transform)` pairs; each layer at most once.
        changes: Vec<(LayerId, Transform2D)>,
    },
    /// Replace a layer's keyframe track.
    SetKeyframes {
        /// Target layer.
        id: LayerId,
        /// New track.
        keyframes: Keyframes,
    },
    /// Rename a layer.
    RenameLayer {
        /// Target layer.
        id: LayerId,
        /// New display name.
        name: String,
    },
}

/// Outcome of [`Command::apply`].
#[derive(Debug)]
pub enum Applied {
    /// The scene changed.
    Changed {
        /// Edited copy of the scene.
        scene: Scene,
        /// Command restoring the original scene.
        inverse: Command,
    },
    /// The command would not change this scene.
    NoOp,
}

impl Command {
    /// Short tag used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::AddLayer { .. } => "add_layer",
            Self::RemoveLayer { .. } => "remove_layer",
            Self::Reorder { .. } => "reorder",
            Self::SetTransform { .. } => "set_transform",
            Self::SetVisibility { .. } => "set_visibility",
            Self::SetOpacity { .. } => "set_opacity",
            Self::BatchTransform { .. } => "batch_transform",
            Self::SetKeyframes { .. } => "set_keyframes",
            Self::RenameLayer { .. } => "rename_layer",
        }
    }

    /// Apply to a copy of `scene`.
    ///
    /// Unknown ids yield [`LayerstackError::NotFound`], non-finite values
    /// [`LayerstackError::InvalidGeometry`]; `scene` is untouched either way.
    pub fn apply(&self, scene: &Scene) -> LayerstackResult<Applied> {
        match self {
            Self::AddLayer { layer, index } => {
                if scene.contains(layer.id) {
                    return Err(LayerstackError::validation(format!(
                        "layer id {} already exists",
                        layer.id
                    )));
                }
                let layer = layer.clone().sanitized()?;

                let mut next = scene.clone();
                let at = index.unwrap_or(next.len());
                let id = layer.id;
                next.insert_layer(at, layer)?;
                Ok(changed(next, Self::RemoveLayer { id }))
            }
            Self::RemoveLayer { id } => {
                let mut next = scene.clone();
                let (index, removed) = next.remove_layer(*id)?;
                Ok(changed(
                    next,
                    Self::AddLayer {
                        layer: removed.as_ref().clone(),
                        index: Some(index),
                    },
                ))
            }
            Self::Reorder { id, to } => {
                let from = scene.require_index(*id)?;
                let to = (*to).min(scene.len().saturating_sub(1));
                if from == to {
                    return Ok(Applied::NoOp);
                }
                let mut next = scene.clone();
                next.move_layer(*id, to)?;
                Ok(changed(next, Self::Reorder { id: *id, to: from }))
            }
            Self::SetTransform { id, transform } => {
                let transform = transform.sanitize()?;
                let current = current_layer(scene, *id)?.transform;
                if current == transform {
                    return Ok(Applied::NoOp);
                }
                let mut next = scene.clone();
                next.layer_mut(*id)?.transform = transform;
                Ok(changed(
                    next,
                    Self::SetTransform {
                        id: *id,
                        transform: current,
                    },
                ))
            }
            Self::SetVisibility { id, visible } => {
                let current = current_layer(scene, *id)?.visible;
                if current == *visible {
                    return Ok(Applied::NoOp);
                }
                let mut next = scene.clone();
                next.layer_mut(*id)?.visible = *visible;
                Ok(changed(
                    next,
                    Self::SetVisibility {
                        id: *id,
                        visible: current,
                    },
                ))
            }
            Self::SetOpacity { id, opacity } => {
                let opacity = sanitize_opacity(*opacity)?;
                let current = current_layer(scene, *id)?.opacity;
                if current == opacity {
                    return Ok(Applied::NoOp);
                }
                let mut next = scene.clone();
                next.layer_mut(*id)?.opacity = opacity;
                Ok(changed(
                    next,
                    Self::SetOpacity {
                        id: *id,
                        opacity: current,
                    },
                ))
            }
            Self::BatchTransform { changes } => {
                let mut seen = HashSet::with_capacity(changes.len());
                let mut effective = Vec::with_capacity(changes.len());
                let mut undo = Vec::with_capacity(changes.len());
                for (id, transform) in changes {
                    if !seen.insert(*id) {
                        return Err(LayerstackError::validation(format!(
                            "{id} appears twice in batch transform"
                        )));
                    }
                    let transform = transform.sanitize()?;
                    let current = current_layer(scene, *id)?.transform;
                    if current != transform {
                        effective.push((*id, transform));
                        undo.push((*id, current));
                    }
                }
                if effective.is_empty() {
                    return Ok(Applied::NoOp);
                }
                let mut next = scene.clone();
                for (id, transform) in effective {
                    next.layer_mut(id)?.transform = transform;
                }
                Ok(changed(next, Self::BatchTransform { changes: undo }))
            }
            Self::SetKeyframes { id, keyframes } => {
                keyframes.validate()?;
                let current = &current_layer(scene, *id)?.keyframes;
                if current == keyframes {
                    return Ok(Applied::NoOp);
                }
                let inverse = Self::SetKeyframes {
                    id: *id,
                    keyframes: current.clone(),
                };
                let mut next = scene.clone();
                next.layer_mut(*id)?.keyframes = keyframes.clone();
                Ok(changed(next, inverse))
            }
            Self::RenameLayer { id, name } => {
                let current = &current_layer(scene, *id)?.name;
                if current == name {
                    return Ok(Applied::NoOp);
                }
                let inverse = Self::RenameLayer {
                    id: *id,
                    name: current.clone(),
                };
                let mut next = scene.clone();
                next.layer_mut(*id)?.name = name.clone();
                Ok(changed(next, inverse))
            }
        }
    }
}

fn changed(scene: Scene, inverse: Command) -> Applied {
    Applied::Changed { scene, inverse }
}

fn current_layer(scene: &Scene, id: LayerId) -> LayerstackResult<&Layer> {
    scene
        .layer(id)
        .ok_or_else(|| LayerstackError::not_found(id.to_string()))
}

#[cfg(test)]
#[path = "../../tests/unit/scene/command.rs"]
mod tests;
