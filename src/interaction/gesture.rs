use crate::foundation::core::{Point, Rect, Size, Vec2};
use crate::geometry::transform::{MIN_SCALE, Transform2D, normalize_angle};
use crate::interaction::handles::Handle;
use crate::interaction::hit::{HitTarget, hit_test, layers_in_marquee};
use crate::interaction::snap::{SnapConfig, SnapGuide, SnapTargets, snap_angle};
use crate::scene::command::Command;
use crate::scene::model::{LayerId, Scene};

/// Keyboard modifiers held during a pointer event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Modifiers {
    /// Shift: additive selection.
    pub shift: bool,
}

impl Modifiers {
    /// Only shift held.
    pub const SHIFT: Self = Self { shift: true };
}

/// Discrete pointer input in canvas coordinates.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PointerEvent {
    /// Button pressed.
    Down {
        /// Pointer position.
        pos: Point,
        /// Held modifiers.
        #[serde(default)]
        modifiers: Modifiers,
    },
    /// Pointer moved.
    Move {
        /// Pointer position.
        pos: Point,
        /// Held modifiers.
        #[serde(default)]
        modifiers: Modifiers,
    },
    /// Button released.
    Up {
        /// Pointer position.
        pos: Point,
        /// Held modifiers.
        #[serde(default)]
        modifiers: Modifiers,
    },
    /// Gesture aborted by the host (escape key, focus loss).
    Cancel,
}

impl PointerEvent {
    /// Press at `(x, y)` without modifiers.
    pub fn down(x: f64, y: f64) -> Self {
        Self::Down {
            pos: Point::new(x, y),
            modifiers: Modifiers::default(),
        }
    }

    /// Press at `(x, y)` with shift held.
    pub fn shift_down(x: f64, y: f64) -> Self {
        Self::Down {
            pos: Point::new(x, y),
            modifiers: Modifiers::SHIFT,
        }
    }

    /// Move to `(x, y)`.
    pub fn moved(x: f64, y: f64) -> Self {
        Self::Move {
            pos: Point::new(x, y),
            modifiers: Modifiers::default(),
        }
    }

    /// Release at `(x, y)`.
    pub fn up(x: f64, y: f64) -> Self {
        Self::Up {
            pos: Point::new(x, y),
            modifiers: Modifiers::default(),
        }
    }
}

/// Tunables for hit testing and snapping.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Snapping behavior.
    pub snap: SnapConfig,
    /// Side of the square hit area around each handle, in canvas pixels.
    pub handle_size_px: f64,
    /// Distance of the rotate handle beyond the top edge, in canvas pixels.
    pub rotate_handle_offset_px: f64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            snap: SnapConfig::default(),
            handle_size_px: 12.0,
            rotate_handle_offset_px: 28.0,
        }
    }
}

/// Kind of an active gesture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    /// Moving the selection.
    Drag,
    /// Dragging a resize handle.
    Resize(Handle),
    /// Dragging the rotate handle.
    Rotate,
    /// Rubber-band selection.
    Marquee,
}

/// What an event did, reported back to the host.
#[derive(Clone, Debug, PartialEq)]
pub enum InteractionAction {
    /// The selection is now exactly these ids.
    SelectionChanged(Vec<LayerId>),
    /// A gesture began.
    GestureStarted(GestureKind),
    /// Preview transforms, marquee or guides changed.
    PreviewUpdated,
    /// The gesture ended with this single command.
    Committed(Command),
    /// The gesture ended without changing anything.
    NothingToCommit,
    /// The gesture was aborted and its preview discarded.
    GestureCancelled,
}

#[derive(Clone, Debug)]
enum State {
    Idle,
    Dragging {
        origin: Point,
        start: Vec<(LayerId, Transform2D)>,
        start_bounds: Rect,
        targets: SnapTargets,
        current: Vec<(LayerId, Transform2D)>,
    },
    Resizing {
        layer: LayerId,
        handle: Handle,
        origin: Point,
        size: Size,
        start: Transform2D,
        current: Transform2D,
    },
    Rotating {
        layer: LayerId,
        pointer_start_deg: f64,
        start: Transform2D,
        current: Transform2D,
    },
    Marquee {
        origin: Point,
        current: Point,
        base: Vec<LayerId>,
    },
}

/// Pointer gesture state machine.
///
/// `Idle → Down → {Dragging | Resizing | Rotating | Marquee} → Move* → Up → Idle`, with `Cancel`
/// returning to `Idle` from any state. Moves only update a preview; the scene is never touched.
/// `Up` yields at most one [`InteractionAction::Committed`] covering the whole gesture.
#[derive(Clone, Debug)]
pub struct GestureMachine {
    state: State,
    guides: Vec<SnapGuide>,
}

impl Default for GestureMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl GestureMachine {
    /// Idle machine.
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            guides: Vec::new(),
        }
    }

    /// `true` while a gesture is in progress.
    pub fn is_active(&self) -> bool {
        !matches!(self.state, State::Idle)
    }

    /// Kind of the active gesture.
    pub fn kind(&self) -> Option<GestureKind> {
        match &self.state {
            State::Idle => None,
            State::Dragging { .. } => Some(GestureKind::Drag),
            State::Resizing { handle, .. } => Some(GestureKind::Resize(*handle)),
            State::Rotating { .. } => Some(GestureKind::Rotate),
            State::Marquee { .. } => Some(GestureKind::Marquee),
        }
    }

    /// Uncommitted transforms of the layers being manipulated.
    pub fn preview(&self) -> Vec<(LayerId, Transform2D)> {
        match &self.state {
            State::Dragging { current, .. } => current.clone(),
            State::Resizing { layer, current, .. } | State::Rotating { layer, current, .. } => {
                vec![(*layer, *current)]
            }
            State::Idle | State::Marquee { .. } => Vec::new(),
        }
    }

    /// Rubber-band rectangle while a marquee is active.
    pub fn marquee(&self) -> Option<Rect> {
        match &self.state {
            State::Marquee {
                origin, current, ..
            } => Some(Rect::from_points(*origin, *current)),
            _ => None,
        }
    }

    /// Snap guides active for the current preview.
    pub fn guides(&self) -> &[SnapGuide] {
        &self.guides
    }

    /// Abort the active gesture. Returns `true` when one was active.
    pub fn cancel(&mut self) -> bool {
        let was_active = self.is_active();
        self.state = State::Idle;
        self.guides.clear();
        was_active
    }

    /// Feed one pointer event.
    pub fn handle(
        &mut self,
        event: PointerEvent,
        scene: &Scene,
        selection: &[LayerId],
        cfg: &InteractionConfig,
    ) -> Vec<InteractionAction> {
        match event {
            PointerEvent::Down { pos, modifiers } => {
                let mut out = Vec::new();
                if self.cancel() {
                    out.push(InteractionAction::GestureCancelled);
                }
                self.press(pos, modifiers, scene, selection, cfg, &mut out);
                out
            }
            PointerEvent::Move { pos, .. } => {
                if !self.is_active() {
                    return Vec::new();
                }
                self.update(pos, &cfg.snap);
                vec![InteractionAction::PreviewUpdated]
            }
            PointerEvent::Up { pos, .. } => {
                if !self.is_active() {
                    return Vec::new();
                }
                self.update(pos, &cfg.snap);
                let finished = std::mem::replace(&mut self.state, State::Idle);
                self.guides.clear();
                vec![finish(finished, scene, selection)]
            }
            PointerEvent::Cancel => {
                if self.cancel() {
                    vec![InteractionAction::GestureCancelled]
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn press(
        &mut self,
        pos: Point,
        modifiers: Modifiers,
        scene: &Scene,
        selection: &[LayerId],
        cfg: &InteractionConfig,
        out: &mut Vec<InteractionAction>,
    ) {
        let target = hit_test(
            scene,
            selection,
            pos,
            cfg.handle_size_px,
            cfg.rotate_handle_offset_px,
        );
        match target {
            HitTarget::Handle { layer, handle } => {
                let Some(l) = scene.layer(layer) else {
                    return;
                };
                let start = l.transform;
                self.state = if handle == Handle::Rotate {
                    State::Rotating {
                        layer,
                        pointer_start_deg: pointer_angle_deg(start.position(), pos),
                        start,
                        current: start,
                    }
                } else {
                    State::Resizing {
                        layer,
                        handle,
                        origin: pos,
                        size: l.size(),
                        start,
                        current: start,
                    }
                };
            }
            HitTarget::Body(id) => {
                let mut next: Vec<LayerId> = selection.to_vec();
                if modifiers.shift {
                    if let Some(i) = next.iter().position(|s| *s == id) {
                        next.remove(i);
                    } else {
                        next.push(id);
                    }
                } else if !next.contains(&id) {
                    next = vec![id];
                }
                if next != selection {
                    out.push(InteractionAction::SelectionChanged(next.clone()));
                }
                if !next.contains(&id) {
                    return;
                }

                let start: Vec<(LayerId, Transform2D)> = scene
                    .layers()
                    .iter()
                    .filter(|l| next.contains(&l.id))
                    .map(|l| (l.id, l.transform))
                    .collect();
                let start_bounds = scene
                    .layers()
                    .iter()
                    .filter(|l| next.contains(&l.id))
                    .map(|l| l.bounds())
                    .reduce(|a, b| a.union(b))
                    .unwrap_or(Rect::from_origin_size(pos, (0.0, 0.0)));
                let ids: Vec<LayerId> = start.iter().map(|(id, _)| *id).collect();
                self.state = State::Dragging {
                    origin: pos,
                    current: start.clone(),
                    start,
                    start_bounds,
                    targets: SnapTargets::collect(scene, &ids),
                };
            }
            HitTarget::Empty => {
                let base = if modifiers.shift {
                    selection.to_vec()
                } else {
                    if !selection.is_empty() {
                        out.push(InteractionAction::SelectionChanged(Vec::new()));
                    }
                    Vec::new()
                };
                self.state = State::Marquee {
                    origin: pos,
                    current: pos,
                    base,
                };
            }
        }
        if let Some(kind) = self.kind() {
            tracing::debug!(?kind, x = pos.x, y = pos.y, "gesture: start");
            out.push(InteractionAction::GestureStarted(kind));
        }
    }

    fn update(&mut self, pos: Point, snap: &SnapConfig) {
        self.guides.clear();
        match &mut self.state {
            State::Idle => {}
            State::Dragging {
                origin,
                start,
                start_bounds,
                targets,
                current,
            } => {
                let mut delta = pos - *origin;
                // A pointer back at its origin means no move, snapped or not.
                if delta == Vec2::ZERO {
                    current.clone_from(start);
                    return;
                }
                let (snap_offset, guides) = targets.snap_rect(*start_bounds + delta, snap);
                delta += snap_offset;
                self.guides = guides;
                for ((_, cur), (_, base)) in current.iter_mut().zip(start.iter()) {
                    *cur = base.translated(delta);
                }
            }
            State::Resizing {
                handle,
                origin,
                size,
                start,
                current,
                ..
            } => {
                *current = resize(start, *size, *handle, pos - *origin);
            }
            State::Rotating {
                pointer_start_deg,
                start,
                current,
                ..
            } => {
                let now = pointer_angle_deg(start.position(), pos);
                if now == *pointer_start_deg {
                    *current = *start;
                    return;
                }
                let raw = start.rotation_deg + (now - *pointer_start_deg);
                let (deg, snapped) = snap_angle(raw, snap);
                if snapped {
                    self.guides.push(SnapGuide::Angle { deg });
                }
                *current = Transform2D {
                    rotation_deg: deg,
                    ..*start
                };
            }
            State::Marquee { current, .. } => *current = pos,
        }
    }
}

fn finish(state: State, scene: &Scene, selection: &[LayerId]) -> InteractionAction {
    let action = match state {
        State::Idle => InteractionAction::NothingToCommit,
        State::Dragging { start, current, .. } => {
            let mut changes: Vec<(LayerId, Transform2D)> = current
                .into_iter()
                .zip(start)
                .filter(|((_, cur), (_, base))| cur != base)
                .map(|(cur, _)| cur)
                .collect();
            match changes.len() {
                0 => InteractionAction::NothingToCommit,
                1 => {
                    let (id, transform) = changes.remove(0);
                    InteractionAction::Committed(Command::SetTransform { id, transform })
                }
                _ => InteractionAction::Committed(Command::BatchTransform { changes }),
            }
        }
        State::Resizing {
            layer,
            start,
            current,
            ..
        }
        | State::Rotating {
            layer,
            start,
            current,
            ..
        } => {
            if current == start {
                InteractionAction::NothingToCommit
            } else {
                InteractionAction::Committed(Command::SetTransform {
                    id: layer,
                    transform: current,
                })
            }
        }
        State::Marquee {
            origin,
            current,
            mut base,
        } => {
            let rect = Rect::from_points(origin, current);
            if rect.width() > 0.0 || rect.height() > 0.0 {
                for id in layers_in_marquee(scene, rect) {
                    if !base.contains(&id) {
                        base.push(id);
                    }
                }
            }
            if base.as_slice() == selection {
                InteractionAction::NothingToCommit
            } else {
                InteractionAction::SelectionChanged(base)
            }
        }
    };
    match &action {
        InteractionAction::Committed(cmd) => {
            tracing::debug!(op = cmd.label(), "gesture: commit");
        }
        _ => tracing::debug!("gesture: end without commit"),
    }
    action
}

fn pointer_angle_deg(center: Point, pos: Point) -> f64 {
    let d = pos - center;
    d.y.atan2(d.x).to_degrees()
}

/// Move one handle by `world_delta` while the opposite edge or corner stays put.
///
/// Works in the layer's rotated frame so handles track the pointer at any rotation.
fn resize(start: &Transform2D, size: Size, handle: Handle, world_delta: Vec2) -> Transform2D {
    if size.width <= 0.0 || size.height <= 0.0 {
        return *start;
    }
    let theta = start.rotation_deg.to_radians();
    let (sin, cos) = theta.sin_cos();
    let lx = world_delta.x * cos + world_delta.y * sin;
    let ly = -world_delta.x * sin + world_delta.y * cos;

    let w = size.width * start.scale_x;
    let h = size.height * start.scale_y;
    let (mut left, mut right) = (-w * 0.5, w * 0.5);
    let (mut top, mut bottom) = (-h * 0.5, h * 0.5);
    let min_w = size.width * MIN_SCALE;
    let min_h = size.height * MIN_SCALE;

    let (hx, hy) = handle.axis_signs();
    if hx > 0.0 {
        right = (right + lx).max(left + min_w);
    } else if hx < 0.0 {
        left = (left + lx).min(right - min_w);
    }
    if hy > 0.0 {
        bottom = (bottom + ly).max(top + min_h);
    } else if hy < 0.0 {
        top = (top + ly).min(bottom - min_h);
    }

    let cx = (left + right) * 0.5;
    let cy = (top + bottom) * 0.5;
    Transform2D {
        x: start.x + cx * cos - cy * sin,
        y: start.y + cx * sin + cy * cos,
        scale_x: ((right - left) / size.width).max(MIN_SCALE),
        scale_y: ((bottom - top) / size.height).max(MIN_SCALE),
        rotation_deg: normalize_angle(start.rotation_deg),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/interaction/gesture.rs"]
mod tests;
