use crate::foundation::core::{Point, Rect};
use crate::geometry::transform::contains_point;
use crate::interaction::handles::{Handle, HandleGeometry};
use crate::scene::model::{LayerId, Scene};

/// What lies under the pointer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HitTarget {
    /// A handle of a selected layer.
    Handle {
        /// Layer owning the handle.
        layer: LayerId,
        /// Which handle.
        handle: Handle,
    },
    /// The body of a visible layer (topmost wins).
    Body(LayerId),
    /// Bare canvas.
    Empty,
}

/// Resolve the pointer position against the scene.
///
/// Handles of selected layers take priority over bodies: corners first, then edges, then the rotate
/// knob, with the topmost selected layer checked first. Handles are square hit areas of
/// `handle_size_px` centered on the handle position.
pub fn hit_test(
    scene: &Scene,
    selection: &[LayerId],
    pos: Point,
    handle_size_px: f64,
    rotate_offset_px: f64,
) -> HitTarget {
    let half = handle_size_px * 0.5;
    let near = |p: Point| (p.x - pos.x).abs() <= half && (p.y - pos.y).abs() <= half;

    for layer in scene.layers().iter().rev() {
        if !layer.visible || !selection.contains(&layer.id) {
            continue;
        }
        let g = HandleGeometry::new(layer.id, &layer.transform, layer.size(), rotate_offset_px);
        let order = Handle::CORNERS
            .into_iter()
            .chain(Handle::EDGES)
            .chain([Handle::Rotate]);
        for handle in order {
            if near(g.position(handle)) {
                return HitTarget::Handle {
                    layer: layer.id,
                    handle,
                };
            }
        }
    }

    scene
        .layers()
        .iter()
        .rev()
        .find(|l| l.visible && contains_point(&l.transform, l.size(), pos))
        .map_or(HitTarget::Empty, |l| HitTarget::Body(l.id))
}

/// Visible layers whose bounding box intersects `marquee`, bottom to top.
pub fn layers_in_marquee(scene: &Scene, marquee: Rect) -> Vec<LayerId> {
    let m = marquee.abs();
    scene
        .layers()
        .iter()
        .filter(|l| l.visible)
        .filter(|l| {
            let b = l.bounds();
            b.x0 <= m.x1 && m.x0 <= b.x1 && b.y0 <= m.y1 && m.y0 <= b.y1
        })
        .map(|l| l.id)
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/interaction/hit.rs"]
mod tests;
