use crate::foundation::core::{Rect, Vec2};
use crate::geometry::transform::{normalize_angle, shortest_angle_delta};
use crate::scene::model::{LayerId, Scene};

/// Snapping behavior while dragging and rotating.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SnapConfig {
    /// Master switch.
    pub enabled: bool,
    /// Maximum distance, in canvas pixels, at which an edge or center snaps.
    pub tolerance_px: f64,
    /// Maximum distance, in degrees, at which a rotation snaps to a right angle.
    pub angle_tolerance_deg: f64,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tolerance_px: 6.0,
            angle_tolerance_deg: 5.0,
        }
    }
}

/// Where a snap line comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapSource {
    /// Canvas edge or center.
    Canvas,
    /// Edge or center of another layer.
    Layer(LayerId),
}

/// Alignment guide the host may draw while a gesture is active.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SnapGuide {
    /// Vertical line at canvas `x`.
    Vertical {
        /// Line position.
        x: f64,
        /// Origin of the line.
        source: SnapSource,
    },
    /// Horizontal line at canvas `y`.
    Horizontal {
        /// Line position.
        y: f64,
        /// Origin of the line.
        source: SnapSource,
    },
    /// Rotation locked to a right angle.
    Angle {
        /// Snapped angle in degrees.
        deg: f64,
    },
}

/// Reference lines collected once per gesture.
#[derive(Clone, Debug, Default)]
pub struct SnapTargets {
    xs: Vec<(f64, SnapSource)>,
    ys: Vec<(f64, SnapSource)>,
}

impl SnapTargets {
    /// Canvas edges and center, then edges and centers of visible layers not in `moving`.
    pub fn collect(scene: &Scene, moving: &[LayerId]) -> Self {
        let mut out = Self::default();
        out.push_rect(scene.canvas().rect(), SnapSource::Canvas);
        for layer in scene.layers() {
            if !layer.visible || moving.contains(&layer.id) {
                continue;
            }
            out.push_rect(layer.bounds(), SnapSource::Layer(layer.id));
        }
        out
    }

    fn push_rect(&mut self, r: Rect, source: SnapSource) {
        let c = r.center();
        for x in [r.x0, c.x, r.x1] {
            self.xs.push((x, source));
        }
        for y in [r.y0, c.y, r.y1] {
            self.ys.push((y, source));
        }
    }

    /// Offset that snaps `moving` onto the nearest targets, with the guides that caused it.
    ///
    /// Each axis snaps independently. Among candidates within tolerance the closest wins; on a
    /// tie the earlier candidate (canvas before layers, bottom layer first) wins.
    pub fn snap_rect(&self, moving: Rect, cfg: &SnapConfig) -> (Vec2, Vec<SnapGuide>) {
        let mut guides = Vec::new();
        if !cfg.enabled {
            return (Vec2::ZERO, guides);
        }
        let c = moving.center();
        let dx = best_offset(&self.xs, [moving.x0, c.x, moving.x1], cfg.tolerance_px);
        let dy = best_offset(&self.ys, [moving.y0, c.y, moving.y1], cfg.tolerance_px);

        let mut offset = Vec2::ZERO;
        if let Some((d, at, source)) = dx {
            offset.x = d;
            guides.push(SnapGuide::Vertical { x: at, source });
        }
        if let Some((d, at, source)) = dy {
            offset.y = d;
            guides.push(SnapGuide::Horizontal { y: at, source });
        }
        (offset, guides)
    }
}

fn best_offset(
    targets: &[(f64, SnapSource)],
    features: [f64; 3],
    tolerance: f64,
) -> Option<(f64, f64, SnapSource)> {
    let mut best: Option<(f64, f64, SnapSource)> = None;
    for &(target, source) in targets {
        for f in features {
            let d = target - f;
            if d.abs() > tolerance {
                continue;
            }
            if best.is_none_or(|(bd, _, _)| d.abs() < bd.abs()) {
                best = Some((d, target, source));
            }
        }
    }
    best
}

/// Snap `deg` to the nearest multiple of 90° when within `cfg.angle_tolerance_deg`.
///
/// Returns the (normalized) angle and whether it snapped.
pub fn snap_angle(deg: f64, cfg: &SnapConfig) -> (f64, bool) {
    let deg = normalize_angle(deg);
    if !cfg.enabled {
        return (deg, false);
    }
    let nearest = normalize_angle((deg / 90.0).round() * 90.0);
    if shortest_angle_delta(deg, nearest).abs() <= cfg.angle_tolerance_deg {
        (nearest, true)
    } else {
        (deg, false)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/interaction/snap.rs"]
mod tests;
