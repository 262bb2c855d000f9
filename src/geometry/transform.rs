use crate::foundation::core::{Affine, Point, Rect, Size, Vec2};
use crate::foundation::error::{LayerstackError, LayerstackResult};
use crate::foundation::math::approx_eq;

/// Smallest allowed magnitude for a scale factor.
pub const MIN_SCALE: f64 = 0.01;

/// Position, scale and rotation of one layer on the canvas.
///
/// Layer content is a rectangle centered on the layer-local origin, so `(x, y)` is the center of
/// the content on the canvas. The affine form is `T(x, y) · R(rotation) · S(scale_x, scale_y)`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Transform2D {
    /// Center x in canvas pixels.
    pub x: f64,
    /// Center y in canvas pixels.
    pub y: f64,
    /// Horizontal scale factor.
    pub scale_x: f64,
    /// Vertical scale factor.
    pub scale_y: f64,
    /// Clockwise rotation in degrees (canvas y axis points down).
    pub rotation_deg: f64,
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform2D {
    /// No translation, unit scale, no rotation.
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        scale_x: 1.0,
        scale_y: 1.0,
        rotation_deg: 0.0,
    };

    /// Build a transform from all five components.
    pub fn new(x: f64, y: f64, scale_x: f64, scale_y: f64, rotation_deg: f64) -> Self {
        Self {
            x,
            y,
            scale_x,
            scale_y,
            rotation_deg,
        }
    }

    /// Unscaled, unrotated transform centered at `(x, y)`.
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..Self::IDENTITY
        }
    }

    /// Center position.
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Copy with the center moved by `delta`.
    pub fn translated(&self, delta: Vec2) -> Self {
        Self {
            x: self.x + delta.x,
            y: self.y + delta.y,
            ..*self
        }
    }

    /// `true` when every component is finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.scale_x.is_finite()
            && self.scale_y.is_finite()
            && self.rotation_deg.is_finite()
    }

    /// Normalize the angle into `[0, 360)` and clamp both scales to [`MIN_SCALE`].
    ///
    /// Non-finite components are rejected with [`LayerstackError::InvalidGeometry`].
    pub fn sanitize(&self) -> LayerstackResult<Self> {
        if !self.is_finite() {
            return Err(LayerstackError::invalid_geometry(format!(
                "transform components must be finite, got {self:?}"
            )));
        }
        Ok(Self {
            x: self.x,
            y: self.y,
            scale_x: clamp_scale(self.scale_x),
            scale_y: clamp_scale(self.scale_y),
            rotation_deg: normalize_angle(self.rotation_deg),
        })
    }

    /// Layer-local to canvas affine.
    pub fn to_affine(&self) -> Affine {
        Affine::translate(Vec2::new(self.x, self.y))
            * Affine::rotate(self.rotation_deg.to_radians())
            * Affine::scale_non_uniform(self.scale_x, self.scale_y)
    }

    /// Component-wise equality within `eps` (angles compared modulo 360).
    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        approx_eq(self.x, other.x, eps)
            && approx_eq(self.y, other.y, eps)
            && approx_eq(self.scale_x, other.scale_x, eps)
            && approx_eq(self.scale_y, other.scale_y, eps)
            && approx_eq(shortest_angle_delta(self.rotation_deg, other.rotation_deg), 0.0, eps)
    }
}

/// Place `child` inside `parent`'s local space; `child` applies first.
///
/// The result is an affine because rotation over a non-uniform parent scale skews, which a
/// `Transform2D` cannot hold.
pub fn compose(parent: &Transform2D, child: &Transform2D) -> Affine {
    parent.to_affine() * child.to_affine()
}

/// Inverse of `t`'s affine.
pub fn inverse(t: &Transform2D) -> LayerstackResult<Affine> {
    let a = t.to_affine();
    let det = a.determinant();
    if !det.is_finite() || det.abs() < 1e-12 {
        return Err(LayerstackError::invalid_geometry(
            "transform is not invertible",
        ));
    }
    Ok(a.inverse())
}

/// Map a canvas point into `t`'s layer-local space.
pub fn to_local(t: &Transform2D, point: Point) -> LayerstackResult<Point> {
    Ok(inverse(t)? * point)
}

/// Content rectangle of `size` centered on the local origin.
pub fn content_rect(size: Size) -> Rect {
    Rect::from_center_size(Point::ORIGIN, size)
}

/// Corners of the transformed content rectangle: top-left, top-right, bottom-right, bottom-left
/// (named in local space).
pub fn rotated_rect_corners(t: &Transform2D, size: Size) -> [Point; 4] {
    let r = content_rect(size);
    let a = t.to_affine();
    [
        a * Point::new(r.x0, r.y0),
        a * Point::new(r.x1, r.y0),
        a * Point::new(r.x1, r.y1),
        a * Point::new(r.x0, r.y1),
    ]
}

/// Axis-aligned bounding box of the transformed content rectangle.
pub fn rotated_rect_aabb(t: &Transform2D, size: Size) -> Rect {
    let [c0, c1, c2, c3] = rotated_rect_corners(t, size);
    Rect::from_points(c0, c0).union_pt(c1).union_pt(c2).union_pt(c3)
}

/// Point-in-rotated-rectangle test, edges inclusive.
pub fn contains_point(t: &Transform2D, size: Size, point: Point) -> bool {
    let Ok(local) = to_local(t, point) else {
        return false;
    };
    let r = content_rect(size);
    const EPS: f64 = 1e-9;
    local.x >= r.x0 - EPS && local.x <= r.x1 + EPS && local.y >= r.y0 - EPS && local.y <= r.y1 + EPS
}

/// Map any finite angle into `[0, 360)`.
pub fn normalize_angle(deg: f64) -> f64 {
    let r = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if r >= 360.0 { 0.0 } else { r }
}

/// Signed shortest rotation from `from` to `to`, in `(-180, 180]`.
pub fn shortest_angle_delta(from: f64, to: f64) -> f64 {
    let d = (to - from).rem_euclid(360.0);
    if d > 180.0 { d - 360.0 } else { d }
}

/// Clamp a scale factor to at least [`MIN_SCALE`] in magnitude. The sign is dropped.
pub fn clamp_scale(s: f64) -> f64 {
    s.abs().max(MIN_SCALE)
}

pub(crate) fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[cfg(test)]
#[path = "../../tests/unit/geometry/transform.rs"]
mod tests;
