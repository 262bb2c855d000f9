use crate::foundation::core::{Point, Size, Vec2};
use crate::geometry::transform::{Transform2D, rotated_rect_corners};
use crate::scene::model::LayerId;

/// Grab points around a selected layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handle {
    /// Top-left corner.
    TopLeft,
    /// Top edge midpoint.
    Top,
    /// Top-right corner.
    TopRight,
    /// Right edge midpoint.
    Right,
    /// Bottom-right corner.
    BottomRight,
    /// Bottom edge midpoint.
    Bottom,
    /// Bottom-left corner.
    BottomLeft,
    /// Left edge midpoint.
    Left,
    /// Rotation knob above the top edge.
    Rotate,
}

impl Handle {
    /// The four corner handles.
    pub const CORNERS: [Handle; 4] = [
        Handle::TopLeft,
        Handle::TopRight,
        Handle::BottomRight,
        Handle::BottomLeft,
    ];

    /// The four edge handles.
    pub const EDGES: [Handle; 4] = [Handle::Top, Handle::Right, Handle::Bottom, Handle::Left];

    /// Direction the handle moves the content edges in local space: `-1` for left/top,
    /// `1` for right/bottom, `0` for an axis the handle does not touch.
    pub fn axis_signs(self) -> (f64, f64) {
        match self {
            Self::TopLeft => (-1.0, -1.0),
            Self::Top => (0.0, -1.0),
            Self::TopRight => (1.0, -1.0),
            Self::Right => (1.0, 0.0),
            Self::BottomRight => (1.0, 1.0),
            Self::Bottom => (0.0, 1.0),
            Self::BottomLeft => (-1.0, 1.0),
            Self::Left => (-1.0, 0.0),
            Self::Rotate => (0.0, 0.0),
        }
    }

    /// `true` for the eight resize handles.
    pub fn is_resize(self) -> bool {
        self != Self::Rotate
    }
}

/// Handle positions for one selected layer, in canvas coordinates.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct HandleGeometry {
    /// Layer the handles belong to.
    pub layer: LayerId,
    /// Transformed content corners: top-left, top-right, bottom-right, bottom-left.
    pub corners: [Point; 4],
    /// Centers of the eight resize handles.
    pub resize: [(Handle, Point); 8],
    /// Center of the rotate handle.
    pub rotate: Point,
}

impl HandleGeometry {
    /// Compute handles for a layer of `size` at transform `t`.
    ///
    /// The rotate handle sits `rotate_offset_px` canvas pixels beyond the top edge, along the
    /// layer's rotated up direction.
    pub fn new(layer: LayerId, t: &Transform2D, size: Size, rotate_offset_px: f64) -> Self {
        let corners = rotated_rect_corners(t, size);
        let [tl, tr, br, bl] = corners;
        let mid = |a: Point, b: Point| a.midpoint(b);
        let top = mid(tl, tr);

        let theta = t.rotation_deg.to_radians();
        let up = Vec2::new(theta.sin(), -theta.cos());

        Self {
            layer,
            corners,
            resize: [
                (Handle::TopLeft, tl),
                (Handle::Top, top),
                (Handle::TopRight, tr),
                (Handle::Right, mid(tr, br)),
                (Handle::BottomRight, br),
                (Handle::Bottom, mid(br, bl)),
                (Handle::BottomLeft, bl),
                (Handle::Left, mid(bl, tl)),
            ],
            rotate: top + up * rotate_offset_px,
        }
    }

    /// Position of `handle`.
    pub fn position(&self, handle: Handle) -> Point {
        if handle == Handle::Rotate {
            return self.rotate;
        }
        self.resize
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, p)| *p)
            .unwrap_or(self.rotate)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/interaction/handles.rs"]
mod tests;
