use crate::animation::ease::Ease;
use crate::foundation::error::{LayerstackError, LayerstackResult};
use crate::geometry::transform::{Transform2D, lerp, normalize_angle, shortest_angle_delta};

/// One point on a layer's animation track.
///
/// `delta` is relative to the layer's base transform: `x`/`y` add, `scale_x`/`scale_y` multiply,
/// `rotation_deg` adds. `opacity` multiplies the base opacity. `ease` shapes the segment that
/// starts at this keyframe.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Keyframe {
    /// Time in seconds.
    pub time_s: f64,
    /// Transform delta at `time_s`.
    #[serde(default)]
    pub delta: Transform2D,
    /// Opacity multiplier at `time_s`.
    #[serde(default = "unit_opacity")]
    pub opacity: f64,
    /// Easing of the segment towards the next keyframe.
    #[serde(default)]
    pub ease: Ease,
}

fn unit_opacity() -> f64 {
    1.0
}

impl Keyframe {
    /// Keyframe at `time_s` with a translation-only delta.
    pub fn translate(time_s: f64, dx: f64, dy: f64) -> Self {
        Self {
            time_s,
            delta: Transform2D::at(dx, dy),
            opacity: 1.0,
            ease: Ease::Linear,
        }
    }

    /// Replace the segment easing.
    pub fn with_ease(mut self, ease: Ease) -> Self {
        self.ease = ease;
        self
    }

    /// Replace the opacity multiplier.
    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    /// Replace the transform delta.
    pub fn with_delta(mut self, delta: Transform2D) -> Self {
        self.delta = delta;
        self
    }
}

/// Keyframe delta evaluated at a given time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyframeSample {
    /// Interpolated transform delta.
    pub delta: Transform2D,
    /// Interpolated opacity multiplier.
    pub opacity: f64,
}

impl KeyframeSample {
    /// No change to the base transform or opacity.
    pub const NEUTRAL: Self = Self {
        delta: Transform2D::IDENTITY,
        opacity: 1.0,
    };

    /// Combine this delta with a base transform and opacity.
    pub fn apply_to(&self, base: &Transform2D, base_opacity: f64) -> (Transform2D, f64) {
        let d = &self.delta;
        let t = Transform2D {
            x: base.x + d.x,
            y: base.y + d.y,
            scale_x: base.scale_x * d.scale_x,
            scale_y: base.scale_y * d.scale_y,
            rotation_deg: normalize_angle(base.rotation_deg + d.rotation_deg),
        };
        (t, (base_opacity * self.opacity).clamp(0.0, 1.0))
    }
}

/// Time-sorted keyframe track. An empty track leaves the layer static.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Keyframes {
    frames: Vec<Keyframe>,
}

impl Keyframes {
    /// Sort `frames` by time and validate them.
    pub fn new(mut frames: Vec<Keyframe>) -> LayerstackResult<Self> {
        frames.sort_by(|a, b| a.time_s.total_cmp(&b.time_s));
        let out = Self { frames };
        out.validate()?;
        Ok(out)
    }

    /// Empty track.
    pub fn none() -> Self {
        Self::default()
    }

    /// Borrow the keyframes in time order.
    pub fn as_slice(&self) -> &[Keyframe] {
        &self.frames
    }

    /// `true` when the track has no keyframes.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of keyframes.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check finiteness and strictly increasing times.
    pub fn validate(&self) -> LayerstackResult<()> {
        for k in &self.frames {
            if !k.time_s.is_finite() || !k.opacity.is_finite() || !k.delta.is_finite() {
                return Err(LayerstackError::invalid_geometry(format!(
                    "keyframe at t={} has non-finite values",
                    k.time_s
                )));
            }
        }
        for w in self.frames.windows(2) {
            if w[1].time_s <= w[0].time_s {
                return Err(LayerstackError::validation(format!(
                    "keyframe times must be strictly increasing ({} then {})",
                    w[0].time_s, w[1].time_s
                )));
            }
        }
        Ok(())
    }

    /// Evaluate the track at `t_s`.
    ///
    /// Before the first keyframe the first one holds, after the last one the last one holds.
    /// Rotation follows the shortest arc between neighbours.
    pub fn sample(&self, t_s: f64) -> KeyframeSample {
        let (Some(first), Some(last)) = (self.frames.first(), self.frames.last()) else {
            return KeyframeSample::NEUTRAL;
        };
        if t_s <= first.time_s {
            return sample_of(first);
        }
        if t_s >= last.time_s {
            return sample_of(last);
        }

        // First index whose time is strictly after t_s; guaranteed in 1..len here.
        let hi = self.frames.partition_point(|k| k.time_s <= t_s);
        let a = &self.frames[hi - 1];
        let b = &self.frames[hi];
        let u = a.ease.apply((t_s - a.time_s) / (b.time_s - a.time_s));

        let da = &a.delta;
        let db = &b.delta;
        KeyframeSample {
            delta: Transform2D {
                x: lerp(da.x, db.x, u),
                y: lerp(da.y, db.y, u),
                scale_x: lerp(da.scale_x, db.scale_x, u),
                scale_y: lerp(da.scale_y, db.scale_y, u),
                rotation_deg: da.rotation_deg
                    + shortest_angle_delta(da.rotation_deg, db.rotation_deg) * u,
            },
            opacity: lerp(a.opacity, b.opacity, u),
        }
    }
}

fn sample_of(k: &Keyframe) -> KeyframeSample {
    KeyframeSample {
        delta: k.delta,
        opacity: k.opacity,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/keyframes.rs"]
mod tests;
