use crate::foundation::error::{LayerstackError, LayerstackResult};

pub use kurbo::{Affine, Point, Rect, Size, Vec2};

/// 0-based frame index within an export timeline.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> LayerstackResult<Self> {
        if den == 0 {
            return Err(LayerstackError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(LayerstackError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Convert frame count to seconds.
    pub fn frames_to_secs(self, frames: u64) -> f64 {
        (frames as f64) * self.frame_duration_secs()
    }

    /// Convert seconds to frame count using floor semantics.
    ///
    /// A tiny epsilon absorbs float error so that e.g. `0.3s @ 10fps` is 3 frames, not 2.
    pub fn secs_to_frames_floor(self, secs: f64) -> u64 {
        (secs * self.as_f64() + 1e-9).floor().max(0.0) as u64
    }
}

/// Half-open time range `[start_s, end_s)` in seconds.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimeRange {
    /// Inclusive start, seconds.
    pub start_s: f64,
    /// Exclusive end, seconds.
    pub end_s: f64,
}

impl TimeRange {
    /// Create a validated range with finite bounds and `start_s <= end_s`.
    pub fn new(start_s: f64, end_s: f64) -> LayerstackResult<Self> {
        if !start_s.is_finite() || !end_s.is_finite() {
            return Err(LayerstackError::validation("TimeRange bounds must be finite"));
        }
        if start_s > end_s {
            return Err(LayerstackError::validation("TimeRange start must be <= end"));
        }
        Ok(Self { start_s, end_s })
    }

    /// Length of the range in seconds.
    pub fn duration_s(self) -> f64 {
        (self.end_s - self.start_s).max(0.0)
    }

    /// Number of frames sampled from this range at `fps`.
    pub fn frame_count(self, fps: Fps) -> u64 {
        fps.secs_to_frames_floor(self.duration_s())
    }

    /// Timestamp of frame `idx` when sampling at `fps`.
    pub fn frame_time(self, fps: Fps, idx: FrameIndex) -> f64 {
        self.start_s + fps.frames_to_secs(idx.0)
    }
}

/// Canvas (or output) dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Build a canvas size.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Canvas bounds in canvas coordinates, origin at the top-left.
    pub fn rect(self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }

    /// Canvas center point.
    pub fn center(self) -> Point {
        self.rect().center()
    }

    /// Return an error when either side is zero or does not fit the rasterizer (u16).
    pub fn validate_raster(self) -> LayerstackResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(LayerstackError::validation(
                "canvas width/height must be non-zero",
            ));
        }
        if self.width > u32::from(u16::MAX) || self.height > u32::from(u16::MAX) {
            return Err(LayerstackError::validation(format!(
                "canvas {}x{} exceeds the maximum raster size {}x{}",
                self.width,
                self.height,
                u16::MAX,
                u16::MAX
            )));
        }
        Ok(())
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    /// Red channel premultiplied by alpha.
    pub r: u8,
    /// Green channel premultiplied by alpha.
    pub g: u8,
    /// Blue channel premultiplied by alpha.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8Premul {
    /// Fully transparent black.
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Convert straight-alpha RGBA8 into premultiplied RGBA8.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        Self {
            r: premul(r, a),
            g: premul(g, a),
            b: premul(b, a),
            a,
        }
    }

    /// Byte array in `[r, g, b, a]` order.
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
