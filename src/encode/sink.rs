use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{LayerstackError, LayerstackResult};
use crate::render::backend::FrameRGBA;
use anyhow::Context as _;
use std::path::Path;

/// Configuration provided to a [`FrameSink`] at the start of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frames-per-second.
    pub fps: Fps,
}

/// Sink contract for consuming rendered frames in timeline order.
///
/// Ordering contract: `push_frame` is called in strictly increasing `FrameIndex` order. After a
/// cancelled or failed export the sink receives `abort` instead of `end`.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> LayerstackResult<()>;
    /// Push one premultiplied frame sampled at `time_s`.
    fn push_frame(&mut self, idx: FrameIndex, time_s: f64, frame: &FrameRGBA)
    -> LayerstackResult<()>;
    /// Called once after the last frame is pushed.
    fn end(&mut self) -> LayerstackResult<()>;
    /// Discard partial output. Called at most once, never after `end`.
    fn abort(&mut self) {}
}

/// Create the parent directory of an output file if it does not exist yet.
pub fn ensure_parent_dir(path: &Path) -> LayerstackResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output directory '{}'", parent.display()))
            .map_err(|e| LayerstackError::encode(format!("{e:#}")))?;
    }
    Ok(())
}

/// A frame captured by [`InMemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedFrame {
    /// Timeline index.
    pub index: FrameIndex,
    /// Sample time in seconds.
    pub time_s: f64,
    /// Pixels.
    pub frame: FrameRGBA,
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<CapturedFrame>,
    ended: bool,
    aborted: bool,
}

impl InMemorySink {
    /// Create a new in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the sink configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg
    }

    /// Borrow the captured frames.
    pub fn frames(&self) -> &[CapturedFrame] {
        &self.frames
    }

    /// `true` once `end` was called.
    pub fn ended(&self) -> bool {
        self.ended
    }

    /// `true` once `abort` was called. Frames captured before the abort stay inspectable.
    pub fn aborted(&self) -> bool {
        self.aborted
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> LayerstackResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.ended = false;
        self.aborted = false;
        Ok(())
    }

    fn push_frame(
        &mut self,
        idx: FrameIndex,
        time_s: f64,
        frame: &FrameRGBA,
    ) -> LayerstackResult<()> {
        if let Some(last) = self.frames.last()
            && idx <= last.index
        {
            return Err(LayerstackError::encode(
                "in-memory sink received out-of-order frame index",
            ));
        }
        self.frames.push(CapturedFrame {
            index: idx,
            time_s,
            frame: frame.clone(),
        });
        Ok(())
    }

    fn end(&mut self) -> LayerstackResult<()> {
        self.ended = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.aborted = true;
    }
}
