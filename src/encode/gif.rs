use crate::encode::sink::{FrameSink, SinkConfig, ensure_parent_dir};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{LayerstackError, LayerstackResult};
use crate::foundation::math::unpremul_u8;
use crate::render::backend::FrameRGBA;
use anyhow::Context as _;
use gif::{Encoder, Frame, Repeat};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// NeuQuant sampling factor; 10 trades a little palette quality for a large speedup.
const QUANT_SPEED: i32 = 10;

/// Animated GIF sink that loops forever.
///
/// Frames are un-premultiplied and palette-quantized per frame. Every frame carries the same
/// delay, derived from the export frame rate and rounded to the format's centisecond unit.
pub struct GifSink<W: Write + Send> {
    writer: Option<W>,
    encoder: Option<Encoder<W>>,
    out_path: Option<PathBuf>,
    cfg: Option<SinkConfig>,
    delay_cs: u16,
    last_idx: Option<FrameIndex>,
}

impl<W: Write + Send> GifSink<W> {
    /// Encode into `writer`. The GIF trailer is written and the writer flushed by `end`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Some(writer),
            encoder: None,
            out_path: None,
            cfg: None,
            delay_cs: 0,
            last_idx: None,
        }
    }
}

impl GifSink<BufWriter<File>> {
    /// Encode into a file at `path`, creating parent directories. `abort` removes the file.
    pub fn create(path: impl AsRef<Path>) -> LayerstackResult<Self> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;
        let file =
            File::create(path).with_context(|| format!("create gif '{}'", path.display()))?;
        let mut sink = Self::new(BufWriter::new(file));
        sink.out_path = Some(path.to_path_buf());
        Ok(sink)
    }
}

fn frame_delay_cs(num: u32, den: u32) -> u16 {
    let cs = (u64::from(den) * 100 + u64::from(num) / 2) / u64::from(num.max(1));
    cs.clamp(1, u64::from(u16::MAX)) as u16
}

impl<W: Write + Send> FrameSink for GifSink<W> {
    fn begin(&mut self, cfg: SinkConfig) -> LayerstackResult<()> {
        if cfg.width == 0 || cfg.height == 0 {
            return Err(LayerstackError::encode(
                "gif sink width/height must be non-zero",
            ));
        }
        let (Ok(width), Ok(height)) = (u16::try_from(cfg.width), u16::try_from(cfg.height)) else {
            return Err(LayerstackError::encode(
                "gif sink width/height must fit in 16 bits",
            ));
        };
        let writer = self
            .writer
            .take()
            .ok_or_else(|| LayerstackError::encode("gif sink can only be started once"))?;
        let mut encoder = Encoder::new(writer, width, height, &[])
            .map_err(|e| LayerstackError::encode(format!("gif header: {e}")))?;
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| LayerstackError::encode(format!("gif repeat: {e}")))?;

        self.delay_cs = frame_delay_cs(cfg.fps.num, cfg.fps.den);
        self.encoder = Some(encoder);
        self.cfg = Some(cfg);
        self.last_idx = None;
        Ok(())
    }

    fn push_frame(
        &mut self,
        idx: FrameIndex,
        _time_s: f64,
        frame: &FrameRGBA,
    ) -> LayerstackResult<()> {
        let (Some(cfg), Some(encoder)) = (self.cfg.as_ref(), self.encoder.as_mut()) else {
            return Err(LayerstackError::encode("gif sink not started"));
        };
        if let Some(last) = self.last_idx
            && idx.0 <= last.0
        {
            return Err(LayerstackError::encode(
                "gif sink received out-of-order frame index",
            ));
        }
        self.last_idx = Some(idx);

        if frame.width != cfg.width
            || frame.height != cfg.height
            || frame.data.len() != (cfg.width as usize) * (cfg.height as usize) * 4
        {
            return Err(LayerstackError::encode(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }

        let mut straight = frame.data.clone();
        if frame.premultiplied {
            for px in straight.chunks_exact_mut(4) {
                let a = px[3];
                px[0] = unpremul_u8(px[0], a);
                px[1] = unpremul_u8(px[1], a);
                px[2] = unpremul_u8(px[2], a);
            }
        }
        // Sizes were checked against the 16-bit limit in `begin`.
        let mut gif_frame =
            Frame::from_rgba_speed(cfg.width as u16, cfg.height as u16, &mut straight, QUANT_SPEED);
        gif_frame.delay = self.delay_cs;

        encoder
            .write_frame(&gif_frame)
            .map_err(|e| LayerstackError::encode(format!("gif frame {}: {e}", idx.0)))
    }

    fn end(&mut self) -> LayerstackResult<()> {
        let encoder = self
            .encoder
            .take()
            .ok_or_else(|| LayerstackError::encode("gif sink not started"))?;
        self.cfg = None;
        let mut writer = encoder
            .into_inner()
            .map_err(|e| LayerstackError::encode(format!("gif trailer: {e}")))?;
        writer
            .flush()
            .map_err(|e| LayerstackError::encode(format!("gif flush: {e}")))
    }

    fn abort(&mut self) {
        drop(self.encoder.take());
        self.cfg = None;
        if let Some(path) = self.out_path.take()
            && let Err(e) = std::fs::remove_file(&path)
        {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove partial gif");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/gif.rs"]
mod tests;
