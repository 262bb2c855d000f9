use crate::encode::sink::{FrameSink, SinkConfig, ensure_parent_dir};
use crate::foundation::color::Color;
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{LayerstackError, LayerstackResult};
use crate::foundation::math::mul_div255_u16;
use crate::render::backend::FrameRGBA;
use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

/// Options for [`FfmpegSink`].
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// Output MP4 path.
    pub out_path: PathBuf,
    /// Replace an existing file instead of failing.
    pub overwrite: bool,
    /// Color that transparent pixels are flattened onto. Its alpha is ignored.
    pub matte: Color,
    /// x264 constant rate factor (0 is lossless, 51 is worst).
    pub crf: u8,
    /// x264 speed/size preset.
    pub preset: String,
    /// Encoder executable, looked up on `PATH` when relative.
    pub program: PathBuf,
}

impl FfmpegSinkOpts {
    /// Defaults for an MP4 at `out_path`: overwrite, black matte, CRF 23, `medium` preset.
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
            matte: Color::BLACK,
            crf: 23,
            preset: "medium".to_owned(),
            program: PathBuf::from("ffmpeg"),
        }
    }

    /// Replace the matte color.
    pub fn with_matte(mut self, matte: Color) -> Self {
        self.matte = matte;
        self
    }

    fn encoder_args(&self, cfg: SinkConfig) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::with_capacity(28);
        let mut push = |s: &str| args.push(OsString::from(s));
        push(if self.overwrite { "-y" } else { "-n" });
        push("-loglevel");
        push("error");
        // Input side: opaque rgba at the export rate.
        push("-f");
        push("rawvideo");
        push("-pix_fmt");
        push("rgba");
        push("-s");
        push(&format!("{}x{}", cfg.width, cfg.height));
        push("-r");
        push(&format!("{}/{}", cfg.fps.num, cfg.fps.den));
        push("-i");
        push("pipe:0");
        // Output side.
        push("-an");
        push("-c:v");
        push("libx264");
        push("-preset");
        push(&self.preset);
        push("-crf");
        push(&self.crf.to_string());
        push("-pix_fmt");
        push("yuv420p");
        push("-movflags");
        push("+faststart");
        args.push(self.out_path.clone().into_os_string());
        args
    }
}

struct Running {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    cfg: SinkConfig,
    flat: Vec<u8>,
    last_idx: Option<FrameIndex>,
}

impl Running {
    fn collect_stderr(&mut self) -> String {
        let bytes = match self.stderr.take().map(JoinHandle::join) {
            Some(Ok(Ok(bytes))) => bytes,
            _ => Vec::new(),
        };
        String::from_utf8_lossy(&bytes).trim().to_owned()
    }
}

/// MP4 sink that pipes raw frames into an `ffmpeg` child process.
///
/// Transparent pixels are flattened onto [`FfmpegSinkOpts::matte`]. `abort` kills the child and
/// removes the partial file.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,
    running: Option<Running>,
}

impl FfmpegSink {
    /// Sink writing to `opts.out_path`; nothing is spawned until `begin`.
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            running: None,
        }
    }

    fn running(&mut self) -> LayerstackResult<&mut Running> {
        self.running
            .as_mut()
            .ok_or_else(|| LayerstackError::encode("mp4 encoder is not running"))
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> LayerstackResult<()> {
        if self.running.is_some() {
            return Err(LayerstackError::encode("mp4 encoder already started"));
        }
        if cfg.width == 0 || cfg.height == 0 {
            return Err(LayerstackError::encode("mp4 frame size must be non-zero"));
        }
        // yuv420p subsamples chroma by two on both axes.
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(LayerstackError::encode(format!(
                "mp4 frame size must be even, got {}x{}",
                cfg.width, cfg.height
            )));
        }
        ensure_parent_dir(&self.opts.out_path)?;
        if !self.opts.overwrite && self.opts.out_path.exists() {
            return Err(LayerstackError::encode(format!(
                "'{}' exists and overwrite is off",
                self.opts.out_path.display()
            )));
        }

        let mut child = Command::new(&self.opts.program)
            .args(self.opts.encoder_args(cfg))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                LayerstackError::encode(format!(
                    "could not start '{}': {e}",
                    self.opts.program.display()
                ))
            })?;
        let stdin = child.stdin.take();
        let stderr = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                pipe.read_to_end(&mut buf)?;
                Ok(buf)
            })
        });
        tracing::debug!(
            path = %self.opts.out_path.display(),
            width = cfg.width,
            height = cfg.height,
            "mp4 encoder started"
        );

        self.running = Some(Running {
            child,
            stdin,
            stderr,
            cfg,
            flat: vec![0; (cfg.width as usize) * (cfg.height as usize) * 4],
            last_idx: None,
        });
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, _time_s: f64, frame: &FrameRGBA) -> LayerstackResult<()> {
        let matte = self.opts.matte;
        let run = self.running()?;
        if run.last_idx.is_some_and(|last| idx <= last) {
            return Err(LayerstackError::encode(format!(
                "mp4 encoder got frame {} after frame {}",
                idx.0,
                run.last_idx.map_or(0, |l| l.0)
            )));
        }
        if (frame.width, frame.height) != (run.cfg.width, run.cfg.height)
            || frame.data.len() != run.flat.len()
        {
            return Err(LayerstackError::encode(format!(
                "mp4 encoder expects {}x{} frames, got {}x{}",
                run.cfg.width, run.cfg.height, frame.width, frame.height
            )));
        }
        flatten_onto(&mut run.flat, &frame.data, matte);

        let Some(stdin) = run.stdin.as_mut() else {
            return Err(LayerstackError::encode("mp4 encoder input is closed"));
        };
        if let Err(e) = stdin.write_all(&run.flat) {
            drop(run.stdin.take());
            let detail = run.collect_stderr();
            return Err(LayerstackError::encode(format!(
                "writing frame {} to the encoder failed: {e} {detail}",
                idx.0
            )));
        }
        run.last_idx = Some(idx);
        Ok(())
    }

    fn end(&mut self) -> LayerstackResult<()> {
        let mut run = self
            .running
            .take()
            .ok_or_else(|| LayerstackError::encode("mp4 encoder is not running"))?;
        drop(run.stdin.take());
        let status = run
            .child
            .wait()
            .map_err(|e| LayerstackError::encode(format!("waiting for the encoder: {e}")))?;
        let detail = run.collect_stderr();
        if !status.success() {
            return Err(LayerstackError::encode(format!(
                "encoder exited with {status}: {detail}"
            )));
        }
        tracing::debug!(path = %self.opts.out_path.display(), "mp4 encoder finished");
        Ok(())
    }

    fn abort(&mut self) {
        let Some(mut run) = self.running.take() else {
            return;
        };
        drop(run.stdin.take());
        if let Err(e) = run.child.kill() {
            tracing::warn!(error = %e, "could not kill the mp4 encoder");
        }
        let _ = run.child.wait();
        let _ = run.collect_stderr();
        let _ = std::fs::remove_file(&self.opts.out_path);
    }
}

/// Composite premultiplied pixels over an opaque `matte`.
fn flatten_onto(dst: &mut [u8], src_premul: &[u8], matte: Color) {
    let bg = [u16::from(matte.r), u16::from(matte.g), u16::from(matte.b)];
    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let inv = 255 - u16::from(s[3]);
        for c in 0..3 {
            d[c] = (u16::from(s[c]) + mul_div255_u16(bg[c], inv)).min(255) as u8;
        }
        d[3] = 255;
    }
}

/// `true` when `ffmpeg -version` runs successfully.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}
