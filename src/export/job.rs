use crate::encode::sink::FrameSink;
use crate::foundation::core::{Canvas, Fps, FrameIndex, TimeRange};
use crate::foundation::error::{LayerstackError, LayerstackResult};
use crate::render::assets::AssetSource;
use crate::render::backend::RenderBackend;
use crate::scene::model::{Scene, SceneId};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, mpsc};

/// Environment override for [`ExportOpts::threads`].
pub const EXPORT_THREADS_ENV: &str = "LAYERSTACK_EXPORT_THREADS";

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique export job identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct JobId(u64);

impl JobId {
    fn fresh() -> Self {
        Self(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// What to export: a time range sampled at a frame rate into an output size.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExportRequest {
    /// Sampled time range, seconds.
    pub range: TimeRange,
    /// Sampling rate.
    pub fps: Fps,
    /// Output frame size; the canvas is scaled per axis to fit.
    pub output: Canvas,
}

impl ExportRequest {
    /// Create a validated request.
    pub fn new(range: TimeRange, fps: Fps, output: Canvas) -> LayerstackResult<Self> {
        let req = Self { range, fps, output };
        req.validate()?;
        Ok(req)
    }

    /// Export the whole scene at canvas size.
    ///
    /// Animated scenes use `[0, duration)`. Still scenes produce exactly one frame.
    pub fn for_scene(scene: &Scene, fps: Fps) -> LayerstackResult<Self> {
        let end = scene
            .duration_s()
            .unwrap_or_else(|| fps.frame_duration_secs());
        Self::new(TimeRange::new(0.0, end)?, fps, scene.canvas())
    }

    /// Check the frame rate, output size and that at least one frame is sampled.
    pub fn validate(&self) -> LayerstackResult<()> {
        Fps::new(self.fps.num, self.fps.den)?;
        TimeRange::new(self.range.start_s, self.range.end_s)?;
        self.output.validate_raster()?;
        if self.frames_total() == 0 {
            return Err(LayerstackError::validation(format!(
                "export range [{}, {}) yields no frames at {}/{} fps",
                self.range.start_s, self.range.end_s, self.fps.num, self.fps.den
            )));
        }
        Ok(())
    }

    /// `floor((end - start) * fps)`, tolerant of float error.
    pub fn frames_total(&self) -> u64 {
        self.range.frame_count(self.fps)
    }

    /// Sample time of frame `idx`: `start + idx / fps`.
    pub fn frame_time(&self, idx: FrameIndex) -> f64 {
        self.range.frame_time(self.fps, idx)
    }
}

/// Options controlling how an export renders frames.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExportOpts {
    /// Enable frame-level parallelism (rayon), using a dedicated thread pool.
    pub parallel: bool,
    /// Override the number of rayon worker threads. `None` uses rayon defaults.
    pub threads: Option<usize>,
    /// Frames per render chunk; also bounds the reorder buffer.
    pub chunk_size: usize,
    /// Bounded channel capacity between render workers and the encoder thread.
    pub channel_capacity: usize,
    /// Reuse pixels for frames whose evaluated layer state repeats within a chunk.
    pub static_frame_elision: bool,
}

impl Default for ExportOpts {
    fn default() -> Self {
        Self {
            parallel: false,
            threads: None,
            chunk_size: 64,
            channel_capacity: 4,
            static_frame_elision: false,
        }
    }
}

impl ExportOpts {
    /// Defaults with `threads` taken from `LAYERSTACK_EXPORT_THREADS` when set to a positive
    /// integer.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides on top of `self`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(n) = std::env::var(EXPORT_THREADS_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
        {
            self.threads = Some(n);
        }
        self
    }

    /// Reject `threads == Some(0)`.
    pub fn validate(&self) -> LayerstackResult<()> {
        if self.threads == Some(0) {
            return Err(LayerstackError::validation(
                "export 'threads' must be >= 1 when set",
            ));
        }
        Ok(())
    }
}

/// Which collaborator stopped a failed job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A frame could not be rendered.
    Render,
    /// The sink rejected a frame or failed to finalize.
    Encode,
}

/// Export job lifecycle: `Pending -> Running -> {Completed | Cancelled | Failed}`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ExportStatus {
    /// Created, not started.
    Pending,
    /// Frames are being produced.
    Running,
    /// Every frame was delivered and the sink finalized.
    Completed,
    /// Stopped on request; the sink was aborted.
    Cancelled,
    /// Stopped by an error; the sink was aborted.
    Failed {
        /// Failing collaborator.
        kind: FailureKind,
        /// Error message.
        message: String,
    },
}

impl ExportStatus {
    /// `true` for `Completed`, `Cancelled` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Cancelled | Self::Failed { .. }
        )
    }

    pub(crate) fn failed(err: &LayerstackError) -> Self {
        let kind = match err {
            LayerstackError::EncodeFailure(_) => FailureKind::Encode,
            _ => FailureKind::Render,
        };
        Self::Failed {
            kind,
            message: err.to_string(),
        }
    }
}

/// Snapshot of job progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ExportProgress {
    /// Frames delivered to the sink so far.
    pub frames_produced: u64,
    /// Frames the job will deliver when it completes.
    pub frames_total: u64,
}

impl ExportProgress {
    /// `frames_produced / frames_total`, in `[0, 1]`.
    pub fn fraction(self) -> f64 {
        if self.frames_total == 0 {
            return 1.0;
        }
        (self.frames_produced as f64 / self.frames_total as f64).clamp(0.0, 1.0)
    }
}

/// Notifications emitted while a job runs.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExportEvent {
    /// The job changed state.
    Status {
        /// Job.
        job: JobId,
        /// New state.
        status: ExportStatus,
    },
    /// One more frame reached the sink.
    Progress {
        /// Job.
        job: JobId,
        /// Progress after the delivery.
        progress: ExportProgress,
    },
}

/// Cooperative cancellation flag shared between a job and its controllers.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, not-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Takes effect at the next frame boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// `true` once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Range render statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct RenderStats {
    /// Frames rendered or reused so far.
    pub frames_total: u64,
    /// Frames actually rendered (may be < total when static-frame elision is enabled).
    pub frames_rendered: u64,
    /// Frames elided due to static-frame elision.
    pub frames_elided: u64,
}

/// Result of a job that ran to a non-error end.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ExportReport {
    /// Job.
    pub job: JobId,
    /// `Completed` or `Cancelled`.
    pub status: ExportStatus,
    /// Final progress.
    pub progress: ExportProgress,
    /// Render statistics.
    pub stats: RenderStats,
}

pub(crate) type BusySet = Arc<Mutex<HashSet<SceneId>>>;

/// Marks a scene as exporting until dropped.
#[derive(Debug)]
pub(crate) struct BusySlot {
    busy: BusySet,
    scene: SceneId,
}

impl BusySlot {
    pub(crate) fn claim(busy: &BusySet, scene: SceneId) -> LayerstackResult<Self> {
        let mut set = busy.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(scene) {
            return Err(LayerstackError::busy_exporting(format!(
                "{scene} already has an export in progress"
            )));
        }
        Ok(Self {
            busy: busy.clone(),
            scene,
        })
    }
}

impl Drop for BusySlot {
    fn drop(&mut self) {
        self.busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.scene);
    }
}

/// State shared between a running job and its handles.
#[derive(Debug)]
pub(crate) struct JobShared {
    pub(crate) id: JobId,
    status: Mutex<ExportStatus>,
    produced: AtomicU64,
    total: u64,
    pub(crate) cancel: CancelToken,
    events: Option<mpsc::Sender<ExportEvent>>,
    slot: Mutex<Option<BusySlot>>,
}

impl JobShared {
    fn new(total: u64, events: Option<mpsc::Sender<ExportEvent>>) -> Self {
        Self {
            id: JobId::fresh(),
            status: Mutex::new(ExportStatus::Pending),
            produced: AtomicU64::new(0),
            total,
            cancel: CancelToken::new(),
            events,
            slot: Mutex::new(None),
        }
    }

    /// Keep `slot` claimed until the job reaches a terminal state.
    pub(crate) fn hold(&self, slot: BusySlot) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(slot);
    }

    pub(crate) fn status(&self) -> ExportStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn progress(&self) -> ExportProgress {
        ExportProgress {
            frames_produced: self.produced.load(Ordering::Acquire),
            frames_total: self.total,
        }
    }

    /// Move `Pending` to `Running`; any other state is an error.
    fn start(&self) -> LayerstackResult<()> {
        {
            let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
            if *status != ExportStatus::Pending {
                return Err(LayerstackError::validation(format!(
                    "{} was already started",
                    self.id
                )));
            }
            *status = ExportStatus::Running;
        }
        self.emit(ExportEvent::Status {
            job: self.id,
            status: ExportStatus::Running,
        });
        Ok(())
    }

    pub(crate) fn finish(&self, status: ExportStatus) {
        // The scene is free again before anyone can observe the terminal state.
        drop(self.slot.lock().unwrap_or_else(PoisonError::into_inner).take());
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status.clone();
        self.emit(ExportEvent::Status {
            job: self.id,
            status,
        });
    }

    pub(crate) fn frame_delivered(&self) {
        self.produced.fetch_add(1, Ordering::AcqRel);
        self.emit(ExportEvent::Progress {
            job: self.id,
            progress: self.progress(),
        });
    }

    fn emit(&self, event: ExportEvent) {
        if let Some(tx) = self.events.as_ref() {
            // A dropped receiver only means nobody is listening.
            let _ = tx.send(event);
        }
    }
}

/// One export of an immutable scene snapshot.
///
/// Later edits to the live scene never reach a job: it owns its own `Scene` value, whose layers
/// are shared copy-on-write.
pub struct ExportJob {
    scene: Scene,
    request: ExportRequest,
    opts: ExportOpts,
    shared: Arc<JobShared>,
}

impl ExportJob {
    /// Create a `Pending` job.
    pub fn new(scene: Scene, request: ExportRequest) -> LayerstackResult<Self> {
        request.validate()?;
        Ok(Self {
            shared: Arc::new(JobShared::new(request.frames_total(), None)),
            scene,
            request,
            opts: ExportOpts::default(),
        })
    }

    /// Replace the render options.
    pub fn with_opts(mut self, opts: ExportOpts) -> LayerstackResult<Self> {
        opts.validate()?;
        self.opts = opts;
        Ok(self)
    }

    /// Emit [`ExportEvent`]s on `events` while running.
    pub fn with_events(mut self, events: mpsc::Sender<ExportEvent>) -> Self {
        let total = self.request.frames_total();
        let mut shared = JobShared::new(total, Some(events));
        shared.id = self.shared.id;
        shared.cancel = self.shared.cancel.clone();
        self.shared = Arc::new(shared);
        self
    }

    /// Job id.
    pub fn id(&self) -> JobId {
        self.shared.id
    }

    /// Id of the editing session the snapshot was taken from.
    pub fn scene_id(&self) -> SceneId {
        self.scene.id()
    }

    /// The snapshot being exported.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// The request.
    pub fn request(&self) -> &ExportRequest {
        &self.request
    }

    /// The render options.
    pub fn opts(&self) -> &ExportOpts {
        &self.opts
    }

    /// Current state.
    pub fn status(&self) -> ExportStatus {
        self.shared.status()
    }

    /// Current progress.
    pub fn progress(&self) -> ExportProgress {
        self.shared.progress()
    }

    /// Token that cancels this job.
    pub fn cancel_token(&self) -> CancelToken {
        self.shared.cancel.clone()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.shared.cancel.cancel();
    }

    pub(crate) fn shared(&self) -> Arc<JobShared> {
        self.shared.clone()
    }

    /// Render every frame and deliver it to `sink`, in time order.
    ///
    /// Returns the report for `Completed` and `Cancelled` jobs. Render and sink errors stop the
    /// job as `Failed`, abort the sink, and are returned as `RenderFailure`/`EncodeFailure`.
    /// Running a job twice is a `Validation` error.
    #[tracing::instrument(skip_all, fields(job = %self.id(), scene = %self.scene_id()))]
    pub fn run(
        &self,
        backend: &mut dyn RenderBackend,
        assets: &dyn AssetSource,
        sink: &mut dyn FrameSink,
    ) -> LayerstackResult<ExportReport> {
        self.shared.start()?;
        tracing::info!(
            frames = self.request.frames_total(),
            parallel = self.opts.parallel,
            "export started"
        );

        let ctx = crate::export::pipeline::FrameLoop {
            scene: &self.scene,
            request: &self.request,
            opts: &self.opts,
            assets,
            shared: &self.shared,
        };
        match ctx.run(backend, sink) {
            Ok((status, stats)) => {
                self.shared.finish(status.clone());
                let progress = self.shared.progress();
                tracing::info!(
                    ?status,
                    delivered = progress.frames_produced,
                    rendered = stats.frames_rendered,
                    elided = stats.frames_elided,
                    "export finished"
                );
                Ok(ExportReport {
                    job: self.shared.id,
                    status,
                    progress,
                    stats,
                })
            }
            Err(err) => {
                tracing::warn!(error = %err, "export failed");
                self.shared.finish(ExportStatus::failed(&err));
                Err(err)
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/job.rs"]
mod tests;
