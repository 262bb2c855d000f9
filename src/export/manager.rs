use crate::encode::sink::FrameSink;
use crate::export::job::{
    BusySet, BusySlot, CancelToken, ExportEvent, ExportJob, ExportOpts, ExportProgress,
    ExportReport, ExportRequest, ExportStatus, JobId, JobShared,
};
use crate::foundation::error::{LayerstackError, LayerstackResult};
use crate::render::assets::AssetSource;
use crate::render::backend::RenderBackend;
use crate::scene::model::{Scene, SceneId};
use anyhow::Context as _;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread::JoinHandle;

type JobRegistry = Arc<Mutex<HashMap<JobId, Arc<JobShared>>>>;

/// Runs export jobs on background threads, at most one per scene.
///
/// A second `start_export` for a `SceneId` whose job is still pending or running fails with
/// `BusyExporting`. The slot frees before that job's terminal state becomes visible.
///
/// Jobs stay queryable by id until [`ExportHandle::wait`] returns or
/// [`ExportManager::prune_finished`] drops them.
#[derive(Default)]
pub struct ExportManager {
    opts: ExportOpts,
    events: Option<mpsc::Sender<ExportEvent>>,
    busy: BusySet,
    jobs: JobRegistry,
}

impl ExportManager {
    /// Manager whose jobs use `opts`.
    pub fn new(opts: ExportOpts) -> LayerstackResult<Self> {
        opts.validate()?;
        Ok(Self {
            opts,
            ..Self::default()
        })
    }

    /// Forward every job's [`ExportEvent`]s to `events`.
    pub fn with_events(mut self, events: mpsc::Sender<ExportEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Options applied to new jobs.
    pub fn opts(&self) -> &ExportOpts {
        &self.opts
    }

    /// `true` while a job for `scene` is pending or running.
    pub fn is_busy(&self, scene: SceneId) -> bool {
        self.busy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&scene)
    }

    /// Snapshot `scene` and export it on a new thread.
    ///
    /// Later edits to the caller's scene do not affect the job.
    pub fn start_export(
        &self,
        scene: &Scene,
        request: ExportRequest,
        mut backend: Box<dyn RenderBackend>,
        assets: Arc<dyn AssetSource>,
        mut sink: Box<dyn FrameSink>,
    ) -> LayerstackResult<ExportHandle> {
        let mut job = ExportJob::new(scene.clone(), request)?.with_opts(self.opts.clone())?;
        if let Some(tx) = self.events.clone() {
            job = job.with_events(tx);
        }

        let shared = job.shared();
        shared.hold(BusySlot::claim(&self.busy, scene.id())?);
        let id = job.id();

        let thread = std::thread::Builder::new()
            .name(format!("layerstack-export-{}", id.get()))
            .spawn(move || job.run(backend.as_mut(), assets.as_ref(), sink.as_mut()))
            .context("spawn export thread")?;

        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, shared.clone());
        tracing::debug!(job = %id, scene = %scene.id(), "export spawned");

        Ok(ExportHandle {
            shared,
            registry: self.jobs.clone(),
            thread: Some(thread),
        })
    }

    /// Forget every job that reached a terminal state. Returns how many were dropped.
    pub fn prune_finished(&self) -> usize {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let before = jobs.len();
        jobs.retain(|_, shared| !shared.status().is_terminal());
        before - jobs.len()
    }

    /// Number of jobs still queryable by id.
    pub fn tracked_jobs(&self) -> usize {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// State of a job started by this manager.
    pub fn status(&self, job: JobId) -> LayerstackResult<ExportStatus> {
        Ok(self.shared(job)?.status())
    }

    /// Progress of a job started by this manager.
    pub fn progress(&self, job: JobId) -> LayerstackResult<ExportProgress> {
        Ok(self.shared(job)?.progress())
    }

    /// Cancel a job started by this manager.
    pub fn cancel(&self, job: JobId) -> LayerstackResult<()> {
        self.shared(job)?.cancel.cancel();
        Ok(())
    }

    fn shared(&self, job: JobId) -> LayerstackResult<Arc<JobShared>> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&job)
            .cloned()
            .ok_or_else(|| LayerstackError::not_found(format!("{job}")))
    }
}

/// Handle to a background export.
pub struct ExportHandle {
    shared: Arc<JobShared>,
    registry: JobRegistry,
    thread: Option<JoinHandle<LayerstackResult<ExportReport>>>,
}

impl ExportHandle {
    /// Job id.
    pub fn id(&self) -> JobId {
        self.shared.id
    }

    /// Current state.
    pub fn status(&self) -> ExportStatus {
        self.shared.status()
    }

    /// Current progress.
    pub fn progress(&self) -> ExportProgress {
        self.shared.progress()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.shared.cancel.cancel();
    }

    /// Token that cancels this job.
    pub fn cancel_token(&self) -> CancelToken {
        self.shared.cancel.clone()
    }

    /// `true` once the job reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    /// Block until the job ends, then drop it from the manager's registry.
    pub fn wait(mut self) -> LayerstackResult<ExportReport> {
        let thread = self
            .thread
            .take()
            .ok_or_else(|| LayerstackError::not_found(format!("{} thread", self.shared.id)))?;
        let joined = thread.join();
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.shared.id);
        joined
            .map_err(|_| LayerstackError::render(format!("{} thread panicked", self.shared.id)))?
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/manager.rs"]
mod tests;
