use crate::encode::sink::{FrameSink, SinkConfig};
use crate::export::fingerprint::{FrameFingerprint, fingerprint_at};
use crate::export::job::{ExportOpts, ExportRequest, ExportStatus, JobShared, RenderStats};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{LayerstackError, LayerstackResult};
use crate::render::assets::AssetSource;
use crate::render::backend::{
    BackendKind, FrameRGBA, RenderBackend, RenderSettings, create_backend,
};
use crate::scene::model::Scene;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, mpsc};

const MAX_REORDER_BUFFER_BYTES: u64 = 128 * 1024 * 1024;

/// Everything one export run reads. The sink and the main backend are passed separately because
/// they are mutated on different threads.
pub(crate) struct FrameLoop<'a> {
    pub(crate) scene: &'a Scene,
    pub(crate) request: &'a ExportRequest,
    pub(crate) opts: &'a ExportOpts,
    pub(crate) assets: &'a dyn AssetSource,
    pub(crate) shared: &'a JobShared,
}

/// Why a stage stopped before the last frame.
#[derive(Debug)]
enum Stop {
    Cancelled,
    /// The other stage hung up; its own result carries the reason.
    Disconnected,
    Failed(LayerstackError),
}

#[derive(Debug)]
struct FrameMsg {
    idx: FrameIndex,
    frame: Arc<FrameRGBA>,
}

impl FrameLoop<'_> {
    /// Render and deliver every frame.
    ///
    /// Returns `Completed` or `Cancelled` with statistics; render and sink errors come back as
    /// `RenderFailure`/`EncodeFailure`. The sink is aborted on every path except `Completed`.
    pub(crate) fn run(
        &self,
        backend: &mut dyn RenderBackend,
        sink: &mut dyn FrameSink,
    ) -> LayerstackResult<(ExportStatus, RenderStats)> {
        let total = self.request.frames_total();
        let cfg = SinkConfig {
            width: self.request.output.width,
            height: self.request.output.height,
            fps: self.request.fps,
        };

        let cap = self.opts.channel_capacity.max(1);
        let bytes_per_frame = u64::from(cfg.width)
            .saturating_mul(u64::from(cfg.height))
            .saturating_mul(4)
            .max(1);
        let max_chunk_by_mem = (MAX_REORDER_BUFFER_BYTES / bytes_per_frame).max(1);
        let chunk_size = normalized_chunk_size(self.opts.chunk_size)
            .min(max_chunk_by_mem)
            .min(total.max(1));

        let workers = if self.opts.parallel {
            match backend.worker_render_settings() {
                Some(settings) => Some((
                    build_thread_pool(self.opts.threads).map_err(|e| e.into_render_failure())?,
                    settings,
                )),
                None => {
                    tracing::warn!("backend has no worker settings; rendering sequentially");
                    None
                }
            }
        } else {
            None
        };

        // Encoder thread: in-order delivery to the sink regardless of render completion order.
        std::thread::scope(|scope| {
            let (tx, rx) = mpsc::sync_channel::<FrameMsg>(cap);
            let enc = scope.spawn(move || self.encode(sink, cfg, rx));

            let mut stats = RenderStats::default();
            let produced = match workers.as_ref() {
                Some((pool, settings)) => {
                    self.produce_parallel(pool, settings, chunk_size, &tx, &mut stats)
                }
                None => self.produce_sequential(backend, chunk_size, &tx, &mut stats),
            };
            drop(tx);

            let encoded = enc
                .join()
                .unwrap_or_else(|_| Err(Stop::Failed(LayerstackError::encode("encoder thread panicked"))));

            match (produced, encoded) {
                (Ok(()), Ok(())) => Ok((ExportStatus::Completed, stats)),
                (Err(Stop::Failed(e)), _) | (_, Err(Stop::Failed(e))) => Err(e),
                (Err(Stop::Cancelled), _) | (_, Err(Stop::Cancelled)) => {
                    Ok((ExportStatus::Cancelled, stats))
                }
                _ => Err(LayerstackError::render(
                    "export pipeline stopped without a reason",
                )),
            }
        })
    }

    fn encode(
        &self,
        sink: &mut dyn FrameSink,
        cfg: SinkConfig,
        rx: mpsc::Receiver<FrameMsg>,
    ) -> Result<(), Stop> {
        let res = self.deliver(sink, cfg, rx);
        if res.is_err() {
            sink.abort();
        }
        res
    }

    fn deliver(
        &self,
        sink: &mut dyn FrameSink,
        cfg: SinkConfig,
        rx: mpsc::Receiver<FrameMsg>,
    ) -> Result<(), Stop> {
        sink.begin(cfg).map_err(encode_stop)?;

        let total = self.request.frames_total();
        let mut next = 0u64;
        let mut pending = HashMap::<u64, Arc<FrameRGBA>>::new();
        while next < total {
            let Some(frame) = pending.remove(&next) else {
                let msg = rx.recv().map_err(|_| Stop::Disconnected)?;
                pending.insert(msg.idx.0, msg.frame);
                continue;
            };

            self.check_cancel()?;
            let idx = FrameIndex(next);
            sink.push_frame(idx, self.request.frame_time(idx), &frame)
                .map_err(encode_stop)?;
            self.shared.frame_delivered();
            next += 1;
        }

        sink.end().map_err(encode_stop)
    }

    fn produce_sequential(
        &self,
        backend: &mut dyn RenderBackend,
        chunk_size: u64,
        tx: &mpsc::SyncSender<FrameMsg>,
        stats: &mut RenderStats,
    ) -> Result<(), Stop> {
        let total = self.request.frames_total();
        let mut chunk_start = 0;
        while chunk_start < total {
            let chunk_end = (chunk_start + chunk_size).min(total);
            let mut cache = HashMap::<FrameFingerprint, Arc<FrameRGBA>>::new();
            for f in chunk_start..chunk_end {
                self.check_cancel()?;
                let idx = FrameIndex(f);
                let t = self.request.frame_time(idx);

                let fp = self
                    .opts
                    .static_frame_elision
                    .then(|| fingerprint_at(self.scene, t));
                let frame = match fp.and_then(|fp| cache.get(&fp)) {
                    Some(frame) => {
                        stats.frames_elided += 1;
                        frame.clone()
                    }
                    None => {
                        let frame = Arc::new(self.render_one(backend, t)?);
                        stats.frames_rendered += 1;
                        if let Some(fp) = fp {
                            cache.insert(fp, frame.clone());
                        }
                        frame
                    }
                };
                stats.frames_total += 1;
                send(tx, idx, frame)?;
            }
            chunk_start = chunk_end;
        }
        Ok(())
    }

    fn produce_parallel(
        &self,
        pool: &rayon::ThreadPool,
        settings: &RenderSettings,
        chunk_size: u64,
        tx: &mpsc::SyncSender<FrameMsg>,
        stats: &mut RenderStats,
    ) -> Result<(), Stop> {
        let total = self.request.frames_total();
        let mut chunk_start = 0;
        while chunk_start < total {
            let chunk_end = (chunk_start + chunk_size).min(total);
            if self.opts.static_frame_elision {
                let (unique_frames, frame_to_unique) =
                    self.render_chunk_unique(pool, settings, chunk_start, chunk_end)?;
                for (i, f) in (chunk_start..chunk_end).enumerate() {
                    self.check_cancel()?;
                    send(tx, FrameIndex(f), unique_frames[frame_to_unique[i]].clone())?;
                }
                let rendered = unique_frames.len() as u64;
                stats.frames_rendered += rendered;
                stats.frames_elided += (chunk_end - chunk_start).saturating_sub(rendered);
            } else {
                self.render_chunk_send(pool, settings, chunk_start, chunk_end, tx)?;
                stats.frames_rendered += chunk_end - chunk_start;
            }
            stats.frames_total += chunk_end - chunk_start;
            chunk_start = chunk_end;
        }
        Ok(())
    }

    fn render_chunk_send(
        &self,
        pool: &rayon::ThreadPool,
        settings: &RenderSettings,
        start: u64,
        end: u64,
        tx: &mpsc::SyncSender<FrameMsg>,
    ) -> Result<(), Stop> {
        let tx = tx.clone();
        pool.install(|| {
            (start..end).into_par_iter().try_for_each_init(
                || Worker::new(settings),
                move |w, f| -> Result<(), Stop> {
                    self.check_cancel()?;
                    let idx = FrameIndex(f);
                    let frame = self.render_one(w.backend()?, self.request.frame_time(idx))?;
                    send(&tx, idx, Arc::new(frame))
                },
            )
        })
    }

    fn render_chunk_unique(
        &self,
        pool: &rayon::ThreadPool,
        settings: &RenderSettings,
        start: u64,
        end: u64,
    ) -> Result<(Vec<Arc<FrameRGBA>>, Vec<usize>), Stop> {
        let mut uniq = Vec::<u64>::new();
        let mut map = Vec::<usize>::with_capacity((end - start) as usize);
        let mut seen = HashMap::<FrameFingerprint, usize>::new();
        for f in start..end {
            let fp = fingerprint_at(self.scene, self.request.frame_time(FrameIndex(f)));
            let u = *seen.entry(fp).or_insert_with(|| {
                uniq.push(f);
                uniq.len() - 1
            });
            map.push(u);
        }

        let rendered = pool.install(|| {
            uniq.par_iter()
                .map_init(
                    || Worker::new(settings),
                    |w, &f| -> Result<Arc<FrameRGBA>, Stop> {
                        self.check_cancel()?;
                        let t = self.request.frame_time(FrameIndex(f));
                        Ok(Arc::new(self.render_one(w.backend()?, t)?))
                    },
                )
                .collect::<Result<Vec<_>, Stop>>()
        })?;
        Ok((rendered, map))
    }

    fn render_one(&self, backend: &mut dyn RenderBackend, t_s: f64) -> Result<FrameRGBA, Stop> {
        backend
            .render_scene(self.scene, t_s, self.request.output, self.assets)
            .map_err(|e| Stop::Failed(e.into_render_failure()))
    }

    fn check_cancel(&self) -> Result<(), Stop> {
        if self.shared.cancel.is_cancelled() {
            return Err(Stop::Cancelled);
        }
        Ok(())
    }
}

/// Per-rayon-worker backend, built from the main backend's settings.
struct Worker {
    backend: Result<Box<dyn RenderBackend>, String>,
}

impl Worker {
    fn new(settings: &RenderSettings) -> Self {
        Self {
            backend: create_backend(BackendKind::Cpu, settings).map_err(|e| e.to_string()),
        }
    }

    fn backend(&mut self) -> Result<&mut dyn RenderBackend, Stop> {
        match self.backend.as_mut() {
            Ok(b) => Ok(b.as_mut()),
            Err(msg) => Err(Stop::Failed(LayerstackError::render(format!(
                "worker backend: {msg}"
            )))),
        }
    }
}

fn send(tx: &mpsc::SyncSender<FrameMsg>, idx: FrameIndex, frame: Arc<FrameRGBA>) -> Result<(), Stop> {
    tx.send(FrameMsg { idx, frame })
        .map_err(|_| Stop::Disconnected)
}

fn encode_stop(err: LayerstackError) -> Stop {
    Stop::Failed(err.into_encode_failure())
}

fn normalized_chunk_size(chunk_size: usize) -> u64 {
    if chunk_size == 0 {
        1
    } else {
        chunk_size as u64
    }
}

fn build_thread_pool(threads: Option<usize>) -> LayerstackResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(LayerstackError::validation(
            "export 'threads' must be >= 1 when set",
        ));
    }
    let mut builder = rayon::ThreadPoolBuilder::new()
        .thread_name(|i| format!("layerstack-render-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| LayerstackError::render(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/export/pipeline.rs"]
mod tests;
