use super::*;
use crate::encode::sink::{InMemorySink, SinkConfig};
use crate::foundation::color::Color;
use crate::foundation::core::{Canvas, Fps, FrameIndex, TimeRange};
use crate::render::assets::InMemoryAssets;
use crate::render::backend::{FrameRGBA, RenderSettings};
use crate::render::cpu::CpuBackend;

/// Blocks in `begin` until the test opens the gate.
struct GateSink {
    gate: mpsc::Receiver<()>,
    delivered: Arc<Mutex<Vec<u64>>>,
}

impl FrameSink for GateSink {
    fn begin(&mut self, _cfg: SinkConfig) -> LayerstackResult<()> {
        let _ = self.gate.recv();
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, _t: f64, _f: &FrameRGBA) -> LayerstackResult<()> {
        self.delivered.lock().unwrap().push(idx.0);
        Ok(())
    }

    fn end(&mut self) -> LayerstackResult<()> {
        Ok(())
    }
}

fn scene() -> Scene {
    Scene::new(Canvas::new(8, 8))
        .with_background(Color::rgb(1, 2, 3))
        .with_duration(0.5)
}

fn request() -> ExportRequest {
    ExportRequest::new(
        TimeRange::new(0.0, 0.5).unwrap(),
        Fps::new(10, 1).unwrap(),
        Canvas::new(8, 8),
    )
    .unwrap()
}

fn backend() -> Box<dyn RenderBackend> {
    Box::new(CpuBackend::new(RenderSettings::default()))
}

fn assets() -> Arc<dyn AssetSource> {
    Arc::new(InMemoryAssets::new())
}

#[test]
fn second_export_of_a_busy_scene_is_rejected_until_the_first_ends() {
    let manager = ExportManager::default();
    let scene = scene();
    let (open, gate) = mpsc::channel();
    let delivered = Arc::new(Mutex::new(Vec::new()));

    let first = manager
        .start_export(
            &scene,
            request(),
            backend(),
            assets(),
            Box::new(GateSink {
                gate,
                delivered: delivered.clone(),
            }),
        )
        .unwrap();
    assert!(manager.is_busy(scene.id()));

    let err = manager
        .start_export(
            &scene.clone(),
            request(),
            backend(),
            assets(),
            Box::new(InMemorySink::new()),
        )
        .err()
        .unwrap();
    assert!(matches!(err, LayerstackError::BusyExporting(_)));

    let other = manager
        .start_export(
            &Scene::new(Canvas::new(8, 8)).with_duration(0.5),
            request(),
            backend(),
            assets(),
            Box::new(InMemorySink::new()),
        )
        .unwrap();
    assert_eq!(other.wait().unwrap().status, ExportStatus::Completed);

    open.send(()).unwrap();
    let id = first.id();
    let report = first.wait().unwrap();
    assert_eq!(report.status, ExportStatus::Completed);
    assert_eq!(*delivered.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    assert!(!manager.is_busy(scene.id()));
    assert!(matches!(manager.status(id), Err(LayerstackError::NotFound(_))));

    let again = manager
        .start_export(
            &scene,
            request(),
            backend(),
            assets(),
            Box::new(InMemorySink::new()),
        )
        .unwrap();
    assert!(again.wait().is_ok());
}

#[test]
fn cancel_through_the_manager_stops_the_job() {
    let manager = ExportManager::default();
    let (open, gate) = mpsc::channel();
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let handle = manager
        .start_export(
            &scene(),
            request(),
            backend(),
            assets(),
            Box::new(GateSink {
                gate,
                delivered: delivered.clone(),
            }),
        )
        .unwrap();

    manager.cancel(handle.id()).unwrap();
    open.send(()).unwrap();
    let report = handle.wait().unwrap();
    assert_eq!(report.status, ExportStatus::Cancelled);
    assert!(delivered.lock().unwrap().is_empty());
}

#[test]
fn unknown_jobs_are_not_found() {
    let manager = ExportManager::default();
    let other = ExportManager::default();
    let handle = other
        .start_export(
            &scene(),
            request(),
            backend(),
            assets(),
            Box::new(InMemorySink::new()),
        )
        .unwrap();
    let id = handle.id();
    handle.wait().unwrap();

    assert!(matches!(
        manager.status(id),
        Err(LayerstackError::NotFound(_))
    ));
    assert!(matches!(manager.cancel(id), Err(LayerstackError::NotFound(_))));
}

#[test]
fn events_are_forwarded_from_background_jobs() {
    let (tx, rx) = mpsc::channel();
    let manager = ExportManager::new(ExportOpts::default())
        .unwrap()
        .with_events(tx);
    let handle = manager
        .start_export(
            &scene(),
            request(),
            backend(),
            assets(),
            Box::new(InMemorySink::new()),
        )
        .unwrap();
    let id = handle.id();
    handle.wait().unwrap();

    let events: Vec<ExportEvent> = rx.try_iter().collect();
    assert_eq!(events.len(), 1 + 5 + 1);
    assert!(events.iter().all(|e| match e {
        ExportEvent::Status { job, .. } | ExportEvent::Progress { job, .. } => *job == id,
    }));
}

#[test]
fn finished_job_frees_its_scene_before_reporting_done() {
    let manager = ExportManager::default();
    let scene = scene();
    for _ in 0..20 {
        let handle = manager
            .start_export(
                &scene,
                request(),
                backend(),
                assets(),
                Box::new(InMemorySink::new()),
            )
            .unwrap();
        while !handle.is_finished() {
            std::thread::yield_now();
        }
        assert!(!manager.is_busy(scene.id()));
        let again = manager
            .start_export(
                &scene,
                request(),
                backend(),
                assets(),
                Box::new(InMemorySink::new()),
            )
            .unwrap();
        again.wait().unwrap();
        handle.wait().unwrap();
    }
    assert_eq!(manager.tracked_jobs(), 0);
}

#[test]
fn finished_jobs_are_reaped() {
    let manager = ExportManager::default();
    let waited = manager
        .start_export(
            &scene(),
            request(),
            backend(),
            assets(),
            Box::new(InMemorySink::new()),
        )
        .unwrap();
    let waited_id = waited.id();
    waited.wait().unwrap();
    assert!(matches!(
        manager.status(waited_id),
        Err(LayerstackError::NotFound(_))
    ));

    let detached = manager
        .start_export(
            &scene(),
            request(),
            backend(),
            assets(),
            Box::new(InMemorySink::new()),
        )
        .unwrap();
    let detached_id = detached.id();
    while !detached.is_finished() {
        std::thread::yield_now();
    }
    drop(detached);
    assert_eq!(manager.status(detached_id).unwrap(), ExportStatus::Completed);
    assert_eq!(manager.prune_finished(), 1);
    assert_eq!(manager.tracked_jobs(), 0);
    assert!(matches!(
        manager.status(detached_id),
        Err(LayerstackError::NotFound(_))
    ));
}
