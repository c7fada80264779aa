//! Keeps exactly one worker per active camera in the directory.

use futures_util::future::join_all;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use watchpost_core::{error::Result, Camera, CameraDirectory};

use crate::{status::FleetStatus, worker::CameraWorker, FleetContext};

struct WorkerHandle {
    camera: Camera,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

///Camera ids touched by one reconciliation cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub started: Vec<String>,
    pub stopped: Vec<String>,
    ///camera record changed, old worker stopped and a new one started
    pub restarted: Vec<String>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.stopped.is_empty() && self.restarted.is_empty()
    }
}

///Owns every camera worker.
///
///Stopping a worker only cancels it; its handle moves to `retiring` and is handed to the next
///worker for the same camera, which waits for it before opening the capture source. A camera
///therefore never has two live capture sessions.
pub struct CameraRegistry {
    directory: Arc<dyn CameraDirectory>,
    ctx: Arc<FleetContext>,
    workers: HashMap<String, WorkerHandle>,
    retiring: HashMap<String, JoinHandle<()>>,
    cancel: CancellationToken,
    managed: watch::Sender<Vec<String>>,
}

impl CameraRegistry {
    pub fn new(directory: Arc<dyn CameraDirectory>, ctx: Arc<FleetContext>) -> Self {
        let (managed, _) = watch::channel(Vec::new());
        Self {
            directory,
            ctx,
            workers: HashMap::new(),
            retiring: HashMap::new(),
            cancel: CancellationToken::new(),
            managed,
        }
    }

    pub fn status(&self) -> FleetStatus {
        FleetStatus::new(self.managed.subscribe())
    }

    ///Sorted ids of the cameras that currently have a worker.
    pub fn managed_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.workers.keys().cloned().collect();
        ids.sort();
        ids
    }

    ///Fetches the directory once and converges the running workers onto its active cameras.
    ///
    ///A failed fetch changes nothing: running workers keep running until a later fetch succeeds.
    pub async fn reconcile(&mut self) -> Result<ReconcileReport> {
        self.reap_retired();

        let cameras = match self.directory.list_cameras().await {
            Ok(cameras) => cameras,
            Err(err) => {
                warn!(
                    "camera directory unavailable, keeping {} workers as they are: {}",
                    self.workers.len(),
                    err
                );
                return Err(err);
            }
        };

        let desired: HashMap<String, Camera> = cameras
            .into_iter()
            .filter(|camera| camera.active)
            .map(|camera| (camera.id.clone(), camera))
            .collect();
        Ok(self.apply(desired))
    }

    fn apply(&mut self, mut desired: HashMap<String, Camera>) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let running: Vec<String> = self.workers.keys().cloned().collect();
        for id in running {
            match desired.get(&id) {
                None => {
                    self.stop_worker(&id);
                    report.stopped.push(id);
                }
                Some(camera) if self.workers.get(&id).is_some_and(|h| h.camera != *camera) => {
                    self.stop_worker(&id);
                    report.restarted.push(id);
                }
                Some(_) => {}
            }
        }

        let restarted: HashSet<&String> = report.restarted.iter().collect();
        let mut to_start: Vec<String> = desired
            .keys()
            .filter(|id| !self.workers.contains_key(*id))
            .cloned()
            .collect();
        to_start.sort();
        for id in to_start {
            if let Some(camera) = desired.remove(&id) {
                self.start_worker(camera);
            }
            if !restarted.contains(&id) {
                report.started.push(id);
            }
        }

        report.started.sort();
        report.stopped.sort();
        report.restarted.sort();
        self.publish();
        report
    }

    fn start_worker(&mut self, camera: Camera) {
        let cancel = self.cancel.child_token();
        let predecessor = self.retiring.remove(&camera.id);
        let join = CameraWorker::new(camera.clone(), self.ctx.clone(), cancel.clone())
            .spawn(predecessor);
        info!(camera_id = %camera.id, "managing camera '{}'", camera.name);
        self.workers.insert(
            camera.id.clone(),
            WorkerHandle {
                camera,
                cancel,
                join,
            },
        );
    }

    fn stop_worker(&mut self, id: &str) {
        if let Some(handle) = self.workers.remove(id) {
            handle.cancel.cancel();
            info!(camera_id = %id, "stopping camera worker");
            self.retiring.insert(id.to_owned(), handle.join);
        }
    }

    fn reap_retired(&mut self) {
        self.retiring.retain(|id, join| {
            let finished = join.is_finished();
            if finished {
                debug!(camera_id = %id, "retired worker exited");
            }
            !finished
        });
    }

    fn publish(&self) {
        self.managed.send_replace(self.managed_ids());
    }

    ///Runs `reconcile` every `interval` until `shutdown` fires, then stops all workers, waiting
    ///at most `grace` for them.
    pub fn spawn(
        mut self,
        interval: Duration,
        shutdown: CancellationToken,
        grace: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        match self.reconcile().await {
                            Ok(report) if !report.is_empty() => info!(
                                "reconciled: started {:?}, stopped {:?}, restarted {:?}",
                                report.started, report.stopped, report.restarted
                            ),
                            Ok(_) => debug!("reconciled, {} cameras unchanged", self.workers.len()),
                            //logged by reconcile
                            Err(_) => {}
                        }
                    }
                }
            }

            self.shutdown(grace).await;
            debug!("camera registry shutting down!");
        })
    }

    ///Cancels every worker and waits up to `grace` for all of them to exit.
    pub async fn shutdown(&mut self, grace: Duration) {
        self.cancel.cancel();

        let mut joins: Vec<JoinHandle<()>> =
            self.workers.drain().map(|(_, handle)| handle.join).collect();
        joins.extend(self.retiring.drain().map(|(_, join)| join));
        self.publish();

        let count = joins.len();
        match tokio::time::timeout(grace, join_all(joins)).await {
            Ok(_) => info!("stopped {} camera workers", count),
            Err(_) => warn!(
                "camera workers still running after {:?}, leaving them behind",
                grace
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingCapture, FailingCapture, Harness, ScriptedDirectory};

    fn cam(id: &str, active: bool) -> Camera {
        Camera::new(id, &format!("rtsp://{}/live", id), active)
    }

    fn registry(responses: Vec<Option<Vec<Camera>>>) -> CameraRegistry {
        let harness = Harness::new(Arc::new(FailingCapture::default()));
        CameraRegistry::new(Arc::new(ScriptedDirectory::new(responses)), harness.ctx)
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[tokio::test]
    async fn starts_only_active_cameras() {
        let mut registry = registry(vec![Some(vec![
            cam("c1", true),
            cam("c2", true),
            cam("c3", false),
        ])]);
        let status = registry.status();

        let report = registry.reconcile().await.unwrap();

        assert_eq!(report.started, ids(&["c1", "c2"]));
        assert!(report.stopped.is_empty());
        assert_eq!(registry.managed_ids(), ids(&["c1", "c2"]));
        assert_eq!(status.managed_ids(), ids(&["c1", "c2"]));
        assert_eq!(status.count(), 2);
        registry.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn reconcile_is_idempotent() {
        let mut registry = registry(vec![Some(vec![cam("c1", true), cam("c2", true)])]);

        registry.reconcile().await.unwrap();
        let first_tokens: Vec<CancellationToken> =
            registry.workers.values().map(|h| h.cancel.clone()).collect();
        let report = registry.reconcile().await.unwrap();

        assert!(report.is_empty());
        assert_eq!(registry.managed_ids(), ids(&["c1", "c2"]));
        assert!(first_tokens.iter().all(|token| !token.is_cancelled()));
        registry.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn follows_directory_changes() {
        let mut registry = registry(vec![
            Some(vec![cam("c1", true), cam("c2", true)]),
            Some(vec![cam("c1", false), cam("c2", true), cam("c4", true)]),
        ]);

        registry.reconcile().await.unwrap();
        let c1 = registry.workers["c1"].cancel.clone();
        let report = registry.reconcile().await.unwrap();

        assert_eq!(report.started, ids(&["c4"]));
        assert_eq!(report.stopped, ids(&["c1"]));
        assert!(c1.is_cancelled());
        assert_eq!(registry.managed_ids(), ids(&["c2", "c4"]));
        registry.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn failed_fetch_keeps_workers() {
        let mut registry = registry(vec![Some(vec![cam("c1", true)]), None]);

        registry.reconcile().await.unwrap();
        assert!(registry.reconcile().await.is_err());

        assert_eq!(registry.managed_ids(), ids(&["c1"]));
        assert!(!registry.workers["c1"].cancel.is_cancelled());
        registry.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn changed_record_restarts_worker() {
        let mut moved = cam("c1", true);
        moved.source_uri = "rtsp://c1-new/live".to_owned();
        let mut registry = registry(vec![Some(vec![cam("c1", true)]), Some(vec![moved.clone()])]);

        registry.reconcile().await.unwrap();
        let old = registry.workers["c1"].cancel.clone();
        let report = registry.reconcile().await.unwrap();

        assert_eq!(report.restarted, ids(&["c1"]));
        assert!(report.started.is_empty());
        assert!(old.is_cancelled());
        assert_eq!(registry.workers["c1"].camera, moved);
        registry.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn restarted_camera_never_has_two_sessions() {
        let capture = Arc::new(CountingCapture::new(Duration::from_millis(100)));
        let harness = Harness::new(capture.clone());
        let mut moved = cam("c1", true);
        moved.name = "renamed".to_owned();
        let directory = ScriptedDirectory::new(vec![
            Some(vec![cam("c1", true)]),
            Some(vec![moved]),
        ]);
        let mut registry = CameraRegistry::new(Arc::new(directory), harness.ctx.clone());

        registry.reconcile().await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(capture.live(), 1);

        registry.reconcile().await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert_eq!(capture.live(), 1);
        assert_eq!(capture.max_live(), 1);
        registry.reconcile().await.unwrap();
        assert!(registry.retiring.is_empty());
        registry.shutdown(Duration::from_secs(1)).await;
        assert_eq!(capture.live(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn background_loop_stops_workers_on_shutdown() {
        let capture = Arc::new(CountingCapture::new(Duration::from_millis(100)));
        let harness = Harness::new(capture.clone());
        let directory =
            ScriptedDirectory::new(vec![Some(vec![cam("c1", true), cam("c2", true)])]);
        let registry = CameraRegistry::new(Arc::new(directory), harness.ctx.clone());
        let status = registry.status();
        let shutdown = CancellationToken::new();

        let join = registry.spawn(Duration::from_secs(30), shutdown.clone(), Duration::from_secs(5));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(status.count(), 2);
        assert_eq!(capture.live(), 2);
        assert!(harness.ctx.frames.get("c1").is_some());

        shutdown.cancel();
        join.await.unwrap();
        assert_eq!(status.count(), 0);
        assert_eq!(capture.live(), 0);
        assert!(harness.ctx.frames.is_empty());
    }
}
