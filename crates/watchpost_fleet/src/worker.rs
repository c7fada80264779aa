use bytes::Bytes;
use std::sync::Arc;
use tokio::{task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use watchpost_core::{Camera, Detection, FrameCacheEntry, FrameSource};

use crate::FleetContext;

///What happened to a single captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    ///detector failed, nothing was published
    DetectionFailed,
    ///published, no target class in the frame
    Published,
    ///target class present but the camera is still cooling down
    Suppressed,
    Alerted,
    ///dispatch failed, the cooldown was not advanced
    AlertFailed,
}

///Runs capture, detection, publishing and alerting for one camera until cancelled.
///
///Read and open failures never end the worker: the source is dropped and reopened after the
///configured backoff. Cancellation is checked once per iteration and cuts backoff sleeps short,
///but an in-flight read is always allowed to finish. On exit the worker removes its camera from
///the frame cache and the alert state.
pub struct CameraWorker {
    camera: Camera,
    ctx: Arc<FleetContext>,
    cancel: CancellationToken,
}

impl CameraWorker {
    pub fn new(camera: Camera, ctx: Arc<FleetContext>, cancel: CancellationToken) -> Self {
        Self {
            camera,
            ctx,
            cancel,
        }
    }

    ///Spawns the worker. When `predecessor` is given (a retiring worker for the same camera) it
    ///is awaited before the capture source is opened.
    pub fn spawn(self, predecessor: Option<JoinHandle<()>>) -> JoinHandle<()> {
        tokio::spawn(self.run(predecessor))
    }

    pub async fn run(self, predecessor: Option<JoinHandle<()>>) {
        let camera_id = self.camera.id.as_str();

        if let Some(predecessor) = predecessor {
            debug!(camera_id, "waiting for previous worker to exit");
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!(camera_id, "cancelled before start");
                    return;
                }
                res = predecessor => {
                    if let Err(err) = res {
                        warn!(camera_id, "previous worker did not exit cleanly: {}", err);
                    }
                }
            }
        }

        info!(camera_id, uri = %self.camera.source_uri, "camera worker started");
        let mut source: Option<Box<dyn FrameSource>> = None;

        while !self.cancel.is_cancelled() {
            if source.is_none() {
                match self.ctx.capture.open(&self.camera).await {
                    Ok(opened) => {
                        debug!(camera_id, "capture opened");
                        source = Some(opened);
                    }
                    Err(err) => {
                        warn!(
                            camera_id,
                            "cannot open capture, retrying in {:?}: {}",
                            self.ctx.settings.retry_backoff,
                            err
                        );
                        self.backoff().await;
                        continue;
                    }
                }
            }
            let Some(active) = source.as_mut() else {
                continue;
            };

            //never interrupted, the source's own read timeout bounds how long a stop can take
            let read = active.read_frame().await;
            match read {
                Ok(frame) => {
                    self.process_frame(frame, Instant::now()).await;
                }
                Err(err) => {
                    warn!(
                        camera_id,
                        "frame read failed, reopening in {:?}: {}",
                        self.ctx.settings.retry_backoff,
                        err
                    );
                    source = None;
                    self.backoff().await;
                }
            }
        }

        drop(source);
        self.ctx.frames.remove(camera_id);
        self.ctx.alerts.remove(camera_id);
        debug!(camera_id, "camera worker shutting down!");
    }

    ///Detects, publishes, and alerts when due. `now` is the capture time used for the cooldown.
    pub async fn process_frame(&self, frame: Bytes, now: Instant) -> FrameOutcome {
        let camera_id = self.camera.id.as_str();
        let settings = &self.ctx.settings;

        let result = match self.ctx.detector.detect(frame).await {
            Ok(result) => result,
            Err(err) => {
                warn!(camera_id, "detection failed, skipping frame: {}", err);
                return FrameOutcome::DetectionFailed;
            }
        };

        self.ctx
            .frames
            .put(FrameCacheEntry::new(camera_id, result.annotated.clone()));

        if !result.contains(settings.target_class) {
            return FrameOutcome::Published;
        }
        if !self.ctx.alerts.is_due(camera_id, now, settings.cooldown) {
            debug!(camera_id, "{} in frame, alert suppressed by cooldown", settings.target_class);
            return FrameOutcome::Suppressed;
        }

        let triggering: Vec<Detection> = result
            .detections
            .iter()
            .filter(|d| d.class_id == settings.target_class.id())
            .cloned()
            .collect();

        match self
            .ctx
            .dispatcher
            .dispatch(&self.camera, &triggering, &result.annotated)
            .await
        {
            Ok(()) => {
                self.ctx.alerts.record(camera_id, now);
                info!(camera_id, "alert sent");
                FrameOutcome::Alerted
            }
            Err(err) => {
                warn!(camera_id, "alert dispatch failed: {}", err);
                FrameOutcome::AlertFailed
            }
        }
    }

    async fn backoff(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(self.ctx.settings.retry_backoff) => {}
        }
    }
}
