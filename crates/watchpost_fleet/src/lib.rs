//!Fleet management: one long-running worker per active camera, the registry that reconciles those
//!workers against the camera directory, and the alert dispatcher workers use.
//!
//!Workers only talk to each other through the two shared stores in `FleetContext`
//!(`FrameCache` and `AlertState`), and each store key is written by exactly one worker.

use std::{sync::Arc, time::Duration};
use watchpost_core::{AlertState, CaptureBackend, Detector, FrameCache, TargetClass};

pub mod dispatch;
pub mod registry;
pub mod status;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatch::AlertDispatcher;
pub use registry::{CameraRegistry, ReconcileReport};
pub use status::FleetStatus;
pub use worker::{CameraWorker, FrameOutcome};

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub target_class: TargetClass,
    ///minimum gap between two delivered alerts for one camera
    pub cooldown: Duration,
    ///pause before reopening a capture source that failed to open or read
    pub retry_backoff: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            target_class: TargetClass::PERSON,
            cooldown: Duration::from_secs(10),
            retry_backoff: Duration::from_secs(5),
        }
    }
}

///Everything a camera worker needs, shared by all of them.
pub struct FleetContext {
    pub capture: Arc<dyn CaptureBackend>,
    pub detector: Arc<dyn Detector>,
    pub dispatcher: AlertDispatcher,
    pub frames: FrameCache,
    pub alerts: AlertState,
    pub settings: WorkerSettings,
}
