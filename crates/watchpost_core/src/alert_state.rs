//! Per-camera cooldown bookkeeping for alerts.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Duration,
};
use tokio::time::Instant;

///Camera id -> time of the last alert the event sink acknowledged.
///
///A camera that never alerted has no entry. Only the camera's own worker calls `record`, and only
///after a confirmed dispatch.
#[derive(Debug, Clone, Default)]
pub struct AlertState {
    last_alert: Arc<RwLock<HashMap<String, Instant>>>,
}

impl AlertState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_alert(&self, camera_id: &str) -> Option<Instant> {
        match self.last_alert.read() {
            Ok(map) => map.get(camera_id).copied(),
            Err(poisoned) => poisoned.into_inner().get(camera_id).copied(),
        }
    }

    ///True when the camera never alerted, or strictly more than `cooldown` has passed since.
    pub fn is_due(&self, camera_id: &str, now: Instant, cooldown: Duration) -> bool {
        match self.last_alert(camera_id) {
            None => true,
            Some(last) => now.saturating_duration_since(last) > cooldown,
        }
    }

    pub fn record(&self, camera_id: &str, at: Instant) {
        let mut map = match self.last_alert.write() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.insert(camera_id.to_owned(), at);
    }

    pub fn remove(&self, camera_id: &str) {
        let mut map = match self.last_alert.write() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.remove(camera_id);
    }
}
