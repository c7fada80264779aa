//! Latest annotated frame per camera.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

#[derive(Debug, Clone)]
pub struct FrameCacheEntry {
    pub camera_id: String,
    ///JPEG bytes
    pub image: Bytes,
    pub produced_at: DateTime<Utc>,
}

impl FrameCacheEntry {
    pub fn new(camera_id: &str, image: Bytes) -> Self {
        Self {
            camera_id: camera_id.to_owned(),
            image,
            produced_at: Utc::now(),
        }
    }
}

///Camera id -> most recent frame. Each key is written only by the worker that owns the camera;
///any number of viewers read. Clones share the same map.
///
///The lock only guards the map itself. Entries hold `Bytes`, so a reader never waits longer
///than one refcount bump behind a writer.
#[derive(Debug, Clone, Default)]
pub struct FrameCache {
    entries: Arc<RwLock<HashMap<String, FrameCacheEntry>>>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    ///Overwrites whatever was cached for `entry.camera_id`.
    pub fn put(&self, entry: FrameCacheEntry) {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(entry.camera_id.clone(), entry);
    }

    ///`None` is a normal outcome: the camera has not produced a frame yet, or is unknown.
    pub fn get(&self, camera_id: &str) -> Option<FrameCacheEntry> {
        let entries = match self.entries.read() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.get(camera_id).cloned()
    }

    pub fn remove(&self, camera_id: &str) -> Option<FrameCacheEntry> {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.remove(camera_id)
    }

    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
