//! Turning a triggering frame into a delivered event.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;
use watchpost_core::{
    error::Result, labels::class_name, Camera, Detection, Event, EventSink, EventType, ObjectStore,
};

const SNAPSHOT_CONTENT_TYPE: &str = "image/jpeg";

///Uploads the annotated snapshot and posts the event.
///
///The snapshot upload is best effort: when it fails the event still goes out, with an empty
///snapshot url. Only the event sink decides whether a dispatch succeeded.
pub struct AlertDispatcher {
    store: Arc<dyn ObjectStore>,
    sink: Arc<dyn EventSink>,
    bucket: String,
    event_type: EventType,
}

impl AlertDispatcher {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        sink: Arc<dyn EventSink>,
        bucket: &str,
        event_type: EventType,
    ) -> Self {
        Self {
            store,
            sink,
            bucket: bucket.to_owned(),
            event_type,
        }
    }

    ///`detections` are the ones that triggered the alert, `annotated` is the JPEG they were
    ///drawn on. `Ok` only when the event sink acknowledged the event.
    pub async fn dispatch(
        &self,
        camera: &Camera,
        detections: &[Detection],
        annotated: &Bytes,
    ) -> Result<()> {
        let key = snapshot_key(&camera.id);
        let snapshot_url = match self
            .store
            .put(&self.bucket, &key, annotated.clone(), SNAPSHOT_CONTENT_TYPE)
            .await
        {
            Ok(url) => url,
            Err(err) => {
                warn!(camera_id = %camera.id, "snapshot upload failed, sending event without it: {}", err);
                String::new()
            }
        };

        let event = Event::new(
            self.event_type,
            &camera.id,
            describe(camera, detections),
            snapshot_url,
        );
        self.sink.send(&event).await?;
        debug!(camera_id = %camera.id, "event delivered: {}", event.description);
        Ok(())
    }
}

fn snapshot_key(camera_id: &str) -> String {
    format!("{}/{}.jpg", camera_id, Uuid::new_v4())
}

fn describe(camera: &Camera, detections: &[Detection]) -> String {
    let place = match camera.location {
        Some(ref location) if !location.is_empty() => format!("{} ({})", display_name(camera), location),
        _ => display_name(camera).to_owned(),
    };

    match Detection::most_confident(detections) {
        Some(top) => format!(
            "{} detected on {} with {:.0}% confidence",
            capitalize(class_name(top.class_id).unwrap_or("object")),
            place,
            top.confidence * 100.0
        ),
        None => format!("Alert on {}", place),
    }
}

fn display_name(camera: &Camera) -> &str {
    if camera.name.is_empty() {
        &camera.id
    } else {
        &camera.name
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
