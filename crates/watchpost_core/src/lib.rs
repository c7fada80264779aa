//!This is the core library for the watchpost project. All other watchpost crates depend on this one.
//!It holds the data model, the shared per-camera stores, and the traits every external capability
//!(camera directory, capture device, detector, object store, event sink) is consumed through.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod alert_state;
pub mod error;
pub mod frame_cache;
pub mod labels;

pub use alert_state::AlertState;
pub use frame_cache::{FrameCache, FrameCacheEntry};
pub use labels::TargetClass;

use error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CameraType {
    Commercial,
    Home,
    #[serde(other)]
    Unknown,
}

///A camera as reported by the directory. Identity is `id`; a record that changes between
///reconciliation cycles is a new desired state, never mutated in place.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Camera {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "rtspUrl")]
    pub source_uri: String,
    #[serde(rename = "isActive", default)]
    pub active: bool,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<CameraType>,
}

impl Camera {
    pub fn new(id: &str, source_uri: &str, active: bool) -> Self {
        Self {
            id: id.to_owned(),
            name: id.to_owned(),
            source_uri: source_uri.to_owned(),
            active,
            location: None,
            kind: None,
        }
    }
}

///A single object found in a frame. `bbox` is `[x1, y1, x2, y2]` in pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: [f32; 4],
    #[serde(rename = "conf")]
    pub confidence: f32,
    #[serde(rename = "class")]
    pub class_id: u32,
}

impl Detection {
    ///Highest confidence detection in `detections`, if any.
    pub fn most_confident(detections: &[Detection]) -> Option<&Detection> {
        detections
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    }
}

///Everything the detector hands back for one frame.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub detections: Vec<Detection>,
    ///JPEG encoded frame with the detections drawn on it
    pub annotated: Bytes,
}

impl DetectionResult {
    pub fn contains(&self, class: TargetClass) -> bool {
        self.detections.iter().any(|d| d.class_id == class.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Intrusion,
    Shoplifting,
}

///An alert as posted to the event sink. Built fresh for every dispatch and handed over on send.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventType,
    pub camera_id: String,
    pub description: String,
    pub snapshot_url: String,
    pub video_url: String,
    #[serde(skip)]
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(kind: EventType, camera_id: &str, description: String, snapshot_url: String) -> Self {
        Self {
            kind,
            camera_id: camera_id.to_owned(),
            description,
            snapshot_url,
            video_url: String::new(),
            timestamp: Utc::now(),
        }
    }
}

///Source of the desired camera set.
#[async_trait]
pub trait CameraDirectory: Send + Sync {
    async fn list_cameras(&self) -> Result<Vec<Camera>>;
}

///Receives alerts. `Ok` means the sink explicitly acknowledged the event.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, event: &Event) -> Result<()>;
}

///Durable blob storage. Returns the public URL of the stored object.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, bucket: &str, key: &str, data: Bytes, content_type: &str) -> Result<String>;
}

///Object detection over one JPEG frame.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, frame: Bytes) -> Result<DetectionResult>;
}

///An open capture session. Dropping it releases the underlying device or process.
#[async_trait]
pub trait FrameSource: Send {
    ///Next JPEG frame, in capture order.
    async fn read_frame(&mut self) -> Result<Bytes>;
}

///Opens capture sessions for cameras.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    async fn open(&self, camera: &Camera) -> Result<Box<dyn FrameSource>>;
}
