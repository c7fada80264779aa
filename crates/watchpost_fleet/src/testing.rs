//! In-memory stand-ins for the external services, shared by the fleet tests.

use async_trait::async_trait;
use bytes::Bytes;
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use watchpost_core::{
    error::{Result, WatchpostError},
    AlertState, Camera, CameraDirectory, CaptureBackend, Detection, DetectionResult, Detector,
    Event, EventSink, EventType, FrameCache, FrameSource, ObjectStore,
};

use crate::{AlertDispatcher, FleetContext, WorkerSettings};

pub(crate) fn person(confidence: f32) -> Detection {
    Detection {
        bbox: [10.0, 10.0, 50.0, 120.0],
        confidence,
        class_id: 0,
    }
}

pub(crate) fn dog(confidence: f32) -> Detection {
    Detection {
        bbox: [10.0, 10.0, 50.0, 50.0],
        confidence,
        class_id: 16,
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<Event>>,
    attempts: AtomicUsize,
    fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn send(&self, event: &Event) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(WatchpostError::event_sink("sink returned 500"));
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingStore {
    puts: Mutex<Vec<(String, String, String)>>,
    fail: bool,
}

impl RecordingStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    ///(bucket, key, content type) per successful put
    pub fn puts(&self) -> Vec<(String, String, String)> {
        self.puts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn put(&self, bucket: &str, key: &str, _data: Bytes, content_type: &str) -> Result<String> {
        if self.fail {
            return Err(WatchpostError::storage("store unreachable"));
        }
        self.puts
            .lock()
            .unwrap()
            .push((bucket.to_owned(), key.to_owned(), content_type.to_owned()));
        Ok(format!("http://store/{}/{}", bucket, key))
    }
}

///Returns the configured detections for every frame, or fails when set to `None`.
///The annotated frame is the input prefixed with `A:`.
pub(crate) struct StaticDetector {
    detections: Mutex<Option<Vec<Detection>>>,
}

impl StaticDetector {
    pub fn new(detections: Option<Vec<Detection>>) -> Self {
        Self {
            detections: Mutex::new(detections),
        }
    }

    pub fn set(&self, detections: Option<Vec<Detection>>) {
        *self.detections.lock().unwrap() = detections;
    }
}

pub(crate) fn annotated(frame: &[u8]) -> Bytes {
    Bytes::from([b"A:".as_slice(), frame].concat())
}

#[async_trait]
impl Detector for StaticDetector {
    async fn detect(&self, frame: Bytes) -> Result<DetectionResult> {
        let detections = self
            .detections
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| WatchpostError::detection("detector unavailable"))?;
        Ok(DetectionResult {
            detections,
            annotated: annotated(&frame),
        })
    }
}

///Fails every open and counts the attempts.
#[derive(Default)]
pub(crate) struct FailingCapture {
    opens: AtomicUsize,
}

impl FailingCapture {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureBackend for FailingCapture {
    async fn open(&self, camera: &Camera) -> Result<Box<dyn FrameSource>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Err(WatchpostError::capture(format!(
            "cannot open {}",
            camera.source_uri
        )))
    }
}

///Hands out sources that yield a frame every `frame_delay`, and tracks how many sessions are open
///at once. With `frames_per_session` set, every session ends with a read error after that many
///frames.
pub(crate) struct CountingCapture {
    frame_delay: Duration,
    frames_per_session: Option<usize>,
    opens: AtomicUsize,
    live: Arc<AtomicUsize>,
    max_live: Arc<AtomicUsize>,
}

impl CountingCapture {
    pub fn new(frame_delay: Duration) -> Self {
        Self {
            frame_delay,
            frames_per_session: None,
            opens: AtomicUsize::new(0),
            live: Arc::default(),
            max_live: Arc::default(),
        }
    }

    pub fn ending_after(mut self, frames: usize) -> Self {
        self.frames_per_session = Some(frames);
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureBackend for CountingCapture {
    async fn open(&self, _camera: &Camera) -> Result<Box<dyn FrameSource>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(live, Ordering::SeqCst);
        Ok(Box::new(CountingSource {
            frame_delay: self.frame_delay,
            remaining: self.frames_per_session,
            live: self.live.clone(),
        }))
    }
}

struct CountingSource {
    frame_delay: Duration,
    remaining: Option<usize>,
    live: Arc<AtomicUsize>,
}

#[async_trait]
impl FrameSource for CountingSource {
    async fn read_frame(&mut self) -> Result<Bytes> {
        tokio::time::sleep(self.frame_delay).await;
        match self.remaining {
            Some(0) => Err(WatchpostError::StreamEnded),
            Some(ref mut remaining) => {
                *remaining -= 1;
                Ok(Bytes::from_static(b"frame"))
            }
            None => Ok(Bytes::from_static(b"frame")),
        }
    }
}

impl Drop for CountingSource {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

///Serves queued responses in order, `None` being a failed fetch. The last response repeats.
pub(crate) struct ScriptedDirectory {
    responses: Mutex<VecDeque<Option<Vec<Camera>>>>,
}

impl ScriptedDirectory {
    pub fn new(responses: Vec<Option<Vec<Camera>>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl CameraDirectory for ScriptedDirectory {
    async fn list_cameras(&self) -> Result<Vec<Camera>> {
        let mut responses = self.responses.lock().unwrap();
        let next = if responses.len() > 1 {
            responses.pop_front().flatten()
        } else {
            responses.front().cloned().flatten()
        };
        next.ok_or_else(|| WatchpostError::directory("GET /cameras returned 500"))
    }
}

pub(crate) struct Harness {
    pub ctx: Arc<FleetContext>,
    pub detector: Arc<StaticDetector>,
    pub sink: Arc<RecordingSink>,
}

impl Harness {
    pub fn new(capture: Arc<dyn CaptureBackend>) -> Self {
        Self::with_services(
            capture,
            RecordingStore::default(),
            RecordingSink::default(),
        )
    }

    pub fn with_services(
        capture: Arc<dyn CaptureBackend>,
        store: RecordingStore,
        sink: RecordingSink,
    ) -> Self {
        let detector = Arc::new(StaticDetector::new(Some(Vec::new())));
        let sink = Arc::new(sink);
        let ctx = Arc::new(FleetContext {
            capture,
            detector: detector.clone(),
            dispatcher: AlertDispatcher::new(
                Arc::new(store),
                sink.clone(),
                "snapshots",
                EventType::Intrusion,
            ),
            frames: FrameCache::new(),
            alerts: AlertState::new(),
            settings: WorkerSettings::default(),
        });
        Self {
            ctx,
            detector,
            sink,
        }
    }
}
