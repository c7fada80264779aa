use bytes::Bytes;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use watchpost_core::{error::Result, FrameCache};
use watchpost_fleet::FleetStatus;

///Shared by every request handler. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    pub frames: FrameCache,
    pub status: FleetStatus,
    ///sent to viewers of cameras with nothing cached yet
    pub placeholder: Bytes,
    ///pause between two parts of an mjpeg stream
    pub frame_interval: Duration,
    //ends open streams so the server can drain
    pub(crate) shutdown: CancellationToken,
}

impl AppState {
    ///Renders the placeholder frame once, so the stream path itself never has to.
    pub fn new(frames: FrameCache, status: FleetStatus, frame_interval: Duration) -> Result<Self> {
        Ok(Self {
            frames,
            status,
            placeholder: watchpost_capture::placeholder_jpeg()?,
            frame_interval,
            shutdown: CancellationToken::new(),
        })
    }

    ///Latest frame for the camera, or the placeholder.
    pub fn frame_for(&self, camera_id: &str) -> Bytes {
        match self.frames.get(camera_id) {
            Some(entry) => entry.image,
            None => self.placeholder.clone(),
        }
    }
}
