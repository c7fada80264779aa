use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio::{process::Child, sync::watch, task::JoinHandle, time::timeout};
use tracing::debug;
use watchpost_core::{
    error::{Result, WatchpostError},
    Camera, CaptureBackend, FrameSource,
};

use crate::{child_process_stream::start_child_process, jpeg_stream_splitter::split_jpegs};

#[derive(Debug, Clone)]
pub struct FfmpegSettings {
    pub program: String,
    pub fps: u32,
    ///ffmpeg `-q:v`, 2 (best) to 31 (worst)
    pub quality: u8,
    ///upper bound on a single `read_frame`, and so on how long a cancelled worker can stay blocked
    pub read_timeout: Duration,
}

impl Default for FfmpegSettings {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_owned(),
            fps: 10,
            quality: 5,
            read_timeout: Duration::from_secs(10),
        }
    }
}

impl FfmpegSettings {
    pub(crate) fn args(&self, source_uri: &str) -> Vec<String> {
        let quality = self.quality.to_string();
        let fps = self.fps.to_string();

        let mut args: Vec<&str> = vec!["-hide_banner", "-loglevel", "error"];
        if source_uri.starts_with("rtsp://") || source_uri.starts_with("rtsps://") {
            args.extend(["-rtsp_transport", "tcp"]);
        }
        args.extend([
            "-i", source_uri,
            "-an", //no audio
            "-f", "image2pipe", //concatenated jpegs on stdout
            "-vcodec", "mjpeg",
            "-q:v", quality.as_str(),
            "-r", fps.as_str(),
            "-",
        ]);
        args.into_iter().map(str::to_owned).collect()
    }
}

///Captures cameras by running one ffmpeg process per open session and splitting its mjpeg
///output into frames.
pub struct FfmpegCapture {
    settings: FfmpegSettings,
}

impl FfmpegCapture {
    pub fn new(settings: FfmpegSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl CaptureBackend for FfmpegCapture {
    async fn open(&self, camera: &Camera) -> Result<Box<dyn FrameSource>> {
        let args = self.settings.args(&camera.source_uri);
        let (child, child_out) = start_child_process(&self.settings.program, &args)?;

        let (frames_tx, frames) = watch::channel(None);
        let splitter = split_jpegs(child_out, frames_tx);

        Ok(Box::new(FfmpegSource {
            camera_id: camera.id.clone(),
            _child: child,
            frames,
            splitter,
            read_timeout: self.settings.read_timeout,
        }))
    }
}

struct FfmpegSource {
    camera_id: String,
    //killed on drop
    _child: Child,
    frames: watch::Receiver<Option<Bytes>>,
    splitter: JoinHandle<()>,
    read_timeout: Duration,
}

#[async_trait]
impl FrameSource for FfmpegSource {
    async fn read_frame(&mut self) -> Result<Bytes> {
        match timeout(self.read_timeout, self.frames.changed()).await {
            Err(_) => return Err(WatchpostError::CaptureTimeout(self.read_timeout)),
            Ok(Err(_)) => return Err(WatchpostError::StreamEnded),
            Ok(Ok(())) => {}
        }
        let frame = self.frames.borrow_and_update().clone();
        frame.ok_or(WatchpostError::StreamEnded)
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.splitter.abort();
        debug!(camera_id = %self.camera_id, "capture session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtsp_sources_use_tcp() {
        let args = FfmpegSettings::default().args("rtsp://10.0.0.5:554/live");
        let joined = args.join(" ");
        assert!(joined.contains("-rtsp_transport tcp"));
        assert!(joined.contains("-i rtsp://10.0.0.5:554/live"));
        assert!(joined.ends_with("-f image2pipe -vcodec mjpeg -q:v 5 -r 10 -"));
    }

    #[test]
    fn file_sources_skip_rtsp_flags() {
        let args = FfmpegSettings::default().args("/videos/lobby.mp4");
        assert!(!args.iter().any(|a| a == "-rtsp_transport"));
    }

    #[tokio::test]
    async fn missing_ffmpeg_fails_open() {
        let capture = FfmpegCapture::new(FfmpegSettings {
            program: "watchpost-missing-ffmpeg".to_owned(),
            ..Default::default()
        });
        let res = capture.open(&Camera::new("c1", "rtsp://nowhere/live", true)).await;
        assert!(matches!(res, Err(WatchpostError::Capture(_))));
    }

    #[tokio::test]
    async fn ended_stream_is_a_read_failure() {
        //`true` exits immediately with empty stdout
        let capture = FfmpegCapture::new(FfmpegSettings {
            program: "true".to_owned(),
            read_timeout: Duration::from_secs(5),
            ..Default::default()
        });
        let Ok(mut source) = capture.open(&Camera::new("c1", "rtsp://nowhere/live", true)).await
        else {
            //no coreutils on this machine
            return;
        };
        let res = source.read_frame().await;
        assert!(matches!(res, Err(WatchpostError::StreamEnded)));
    }
}
