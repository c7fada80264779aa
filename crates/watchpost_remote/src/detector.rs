//! Detection service client.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::time::Duration;
use watchpost_core::{
    error::{Result, WatchpostError},
    Detection, DetectionResult, Detector,
};

use crate::{build_client, join_url};

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: Vec<Detection>,
}

///Posts each frame to `{DETECTOR_URL}/detect` and draws the returned boxes locally.
///
///Expected response: `{"detections":[{"bbox":[x1,y1,x2,y2],"conf":0.92,"class":0}]}`
pub struct HttpDetector {
    client: reqwest::Client,
    url: String,
}

impl HttpDetector {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            url: join_url(base_url, "detect"),
        })
    }
}

#[async_trait]
impl Detector for HttpDetector {
    async fn detect(&self, frame: Bytes) -> Result<DetectionResult> {
        let resp = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "image/jpeg")
            .body(frame.clone())
            .send()
            .await
            .map_err(|err| WatchpostError::detection(format!("POST {}: {}", self.url, err)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(WatchpostError::detection(format!(
                "POST {} returned {}",
                self.url, status
            )));
        }

        let DetectResponse { detections } = resp
            .json()
            .await
            .map_err(|err| WatchpostError::detection(format!("bad detector response: {}", err)))?;

        if detections.is_empty() {
            return Ok(DetectionResult {
                detections,
                annotated: frame,
            });
        }

        tokio::task::spawn_blocking(move || {
            let annotated = watchpost_capture::annotate(&frame, &detections)?;
            Ok(DetectionResult {
                detections,
                annotated,
            })
        })
        .await
        .map_err(|err| WatchpostError::detection(format!("annotation task failed: {}", err)))?
    }
}
