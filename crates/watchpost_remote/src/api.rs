//! Client for the backend API: the camera directory and the event sink.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;
use watchpost_core::{
    error::{Result, WatchpostError},
    Camera, CameraDirectory, Event, EventSink,
};

use crate::{build_client, join_url};

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.to_owned(),
        })
    }
}

#[async_trait]
impl CameraDirectory for ApiClient {
    ///`GET {API_URL}/cameras`. Inactive cameras are returned too; filtering is the caller's job.
    async fn list_cameras(&self) -> Result<Vec<Camera>> {
        let url = join_url(&self.base_url, "cameras");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| WatchpostError::directory(format!("GET {}: {}", url, err)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(WatchpostError::directory(format!("GET {} returned {}", url, status)));
        }

        let cameras: Vec<Camera> = resp
            .json()
            .await
            .map_err(|err| WatchpostError::directory(format!("bad camera list: {}", err)))?;
        debug!("directory returned {} cameras", cameras.len());
        Ok(cameras)
    }
}

#[async_trait]
impl EventSink for ApiClient {
    ///`POST {API_URL}/events`. Only `201 Created` counts as delivered.
    async fn send(&self, event: &Event) -> Result<()> {
        let url = join_url(&self.base_url, "events");
        let resp = self
            .client
            .post(&url)
            .json(event)
            .send()
            .await
            .map_err(|err| WatchpostError::event_sink(format!("POST {}: {}", url, err)))?;

        match resp.status() {
            StatusCode::CREATED => Ok(()),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(WatchpostError::event_sink(format!(
                    "POST {} returned {}: {}",
                    url, status, body
                )))
            }
        }
    }
}
