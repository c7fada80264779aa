use std::{
    net::{SocketAddr, ToSocketAddrs},
    time::Duration,
};

use config_rs::{builder::DefaultState, Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use watchpost_capture::FfmpegSettings;
use watchpost_core::{
    error::{Result, WatchpostError},
    EventType, TargetClass,
};
use watchpost_fleet::WorkerSettings;
use watchpost_remote::object_store::{ObjectStoreSettings, DEFAULT_REGION};

///Service configuration. Every key has a default; a YAML file given on the command line overrides
///the defaults and environment variables (`API_URL`, `PORT`, ...) override both.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchpostConfig {
    pub api_url: String,
    pub detector_url: String,
    ///`access:secret@` carries the signing credentials, `https` makes the connection secure
    pub object_store_url: String,
    pub object_store_bucket: String,
    pub object_store_region: String,
    pub host: String,
    pub port: u16,
    pub sync_interval_secs: u64,
    pub alert_cooldown_secs: u64,
    ///COCO class name or numeric id
    pub target_class: String,
    pub event_type: EventType,
    pub retry_backoff_secs: u64,
    pub capture_fps: u32,
    pub capture_read_timeout_secs: u64,
    pub ffmpeg_path: String,
    pub stream_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub shutdown_grace_secs: u64,
}

impl Default for WatchpostConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3001".to_owned(),
            detector_url: "http://localhost:8001".to_owned(),
            object_store_url: "http://localhost:9000".to_owned(),
            object_store_bucket: "snapshots".to_owned(),
            object_store_region: DEFAULT_REGION.to_owned(),
            host: "0.0.0.0".to_owned(),
            port: 8000,
            sync_interval_secs: 30,
            alert_cooldown_secs: 10,
            target_class: "person".to_owned(),
            event_type: EventType::Intrusion,
            retry_backoff_secs: 5,
            capture_fps: 10,
            capture_read_timeout_secs: 10,
            ffmpeg_path: "ffmpeg".to_owned(),
            stream_interval_ms: 50,
            request_timeout_secs: 10,
            shutdown_grace_secs: 5,
        }
    }
}

impl WatchpostConfig {
    pub fn load(file: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(File::with_name(file));
        }
        builder = builder.add_source(Environment::default().try_parsing(true));
        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config: Self = builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|err| WatchpostError::config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (key, url) in [
            ("api_url", &self.api_url),
            ("detector_url", &self.detector_url),
            ("object_store_url", &self.object_store_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(WatchpostError::config(format!(
                    "{} must be an http(s) url, got '{}'",
                    key, url
                )));
            }
        }

        //zero would spin or panic the timers these feed
        for (key, value) in [
            ("sync_interval_secs", self.sync_interval_secs),
            ("retry_backoff_secs", self.retry_backoff_secs),
            ("capture_fps", u64::from(self.capture_fps)),
            ("capture_read_timeout_secs", self.capture_read_timeout_secs),
            ("stream_interval_ms", self.stream_interval_ms),
            ("request_timeout_secs", self.request_timeout_secs),
        ] {
            if value == 0 {
                return Err(WatchpostError::config(format!("{} must be positive", key)));
            }
        }

        if self.object_store_bucket.is_empty() {
            return Err(WatchpostError::config("object_store_bucket is empty"));
        }
        if self.object_store_region.is_empty() {
            return Err(WatchpostError::config("object_store_region is empty"));
        }
        self.object_store_settings()?;
        TargetClass::parse(&self.target_class)?;
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| WatchpostError::config(format!("cannot resolve host '{}'", self.host)))
    }

    pub fn worker_settings(&self) -> Result<WorkerSettings> {
        Ok(WorkerSettings {
            target_class: TargetClass::parse(&self.target_class)?,
            cooldown: Duration::from_secs(self.alert_cooldown_secs),
            retry_backoff: Duration::from_secs(self.retry_backoff_secs),
        })
    }

    pub fn object_store_settings(&self) -> Result<ObjectStoreSettings> {
        Ok(ObjectStoreSettings::from_server_url(&self.object_store_url)?
            .with_region(&self.object_store_region))
    }

    pub fn ffmpeg_settings(&self) -> FfmpegSettings {
        FfmpegSettings {
            program: self.ffmpeg_path.clone(),
            fps: self.capture_fps,
            read_timeout: Duration::from_secs(self.capture_read_timeout_secs),
            ..Default::default()
        }
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn stream_interval(&self) -> Duration {
        Duration::from_millis(self.stream_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
