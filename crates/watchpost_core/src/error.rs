//!A mod for the error types
use std::time::Duration;

///Common result type for every external capability and fleet operation.
pub type Result<T> = std::result::Result<T, WatchpostError>;

///One variant per failure concern. None of these are fatal to the process except `Config`.
#[derive(Debug, thiserror::Error)]
pub enum WatchpostError {
    #[error("capture error: {0}")]
    Capture(String),

    #[error("capture read timed out after {0:?}")]
    CaptureTimeout(Duration),

    #[error("capture stream ended")]
    StreamEnded,

    #[error("detection error: {0}")]
    Detection(String),

    #[error("object store error: {0}")]
    Storage(String),

    #[error("event sink error: {0}")]
    EventSink(String),

    #[error("camera directory error: {0}")]
    Directory(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchpostError {
    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture(msg.into())
    }
    pub fn detection(msg: impl Into<String>) -> Self {
        Self::Detection(msg.into())
    }
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
    pub fn event_sink(msg: impl Into<String>) -> Self {
        Self::EventSink(msg.into())
    }
    pub fn directory(msg: impl Into<String>) -> Self {
        Self::Directory(msg.into())
    }
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
