//!HTTP implementations of the external capabilities: the backend API (camera directory and event
//!sink), the object store that keeps alert snapshots, and the detection service.

pub mod api;
pub mod detector;
pub mod object_store;
pub mod sigv4;

pub use api::ApiClient;
pub use detector::HttpDetector;
pub use object_store::{HttpObjectStore, ObjectStoreSettings};

use std::time::Duration;
use watchpost_core::error::{Result, WatchpostError};

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| WatchpostError::config(format!("unable to build http client: {}", err)))
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(super::join_url("http://api:3001", "cameras"), "http://api:3001/cameras");
        assert_eq!(super::join_url("http://api:3001/", "/events"), "http://api:3001/events");
        assert_eq!(super::join_url("http://api/v1/", "cameras"), "http://api/v1/cameras");
    }
}
