use std::convert::Infallible;

use axum::{
    body::StreamBody,
    extract::{Path, State},
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    response::IntoResponse,
};
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::IntervalStream;
use tracing::debug;

use crate::server::state::AppState;

pub(crate) const BOUNDARY: &str = "frame";

///One multipart part: boundary line, part headers, the jpeg, trailing CRLF.
fn as_part(frame: &[u8]) -> Bytes {
    let head = format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY,
        frame.len()
    );
    let mut part = BytesMut::with_capacity(head.len() + frame.len() + 2);
    part.extend_from_slice(head.as_bytes());
    part.extend_from_slice(frame);
    part.extend_from_slice(b"\r\n");
    part.freeze()
}

struct Viewer {
    camera_id: String,
}

impl Drop for Viewer {
    fn drop(&mut self) {
        debug!(camera_id = %self.camera_id, "viewer disconnected");
    }
}

///Emits the camera's latest frame, or the placeholder, once per `frame_interval` until the
///client goes away or the server shuts down. The cache is sampled on every tick, so a camera
///that starts publishing mid-stream switches over without a reconnect.
fn as_mjpeg_stream(state: AppState, camera_id: String) -> impl Stream<Item = Result<Bytes, Infallible>> {
    let mut ticks = tokio::time::interval(state.frame_interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = state.shutdown.clone();
    let viewer = Viewer {
        camera_id: camera_id.clone(),
    };

    IntervalStream::new(ticks)
        .map(move |_| {
            let _viewer = &viewer;
            Ok(as_part(&state.frame_for(&camera_id)))
        })
        .take_until(async move { shutdown.cancelled().await })
}

pub(crate) async fn stream(
    Path(camera_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    debug!(camera_id = %camera_id, "viewer connected");
    let body = StreamBody::new(as_mjpeg_stream(state, camera_id));
    (
        [
            (
                CONTENT_TYPE,
                format!("multipart/x-mixed-replace; boundary={}", BOUNDARY),
            ),
            (CACHE_CONTROL, "no-cache".to_owned()),
        ],
        body,
    )
}
