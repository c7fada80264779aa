pub(crate) mod mjpeg_stream;
pub(crate) mod status;

use axum::{routing::get, Router};

use crate::server::state::AppState;

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(status::root))
        .route("/health", get(status::health))
        .route("/cameras", get(status::cameras))
        .route("/stream/:camera_id", get(mjpeg_stream::stream))
}
