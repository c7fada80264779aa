use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::server::state::AppState;

pub(crate) async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "online",
        "service": "watchpost",
        "active_cameras": state.status.count(),
    }))
}

//camera failures never show up here
pub(crate) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn cameras(State(state): State<AppState>) -> Json<Value> {
    let ids = state.status.managed_ids();
    let count = ids.len();
    Json(json!({ "cameras": ids, "count": count }))
}
