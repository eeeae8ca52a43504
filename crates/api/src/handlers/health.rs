use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::routes::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let stopping = state.dispatcher.queue().is_shutting_down().await;
    Json(json!({
        "status": if stopping { "stopping" } else { "ok" },
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "recycler",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
