use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    store_healthy: bool,
    /// Entries waiting or leased; `null` when the queue could not be read.
    queue_depth: Option<u64>,
}

/// `200` with `status: "degraded"` when the generation store is unreachable,
/// so load balancers can tell "up but impaired" from "down".
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let health = state.admission.health().await;

    Json(HealthResponse {
        status: if health.store_ok { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        store_healthy: health.store_ok,
        queue_depth: health.queue_depth,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
