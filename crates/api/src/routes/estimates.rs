use axum::routing::post;
use axum::Router;

use crate::handlers::estimates;
use crate::state::AppState;

/// Estimate routes mounted at `/estimates`.
///
/// ```text
/// POST /        -> estimate
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(estimates::estimate))
}
