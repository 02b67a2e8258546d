use axum::routing::post;
use axum::Router;

use crate::handlers::prompts;
use crate::state::AppState;

/// Prompt routes mounted at `/prompts`.
///
/// ```text
/// POST /analyze     -> analyze
/// POST /optimize    -> optimize
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/analyze", post(prompts::analyze))
        .route("/optimize", post(prompts::optimize))
}
