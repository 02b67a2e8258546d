use axum::routing::get;
use axum::Router;

use crate::handlers::generations;
use crate::state::AppState;

/// Generation routes mounted at `/generations`.
///
/// ```text
/// POST /        -> submit
/// GET  /        -> list (?user_id=&limit=&offset=)
/// GET  /{id}    -> get_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(generations::list).post(generations::submit))
        .route("/{id}", get(generations::get_status))
}
