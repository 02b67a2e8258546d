use axum::routing::{get, post};
use axum::Router;

use crate::handlers::templates;
use crate::state::AppState;

/// Template routes mounted at `/templates`.
///
/// ```text
/// POST /build             -> build_prompt
/// POST /saved             -> save_template
/// GET  /saved             -> list_saved (?product_type=&limit=&offset=)
/// GET  /saved/{id}        -> load_saved
/// GET  /{product_type}    -> get_template
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/build", post(templates::build_prompt))
        .route(
            "/saved",
            get(templates::list_saved).post(templates::save_template),
        )
        .route("/saved/{id}", get(templates::load_saved))
        .route("/{product_type}", get(templates::get_template))
}
