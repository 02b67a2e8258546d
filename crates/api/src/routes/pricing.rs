use axum::routing::get;
use axum::Router;

use crate::handlers::estimates;
use crate::state::AppState;

/// Pricing routes mounted at `/pricing`.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(estimates::pricing_sheet))
}
