use axum::routing::get;
use axum::Router;

use crate::handlers::budgets;
use crate::state::AppState;

/// Budget routes mounted at `/budgets`.
///
/// ```text
/// GET /{user_id}    -> get_budget
/// PUT /{user_id}    -> set_limit
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{user_id}", get(budgets::get_budget).put(budgets::set_limit))
}
