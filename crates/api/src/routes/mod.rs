pub mod budgets;
pub mod estimates;
pub mod generations;
pub mod health;
pub mod pricing;
pub mod prompts;
pub mod templates;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /generations                     submit (POST), list by user (GET)
/// /generations/{id}                status polling view
///
/// /estimates                       cost estimate with breakdown (POST)
/// /pricing                         pricing sheet
///
/// /prompts/analyze                 validation report (POST)
/// /prompts/optimize                optimized prompt + token counts (POST)
///
/// /templates/{product_type}        product template lookup
/// /templates/build                 five-part product prompt (POST)
/// /templates/saved                 save (POST), list (GET)
/// /templates/saved/{id}            load a saved template
/// /best-practices                  prompting guide
///
/// /budgets/{user_id}               account view (GET), set limit (PUT)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/generations", generations::router())
        .nest("/estimates", estimates::router())
        .nest("/pricing", pricing::router())
        .nest("/prompts", prompts::router())
        .nest("/templates", templates::router())
        .route("/best-practices", get(handlers::templates::best_practices))
        .nest("/budgets", budgets::router())
}
