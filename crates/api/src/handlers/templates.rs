//! Handlers for product prompt templates, saved templates and the
//! prompting guide.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use veostudio_core::templates::{self, NewSavedTemplate, ProductBrief, BEST_PRACTICES};
use veostudio_core::types::DbId;

use crate::error::AppResult;
use crate::query::ListTemplatesParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// `GET /templates/{product_type}`. Unknown categories fall back to the
/// electronics template with `fallback: true`.
pub async fn get_template(
    product_type: Result<Path<String>, PathRejection>,
) -> AppResult<impl IntoResponse> {
    let Path(product_type) = product_type?;
    Ok(Json(DataResponse {
        data: templates::product_template(&product_type),
    }))
}

/// `POST /templates/build`
pub async fn build_prompt(
    body: Result<Json<ProductBrief>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(brief) = body?;
    let formatted = templates::build_product_prompt(&brief)?;
    Ok(Json(DataResponse { data: formatted }))
}

// ---------------------------------------------------------------------------
// Saved templates
// ---------------------------------------------------------------------------

/// `POST /templates/saved`
pub async fn save_template(
    State(state): State<AppState>,
    body: Result<Json<NewSavedTemplate>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(new) = body?;
    let template = state.templates.save(new).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: template })))
}

/// `GET /templates/saved?product_type=`
pub async fn list_saved(
    State(state): State<AppState>,
    params: Result<Query<ListTemplatesParams>, QueryRejection>,
) -> AppResult<impl IntoResponse> {
    let Query(params) = params?;
    let templates = state
        .templates
        .list(params.product_type.as_deref(), params.page())
        .await?;
    Ok(Json(DataResponse { data: templates }))
}

/// `GET /templates/saved/{id}`. Each load counts as one use.
pub async fn load_saved(
    State(state): State<AppState>,
    id: Result<Path<DbId>, PathRejection>,
) -> AppResult<impl IntoResponse> {
    let Path(id) = id?;
    let template = state.templates.load(id).await?;
    Ok(Json(DataResponse { data: template }))
}

// ---------------------------------------------------------------------------
// GET /best-practices
// ---------------------------------------------------------------------------

pub async fn best_practices() -> impl IntoResponse {
    Json(DataResponse {
        data: BEST_PRACTICES,
    })
}
