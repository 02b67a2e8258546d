//! Handlers for submitting and polling generations.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use veostudio_core::generation::SubmitGenerationRequest;
use veostudio_core::types::DbId;

use crate::error::AppResult;
use crate::query::ListGenerationsParams;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// POST /generations
// ---------------------------------------------------------------------------

/// Admit a generation request.
///
/// `201 Created` for a new generation; `200 OK` with the existing one when
/// `request_id` was already used by the same user.
pub async fn submit(
    State(state): State<AppState>,
    body: Result<Json<SubmitGenerationRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(request) = body?;
    let admission = state.admission.submit(request).await?;

    let status = if admission.deduplicated {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((
        status,
        Json(DataResponse {
            data: admission.view,
        }),
    ))
}

// ---------------------------------------------------------------------------
// GET /generations/{id}
// ---------------------------------------------------------------------------

pub async fn get_status(
    State(state): State<AppState>,
    id: Result<Path<DbId>, PathRejection>,
) -> AppResult<impl IntoResponse> {
    let Path(id) = id?;
    let view = state.admission.status(id).await?;
    Ok(Json(DataResponse { data: view }))
}

// ---------------------------------------------------------------------------
// GET /generations?user_id=
// ---------------------------------------------------------------------------

/// A user's generations, newest first.
pub async fn list(
    State(state): State<AppState>,
    params: Result<Query<ListGenerationsParams>, QueryRejection>,
) -> AppResult<impl IntoResponse> {
    let Query(params) = params?;
    let views = state.admission.list(params.user_id, params.page()).await?;
    Ok(Json(DataResponse { data: views }))
}
