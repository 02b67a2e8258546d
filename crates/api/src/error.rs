use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};
use veostudio_core::error::CoreError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Every variant renders as `{ "error": ..., "code": ... }`, with extra
/// fields for validation failures (`fields`) and budget rejections
/// (`shortfall`).
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `veostudio_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The request body, path or query string could not be decoded.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    error_body("NOT_FOUND", format!("{entity} with id {id} not found")),
                ),
                CoreError::InvalidRequest(fields) => {
                    let mut body = error_body("INVALID_REQUEST", core.to_string());
                    body["fields"] = json!(fields);
                    (StatusCode::BAD_REQUEST, body)
                }
                CoreError::InsufficientBudget { shortfall } => {
                    let mut body = error_body(
                        "INSUFFICIENT_BUDGET",
                        format!("Budget exceeded: short by {shortfall}"),
                    );
                    body["shortfall"] = json!(shortfall);
                    (StatusCode::PAYMENT_REQUIRED, body)
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, error_body("CONFLICT", msg.clone())),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        error_body("INTERNAL_ERROR", "An internal error occurred".to_string()),
                    )
                }
            },

            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                error_body("INVALID_REQUEST", msg.clone()),
            ),
        };

        (status, axum::Json(body)).into_response()
    }
}

fn error_body(code: &str, message: String) -> Value {
    json!({
        "error": message,
        "code": code,
    })
}
