//! Handlers for prompt analysis and optimization.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use veostudio_core::context::TaskType;
use veostudio_core::prompt::{self, OptimizedPrompt};
use veostudio_core::types::{DbId, UserId};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct OptimizeRequest {
    pub prompt: String,
    /// When set, the user's cached context is applied as it would be at
    /// submission.
    pub user_id: Option<UserId>,
    pub project_id: Option<DbId>,
}

#[derive(Debug, Serialize)]
pub struct OptimizeResponse {
    #[serde(flatten)]
    pub optimized: OptimizedPrompt,
    pub tokens_saved: u32,
    pub context_applied: bool,
}

/// `POST /prompts/analyze`: issues, warnings and recommendations. Never
/// rejects the prompt itself.
pub async fn analyze(body: Result<Json<AnalyzeRequest>, JsonRejection>) -> AppResult<impl IntoResponse> {
    let Json(request) = body?;
    Ok(Json(DataResponse {
        data: prompt::analyze_prompt(&request.prompt),
    }))
}

/// `POST /prompts/optimize`
pub async fn optimize(
    State(state): State<AppState>,
    body: Result<Json<OptimizeRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(request) = body?;

    let context = match request.user_id {
        Some(user_id) => {
            state
                .admission
                .context()
                .get_context(user_id, TaskType::PromptOptimization, request.project_id)
                .await
        }
        None => String::new(),
    };
    let optimized = prompt::optimize(&request.prompt, &context)?;

    Ok(Json(DataResponse {
        data: OptimizeResponse {
            tokens_saved: optimized.tokens_saved(),
            context_applied: !context.is_empty(),
            optimized,
        },
    }))
}
