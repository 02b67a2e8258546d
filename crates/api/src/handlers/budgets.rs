//! Handlers for per-user budget accounts.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use veostudio_core::budget::BudgetAccount;
use veostudio_core::money::Money;
use veostudio_core::types::UserId;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SetLimitRequest {
    /// New limit in dollars.
    pub limit: Money,
}

#[derive(Debug, Serialize)]
pub struct BudgetView {
    #[serde(flatten)]
    pub account: BudgetAccount,
    pub remaining: Money,
}

impl From<BudgetAccount> for BudgetView {
    fn from(account: BudgetAccount) -> Self {
        Self {
            remaining: account.remaining(),
            account,
        }
    }
}

/// `GET /budgets/{user_id}`. Accounts are opened with the default limit on
/// first access.
pub async fn get_budget(
    State(state): State<AppState>,
    user_id: Result<Path<UserId>, PathRejection>,
) -> AppResult<impl IntoResponse> {
    let Path(user_id) = user_id?;
    let account = state.admission.budget(user_id).await?;
    Ok(Json(DataResponse {
        data: BudgetView::from(account),
    }))
}

/// `PUT /budgets/{user_id}`. Spending so far in the period is kept.
pub async fn set_limit(
    State(state): State<AppState>,
    user_id: Result<Path<UserId>, PathRejection>,
    body: Result<Json<SetLimitRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Path(user_id) = user_id?;
    let Json(request) = body?;
    let account = state.admission.set_limit(user_id, request.limit).await?;
    Ok(Json(DataResponse {
        data: BudgetView::from(account),
    }))
}
