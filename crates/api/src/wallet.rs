//! Wallet and withdrawal endpoints.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use pollstake_core::{WithdrawalRequest, WithdrawalStatus};
use pollstake_wallet::WalletSummary;

use crate::auth::{require_admin, require_user};
use crate::error::ApiError;
use crate::AppState;

pub async fn wallet_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<WalletSummary>, ApiError> {
    let user = require_user(state.auth.as_ref(), &headers).await?;
    Ok(Json(state.wallet.wallet_summary(&user.id).await?))
}

#[derive(Debug, Deserialize)]
pub struct WithdrawalBody {
    pub amount: i64,
}

pub async fn request_withdrawal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<WithdrawalBody>,
) -> Result<Json<WithdrawalRequest>, ApiError> {
    let user = require_user(state.auth.as_ref(), &headers).await?;
    let request = state.wallet.request_withdrawal(&user.id, body.amount).await?;
    Ok(Json(request))
}

#[derive(Debug, Deserialize)]
pub struct ReviewBody {
    pub status: WithdrawalStatus,
}

pub async fn review_withdrawal(
    State(state): State<AppState>,
    Path(withdrawal_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<ReviewBody>,
) -> Result<Json<WithdrawalRequest>, ApiError> {
    require_admin(state.auth.as_ref(), &headers).await?;
    let request = state
        .wallet
        .review_withdrawal(&withdrawal_id, body.status)
        .await?;
    Ok(Json(request))
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<WithdrawalRequest>>, ApiError> {
    require_admin(state.auth.as_ref(), &headers).await?;
    Ok(Json(state.wallet.list_withdrawals().await))
}
