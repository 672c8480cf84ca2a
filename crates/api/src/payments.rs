//! Payment flow: order creation, verification polling, and the
//! provider webhook.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use pollstake_core::PaymentStatus;
use pollstake_settlement::SettleOutcome;

use crate::auth::require_user;
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateOrderBody {
    pub poll_id: String,
    pub option_index: usize,
    pub num_votes: u64,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub provider_ref: String,
    pub checkout_url: String,
    pub amount: i64,
    pub base_amount: i64,
    pub gateway_charge: i64,
}

pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateOrderBody>,
) -> Result<Json<OrderResponse>, ApiError> {
    let user = require_user(state.auth.as_ref(), &headers).await?;
    let order = state
        .orders
        .create_order(&user.id, &body.poll_id, body.option_index, body.num_votes)
        .await?;
    Ok(Json(OrderResponse {
        order_id: order.id,
        provider_ref: order.provider_ref,
        checkout_url: order.checkout_url,
        amount: order.total_amount,
        base_amount: order.base_amount,
        gateway_charge: order.gateway_charge,
    }))
}

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    pub order_id: String,
}

/// Poll the provider and settle if the payment went through. Pending
/// and failed payments are ordinary 200 responses so the frontend can
/// keep polling or stop.
pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<VerifyParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_user(state.auth.as_ref(), &headers).await?;
    let (status, outcome) = state.engine.verify_order(&params.order_id).await?;
    let message = match (status, outcome) {
        (PaymentStatus::Success, SettleOutcome::Settled) => "payment verified, votes recorded",
        (PaymentStatus::Success, _) => "payment already verified",
        (PaymentStatus::Failed, _) => "payment failed",
        (PaymentStatus::Pending, _) => "payment pending",
    };
    Ok(Json(json!({ "status": status, "message": message })))
}

fn outcome_label(outcome: SettleOutcome) -> &'static str {
    match outcome {
        SettleOutcome::Settled => "settled",
        SettleOutcome::AlreadySettled => "already_settled",
        SettleOutcome::MarkedFailed => "marked_failed",
        SettleOutcome::Ignored => "ignored",
    }
}

/// Provider callback. The raw body is verified against the provider's
/// signature header before anything is parsed; a missing header is a
/// 400 and a bad signature a 403, both without touching state.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let signature = headers
        .get(state.provider.signature_header())
        .and_then(|v| v.to_str().ok());
    let result = state.engine.handle_webhook(&body, signature).await?;
    info!(event = %result.event_type, outcome = outcome_label(result.outcome), "webhook processed");
    Ok(Json(json!({
        "status": "ok",
        "event": result.event_type,
        "outcome": outcome_label(result.outcome),
    })))
}
