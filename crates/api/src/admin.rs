//! Admin plane: poll CRUD, result declaration, KYC review, settings,
//! and ledger views. KYC submission lives here too since review is the
//! other half of the same flow.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use pollstake_core::{
    new_id, now_ts, KycStatus, PaymentStatus, Poll, PollOption, PollStatus, Settings,
    Transaction, TransactionKind, WithdrawalStatus,
};
use pollstake_settlement::views;

use crate::auth::{require_admin, require_user};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePollBody {
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub options: Vec<String>,
    /// Price per vote in paise.
    pub vote_price: i64,
    pub end_at: i64,
}

pub async fn create_poll(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreatePollBody>,
) -> Result<Json<Poll>, ApiError> {
    let admin = require_admin(state.auth.as_ref(), &headers).await?;
    if body.options.len() < 2 {
        return Err(ApiError::BadRequest("a poll needs at least two options".into()));
    }
    if body.vote_price <= 0 {
        return Err(ApiError::BadRequest("vote_price must be positive".into()));
    }

    let poll = Poll {
        id: new_id(),
        title: body.title,
        description: body.description.unwrap_or_default(),
        image_url: body.image_url.unwrap_or_default(),
        options: body.options.into_iter().map(PollOption::new).collect(),
        vote_price: body.vote_price,
        end_at: body.end_at,
        status: PollStatus::Active,
        winning_option: None,
        created_by: admin.id,
        created_at: now_ts(),
        result_declared_at: None,
    };
    let stored = poll.clone();
    state
        .store
        .write(move |s| {
            s.polls.insert(stored.id.clone(), stored);
            Ok::<_, ApiError>(())
        })
        .await?;
    info!(poll_id = %poll.id, "poll created");
    Ok(Json(poll))
}

#[derive(Debug, Deserialize)]
pub struct UpdatePollBody {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    /// Replacement option names. Existing tallies are kept by position;
    /// extra names append as fresh options.
    pub options: Option<Vec<String>>,
    pub vote_price: Option<i64>,
    pub end_at: Option<i64>,
}

pub async fn update_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<UpdatePollBody>,
) -> Result<Json<Poll>, ApiError> {
    require_admin(state.auth.as_ref(), &headers).await?;
    let updated = state
        .store
        .write(move |s| {
            let poll = s.poll_mut(&poll_id)?;
            if poll.status != PollStatus::Active {
                return Err(ApiError::BadRequest(format!(
                    "poll {poll_id} result already declared"
                )));
            }
            if let Some(title) = body.title {
                poll.title = title;
            }
            if let Some(description) = body.description {
                poll.description = description;
            }
            if let Some(image_url) = body.image_url {
                poll.image_url = image_url;
            }
            if let Some(vote_price) = body.vote_price {
                if vote_price <= 0 {
                    return Err(ApiError::BadRequest("vote_price must be positive".into()));
                }
                poll.vote_price = vote_price;
            }
            if let Some(end_at) = body.end_at {
                poll.end_at = end_at;
            }
            if let Some(names) = body.options {
                if names.len() < poll.options.len() {
                    return Err(ApiError::BadRequest(
                        "options with recorded votes cannot be removed".into(),
                    ));
                }
                for (index, name) in names.into_iter().enumerate() {
                    match poll.options.get_mut(index) {
                        Some(option) => option.name = name,
                        None => poll.options.push(PollOption::new(name)),
                    }
                }
            }
            Ok(poll.clone())
        })
        .await?;
    Ok(Json(updated))
}

pub async fn delete_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_admin(state.auth.as_ref(), &headers).await?;
    state
        .store
        .write(move |s| {
            s.poll(&poll_id)?;
            if s.votes.values().any(|v| v.poll_id == poll_id) {
                return Err(ApiError::BadRequest(
                    "polls with recorded votes cannot be deleted".into(),
                ));
            }
            s.polls.remove(&poll_id);
            info!(poll_id = %poll_id, "poll deleted");
            Ok(())
        })
        .await?;
    Ok(Json(json!({ "status": "deleted" })))
}

#[derive(Debug, Deserialize)]
pub struct SetResultParams {
    pub winning_option_index: usize,
}

pub async fn set_result(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    headers: HeaderMap,
    Query(params): Query<SetResultParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_admin(state.auth.as_ref(), &headers).await?;
    let summary = state
        .engine
        .declare_result(&poll_id, params.winning_option_index)
        .await?;
    Ok(Json(json!({
        "status": "declared",
        "winners": summary.winners,
        "losers": summary.losers,
        "distributed": summary.distributed,
    })))
}

pub async fn result_stats(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<views::ResultStats>, ApiError> {
    require_admin(state.auth.as_ref(), &headers).await?;
    let stats = views::result_stats(&state.store, &poll_id).await?;
    Ok(Json(stats))
}

#[derive(Debug, Deserialize)]
pub struct KycSubmitBody {
    pub upi_id: Option<String>,
}

/// Flag the caller's account for KYC review. Document collection and
/// verification happen outside this service; the ledger only tracks
/// the review status.
pub async fn submit_kyc(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<KycSubmitBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let caller = require_user(state.auth.as_ref(), &headers).await?;
    state
        .store
        .write(move |s| {
            let user = s.user_mut(&caller.id)?;
            if user.kyc_status == KycStatus::Approved {
                return Err(ApiError::BadRequest("KYC already approved".into()));
            }
            user.kyc_status = KycStatus::Pending;
            if let Some(upi_id) = body.upi_id {
                user.upi_id = Some(upi_id);
            }
            Ok(())
        })
        .await?;
    Ok(Json(json!({ "status": "pending" })))
}

async fn review_kyc(
    state: &AppState,
    user_id: String,
    decision: KycStatus,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .store
        .write(move |s| {
            let user = s.user_mut(&user_id)?;
            if user.kyc_status != KycStatus::Pending {
                return Err(ApiError::BadRequest(format!(
                    "user {user_id} has no pending KYC submission"
                )));
            }
            user.kyc_status = decision;
            info!(user_id = %user_id, decision = ?decision, "kyc reviewed");
            Ok(())
        })
        .await?;
    Ok(Json(json!({ "status": "reviewed" })))
}

pub async fn approve_kyc(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_admin(state.auth.as_ref(), &headers).await?;
    review_kyc(&state, user_id, KycStatus::Approved).await
}

pub async fn reject_kyc(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_admin(state.auth.as_ref(), &headers).await?;
    review_kyc(&state, user_id, KycStatus::Rejected).await
}

/// Charges shown at checkout; safe for unauthenticated reads.
pub async fn public_settings(
    State(state): State<AppState>,
) -> Result<Json<Settings>, ApiError> {
    let settings = state
        .store
        .write(|s| Ok::<_, ApiError>(s.settings_or_default()))
        .await?;
    Ok(Json(settings))
}

pub async fn update_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(settings): Json<Settings>,
) -> Result<Json<Settings>, ApiError> {
    require_admin(state.auth.as_ref(), &headers).await?;
    state
        .store
        .write(move |s| {
            s.update_settings(settings);
            Ok::<_, ApiError>(())
        })
        .await?;
    info!(
        gateway_bps = settings.payment_gateway_charge_bps,
        withdrawal_bps = settings.withdrawal_charge_bps,
        "settings updated"
    );
    Ok(Json(settings))
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

pub async fn transactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<PageParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_admin(state.auth.as_ref(), &headers).await?;
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(50).clamp(1, 200);

    let (total, entries) = state
        .store
        .read(|s| {
            let mut all: Vec<Transaction> = s.transactions.clone();
            all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            let total = all.len();
            let entries: Vec<Transaction> =
                all.into_iter().skip((page - 1).saturating_mul(limit)).take(limit).collect();
            (total, entries)
        })
        .await;
    Ok(Json(json!({
        "total": total,
        "page": page,
        "limit": limit,
        "transactions": entries,
    })))
}

pub async fn dashboard_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_admin(state.auth.as_ref(), &headers).await?;
    let stats = state
        .store
        .read(|s| {
            let active_polls = s
                .polls
                .values()
                .filter(|p| p.status == PollStatus::Active)
                .count();
            let total_collected: i64 = s
                .transactions
                .iter()
                .filter(|t| t.kind == TransactionKind::Vote)
                .map(|t| t.amount + t.gateway_charge.unwrap_or(0))
                .sum();
            let total_distributed: i64 = s
                .transactions
                .iter()
                .filter(|t| t.kind == TransactionKind::Winning)
                .map(|t| t.amount)
                .sum();
            let pending_orders = s
                .orders
                .values()
                .filter(|o| o.payment_status == PaymentStatus::Pending)
                .count();
            let pending_withdrawals = s
                .withdrawals
                .values()
                .filter(|w| w.status == WithdrawalStatus::Pending)
                .count();
            json!({
                "total_users": s.users.len(),
                "total_polls": s.polls.len(),
                "active_polls": active_polls,
                "total_collected": total_collected,
                "total_distributed": total_distributed,
                "pending_orders": pending_orders,
                "pending_withdrawals": pending_withdrawals,
            })
        })
        .await;
    Ok(Json(stats))
}
