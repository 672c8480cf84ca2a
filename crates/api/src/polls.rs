//! Public poll reads.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;

use pollstake_settlement::views::{self, MyPollEntry, PollOverview};

use crate::auth::{optional_user, require_user};
use crate::error::ApiError;
use crate::AppState;

pub async fn list_polls(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<PollOverview>>, ApiError> {
    let user = optional_user(state.auth.as_ref(), &headers).await;
    let user_id = user.as_ref().map(|u| u.id.as_str());
    let mut overviews = Vec::new();
    for poll in views::list_polls(&state.store).await {
        overviews.push(views::poll_overview(&state.store, &poll.id, user_id).await?);
    }
    Ok(Json(overviews))
}

pub async fn get_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<PollOverview>, ApiError> {
    let user = optional_user(state.auth.as_ref(), &headers).await;
    let user_id = user.as_ref().map(|u| u.id.as_str());
    let overview = views::poll_overview(&state.store, &poll_id, user_id).await?;
    Ok(Json(overview))
}

pub async fn my_polls(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<MyPollEntry>>, ApiError> {
    let user = require_user(state.auth.as_ref(), &headers).await?;
    Ok(Json(views::my_polls(&state.store, &user.id).await))
}
