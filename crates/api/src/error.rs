//! HTTP error mapping.
//!
//! Provider and storage internals never leak to clients; they are
//! logged here and surfaced as a generic 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use pollstake_gateway::GatewayError;
use pollstake_settlement::SettlementError;
use pollstake_store::StoreError;
use pollstake_wallet::WalletError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("authentication required")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("internal error")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            StoreError::OptionOutOfRange { .. } | StoreError::InsufficientBalance { .. } => {
                ApiError::BadRequest(e.to_string())
            }
            StoreError::ReadError(_) | StoreError::WriteError(_) | StoreError::ParseError(_) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::MissingSignature => ApiError::BadRequest(e.to_string()),
            GatewayError::SignatureInvalid => ApiError::Forbidden(e.to_string()),
            GatewayError::InvalidAmount(_) | GatewayError::MalformedPayload(_) => {
                ApiError::BadRequest(e.to_string())
            }
            GatewayError::ProviderUnavailable(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<SettlementError> for ApiError {
    fn from(e: SettlementError) -> Self {
        match e {
            SettlementError::Store(inner) => inner.into(),
            SettlementError::Gateway(inner) => inner.into(),
            SettlementError::InvalidState(m) | SettlementError::InvalidAmount(m) => {
                ApiError::BadRequest(m)
            }
            SettlementError::AlreadyDeclared(_) => ApiError::BadRequest(e.to_string()),
        }
    }
}

impl From<WalletError> for ApiError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::Store(inner) => inner.into(),
            WalletError::Forbidden(m) => ApiError::Forbidden(m),
            WalletError::InvalidState(m) | WalletError::InvalidAmount(m) => ApiError::BadRequest(m),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m),
            ApiError::Internal(detail) => {
                error!(detail = %detail, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".into())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
