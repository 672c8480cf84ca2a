//! Token authentication boundary.
//!
//! Identity management lives outside this service; the API resolves
//! bearer tokens to user ids through a capability trait so deployments
//! can plug in their identity provider. `StaticTokenAuth` maps
//! configured tokens and is what the tests and single-node deployments
//! use.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;

use pollstake_core::Role;

use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub role: Role,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolve a bearer token to a user, or `None` if unknown.
    async fn authenticate(&self, token: &str) -> Option<AuthUser>;
}

/// Fixed token table resolved from configuration.
#[derive(Default)]
pub struct StaticTokenAuth {
    tokens: HashMap<String, AuthUser>,
}

impl StaticTokenAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, user_id: impl Into<String>, role: Role) -> Self {
        self.tokens.insert(
            token.into(),
            AuthUser {
                id: user_id.into(),
                role,
            },
        );
        self
    }
}

#[async_trait]
impl AuthProvider for StaticTokenAuth {
    async fn authenticate(&self, token: &str) -> Option<AuthUser> {
        self.tokens.get(token).cloned()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Resolve the calling user or fail with 401.
pub async fn require_user(
    auth: &dyn AuthProvider,
    headers: &HeaderMap,
) -> Result<AuthUser, ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::Unauthorized)?;
    auth.authenticate(token).await.ok_or(ApiError::Unauthorized)
}

/// Resolve the calling user if a valid token is present.
pub async fn optional_user(auth: &dyn AuthProvider, headers: &HeaderMap) -> Option<AuthUser> {
    let token = bearer_token(headers)?;
    auth.authenticate(token).await
}

/// Resolve the calling user and require the admin role.
pub async fn require_admin(
    auth: &dyn AuthProvider,
    headers: &HeaderMap,
) -> Result<AuthUser, ApiError> {
    let user = require_user(auth, headers).await?;
    if user.role != Role::Admin {
        return Err(ApiError::Forbidden("admin role required".into()));
    }
    Ok(user)
}
