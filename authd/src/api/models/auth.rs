//! Request and response bodies for the `/auth/v1` endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::engine::TokenPair,
    types::{AppId, SessionId, UserId},
};

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub user_id: UserId,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Client application the session is opened for
    pub app_id: AppId,
}

/// Body for both logout and refresh
#[derive(Deserialize, ToSchema)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TokenPairResponse {
    /// Signed access token, sent as `Authorization: Bearer <token>`
    pub access_token: String,
    /// Opaque single-use token for `/auth/v1/refresh`
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl From<TokenPair> for TokenPairResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            access_expires_at: pair.access_expires_at,
            refresh_expires_at: pair.refresh_expires_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LogoutResponse {
    /// False when the refresh token was never issued
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IsAdminResponse {
    pub user_id: UserId,
    pub is_admin: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidateSessionResponse {
    pub session_id: SessionId,
    pub active: bool,
}

/// Error body returned by every endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Stable error kind, e.g. `invalid_credentials`
    pub code: String,
    pub message: String,
}
