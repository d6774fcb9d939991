use std::{future::Future, sync::LazyLock, time::Duration};

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use regex::Regex;

use crate::{
    AppState,
    api::models::auth::{
        ErrorResponse, IsAdminResponse, LoginRequest, LogoutResponse, RefreshTokenRequest, RegisterRequest, RegisterResponse,
        TokenPairResponse, ValidateSessionResponse,
    },
    auth::tokens::AccessClaims,
    config::PasswordConfig,
    errors::{Error, Result},
    types::{SessionId, UserId},
};

static EMAIL_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

/// Emails are stored and compared trimmed and lowercased.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    EMAIL_RE.as_ref().is_some_and(|re| re.is_match(email_normalized))
}

/// Normalize and check an email/password pair before it reaches the engine.
fn validate_credentials(email: &str, password: &str, rules: &PasswordConfig) -> Result<String> {
    let email = normalize_email(email);
    if !valid_email(&email) {
        return Err(Error::invalid_argument("Invalid email address"));
    }

    let length = password.chars().count();
    if length < rules.min_length {
        return Err(Error::invalid_argument(format!(
            "Password must be at least {} characters",
            rules.min_length
        )));
    }
    if length > rules.max_length {
        return Err(Error::invalid_argument(format!(
            "Password must be no more than {} characters",
            rules.max_length
        )));
    }

    Ok(email)
}

fn require_refresh_token(request: &RefreshTokenRequest) -> Result<&str> {
    let token = request.refresh_token.trim();
    if token.is_empty() {
        return Err(Error::invalid_argument("refresh_token is required"));
    }
    Ok(token)
}

/// Run an engine call under the per-request deadline. Expiry drops the in-flight future.
pub(crate) async fn with_deadline<T>(timeout: Duration, operation: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(timeout, call).await.map_err(|_| Error::Cancelled {
        operation: operation.to_string(),
    })?
}

/// Register a new user account
#[utoipa::path(
    post,
    path = "/auth/v1/register",
    request_body = RegisterRequest,
    tag = "auth",
    responses(
        (status = 201, description = "User registered", body = RegisterResponse),
        (status = 400, description = "Invalid email or password", body = ErrorResponse),
        (status = 409, description = "User already exists", body = ErrorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, Json(request): Json<RegisterRequest>) -> Result<(StatusCode, Json<RegisterResponse>)> {
    let email = validate_credentials(&request.email, &request.password, &state.config.auth.password)?;

    let user_id = with_deadline(state.config.request_timeout, "register", state.engine.register(&email, &request.password)).await?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id })))
}

/// Log in and open a session
#[utoipa::path(
    post,
    path = "/auth/v1/login",
    request_body = LoginRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Session opened", body = TokenPairResponse),
        (status = 401, description = "Wrong email or password", body = ErrorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Json<TokenPairResponse>> {
    // No format or length rules here: anything that is not a stored credential is simply wrong
    let email = normalize_email(&request.email);

    let pair = with_deadline(
        state.config.request_timeout,
        "login",
        state.engine.login(&email, &request.password, request.app_id),
    )
    .await?;

    Ok(Json(pair.into()))
}

/// Revoke the session behind a refresh token
#[utoipa::path(
    post,
    path = "/auth/v1/logout",
    request_body = RefreshTokenRequest,
    tag = "auth",
    responses(
        (status = 200, description = "`success` is false for a token that was never issued", body = LogoutResponse),
        (status = 400, description = "Missing refresh token", body = ErrorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, Json(request): Json<RefreshTokenRequest>) -> Result<Json<LogoutResponse>> {
    let token = require_refresh_token(&request)?;

    let success = with_deadline(state.config.request_timeout, "logout", state.engine.logout(token)).await?;

    Ok(Json(LogoutResponse { success }))
}

/// Exchange a refresh token for a new token pair
#[utoipa::path(
    post,
    path = "/auth/v1/refresh",
    request_body = RefreshTokenRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Session rotated", body = TokenPairResponse),
        (status = 401, description = "Refresh token revoked, expired, or already used", body = ErrorResponse),
        (status = 404, description = "Refresh token was never issued", body = ErrorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn refresh(State(state): State<AppState>, Json(request): Json<RefreshTokenRequest>) -> Result<Json<TokenPairResponse>> {
    let token = require_refresh_token(&request)?;

    let pair = with_deadline(state.config.request_timeout, "refresh token", state.engine.refresh(token)).await?;

    Ok(Json(pair.into()))
}

/// Whether a user is an administrator
#[utoipa::path(
    get,
    path = "/auth/v1/users/{user_id}/admin",
    tag = "auth",
    params(("user_id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Admin flag", body = IsAdminResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn is_admin(State(state): State<AppState>, Path(user_id): Path<UserId>) -> Result<Json<IsAdminResponse>> {
    let is_admin = with_deadline(state.config.request_timeout, "check admin flag", state.engine.is_admin(user_id)).await?;

    Ok(Json(IsAdminResponse { user_id, is_admin }))
}

/// Whether a session is active and unexpired
#[utoipa::path(
    get,
    path = "/auth/v1/sessions/{session_id}/active",
    tag = "auth",
    params(("session_id" = i64, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session state", body = ValidateSessionResponse),
        (status = 404, description = "Session not found", body = ErrorResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn validate_session(State(state): State<AppState>, Path(session_id): Path<SessionId>) -> Result<Json<ValidateSessionResponse>> {
    let active = with_deadline(
        state.config.request_timeout,
        "validate session",
        state.engine.validate_session(session_id),
    )
    .await?;

    Ok(Json(ValidateSessionResponse { session_id, active }))
}

/// Claims of the caller's access token; requires an active session
#[utoipa::path(
    get,
    path = "/auth/v1/sessions/current",
    tag = "auth",
    responses(
        (status = 200, description = "Verified access token claims", body = AccessClaims),
        (status = 401, description = "Missing or invalid token, or inactive session", body = ErrorResponse),
    ),
    security(("BearerAuth" = []))
)]
pub async fn current_session(Extension(claims): Extension<AccessClaims>) -> Json<AccessClaims> {
    Json(claims)
}
