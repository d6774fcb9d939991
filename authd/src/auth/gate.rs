//! Auth gate: route protection for services that trust this one.
//!
//! A request passes only if its `Authorization: Bearer <access token>` header carries a
//! token with a valid signature and expiry *and* the session it names is still active.
//! The second check is what makes a logout observable across services within one cache
//! TTL. On success the verified [`AccessClaims`] are inserted into the request extensions
//! for handlers to pick up with `Extension<AccessClaims>`.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::{debug, trace};

use crate::{
    auth::{
        engine::AuthEngine,
        tokens::{AccessClaims, TokenIssuer},
    },
    errors::{Error, Result},
    types::SessionId,
};

/// Answers "is this session still active". Implemented in process by [`AuthEngine`]; a
/// remote service would implement it over its client to this one.
#[async_trait::async_trait]
pub trait SessionValidator: Send + Sync {
    async fn validate_session(&self, session_id: SessionId) -> Result<bool>;
}

#[async_trait::async_trait]
impl SessionValidator for AuthEngine {
    async fn validate_session(&self, session_id: SessionId) -> Result<bool> {
        AuthEngine::validate_session(self, session_id).await
    }
}

/// State for [`require_session`]
#[derive(Clone)]
pub struct AuthGate {
    tokens: Arc<dyn TokenIssuer>,
    sessions: Arc<dyn SessionValidator>,
}

impl AuthGate {
    pub fn new(tokens: Arc<dyn TokenIssuer>, sessions: Arc<dyn SessionValidator>) -> Self {
        Self { tokens, sessions }
    }

    /// Run both checks against a raw `Authorization` header value.
    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<AccessClaims> {
        let token = authorization
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::Unauthenticated {
                message: Some("Missing bearer token".to_string()),
            })?;

        let claims = self.tokens.verify_access_token(token)?;
        trace!(session_id = claims.session_id, user_id = claims.user_id, "Access token verified");

        match self.sessions.validate_session(claims.session_id).await {
            Ok(true) => Ok(claims),
            Ok(false) | Err(Error::SessionNotFound) => {
                debug!(session_id = claims.session_id, "Rejected token for inactive session");
                Err(Error::Unauthenticated {
                    message: Some("Session is no longer active".to_string()),
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// Middleware rejecting requests without an active session with 401.
pub async fn require_session(State(gate): State<AuthGate>, mut request: Request, next: Next) -> Result<Response> {
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let claims = gate.authenticate(authorization.as_deref()).await?;
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}
