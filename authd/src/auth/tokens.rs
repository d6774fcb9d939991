//! Access and refresh token issuance.
//!
//! Access tokens are short-lived HS256 JWTs embedding `(user_id, session_id, app_id, exp)`
//! so downstream services can check them without a round trip. Refresh tokens are opaque:
//! 32 random bytes, base64url without padding. Only their [`fingerprint`] is persisted.

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use rand::prelude::RngExt;
use rand::rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use crate::{
    errors::Error,
    types::{AppId, SessionId, UserId},
};

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AccessClaims {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub app_id: AppId,
    /// Expiry, unix seconds
    pub exp: i64,
    /// Issued at, unix seconds
    pub iat: i64,
}

/// Mints and checks tokens. Implementations must be safe to share across tasks.
pub trait TokenIssuer: Send + Sync {
    fn create_access_token(
        &self,
        user_id: UserId,
        session_id: SessionId,
        app_id: AppId,
        expires_at: DateTime<Utc>,
    ) -> Result<String, Error>;

    fn create_refresh_token(&self) -> Result<String, Error>;

    fn verify_access_token(&self, token: &str) -> Result<AccessClaims, Error>;
}

/// HMAC-SHA256 JWT issuer keyed by the service secret.
pub struct JwtTokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtTokenIssuer {
    pub fn new(secret_key: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret_key.as_bytes()),
        }
    }
}

impl std::fmt::Debug for JwtTokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtTokenIssuer").finish_non_exhaustive()
    }
}

impl TokenIssuer for JwtTokenIssuer {
    fn create_access_token(
        &self,
        user_id: UserId,
        session_id: SessionId,
        app_id: AppId,
        expires_at: DateTime<Utc>,
    ) -> Result<String, Error> {
        let claims = AccessClaims {
            user_id,
            session_id,
            app_id,
            exp: expires_at.timestamp(),
            iat: Utc::now().timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| Error::internal("create access token", e))
    }

    fn create_refresh_token(&self) -> Result<String, Error> {
        Ok(generate_refresh_token())
    }

    fn verify_access_token(&self, token: &str) -> Result<AccessClaims, Error> {
        let token_data = decode::<AccessClaims>(token, &self.decoding_key, &Validation::default()).map_err(|e| match e.kind() {
            // Client errors (401) - malformed tokens, invalid claims, expired tokens
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::ExpiredSignature
            | ErrorKind::MissingRequiredClaim(_)
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::ImmatureSignature
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_)
            | ErrorKind::InvalidAlgorithm => Error::Unauthenticated { message: None },

            // Server errors (500) - key issues, internal failures
            ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidRsaKey(_)
            | ErrorKind::RsaFailedSigning
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::InvalidKeyFormat
            | ErrorKind::MissingAlgorithm
            | ErrorKind::Crypto(_) => Error::internal("verify access token", &e),

            _ => Error::internal("verify access token (unknown error)", &e),
        })?;

        Ok(token_data.claims)
    }
}

/// Generate an opaque refresh token: 32 bytes from the OS-seeded RNG, base64url encoded
pub fn generate_refresh_token() -> String {
    let mut token_bytes = [0u8; 32];
    rng().fill(&mut token_bytes);

    general_purpose::URL_SAFE_NO_PAD.encode(token_bytes)
}

/// Storage fingerprint of a refresh token (SHA-256, base64url).
///
/// Refresh tokens carry 256 bits of entropy, so an unsalted digest is enough to make a
/// leaked sessions table useless for replay while keeping lookups indexable.
pub fn fingerprint(refresh_token: &str) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(Sha256::digest(refresh_token.as_bytes()))
}
