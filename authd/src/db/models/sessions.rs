//! Database models for login sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::{AppId, SessionId, UserId};

/// Lifecycle state of a session. Sessions only ever move from `Active` to `Revoked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "session_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Revoked,
}

/// A session row: one per issued refresh token.
///
/// This is also the snapshot held by the session cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub app_id: AppId,
    /// Fingerprint of the refresh token; the raw token is never stored
    pub refresh_token_hash: String,
    pub refresh_expires_at: DateTime<Utc>,
    pub status: SessionStatus,
}

impl Session {
    /// A session is usable only while it is active *and* its refresh token has not expired.
    /// Time-based expiry wins over a stored `active` status.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Active && now < self.refresh_expires_at
    }
}

/// Database request for creating a session
#[derive(Debug, Clone)]
pub struct SessionCreateDBRequest {
    pub user_id: UserId,
    pub app_id: AppId,
    pub refresh_token_hash: String,
    pub refresh_expires_at: DateTime<Utc>,
}
