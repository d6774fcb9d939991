//! Cache-aside session cache.
//!
//! Validation is read-through: a miss falls back to the session store and repopulates the
//! cache. A revoke does not delete the entry; it overwrites it with a revoked snapshot
//! that later read-through writes cannot replace. A validation that read the store just
//! before the revoke therefore cannot resurrect the session when it writes back late.
//! The cache is never authoritative, so all of its failures are soft; callers log them
//! and carry on against the store.
//!
//! Entry lifetime is bounded by the session's own refresh expiry, see [`cache_ttl`].

mod memory;

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{db::models::sessions::Session, types::SessionId};

pub use memory::MokaSessionCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt cache entry for session {session_id}")]
    Corrupt { session_id: SessionId },
}

#[async_trait::async_trait]
pub trait SessionCache: Send + Sync {
    /// `Ok(None)` is a miss.
    async fn get_session(&self, session_id: SessionId) -> Result<Option<Session>, CacheError>;

    /// Store a snapshot read from the session store. Must not replace a revoked snapshot
    /// with an active one.
    async fn set_session(&self, session: &Session) -> Result<(), CacheError>;

    /// Record that the session is revoked, overwriting whatever is cached.
    async fn mark_revoked(&self, session: &Session) -> Result<(), CacheError>;
}

/// Time an entry for a session may live in the cache.
///
/// The remaining refresh lifetime capped at `max_ttl`. Sessions already past their
/// expiry still get `min_ttl` so that repeated validations of a dead session do not all
/// reach the store.
pub fn cache_ttl(refresh_expires_at: DateTime<Utc>, now: DateTime<Utc>, max_ttl: Duration, min_ttl: Duration) -> Duration {
    match (refresh_expires_at - now).to_std() {
        Ok(remaining) if !remaining.is_zero() => remaining.min(max_ttl),
        _ => min_ttl,
    }
}

/// Cache that stores nothing. Selected by `cache.enabled = false`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSessionCache;

#[async_trait::async_trait]
impl SessionCache for NoopSessionCache {
    async fn get_session(&self, _session_id: SessionId) -> Result<Option<Session>, CacheError> {
        Ok(None)
    }

    async fn set_session(&self, _session: &Session) -> Result<(), CacheError> {
        Ok(())
    }

    async fn mark_revoked(&self, _session: &Session) -> Result<(), CacheError> {
        Ok(())
    }
}
