//! In-process session cache backed by moka.

use std::time::{Duration, Instant};

use chrono::Utc;
use moka::{Expiry, future::Cache, ops::compute::Op};

use crate::{
    cache::{CacheError, SessionCache, cache_ttl},
    config::CacheConfig,
    db::models::sessions::{Session, SessionStatus},
    types::SessionId,
};

#[derive(Clone)]
struct CachedSession {
    session: Session,
    ttl: Duration,
}

/// Per-entry expiry: each entry lives for the TTL computed when it was written.
struct SessionExpiry;

impl Expiry<SessionId, CachedSession> for SessionExpiry {
    fn expire_after_create(&self, _key: &SessionId, value: &CachedSession, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &SessionId,
        value: &CachedSession,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// [`SessionCache`] held in process memory. Infallible; every call returns `Ok`.
#[derive(Clone)]
pub struct MokaSessionCache {
    cache: Cache<SessionId, CachedSession>,
    max_ttl: Duration,
    min_ttl: Duration,
}

impl MokaSessionCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(config.max_capacity)
                .expire_after(SessionExpiry)
                .build(),
            max_ttl: config.max_ttl,
            min_ttl: config.min_ttl,
        }
    }

    fn cached(&self, session: Session) -> CachedSession {
        let ttl = cache_ttl(session.refresh_expires_at, Utc::now(), self.max_ttl, self.min_ttl);
        CachedSession { session, ttl }
    }
}

#[async_trait::async_trait]
impl SessionCache for MokaSessionCache {
    async fn get_session(&self, session_id: SessionId) -> Result<Option<Session>, CacheError> {
        let hit = self.cache.get(&session_id).await.map(|cached| cached.session);
        tracing::trace!(session_id, hit = hit.is_some(), "session cache lookup");
        Ok(hit)
    }

    async fn set_session(&self, session: &Session) -> Result<(), CacheError> {
        let incoming = self.cached(session.clone());
        self.cache
            .entry(session.id)
            .and_compute_with(|existing| {
                // A revoke that landed while this snapshot was in flight wins
                let op = match existing {
                    Some(entry) if entry.value().session.status == SessionStatus::Revoked && incoming.session.status == SessionStatus::Active => {
                        tracing::debug!(session_id = incoming.session.id, "Ignoring stale active snapshot for revoked session");
                        Op::Nop
                    }
                    _ => Op::Put(incoming),
                };
                std::future::ready(op)
            })
            .await;
        Ok(())
    }

    async fn mark_revoked(&self, session: &Session) -> Result<(), CacheError> {
        let revoked = Session {
            status: SessionStatus::Revoked,
            ..session.clone()
        };
        let tombstone = self.cached(revoked);
        // Same per-key path as `set_session`, so the two never interleave
        self.cache
            .entry(session.id)
            .and_compute_with(|_| std::future::ready(Op::Put(tombstone)))
            .await;
        Ok(())
    }
}
