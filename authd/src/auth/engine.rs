//! The auth engine: registration, login, session rotation and validation.
//!
//! [`AuthEngine`] is written against four collaborators, each injected as a trait object:
//! [`UserStore`], [`SessionStore`], [`SessionCache`] and [`TokenIssuer`]. It holds no
//! locks and no global state, so one instance is shared by every request.
//!
//! # Session lifecycle
//!
//! ```text
//!   Login ──► active ──Logout──► revoked
//!               │
//!               └──Refresh──► revoked   (old row)
//!                        └──► active    (new row, same user_id/app_id)
//! ```
//!
//! A refresh token is single use. Rotation is conditioned on the store reporting that
//! *this* call moved the old row from active to revoked, so two concurrent refreshes of the
//! same token produce exactly one new session; the other caller gets
//! [`Error::InvalidRefreshToken`].
//!
//! # Cache policy
//!
//! The session cache is read-through. A revoke is written to the store first and then
//! recorded in the cache as a revoked snapshot, which the cache never lets a read-through
//! write replace with an active one. A validation that read the row before the revoke and
//! writes it back afterwards is therefore dropped. Cache failures never fail an
//! operation: reads fall back to the store, writes are logged and skipped.

use std::{sync::Arc, time::Duration};

use bon::Builder;
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{Span, debug, info, instrument, warn};

use crate::{
    auth::{
        password::{self, Argon2Params},
        tokens::{AccessClaims, TokenIssuer, fingerprint},
    },
    cache::SessionCache,
    db::{
        handlers::repository::{SessionStore, UserStore},
        models::{
            sessions::{Session, SessionCreateDBRequest, SessionStatus},
            users::UserCreateDBRequest,
        },
    },
    errors::{Error, Result},
    types::{AppId, SessionId, UserId, abbrev_token},
};

/// Tokens handed to a client after login or refresh. Never persisted as a unit.
#[derive(Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &abbrev_token(&self.access_token))
            .field("refresh_token", &abbrev_token(&self.refresh_token))
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish()
    }
}

#[derive(Builder)]
pub struct AuthEngine {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    cache: Arc<dyn SessionCache>,
    tokens: Arc<dyn TokenIssuer>,
    #[builder(default = Duration::from_secs(15 * 60))]
    access_token_ttl: Duration,
    #[builder(default = Duration::from_secs(30 * 24 * 60 * 60))]
    refresh_token_ttl: Duration,
    #[builder(default)]
    argon2: Argon2Params,
}

impl AuthEngine {
    /// Create a user and return its id.
    ///
    /// # Errors
    /// - [`Error::AlreadyExists`] if the email is taken
    /// - [`Error::Internal`] on hashing or store failure
    #[instrument(skip_all)]
    pub async fn register(&self, email: &str, password: &str) -> Result<UserId> {
        let password_hash = self.hash(password).await?;

        self.users
            .save_user(&UserCreateDBRequest {
                email: email.to_string(),
                password_hash,
                is_admin: false,
            })
            .await?;

        // The insert does not return the row; read it back for the id
        let user = self.users.user_by_email(email).await.map_err(|e| match e {
            Error::UserNotFound => Error::internal("read back registered user", "row missing after insert"),
            other => other,
        })?;

        info!(user_id = user.id, "User registered");
        Ok(user.id)
    }

    /// Check credentials and open a new session for `app_id`.
    ///
    /// # Errors
    /// - [`Error::InvalidCredentials`] for an unknown email or a wrong password
    /// - [`Error::Internal`] on any later failure
    #[instrument(skip_all, fields(app_id = app_id, user_id = tracing::field::Empty, session_id = tracing::field::Empty))]
    pub async fn login(&self, email: &str, password: &str, app_id: AppId) -> Result<TokenPair> {
        let user = self.users.user_by_email(email).await.map_err(|e| match e {
            Error::UserNotFound => Error::InvalidCredentials,
            other => other,
        })?;
        Span::current().record("user_id", user.id);

        if !self.verify(password, &user.password_hash).await? {
            debug!("Password mismatch");
            return Err(Error::InvalidCredentials);
        }

        let (session_id, pair) = self.open_session(user.id, app_id).await?;
        info!(session_id, "User logged in");
        Ok(pair)
    }

    /// Revoke the session issued for `refresh_token`.
    ///
    /// Returns `false` for a token that was never issued. Logging out a session that is
    /// already revoked succeeds.
    ///
    /// # Errors
    /// - [`Error::Internal`] on store failure
    #[instrument(skip_all, fields(session_id = tracing::field::Empty))]
    pub async fn logout(&self, refresh_token: &str) -> Result<bool> {
        let token_hash = fingerprint(refresh_token);

        let session = match self.sessions.session_by_refresh_token(&token_hash).await {
            Ok(session) => session,
            Err(Error::SessionNotFound) => {
                debug!(token = %abbrev_token(refresh_token), "Logout for unknown refresh token");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        Span::current().record("session_id", session.id);

        if session.status == SessionStatus::Revoked {
            debug!("Session already revoked");
            self.invalidate(&session).await;
            return Ok(true);
        }

        // Conditional revoke; `false` means a concurrent caller revoked it first
        let changed = self.sessions.revoke_by_refresh_token(&token_hash).await?;
        self.invalidate(&session).await;

        info!(changed, "Session logged out");
        Ok(true)
    }

    /// Rotate a refresh token: revoke its session and open a new one for the same user
    /// and app.
    ///
    /// # Errors
    /// - [`Error::SessionNotFound`] if the token was never issued
    /// - [`Error::InvalidRefreshToken`] if the session is revoked, expired, or was rotated
    ///   by a concurrent call
    /// - [`Error::Internal`] on store or issuer failure
    #[instrument(skip_all, fields(user_id = tracing::field::Empty, old_session_id = tracing::field::Empty, session_id = tracing::field::Empty))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let token_hash = fingerprint(refresh_token);

        let old = self.sessions.session_by_refresh_token(&token_hash).await?;
        Span::current().record("user_id", old.user_id).record("old_session_id", old.id);

        if !old.is_active(Utc::now()) {
            debug!(status = ?old.status, expires_at = %old.refresh_expires_at, "Refresh with inactive session");
            return Err(Error::InvalidRefreshToken);
        }

        if !self.sessions.revoke_by_refresh_token(&token_hash).await? {
            warn!("Refresh token rotated by a concurrent request");
            return Err(Error::InvalidRefreshToken);
        }
        self.invalidate(&old).await;

        let (session_id, pair) = self.open_session(old.user_id, old.app_id).await?;
        info!(session_id, "Session rotated");
        Ok(pair)
    }

    /// Whether the session is active and unexpired. Served from the cache when possible.
    ///
    /// # Errors
    /// - [`Error::SessionNotFound`] if the id does not exist
    /// - [`Error::Internal`] on store failure
    #[instrument(skip_all, fields(session_id = session_id))]
    pub async fn validate_session(&self, session_id: SessionId) -> Result<bool> {
        match self.cache.get_session(session_id).await {
            Ok(Some(session)) => return Ok(session.is_active(Utc::now())),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Session cache read failed, falling back to store"),
        }

        let session = self.sessions.session_by_id(session_id).await?;

        if let Err(e) = self.cache.set_session(&session).await {
            warn!(error = %e, "Failed to populate session cache");
        }

        Ok(session.is_active(Utc::now()))
    }

    /// # Errors
    /// - [`Error::UserNotFound`] if the id does not exist
    /// - [`Error::Internal`] on store failure
    #[instrument(skip_all, fields(user_id = user_id))]
    pub async fn is_admin(&self, user_id: UserId) -> Result<bool> {
        self.users.is_admin(user_id).await
    }

    /// Verify an access token locally (signature and expiry only, no session check).
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims> {
        self.tokens.verify_access_token(token)
    }

    /// Create an active session and mint its token pair.
    ///
    /// If minting the access token fails the session row is left behind; it is never
    /// handed out and simply expires.
    async fn open_session(&self, user_id: UserId, app_id: AppId) -> Result<(SessionId, TokenPair)> {
        let now = Utc::now();
        let refresh_token = self.tokens.create_refresh_token()?;
        let refresh_expires_at = expires_at(now, self.refresh_token_ttl)?;

        let session_id = self
            .sessions
            .create_session(&SessionCreateDBRequest {
                user_id,
                app_id,
                refresh_token_hash: fingerprint(&refresh_token),
                refresh_expires_at,
            })
            .await?;
        Span::current().record("session_id", session_id);

        let access_expires_at = expires_at(now, self.access_token_ttl)?;
        let access_token = self
            .tokens
            .create_access_token(user_id, session_id, app_id, access_expires_at)?;

        Ok((
            session_id,
            TokenPair {
                access_token,
                refresh_token,
                access_expires_at,
                refresh_expires_at,
            },
        ))
    }

    async fn invalidate(&self, session: &Session) {
        if let Err(e) = self.cache.mark_revoked(session).await {
            warn!(session_id = session.id, error = %e, "Failed to mark cached session revoked");
        }
    }

    // Argon2 is deliberately slow; keep it off the async workers
    async fn hash(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        let params = self.argon2;
        tokio::task::spawn_blocking(move || password::hash_password(&password, params))
            .await
            .map_err(|e| Error::internal("hash password", e))?
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || password::verify_password(&password, &hash))
            .await
            .map_err(|e| Error::internal("verify password", e))?
    }
}

fn expires_at(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| Error::internal("compute token expiry", format!("ttl {ttl:?} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::tokens::JwtTokenIssuer,
        cache::{CacheError, MokaSessionCache, NoopSessionCache},
        config::CacheConfig,
        db::handlers::InMemoryStore,
    };
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::{Barrier, Notify};

    const FAST: Argon2Params = Argon2Params {
        memory_kib: 128,
        iterations: 1,
        parallelism: 1,
    };

    const SECRET: &str = "engine-test-secret";

    fn engine(store: &InMemoryStore, sessions: Arc<dyn SessionStore>, cache: Arc<dyn SessionCache>, tokens: Arc<dyn TokenIssuer>) -> AuthEngine {
        AuthEngine::builder()
            .users(Arc::new(store.clone()))
            .sessions(sessions)
            .cache(cache)
            .tokens(tokens)
            .argon2(FAST)
            .build()
    }

    fn default_engine(store: &InMemoryStore) -> AuthEngine {
        engine(
            store,
            Arc::new(store.clone()),
            Arc::new(MokaSessionCache::new(&CacheConfig::default())),
            Arc::new(JwtTokenIssuer::new(SECRET)),
        )
    }

    fn claims(pair: &TokenPair) -> AccessClaims {
        JwtTokenIssuer::new(SECRET).verify_access_token(&pair.access_token).unwrap()
    }

    /// Cache whose every call fails
    struct BrokenCache;

    #[async_trait::async_trait]
    impl SessionCache for BrokenCache {
        async fn get_session(&self, _session_id: SessionId) -> std::result::Result<Option<Session>, CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn set_session(&self, _session: &Session) -> std::result::Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn mark_revoked(&self, _session: &Session) -> std::result::Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }
    }

    /// Counts `session_by_id` reads; optionally holds refresh lookups at a barrier so
    /// concurrent refreshes both observe the session as active.
    struct ObservedSessions {
        inner: InMemoryStore,
        reads_by_id: AtomicUsize,
        lookup_barrier: Option<Barrier>,
    }

    impl ObservedSessions {
        fn new(inner: &InMemoryStore) -> Self {
            Self {
                inner: inner.clone(),
                reads_by_id: AtomicUsize::new(0),
                lookup_barrier: None,
            }
        }
    }

    #[async_trait::async_trait]
    impl SessionStore for ObservedSessions {
        async fn create_session(&self, request: &SessionCreateDBRequest) -> Result<SessionId> {
            self.inner.create_session(request).await
        }

        async fn session_by_id(&self, id: SessionId) -> Result<Session> {
            self.reads_by_id.fetch_add(1, Ordering::SeqCst);
            self.inner.session_by_id(id).await
        }

        async fn session_by_refresh_token(&self, refresh_token_hash: &str) -> Result<Session> {
            let session = self.inner.session_by_refresh_token(refresh_token_hash).await;
            if let Some(barrier) = &self.lookup_barrier {
                barrier.wait().await;
            }
            session
        }

        async fn revoke_by_refresh_token(&self, refresh_token_hash: &str) -> Result<bool> {
            self.inner.revoke_by_refresh_token(refresh_token_hash).await
        }
    }

    /// Holds the first `session_by_id` read after it has loaded the row, until released
    struct HeldRead {
        inner: InMemoryStore,
        armed: AtomicBool,
        loaded: Notify,
        release: Notify,
    }

    impl HeldRead {
        fn new(inner: &InMemoryStore) -> Self {
            Self {
                inner: inner.clone(),
                armed: AtomicBool::new(true),
                loaded: Notify::new(),
                release: Notify::new(),
            }
        }
    }

    #[async_trait::async_trait]
    impl SessionStore for HeldRead {
        async fn create_session(&self, request: &SessionCreateDBRequest) -> Result<SessionId> {
            self.inner.create_session(request).await
        }

        async fn session_by_id(&self, id: SessionId) -> Result<Session> {
            let session = self.inner.session_by_id(id).await;
            if self.armed.swap(false, Ordering::SeqCst) {
                self.loaded.notify_one();
                self.release.notified().await;
            }
            session
        }

        async fn session_by_refresh_token(&self, refresh_token_hash: &str) -> Result<Session> {
            self.inner.session_by_refresh_token(refresh_token_hash).await
        }

        async fn revoke_by_refresh_token(&self, refresh_token_hash: &str) -> Result<bool> {
            self.inner.revoke_by_refresh_token(refresh_token_hash).await
        }
    }

    /// Issuer that mints refresh tokens but fails to sign access tokens
    struct BrokenSigner;

    impl TokenIssuer for BrokenSigner {
        fn create_access_token(&self, _: UserId, _: SessionId, _: AppId, _: DateTime<Utc>) -> Result<String> {
            Err(Error::internal("create access token", "signing key unavailable"))
        }

        fn create_refresh_token(&self) -> Result<String> {
            Ok(crate::auth::tokens::generate_refresh_token())
        }

        fn verify_access_token(&self, _token: &str) -> Result<AccessClaims> {
            Err(Error::Unauthenticated { message: None })
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let store = InMemoryStore::new();
        let engine = default_engine(&store);

        let user_id = engine.register("a@b.com", "secret1").await.unwrap();
        let pair = engine.login("a@b.com", "secret1", 1).await.unwrap();

        assert!(!pair.access_token.is_empty());
        assert!(!pair.refresh_token.is_empty());
        assert!(pair.access_expires_at < pair.refresh_expires_at);

        let claims = claims(&pair);
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.app_id, 1);
        assert!(engine.validate_session(claims.session_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_password_is_stored_hashed() {
        let store = InMemoryStore::new();
        let engine = default_engine(&store);
        engine.register("a@b.com", "secret1").await.unwrap();

        let user = store.user_by_email("a@b.com").await.unwrap();
        assert_ne!(user.password_hash, "secret1");
        assert!(user.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let store = InMemoryStore::new();
        let engine = default_engine(&store);
        engine.register("a@b.com", "secret1").await.unwrap();

        let wrong_password = engine.login("a@b.com", "secret2", 1).await.unwrap_err();
        assert!(matches!(wrong_password, Error::InvalidCredentials));

        let unknown_email = engine.login("nobody@b.com", "secret1", 1).await.unwrap_err();
        assert!(matches!(unknown_email, Error::InvalidCredentials));

        assert_eq!(store.session_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_register() {
        let store = InMemoryStore::new();
        let engine = default_engine(&store);

        let first = engine.register("a@b.com", "secret1").await.unwrap();
        let err = engine.register("a@b.com", "other-password").await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists));

        // First account unaffected: same id, original password still works
        let user = store.user_by_email("a@b.com").await.unwrap();
        assert_eq!(user.id, first);
        engine.login("a@b.com", "secret1", 1).await.unwrap();
    }

    #[tokio::test]
    async fn test_refresh_succeeds_exactly_once() {
        let store = InMemoryStore::new();
        let engine = default_engine(&store);
        engine.register("a@b.com", "secret1").await.unwrap();
        let old = engine.login("a@b.com", "secret1", 3).await.unwrap();

        let new = engine.refresh(&old.refresh_token).await.unwrap();
        assert_ne!(new.refresh_token, old.refresh_token);

        let old_claims = claims(&old);
        let new_claims = claims(&new);
        assert_ne!(new_claims.session_id, old_claims.session_id);
        assert_eq!(new_claims.user_id, old_claims.user_id);
        assert_eq!(new_claims.app_id, 3);

        let err = engine.refresh(&old.refresh_token).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRefreshToken));

        // Rotation revoked the old session and left the new one usable
        assert!(!engine.validate_session(old_claims.session_id).await.unwrap());
        assert!(engine.validate_session(new_claims.session_id).await.unwrap());
        engine.refresh(&new.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn test_refresh_unknown_token() {
        let store = InMemoryStore::new();
        let engine = default_engine(&store);

        let err = engine.refresh("never-issued").await.unwrap_err();
        assert!(matches!(err, Error::SessionNotFound));
    }

    #[tokio::test]
    async fn test_logout_invalidates_session() {
        let store = InMemoryStore::new();
        let engine = default_engine(&store);
        engine.register("a@b.com", "secret1").await.unwrap();
        let pair = engine.login("a@b.com", "secret1", 1).await.unwrap();
        let session_id = claims(&pair).session_id;

        // Populates the cache with the active snapshot
        assert!(engine.validate_session(session_id).await.unwrap());

        assert!(engine.logout(&pair.refresh_token).await.unwrap());
        assert!(!engine.validate_session(session_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_logout_idempotent() {
        let store = InMemoryStore::new();
        let engine = default_engine(&store);
        engine.register("a@b.com", "secret1").await.unwrap();
        let pair = engine.login("a@b.com", "secret1", 1).await.unwrap();

        assert!(engine.logout(&pair.refresh_token).await.unwrap());
        assert!(engine.logout(&pair.refresh_token).await.unwrap());
        assert!(!engine.logout("never-issued").await.unwrap());
    }

    #[tokio::test]
    async fn test_late_cache_fill_does_not_outlive_logout() {
        let store = InMemoryStore::new();
        let sessions = Arc::new(HeldRead::new(&store));
        let engine = Arc::new(engine(
            &store,
            sessions.clone(),
            Arc::new(MokaSessionCache::new(&CacheConfig::default())),
            Arc::new(JwtTokenIssuer::new(SECRET)),
        ));
        engine.register("a@b.com", "secret1").await.unwrap();
        let pair = engine.login("a@b.com", "secret1", 1).await.unwrap();
        let session_id = claims(&pair).session_id;

        // Validation misses the cache and reads the active row, then stalls
        let validation = tokio::spawn({
            let engine = engine.clone();
            async move { engine.validate_session(session_id).await }
        });
        sessions.loaded.notified().await;

        assert!(engine.logout(&pair.refresh_token).await.unwrap());

        // The stalled call answers from its pre-logout read and writes that snapshot back
        sessions.release.notify_one();
        assert!(validation.await.unwrap().unwrap());

        assert!(!engine.validate_session(session_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_late_cache_fill_does_not_outlive_refresh() {
        let store = InMemoryStore::new();
        let sessions = Arc::new(HeldRead::new(&store));
        let engine = Arc::new(engine(
            &store,
            sessions.clone(),
            Arc::new(MokaSessionCache::new(&CacheConfig::default())),
            Arc::new(JwtTokenIssuer::new(SECRET)),
        ));
        engine.register("a@b.com", "secret1").await.unwrap();
        let pair = engine.login("a@b.com", "secret1", 1).await.unwrap();
        let session_id = claims(&pair).session_id;

        let validation = tokio::spawn({
            let engine = engine.clone();
            async move { engine.validate_session(session_id).await }
        });
        sessions.loaded.notified().await;

        let rotated = engine.refresh(&pair.refresh_token).await.unwrap();
        sessions.release.notify_one();
        validation.await.unwrap().unwrap();

        assert!(!engine.validate_session(session_id).await.unwrap());
        assert!(engine.validate_session(claims(&rotated).session_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_concrete_scenario() {
        let store = InMemoryStore::new();
        let engine = default_engine(&store);

        let uid = engine.register("a@b.com", "secret1").await.unwrap();
        assert!(uid > 0);

        let tok1 = engine.login("a@b.com", "secret1", 1).await.unwrap();
        assert!(!tok1.access_token.is_empty());
        assert!(!tok1.refresh_token.is_empty());

        assert!(engine.logout(&tok1.refresh_token).await.unwrap());

        let err = engine.refresh(&tok1.refresh_token).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRefreshToken));
    }

    #[tokio::test]
    async fn test_validate_cache_hit_matches_miss() {
        let store = InMemoryStore::new();
        let sessions = Arc::new(ObservedSessions::new(&store));
        let engine = engine(
            &store,
            sessions.clone(),
            Arc::new(MokaSessionCache::new(&CacheConfig::default())),
            Arc::new(JwtTokenIssuer::new(SECRET)),
        );
        engine.register("a@b.com", "secret1").await.unwrap();
        let session_id = claims(&engine.login("a@b.com", "secret1", 1).await.unwrap()).session_id;

        let miss = engine.validate_session(session_id).await.unwrap();
        assert_eq!(sessions.reads_by_id.load(Ordering::SeqCst), 1);

        let hit = engine.validate_session(session_id).await.unwrap();
        assert_eq!(sessions.reads_by_id.load(Ordering::SeqCst), 1, "cache hit must not read the store");

        assert!(miss);
        assert_eq!(hit, miss);
    }

    #[tokio::test]
    async fn test_validate_unknown_session() {
        let store = InMemoryStore::new();
        let engine = default_engine(&store);

        let err = engine.validate_session(404).await.unwrap_err();
        assert!(matches!(err, Error::SessionNotFound));
    }

    #[tokio::test]
    async fn test_expired_session_is_inactive() {
        let store = InMemoryStore::new();
        let engine = default_engine(&store);
        engine.register("a@b.com", "secret1").await.unwrap();
        let pair = engine.login("a@b.com", "secret1", 1).await.unwrap();
        let session_id = claims(&pair).session_id;

        store
            .set_refresh_expiry(session_id, Utc::now() - TimeDelta::minutes(1))
            .unwrap();

        let session = store.session_by_id(session_id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Active);
        assert!(!engine.validate_session(session_id).await.unwrap());

        let err = engine.refresh(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRefreshToken));
    }

    #[test_log::test(tokio::test)]
    async fn test_cache_failures_are_not_fatal() {
        let store = InMemoryStore::new();
        let engine = engine(
            &store,
            Arc::new(store.clone()),
            Arc::new(BrokenCache),
            Arc::new(JwtTokenIssuer::new(SECRET)),
        );
        engine.register("a@b.com", "secret1").await.unwrap();
        let pair = engine.login("a@b.com", "secret1", 1).await.unwrap();
        let session_id = claims(&pair).session_id;

        // Read error falls back to the store
        assert!(engine.validate_session(session_id).await.unwrap());

        // Invalidation errors do not fail rotation or logout
        let rotated = engine.refresh(&pair.refresh_token).await.unwrap();
        assert!(engine.logout(&rotated.refresh_token).await.unwrap());

        assert!(!engine.validate_session(session_id).await.unwrap());
        assert!(!engine.validate_session(claims(&rotated).session_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_noop_cache_always_reads_store() {
        let store = InMemoryStore::new();
        let sessions = Arc::new(ObservedSessions::new(&store));
        let engine = engine(&store, sessions.clone(), Arc::new(NoopSessionCache), Arc::new(JwtTokenIssuer::new(SECRET)));
        engine.register("a@b.com", "secret1").await.unwrap();
        let session_id = claims(&engine.login("a@b.com", "secret1", 1).await.unwrap()).session_id;

        assert!(engine.validate_session(session_id).await.unwrap());
        assert!(engine.validate_session(session_id).await.unwrap());
        assert_eq!(sessions.reads_by_id.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_refresh_has_one_winner() {
        let store = InMemoryStore::new();
        let sessions = Arc::new(ObservedSessions {
            lookup_barrier: Some(Barrier::new(2)),
            ..ObservedSessions::new(&store)
        });
        let engine = engine(
            &store,
            sessions,
            Arc::new(MokaSessionCache::new(&CacheConfig::default())),
            Arc::new(JwtTokenIssuer::new(SECRET)),
        );
        engine.register("a@b.com", "secret1").await.unwrap();
        let pair = engine.login("a@b.com", "secret1", 1).await.unwrap();
        assert_eq!(store.session_count(), 1);

        // Both calls pass the active check before either revokes
        let (first, second) = tokio::join!(engine.refresh(&pair.refresh_token), engine.refresh(&pair.refresh_token));

        let outcomes = [first, second];
        let winners = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "exactly one refresh may win: {outcomes:?}");
        assert!(
            outcomes
                .iter()
                .any(|r| matches!(r, Err(Error::InvalidRefreshToken)))
        );
        // Only the winner created a session
        assert_eq!(store.session_count(), 2);
    }

    #[tokio::test]
    async fn test_signing_failure_is_internal() {
        let store = InMemoryStore::new();
        let engine = engine(
            &store,
            Arc::new(store.clone()),
            Arc::new(NoopSessionCache),
            Arc::new(BrokenSigner),
        );
        engine.register("a@b.com", "secret1").await.unwrap();

        let err = engine.login("a@b.com", "secret1", 1).await.unwrap_err();
        assert!(matches!(err, Error::Internal { .. }));
        // Session row created before signing is left to expire
        assert_eq!(store.session_count(), 1);
    }

    #[tokio::test]
    async fn test_is_admin() {
        let store = InMemoryStore::new();
        let engine = default_engine(&store);
        let user_id = engine.register("a@b.com", "secret1").await.unwrap();

        assert!(!engine.is_admin(user_id).await.unwrap());
        store.set_admin(user_id, true).unwrap();
        assert!(engine.is_admin(user_id).await.unwrap());

        assert!(matches!(engine.is_admin(user_id + 100).await.unwrap_err(), Error::UserNotFound));
    }

    #[test]
    fn test_expires_at_out_of_range() {
        assert!(expires_at(Utc::now(), Duration::from_secs(60)).is_ok());
        assert!(matches!(expires_at(Utc::now(), Duration::MAX).unwrap_err(), Error::Internal { .. }));
    }

    #[test]
    fn test_token_pair_debug_redacts() {
        let pair = TokenPair {
            access_token: "eyJhbGciOiJIUzI1NiJ9.payload.sig".to_string(),
            refresh_token: "q3J9vR0wYk1secret".to_string(),
            access_expires_at: Utc::now(),
            refresh_expires_at: Utc::now(),
        };
        let debug = format!("{pair:?}");
        assert!(!debug.contains("secret"));
        assert!(!debug.contains("payload"));
    }
}
