//! Store traits the auth engine is written against.
//!
//! A store is the data access layer for one table. Both traits are object safe so the
//! engine can hold `Arc<dyn UserStore>` / `Arc<dyn SessionStore>`; Postgres
//! ([`super::Users`], [`super::Sessions`]) and in-memory ([`super::InMemoryStore`])
//! implementations sit behind the same interface.
//!
//! Implementations own the translation of backend failures into domain errors: callers
//! only ever see the [`Error`] kinds documented on each method.

use crate::{
    db::models::{
        sessions::{Session, SessionCreateDBRequest},
        users::{User, UserCreateDBRequest},
    },
    errors::{Error, Result},
    types::{SessionId, UserId},
};

/// Durable record of user accounts.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user.
    ///
    /// # Errors
    /// - [`Error::AlreadyExists`] if the email is taken
    /// - [`Error::Internal`] on any other failure
    async fn save_user(&self, request: &UserCreateDBRequest) -> Result<()>;

    /// Look up a user by (normalized) email.
    ///
    /// # Errors
    /// - [`Error::UserNotFound`] if no user has this email
    async fn user_by_email(&self, email: &str) -> Result<User>;

    /// Read the admin flag of a user.
    ///
    /// # Errors
    /// - [`Error::UserNotFound`] if the id does not exist
    async fn is_admin(&self, user_id: UserId) -> Result<bool>;
}

/// Durable record of sessions, one row per issued refresh token.
///
/// Refresh tokens are addressed by their fingerprint (see
/// [`crate::auth::tokens::fingerprint`]).
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Create an active session and return its id.
    ///
    /// # Errors
    /// - [`Error::Internal`] on failure, including a duplicate refresh token
    async fn create_session(&self, request: &SessionCreateDBRequest) -> Result<SessionId>;

    /// # Errors
    /// - [`Error::SessionNotFound`] if the id does not exist
    async fn session_by_id(&self, id: SessionId) -> Result<Session>;

    /// # Errors
    /// - [`Error::SessionNotFound`] if no session was issued for this token
    async fn session_by_refresh_token(&self, refresh_token_hash: &str) -> Result<Session>;

    /// Move the session issued for this token from active to revoked.
    ///
    /// Returns `true` only if this call performed the transition; revoking an unknown or
    /// already revoked session returns `false`.
    async fn revoke_by_refresh_token(&self, refresh_token_hash: &str) -> Result<bool>;
}

/// Translate a missing user into [`Error::UserNotFound`], anything else into `Internal`.
pub(crate) fn user_not_found(operation: &str) -> impl FnOnce(crate::db::errors::DbError) -> Error + '_ {
    move |e| e.into_domain(operation, Error::UserNotFound, |_| None)
}

/// Translate a missing session into [`Error::SessionNotFound`], anything else into `Internal`.
pub(crate) fn session_not_found(operation: &str) -> impl FnOnce(crate::db::errors::DbError) -> Error + '_ {
    move |e| e.into_domain(operation, Error::SessionNotFound, |_| None)
}
