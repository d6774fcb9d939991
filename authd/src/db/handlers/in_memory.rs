//! In-memory user and session store.
//!
//! Everything lives behind a single lock, which gives the same guarantees as the Postgres
//! constraints: unique emails, unique refresh tokens and a conditional active→revoked
//! transition. Suitable for tests and single-process development deployments. Data is
//! lost on restart.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::{
    db::{
        handlers::repository::{SessionStore, UserStore},
        models::{
            sessions::{Session, SessionCreateDBRequest, SessionStatus},
            users::{User, UserCreateDBRequest},
        },
    },
    errors::{Error, Result},
    types::{SessionId, UserId},
};

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    users_by_email: HashMap<String, UserId>,
    sessions: HashMap<SessionId, Session>,
    sessions_by_token: HashMap<String, SessionId>,
    last_user_id: UserId,
    last_session_id: SessionId,
}

/// In-memory implementation of [`UserStore`] and [`SessionStore`].
///
/// Cloning is cheap and clones share the same tables.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a user's admin flag. There is no API for this; admins are promoted out of band.
    pub fn set_admin(&self, user_id: UserId, is_admin: bool) -> Result<()> {
        let mut tables = self.tables.write();
        let user = tables.users.get_mut(&user_id).ok_or(Error::UserNotFound)?;
        user.is_admin = is_admin;
        Ok(())
    }

    /// Overwrite a session's refresh expiry, leaving its status untouched.
    pub fn set_refresh_expiry(&self, id: SessionId, refresh_expires_at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.write();
        let session = tables.sessions.get_mut(&id).ok_or(Error::SessionNotFound)?;
        session.refresh_expires_at = refresh_expires_at;
        Ok(())
    }

    /// Number of session rows ever created (revoked rows included)
    pub fn session_count(&self) -> usize {
        self.tables.read().sessions.len()
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryStore {
    async fn save_user(&self, request: &UserCreateDBRequest) -> Result<()> {
        let mut tables = self.tables.write();

        if tables.users_by_email.contains_key(&request.email) {
            return Err(Error::AlreadyExists);
        }

        tables.last_user_id += 1;
        let id = tables.last_user_id;
        tables.users_by_email.insert(request.email.clone(), id);
        tables.users.insert(
            id,
            User {
                id,
                email: request.email.clone(),
                password_hash: request.password_hash.clone(),
                is_admin: request.is_admin,
            },
        );
        Ok(())
    }

    async fn user_by_email(&self, email: &str) -> Result<User> {
        let tables = self.tables.read();
        tables
            .users_by_email
            .get(email)
            .and_then(|id| tables.users.get(id))
            .cloned()
            .ok_or(Error::UserNotFound)
    }

    async fn is_admin(&self, user_id: UserId) -> Result<bool> {
        self.tables
            .read()
            .users
            .get(&user_id)
            .map(|user| user.is_admin)
            .ok_or(Error::UserNotFound)
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemoryStore {
    async fn create_session(&self, request: &SessionCreateDBRequest) -> Result<SessionId> {
        let mut tables = self.tables.write();

        if tables.sessions_by_token.contains_key(&request.refresh_token_hash) {
            return Err(Error::internal("create session", "duplicate refresh token"));
        }

        tables.last_session_id += 1;
        let id = tables.last_session_id;
        tables.sessions_by_token.insert(request.refresh_token_hash.clone(), id);
        tables.sessions.insert(
            id,
            Session {
                id,
                user_id: request.user_id,
                app_id: request.app_id,
                refresh_token_hash: request.refresh_token_hash.clone(),
                refresh_expires_at: request.refresh_expires_at,
                status: SessionStatus::Active,
            },
        );
        Ok(id)
    }

    async fn session_by_id(&self, id: SessionId) -> Result<Session> {
        self.tables.read().sessions.get(&id).cloned().ok_or(Error::SessionNotFound)
    }

    async fn session_by_refresh_token(&self, refresh_token_hash: &str) -> Result<Session> {
        let tables = self.tables.read();
        tables
            .sessions_by_token
            .get(refresh_token_hash)
            .and_then(|id| tables.sessions.get(id))
            .cloned()
            .ok_or(Error::SessionNotFound)
    }

    async fn revoke_by_refresh_token(&self, refresh_token_hash: &str) -> Result<bool> {
        let mut tables = self.tables.write();

        let Some(id) = tables.sessions_by_token.get(refresh_token_hash).copied() else {
            return Ok(false);
        };

        match tables.sessions.get_mut(&id) {
            Some(session) if session.status == SessionStatus::Active => {
                session.status = SessionStatus::Revoked;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
