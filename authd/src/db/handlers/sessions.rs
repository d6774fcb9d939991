//! Postgres store for sessions.

use sqlx::PgPool;
use tracing::instrument;

use crate::{
    db::{
        errors::DbError,
        handlers::repository::{SessionStore, session_not_found},
        models::sessions::{Session, SessionCreateDBRequest},
    },
    errors::{Error, Result},
    types::SessionId,
};

const SESSION_COLUMNS: &str = "id, user_id, app_id, refresh_token_hash, refresh_expires_at, status";

pub struct Sessions {
    db: PgPool,
}

impl Sessions {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl SessionStore for Sessions {
    #[instrument(skip_all, fields(user_id = request.user_id, app_id = request.app_id), err)]
    async fn create_session(&self, request: &SessionCreateDBRequest) -> Result<SessionId> {
        // A duplicate refresh token hits sessions_refresh_token_hash_unique and is rejected
        let id = sqlx::query_scalar::<_, SessionId>(
            r#"
            INSERT INTO sessions (user_id, app_id, refresh_token_hash, refresh_expires_at, status)
            VALUES ($1, $2, $3, $4, 'active')
            RETURNING id
            "#,
        )
        .bind(request.user_id)
        .bind(request.app_id)
        .bind(&request.refresh_token_hash)
        .bind(request.refresh_expires_at)
        .fetch_one(&self.db)
        .await
        .map_err(|e| Error::internal("create session", DbError::from(e)))?;

        Ok(id)
    }

    #[instrument(skip(self), err(level = "debug"))]
    async fn session_by_id(&self, id: SessionId) -> Result<Session> {
        let session = sqlx::query_as::<_, Session>(&format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"))
            .bind(id)
            .fetch_one(&self.db)
            .await
            .map_err(DbError::from)
            .map_err(session_not_found("look up session by id"))?;

        Ok(session)
    }

    #[instrument(skip_all, err(level = "debug"))]
    async fn session_by_refresh_token(&self, refresh_token_hash: &str) -> Result<Session> {
        let session = sqlx::query_as::<_, Session>(&format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE refresh_token_hash = $1"))
            .bind(refresh_token_hash)
            .fetch_one(&self.db)
            .await
            .map_err(DbError::from)
            .map_err(session_not_found("look up session by refresh token"))?;

        Ok(session)
    }

    #[instrument(skip_all, err)]
    async fn revoke_by_refresh_token(&self, refresh_token_hash: &str) -> Result<bool> {
        // Conditional on the current status so concurrent revokers see exactly one winner
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET status = 'revoked', revoked_at = NOW()
            WHERE refresh_token_hash = $1 AND status = 'active'
            "#,
        )
        .bind(refresh_token_hash)
        .execute(&self.db)
        .await
        .map_err(|e| Error::internal("revoke session", DbError::from(e)))?;

        Ok(result.rows_affected() > 0)
    }
}
