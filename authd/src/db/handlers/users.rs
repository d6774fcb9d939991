//! Postgres store for users.

use sqlx::PgPool;
use tracing::instrument;

use crate::{
    db::{
        errors::DbError,
        handlers::repository::{UserStore, user_not_found},
        models::users::{User, UserCreateDBRequest},
    },
    errors::{Error, Result},
    types::UserId,
};

/// Unique constraint on `users.email` (see migrations)
const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_unique";

pub struct Users {
    db: PgPool,
}

impl Users {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl UserStore for Users {
    #[instrument(skip_all, err)]
    async fn save_user(&self, request: &UserCreateDBRequest) -> Result<()> {
        sqlx::query("INSERT INTO users (email, password_hash, is_admin) VALUES ($1, $2, $3)")
            .bind(&request.email)
            .bind(&request.password_hash)
            .bind(request.is_admin)
            .execute(&self.db)
            .await
            .map_err(|e| {
                DbError::from(e).into_domain("save user", Error::UserNotFound, |constraint| {
                    (constraint == Some(EMAIL_UNIQUE_CONSTRAINT)).then_some(Error::AlreadyExists)
                })
            })?;

        Ok(())
    }

    #[instrument(skip_all, err(level = "debug"))]
    async fn user_by_email(&self, email: &str) -> Result<User> {
        let user = sqlx::query_as::<_, User>("SELECT id, email, password_hash, is_admin FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(&self.db)
            .await
            .map_err(DbError::from)
            .map_err(user_not_found("look up user by email"))?;

        Ok(user)
    }

    #[instrument(skip(self), err(level = "debug"))]
    async fn is_admin(&self, user_id: UserId) -> Result<bool> {
        let is_admin = sqlx::query_scalar::<_, bool>("SELECT is_admin FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.db)
            .await
            .map_err(DbError::from)
            .map_err(user_not_found("read admin flag"))?;

        Ok(is_admin)
    }
}
