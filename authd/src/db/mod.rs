//! Database layer for users and sessions.
//!
//! ```text
//! ┌─────────────┐
//! │ AuthEngine  │  (auth::engine)
//! └──────┬──────┘
//!        │  Arc<dyn UserStore>, Arc<dyn SessionStore>
//!        ↓
//! ┌─────────────┐
//! │   Stores    │  (db::handlers - queries, error translation)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - database records)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ PostgreSQL  │  (or the in-memory store)
//! └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: Store traits and their Postgres / in-memory implementations
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: sqlx error classification and translation into domain errors
//!
//! # Error translation
//!
//! sqlx failures are first classified into [`errors::DbError`] and then translated, inside
//! each store, into the domain [`crate::errors::Error`] kinds. A raw database error never
//! leaves a store.
//!
//! # Soft revocation
//!
//! Sessions are never deleted. Revocation flips `status` to `revoked`, which keeps the
//! audit history of every refresh token ever issued.

pub mod errors;
pub mod handlers;
pub mod models;

use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::config::PoolSettings;

/// Open a Postgres pool with the configured settings.
pub async fn connect(url: &str, settings: &PoolSettings) -> Result<PgPool, sqlx::Error> {
    let mut options = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs));

    // 0 means "never" for both timeouts
    if settings.idle_timeout_secs > 0 {
        options = options.idle_timeout(Duration::from_secs(settings.idle_timeout_secs));
    }
    if settings.max_lifetime_secs > 0 {
        options = options.max_lifetime(Duration::from_secs(settings.max_lifetime_secs));
    }

    options.connect(url).await
}
