//! # authd: authentication and session service
//!
//! `authd` authenticates users and manages the lifecycle of their login sessions. Other
//! services (chat backends, HTTP gateways) treat it as the source of truth for two
//! questions: is this caller who they claim to be, and is their session still valid.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses PostgreSQL for persistence, with an in-memory backend for development and tests.
//!
//! ### Core Components
//!
//! The **auth engine** ([`auth::engine`]) implements Register, Login, Logout, RefreshToken,
//! ValidateSession and IsAdmin. It is written against four injected collaborators: the user
//! and session stores ([`db`]), the session cache ([`cache`]) and the token issuer
//! ([`auth::tokens`]).
//!
//! The **API layer** ([`api`]) exposes the engine as JSON over HTTP at `/auth/v1/*`. Input is
//! validated at this boundary, and every engine call runs under the configured request
//! deadline.
//!
//! The **auth gate** ([`auth::gate`]) is axum middleware that admits a request only if its
//! bearer access token verifies *and* its session is still active.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use authd::{Application, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = authd::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     authd::telemetry::init_telemetry(config.logging.format)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database Setup
//!
//! Migrations run automatically on startup against an external database:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::migrate::MigrateError> {
//! authd::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use bon::Builder;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;

use crate::{
    api::handlers::{auth as auth_handlers, health},
    auth::{
        engine::AuthEngine,
        gate::{AuthGate, require_session},
        password::Argon2Params,
        tokens::{JwtTokenIssuer, TokenIssuer},
    },
    cache::{MokaSessionCache, NoopSessionCache, SessionCache},
    config::{Config, DatabaseConfig},
    db::handlers::{InMemoryStore, SessionStore, Sessions, UserStore, Users},
    openapi::ApiDoc,
};

/// Shared state handed to every handler.
#[derive(Clone, Builder)]
pub struct AppState {
    pub engine: Arc<AuthEngine>,
    pub gate: AuthGate,
    pub config: Config,
}

/// Get the authd database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Wire the engine and gate from configuration over the given stores.
pub fn build_app_state(config: &Config, users: Arc<dyn UserStore>, sessions: Arc<dyn SessionStore>) -> anyhow::Result<AppState> {
    let secret_key = config.secret_key.as_deref().context("secret_key is required")?;
    let tokens: Arc<dyn TokenIssuer> = Arc::new(JwtTokenIssuer::new(secret_key));

    let cache: Arc<dyn SessionCache> = if config.cache.enabled {
        Arc::new(MokaSessionCache::new(&config.cache))
    } else {
        info!("Session cache disabled; every validation reads the store");
        Arc::new(NoopSessionCache)
    };

    let engine = Arc::new(
        AuthEngine::builder()
            .users(users)
            .sessions(sessions)
            .cache(cache)
            .tokens(tokens.clone())
            .access_token_ttl(config.auth.tokens.access_token_ttl)
            .refresh_token_ttl(config.auth.tokens.refresh_token_ttl)
            .argon2(Argon2Params::from(&config.auth.password))
            .build(),
    );

    let gate = AuthGate::new(tokens, engine.clone());

    Ok(AppState::builder().engine(engine).gate(gate).config(config.clone()).build())
}

/// Build the application router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let gated = Router::new()
        .route("/auth/v1/sessions/current", get(auth_handlers::current_session))
        .layer(from_fn_with_state(state.gate.clone(), require_session));

    Router::new()
        .route("/auth/v1/register", post(auth_handlers::register))
        .route("/auth/v1/login", post(auth_handlers::login))
        .route("/auth/v1/logout", post(auth_handlers::logout))
        .route("/auth/v1/refresh", post(auth_handlers::refresh))
        .route("/auth/v1/users/{user_id}/admin", get(auth_handlers::is_admin))
        .route("/auth/v1/sessions/{session_id}/active", get(auth_handlers::validate_session))
        .merge(gated)
        .with_state(state)
        .route("/healthz", get(health::healthz))
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .layer(TraceLayer::new_for_http())
}

/// Open the configured storage backend. Runs migrations against an external database.
async fn setup_database(config: &Config) -> anyhow::Result<(Option<PgPool>, Arc<dyn UserStore>, Arc<dyn SessionStore>)> {
    match &config.database {
        DatabaseConfig::External { url, pool } => {
            let pool = db::connect(url, pool).await.context("Failed to connect to database")?;
            migrator().run(&pool).await.context("Failed to run migrations")?;
            info!("Database migrations applied");

            Ok((
                Some(pool.clone()),
                Arc::new(Users::new(pool.clone())),
                Arc::new(Sessions::new(pool)),
            ))
        }
        DatabaseConfig::InMemory => {
            info!("Using in-memory storage; users and sessions are lost on restart");
            let store = InMemoryStore::new();
            Ok((None, Arc::new(store.clone()), Arc::new(store)))
        }
    }
}

/// Main application struct that owns all resources and lifecycle.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] connects storage, runs migrations and wires the engine
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown signal is received, in-flight requests drain and the pool closes
pub struct Application {
    router: Router,
    config: Config,
    pool: Option<PgPool>,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let (pool, users, sessions) = setup_database(&config).await?;
        let state = build_app_state(&config, users, sessions)?;
        let router = build_router(state);

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("authd listening on http://{}", bind_addr);

        // Run the server with graceful shutdown
        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::models::auth::TokenPairResponse, test_utils::create_test_config};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_in_memory_application_serves_routes() {
        let config = Config {
            database: DatabaseConfig::InMemory,
            ..create_test_config()
        };
        let server = Application::new(config).await.unwrap().into_test_server();

        server.get("/healthz").await.assert_status_ok();

        let doc: serde_json::Value = server.get("/openapi.json").await.json();
        assert!(doc["paths"]["/auth/v1/login"].is_object());

        server
            .post("/auth/v1/register")
            .json(&json!({"email": "a@b.com", "password": "secret1"}))
            .await
            .assert_status(StatusCode::CREATED);
        let pair: TokenPairResponse = server
            .post("/auth/v1/login")
            .json(&json!({"email": "a@b.com", "password": "secret1", "app_id": 1}))
            .await
            .json();
        assert!(!pair.access_token.is_empty());
    }

    #[test]
    fn test_missing_secret_fails_wiring() {
        let config = Config {
            secret_key: None,
            ..create_test_config()
        };
        let store = InMemoryStore::new();
        assert!(build_app_state(&config, Arc::new(store.clone()), Arc::new(store)).is_err());
    }

    #[tokio::test]
    async fn test_disabled_cache_still_validates() {
        let mut config = create_test_config();
        config.cache.enabled = false;
        let store = InMemoryStore::new();
        let state = build_app_state(&config, Arc::new(store.clone()), Arc::new(store)).unwrap();

        state.engine.register("a@b.com", "secret1").await.unwrap();
        let pair = state.engine.login("a@b.com", "secret1", 1).await.unwrap();
        let claims = state.engine.verify_access_token(&pair.access_token).unwrap();
        assert!(state.engine.validate_session(claims.session_id).await.unwrap());
    }

    #[cfg(feature = "postgres-tests")]
    #[sqlx::test]
    async fn test_postgres_backed_flow(pool: PgPool) {
        let config = create_test_config();
        let state = build_app_state(&config, Arc::new(Users::new(pool.clone())), Arc::new(Sessions::new(pool))).unwrap();
        let server = axum_test::TestServer::new(build_router(state)).unwrap();

        server
            .post("/auth/v1/register")
            .json(&json!({"email": "a@b.com", "password": "secret1"}))
            .await
            .assert_status(StatusCode::CREATED);
        let tok1: TokenPairResponse = server
            .post("/auth/v1/login")
            .json(&json!({"email": "a@b.com", "password": "secret1", "app_id": 1}))
            .await
            .json();
        server
            .post("/auth/v1/logout")
            .json(&json!({"refresh_token": tok1.refresh_token}))
            .await
            .assert_status_ok();
        server
            .post("/auth/v1/refresh")
            .json(&json!({"refresh_token": tok1.refresh_token}))
            .await
            .assert_status_unauthorized();
    }
}
