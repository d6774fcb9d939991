//! Shared constructors for tests.

use std::sync::Arc;

use axum_test::TestServer;

use crate::{
    build_app_state, build_router,
    config::{Config, DatabaseConfig, PasswordConfig},
    db::handlers::InMemoryStore,
};

pub fn create_test_config() -> Config {
    Config {
        database: DatabaseConfig::InMemory,
        secret_key: Some("test-secret-key".to_string()),
        auth: crate::config::AuthConfig {
            password: PasswordConfig {
                // Cheap hashing keeps HTTP tests fast
                argon2_memory_kib: 128,
                argon2_iterations: 1,
                argon2_parallelism: 1,
                ..PasswordConfig::default()
            },
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Full router over a fresh in-memory store. The store handle is returned so tests can
/// arrange state there is no endpoint for (admin flags, expiry).
pub fn create_test_app() -> (TestServer, InMemoryStore) {
    let config = create_test_config();
    let store = InMemoryStore::new();

    let state = build_app_state(&config, Arc::new(store.clone()), Arc::new(store.clone())).expect("Failed to build app state");
    let server = TestServer::new(build_router(state)).expect("Failed to create test server");

    (server, store)
}
