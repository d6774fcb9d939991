//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - **Auth** (`/auth/v1/*`): register, login, logout, refresh, admin flag and session checks
//! - **Health** (`/healthz`): liveness
//! - **Docs** (`/openapi.json`): OpenAPI document generated with `utoipa`

pub mod handlers;
pub mod models;
