//! Authentication and session management.
//!
//! # Tokens
//!
//! A successful login yields a [`engine::TokenPair`]:
//!
//! - **Access token**: short-lived HS256 JWT embedding `user_id`, `session_id`, `app_id`
//!   and `exp`. Any service holding the shared secret can verify it offline.
//! - **Refresh token**: opaque long-lived secret, single use. Exchanging it at
//!   `/auth/v1/refresh` revokes its session and opens a new one.
//!
//! Because an access token outlives a logout, consumers must also ask whether the session
//! it names is still active. [`gate`] packages both checks as axum middleware.
//!
//! # Modules
//!
//! - [`engine`]: Register, Login, Logout, Refresh, ValidateSession and IsAdmin
//! - [`gate`]: Bearer-token route protection
//! - [`password`]: Argon2id hashing and verification
//! - [`tokens`]: Token issuer trait, JWT implementation and refresh-token fingerprints
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use authd::auth::tokens::AccessClaims;
//! use axum::Extension;
//!
//! async fn protected_handler(Extension(claims): Extension<AccessClaims>) -> String {
//!     format!("Hello, user {}!", claims.user_id)
//! }
//! ```

pub mod engine;
pub mod gate;
pub mod password;
pub mod tokens;
