//! Common type definitions.
//!
//! # ID Types
//!
//! Entity IDs are database-generated integers wrapped in type aliases:
//!
//! - [`UserId`]: User account identifier
//! - [`SessionId`]: Session (one per issued refresh token) identifier
//! - [`AppId`]: Client application a session was opened for
//!
//! # Utility Functions
//!
//! - [`abbrev_token`]: Abbreviate opaque secrets for logging

// Type aliases for IDs
pub type UserId = i64;
pub type SessionId = i64;
pub type AppId = i32;

/// Abbreviate an opaque token to its first 6 characters so it can appear in logs without
/// leaking the secret.
/// Example: "q3J9vR0wYk1...": "q3J9vR…"
pub fn abbrev_token(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{prefix}…")
}
