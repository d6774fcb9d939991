//! Database models for users.

use crate::types::UserId;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    /// Normalized (trimmed, lowercased) email
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
}

/// Database entity model for a user account
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_admin: bool,
}
