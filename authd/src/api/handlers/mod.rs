//! HTTP request handlers.
//!
//! Each handler validates its input, runs one engine operation under the configured
//! request deadline, and serializes the result. Errors convert to responses through
//! [`crate::errors::Error`]'s `IntoResponse` implementation.
//!
//! # Handler Modules
//!
//! - [`auth`]: The `/auth/v1` endpoints
//! - [`health`]: Liveness probe

pub mod auth;
pub mod health;
