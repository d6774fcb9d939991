//! API request and response data models.
//!
//! API models are distinct from database models: secrets such as password hashes and
//! refresh-token fingerprints never appear here. All models are annotated with `utoipa`
//! for the generated OpenAPI document.

pub mod auth;
