//! Database record structures matching table schemas.

pub mod sessions;
pub mod users;
