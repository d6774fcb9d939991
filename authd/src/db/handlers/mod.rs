//! Store implementations.
//!
//! - [`repository`]: the [`UserStore`] and [`SessionStore`] traits
//! - [`users`] / [`sessions`]: Postgres-backed stores
//! - [`in_memory`]: single-process store used by tests and `database.type = in_memory`

pub mod in_memory;
pub mod repository;
pub mod sessions;
pub mod users;


pub use in_memory::InMemoryStore;
pub use repository::{SessionStore, UserStore};
pub use sessions::Sessions;
pub use users::Users;
