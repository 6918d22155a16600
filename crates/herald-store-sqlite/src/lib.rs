//! SQLite backend for Herald.
//!
//! [`SqliteStore`] keeps the catalog, the entity hierarchy, grants, and
//! revocations in a single SQLite file and implements both
//! [`herald_core::EntityDirectory`] and [`herald_core::SubscriptionStore`].
//! It wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime.

mod directory;
mod encode;
mod filter;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
