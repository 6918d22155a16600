//! Core types, collaborator traits, and the subscription resolver for Herald.
//!
//! Herald answers one question: which delivery mediums should an entity
//! receive notifications on for a given source? Grants may name an entity
//! directly or cover every descendant of a given kind beneath an anchor
//! entity; per-entity unsubscribes always win.
//!
//! This crate is deliberately free of database dependencies. The entity
//! hierarchy and the subscription tables are reached through the
//! [`EntityDirectory`] and [`SubscriptionStore`] traits.

pub mod catalog;
pub mod directory;
pub mod entity;
pub mod error;
pub mod memory;
pub mod query;
pub mod resolver;
pub mod store;
pub mod subscription;

pub use directory::EntityDirectory;
pub use error::{Error, Result};
pub use resolver::Resolver;
pub use store::SubscriptionStore;

#[cfg(test)]
mod tests;
