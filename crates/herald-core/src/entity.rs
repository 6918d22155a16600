//! Entities: the addressable subjects of notifications.
//!
//! Entities are owned by the entity directory. Herald only needs their
//! identity and their kind; the hierarchy itself is reached through
//! [`crate::EntityDirectory`].

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The classifier of an entity, e.g. `"user"`, `"team"`, `"organization"`.
///
/// Kinds are open-ended strings so that each application can bring its own
/// taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKind(String);

impl EntityKind {
  pub fn new(kind: impl Into<String>) -> Self { Self(kind.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for EntityKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for EntityKind {
  fn from(s: &str) -> Self { Self::new(s) }
}

impl From<String> for EntityKind {
  fn from(s: String) -> Self { Self(s) }
}

/// A reference to an entity in the directory: its identity plus its kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
  pub entity_id: Uuid,
  pub kind:      EntityKind,
}

impl Entity {
  pub fn new(entity_id: Uuid, kind: impl Into<EntityKind>) -> Self {
    Self { entity_id, kind: kind.into() }
  }
}

impl fmt::Display for Entity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.kind, self.entity_id)
  }
}
