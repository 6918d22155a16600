//! Error type for `herald-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A relationship write named an entity that is not in the store.
  #[error("entity not found: {0}")]
  UnknownEntity(uuid::Uuid),

  #[error("entity {0} cannot be related to itself")]
  SelfRelationship(uuid::Uuid),

  /// A source or medium with this name already exists.
  #[error("duplicate name: {0:?}")]
  Duplicate(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
