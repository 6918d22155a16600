//! Error types for `herald-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The caller passed arguments the resolver cannot act on, e.g. a batch of
  /// entities that are not all of the same kind.
  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  #[error("entity directory error: {0}")]
  Directory(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("subscription store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn directory<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Directory(Box::new(e))
  }

  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
