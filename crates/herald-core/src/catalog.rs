//! Catalog records: the static dimension tables of sources and mediums.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A category of where notifications originate from.
///
/// Pieces of an application that create a type of notification own a source
/// (or at least know its name) and pass it along when distributing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
  pub source_id:    Uuid,
  /// Unique machine name.
  pub name:         String,
  pub display_name: String,
  pub description:  String,
}

/// A method of actually delivering a notification, e.g. email or SMS.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Medium {
  pub medium_id:    Uuid,
  /// Unique machine name.
  pub name:         String,
  pub display_name: String,
  pub description:  String,
}

impl fmt::Display for Source {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.display_name)
  }
}

impl fmt::Display for Medium {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.display_name)
  }
}

/// Input for creating either a source or a medium; the id is assigned by the
/// store.
#[derive(Debug, Clone)]
pub struct NewCatalogEntry {
  pub name:         String,
  pub display_name: String,
  pub description:  String,
}

impl NewCatalogEntry {
  /// Convenience constructor with an empty description.
  pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
    Self {
      name:         name.into(),
      display_name: display_name.into(),
      description:  String::new(),
    }
  }
}
