//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. UUIDs are stored as
//! hyphenated lowercase strings. Entity kinds are stored verbatim.
//!
//! Sets of ids are bound as a single JSON array parameter and unpacked in SQL
//! with [`ID_SET`], so one statement can carry any number of ids without
//! reaching SQLite's bound-variable limit.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use herald_core::{
  catalog::{Medium, Source},
  entity::{Entity, EntityKind},
  subscription::{Subscription, Unsubscribe},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_uuid_set(raw: Vec<String>) -> Result<HashSet<Uuid>> {
  raw.iter().map(|s| decode_uuid(s)).collect()
}

/// Subquery yielding the members of one [`encode_uuid_set`] parameter.
pub const ID_SET: &str = "SELECT value FROM json_each(?)";

/// `["<uuid>", ...]`, bound to the `?` in [`ID_SET`].
pub fn encode_uuid_set(ids: &[Uuid]) -> String {
  let ids: Vec<String> = ids.iter().copied().map(encode_uuid).collect();
  serde_json::Value::from(ids).to_string()
}

// ─── DateTime<Utc>
// ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column lists in [`RawCatalogEntry`] order; one row type serves both
/// sources and mediums.
pub const SOURCE_COLUMNS: &str = "source_id, name, display_name, description";
pub const MEDIUM_COLUMNS: &str = "medium_id, name, display_name, description";

/// Raw strings read directly from a `sources` or `mediums` row.
pub struct RawCatalogEntry {
  pub id:           String,
  pub name:         String,
  pub display_name: String,
  pub description:  String,
}

impl RawCatalogEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      name:         row.get(1)?,
      display_name: row.get(2)?,
      description:  row.get(3)?,
    })
  }

  pub fn into_source(self) -> Result<Source> {
    Ok(Source {
      source_id:    decode_uuid(&self.id)?,
      name:         self.name,
      display_name: self.display_name,
      description:  self.description,
    })
  }

  pub fn into_medium(self) -> Result<Medium> {
    Ok(Medium {
      medium_id:    decode_uuid(&self.id)?,
      name:         self.name,
      display_name: self.display_name,
      description:  self.description,
    })
  }
}

/// Raw strings read directly from an `entities` row.
pub struct RawEntity {
  pub entity_id: String,
  pub kind:      String,
}

impl RawEntity {
  pub fn into_entity(self) -> Result<Entity> {
    Ok(Entity {
      entity_id: decode_uuid(&self.entity_id)?,
      kind:      EntityKind::new(self.kind),
    })
  }
}

pub const SUBSCRIPTION_COLUMNS: &str =
  "s.subscription_id, s.source_id, s.medium_id, s.entity_id, s.subentity_kind, s.created_at";

/// Raw strings read directly from a `subscriptions` row.
pub struct RawSubscription {
  pub subscription_id: String,
  pub source_id:       String,
  pub medium_id:       String,
  pub entity_id:       String,
  pub subentity_kind:  Option<String>,
  pub created_at:      String,
}

impl RawSubscription {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subscription_id: row.get(0)?,
      source_id:       row.get(1)?,
      medium_id:       row.get(2)?,
      entity_id:       row.get(3)?,
      subentity_kind:  row.get(4)?,
      created_at:      row.get(5)?,
    })
  }

  pub fn into_subscription(self) -> Result<Subscription> {
    Ok(Subscription {
      subscription_id: decode_uuid(&self.subscription_id)?,
      source_id:       decode_uuid(&self.source_id)?,
      medium_id:       decode_uuid(&self.medium_id)?,
      entity_id:       decode_uuid(&self.entity_id)?,
      subentity_kind:  self.subentity_kind.map(EntityKind::new),
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

pub const UNSUBSCRIBE_COLUMNS: &str =
  "u.unsubscribe_id, u.entity_id, u.source_id, u.medium_id, u.created_at";

/// Raw strings read directly from an `unsubscribes` row.
pub struct RawUnsubscribe {
  pub unsubscribe_id: String,
  pub entity_id:      String,
  pub source_id:      String,
  pub medium_id:      String,
  pub created_at:     String,
}

impl RawUnsubscribe {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      unsubscribe_id: row.get(0)?,
      entity_id:      row.get(1)?,
      source_id:      row.get(2)?,
      medium_id:      row.get(3)?,
      created_at:     row.get(4)?,
    })
  }

  pub fn into_unsubscribe(self) -> Result<Unsubscribe> {
    Ok(Unsubscribe {
      unsubscribe_id: decode_uuid(&self.unsubscribe_id)?,
      entity_id:      decode_uuid(&self.entity_id)?,
      source_id:      decode_uuid(&self.source_id)?,
      medium_id:      decode_uuid(&self.medium_id)?,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}
