//! Grants and revocations.
//!
//! A [`Subscription`] either names an individual entity directly or, when
//! `subentity_kind` is set, covers every descendant of that kind beneath the
//! anchor entity. An [`Unsubscribe`] is always an individual opt-out and wins
//! over any grant, however derived.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  catalog::{Medium, Source},
  entity::{Entity, EntityKind},
};

// ─── Subscription ────────────────────────────────────────────────────────────

/// A grant of a source/medium combination.
///
/// No uniqueness is enforced across grants; identical rows may coexist and
/// resolution treats them as a set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
  pub subscription_id: Uuid,
  pub source_id:       Uuid,
  pub medium_id:       Uuid,
  /// The subscribed entity, or the group anchor for a group grant.
  pub entity_id:       Uuid,
  /// `None` for an individual grant; otherwise the kind of descendant of
  /// `entity_id` being subscribed.
  pub subentity_kind:  Option<EntityKind>,
  pub created_at:      DateTime<Utc>,
}

impl Subscription {
  pub fn is_individual(&self) -> bool { self.subentity_kind.is_none() }

  pub fn is_group(&self) -> bool { self.subentity_kind.is_some() }

  /// "{entity} to {source} by {medium}". For a group grant `entity` is the
  /// anchor; the covered kind is left to `subentity_kind`.
  pub fn describe(&self, entity: &Entity, source: &Source, medium: &Medium) -> String {
    format!("{entity} to {source} by {medium}")
  }
}

/// Input to a store's subscribe operation. `subscription_id` and
/// `created_at` are always set by the store.
#[derive(Debug, Clone)]
pub struct NewSubscription {
  pub source_id:      Uuid,
  pub medium_id:      Uuid,
  pub entity_id:      Uuid,
  pub subentity_kind: Option<EntityKind>,
}

impl NewSubscription {
  /// An individual grant naming `entity_id` directly.
  pub fn individual(source_id: Uuid, medium_id: Uuid, entity_id: Uuid) -> Self {
    Self { source_id, medium_id, entity_id, subentity_kind: None }
  }

  /// A group grant covering every descendant of `anchor_id` of `kind`.
  pub fn group(
    source_id: Uuid,
    medium_id: Uuid,
    anchor_id: Uuid,
    kind: impl Into<EntityKind>,
  ) -> Self {
    Self {
      source_id,
      medium_id,
      entity_id: anchor_id,
      subentity_kind: Some(kind.into()),
    }
  }
}

// ─── Unsubscribe ─────────────────────────────────────────────────────────────

/// An individual entity's opt-out from a source/medium combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unsubscribe {
  pub unsubscribe_id: Uuid,
  pub entity_id:      Uuid,
  pub source_id:      Uuid,
  pub medium_id:      Uuid,
  pub created_at:     DateTime<Utc>,
}

impl Unsubscribe {
  /// "{entity} from {source} by {medium}"
  pub fn describe(&self, entity: &Entity, source: &Source, medium: &Medium) -> String {
    format!("{entity} from {source} by {medium}")
  }
}

/// Input to a store's unsubscribe operation.
#[derive(Debug, Clone)]
pub struct NewUnsubscribe {
  pub entity_id: Uuid,
  pub source_id: Uuid,
  pub medium_id: Uuid,
}
