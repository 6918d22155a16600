//! Batched filter types for scans over the subscription tables.
//!
//! A [`GrantQuery`] is the explicit form of "source = ? AND medium = ? AND
//! (scope OR scope ...)". Backends translate it into a single statement; the
//! [`GrantQuery::matches`] predicate is the reference semantics they must
//! agree with.

use uuid::Uuid;

use crate::{
  entity::EntityKind,
  subscription::{Subscription, Unsubscribe},
};

// ─── Grants ──────────────────────────────────────────────────────────────────

/// One disjunct of a [`GrantQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantScope {
  /// Individual grants (`subentity_kind` is null), optionally restricted to
  /// the listed entities.
  Individual { entity_ids: Option<Vec<Uuid>> },
  /// Group grants for descendants of `kind`, optionally restricted to the
  /// listed anchor entities.
  Group {
    kind:    EntityKind,
    anchors: Option<Vec<Uuid>>,
  },
  /// Grants of either shape, optionally restricted to the listed entities
  /// (subscribers or anchors).
  Any { entity_ids: Option<Vec<Uuid>> },
}

impl GrantScope {
  pub fn individual(entity_id: Uuid) -> Self {
    Self::Individual { entity_ids: Some(vec![entity_id]) }
  }

  pub fn group_anchored_in(
    kind: EntityKind,
    anchors: impl IntoIterator<Item = Uuid>,
  ) -> Self {
    Self::Group { kind, anchors: Some(anchors.into_iter().collect()) }
  }

  pub fn matches(&self, sub: &Subscription) -> bool {
    match self {
      Self::Individual { entity_ids } => {
        sub.subentity_kind.is_none() && restricted_to(entity_ids, sub.entity_id)
      }
      Self::Group { kind, anchors } => {
        sub.subentity_kind.as_ref() == Some(kind)
          && restricted_to(anchors, sub.entity_id)
      }
      Self::Any { entity_ids } => restricted_to(entity_ids, sub.entity_id),
    }
  }

  /// True if no row can ever match this scope.
  pub fn is_empty(&self) -> bool {
    match self {
      Self::Individual { entity_ids } | Self::Any { entity_ids } => {
        entity_ids.as_ref().is_some_and(Vec::is_empty)
      }
      Self::Group { anchors, .. } => anchors.as_ref().is_some_and(Vec::is_empty),
    }
  }
}

/// Parameters for grant scans on a [`crate::SubscriptionStore`].
///
/// Scopes are OR-ed together and AND-ed with the source and optional medium.
/// A query with no scopes matches nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantQuery {
  pub source_id: Uuid,
  pub medium_id: Option<Uuid>,
  pub scopes:    Vec<GrantScope>,
}

impl GrantQuery {
  pub fn new(source_id: Uuid) -> Self {
    Self { source_id, medium_id: None, scopes: Vec::new() }
  }

  pub fn medium(mut self, medium_id: Uuid) -> Self {
    self.medium_id = Some(medium_id);
    self
  }

  pub fn scope(mut self, scope: GrantScope) -> Self {
    self.scopes.push(scope);
    self
  }

  /// True if no row can ever match; backends may skip the round-trip.
  pub fn is_empty(&self) -> bool { self.scopes.iter().all(GrantScope::is_empty) }

  pub fn matches(&self, sub: &Subscription) -> bool {
    sub.source_id == self.source_id
      && self.medium_id.is_none_or(|m| m == sub.medium_id)
      && self.scopes.iter().any(|scope| scope.matches(sub))
  }
}

// ─── Revocations ─────────────────────────────────────────────────────────────

/// Parameters for unsubscribe scans on a [`crate::SubscriptionStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationQuery {
  pub source_id:  Uuid,
  pub medium_id:  Option<Uuid>,
  /// Restrict to these entities; `None` means any entity.
  pub entity_ids: Option<Vec<Uuid>>,
}

impl RevocationQuery {
  pub fn new(source_id: Uuid) -> Self {
    Self { source_id, medium_id: None, entity_ids: None }
  }

  pub fn medium(mut self, medium_id: Uuid) -> Self {
    self.medium_id = Some(medium_id);
    self
  }

  pub fn entities(mut self, entity_ids: impl IntoIterator<Item = Uuid>) -> Self {
    self.entity_ids = Some(entity_ids.into_iter().collect());
    self
  }

  pub fn is_empty(&self) -> bool {
    self.entity_ids.as_ref().is_some_and(Vec::is_empty)
  }

  pub fn matches(&self, unsub: &Unsubscribe) -> bool {
    unsub.source_id == self.source_id
      && self.medium_id.is_none_or(|m| m == unsub.medium_id)
      && restricted_to(&self.entity_ids, unsub.entity_id)
  }
}

fn restricted_to(ids: &Option<Vec<Uuid>>, id: Uuid) -> bool {
  ids.as_ref().is_none_or(|ids| ids.contains(&id))
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;

  fn grant(entity_id: Uuid, kind: Option<&str>) -> Subscription {
    Subscription {
      subscription_id: Uuid::new_v4(),
      source_id:       Uuid::nil(),
      medium_id:       Uuid::nil(),
      entity_id,
      subentity_kind:  kind.map(EntityKind::from),
      created_at:      Utc::now(),
    }
  }

  #[test]
  fn individual_scope_ignores_group_rows() {
    let e = Uuid::new_v4();
    let scope = GrantScope::individual(e);
    assert!(scope.matches(&grant(e, None)));
    assert!(!scope.matches(&grant(e, Some("user"))));
    assert!(!scope.matches(&grant(Uuid::new_v4(), None)));
  }

  #[test]
  fn group_scope_requires_matching_kind() {
    let anchor = Uuid::new_v4();
    let scope = GrantScope::group_anchored_in("user".into(), [anchor]);
    assert!(scope.matches(&grant(anchor, Some("user"))));
    assert!(!scope.matches(&grant(anchor, Some("team"))));
    assert!(!scope.matches(&grant(anchor, None)));
  }

  #[test]
  fn any_scope_covers_both_shapes() {
    let e = Uuid::new_v4();
    let scope = GrantScope::Any { entity_ids: Some(vec![e]) };
    assert!(scope.matches(&grant(e, None)));
    assert!(scope.matches(&grant(e, Some("user"))));
    assert!(!scope.matches(&grant(Uuid::new_v4(), None)));
    assert!(GrantScope::Any { entity_ids: None }.matches(&grant(Uuid::new_v4(), Some("team"))));
    assert!(GrantScope::Any { entity_ids: Some(Vec::new()) }.is_empty());
  }

  #[test]
  fn query_without_scopes_matches_nothing() {
    let q = GrantQuery::new(Uuid::nil());
    assert!(q.is_empty());
    assert!(!q.matches(&grant(Uuid::new_v4(), None)));
  }

  #[test]
  fn query_filters_by_medium() {
    let e = Uuid::new_v4();
    let q = GrantQuery::new(Uuid::nil())
      .medium(Uuid::new_v4())
      .scope(GrantScope::individual(e));
    assert!(!q.matches(&grant(e, None)));
  }
}
