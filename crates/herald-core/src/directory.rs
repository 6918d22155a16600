//! The `EntityDirectory` trait: Herald's view of the entity hierarchy.
//!
//! The hierarchy may be an arbitrary DAG: an entity can have several super
//! entities. All lookups are transitive and batched so that the resolver
//! issues a fixed number of calls regardless of depth or fan-out.

use std::{collections::HashSet, future::Future, sync::Arc};

use uuid::Uuid;

use crate::entity::{Entity, EntityKind};

/// Ancestor and descendant lookups over the entity hierarchy.
///
/// Each method is expected to cost one round-trip to the backing store.
pub trait EntityDirectory: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// All transitive super entities of `entity`, never including itself.
  fn ancestors_of<'a>(
    &'a self,
    entity: &'a Entity,
  ) -> impl Future<Output = Result<HashSet<Uuid>, Self::Error>> + Send + 'a;

  /// All transitive sub entities of `entity` whose kind is `kind`, never
  /// including itself.
  fn descendants_of<'a>(
    &'a self,
    entity: &'a Entity,
    kind: &'a EntityKind,
  ) -> impl Future<Output = Result<HashSet<Uuid>, Self::Error>> + Send + 'a;

  /// The union of [`ancestors_of`](Self::ancestors_of) over every entity in
  /// `entity_ids`.
  fn ancestors_of_any<'a>(
    &'a self,
    entity_ids: &'a [Uuid],
  ) -> impl Future<Output = Result<HashSet<Uuid>, Self::Error>> + Send + 'a;

  /// The subset of `candidates` that have at least one member of `anchors`
  /// among their ancestors.
  fn descendants_among<'a>(
    &'a self,
    anchors: &'a [Uuid],
    candidates: &'a [Uuid],
  ) -> impl Future<Output = Result<HashSet<Uuid>, Self::Error>> + Send + 'a;
}

// ─── Forwarding impls ────────────────────────────────────────────────────────

macro_rules! forward_directory {
  ($($ty:ty),*) => {$(
    impl<T: EntityDirectory> EntityDirectory for $ty {
      type Error = T::Error;

      fn ancestors_of<'a>(
        &'a self,
        entity: &'a Entity,
      ) -> impl Future<Output = Result<HashSet<Uuid>, Self::Error>> + Send + 'a {
        (**self).ancestors_of(entity)
      }

      fn descendants_of<'a>(
        &'a self,
        entity: &'a Entity,
        kind: &'a EntityKind,
      ) -> impl Future<Output = Result<HashSet<Uuid>, Self::Error>> + Send + 'a {
        (**self).descendants_of(entity, kind)
      }

      fn ancestors_of_any<'a>(
        &'a self,
        entity_ids: &'a [Uuid],
      ) -> impl Future<Output = Result<HashSet<Uuid>, Self::Error>> + Send + 'a {
        (**self).ancestors_of_any(entity_ids)
      }

      fn descendants_among<'a>(
        &'a self,
        anchors: &'a [Uuid],
        candidates: &'a [Uuid],
      ) -> impl Future<Output = Result<HashSet<Uuid>, Self::Error>> + Send + 'a {
        (**self).descendants_among(anchors, candidates)
      }
    }
  )*};
}

forward_directory!(&T, Arc<T>);
