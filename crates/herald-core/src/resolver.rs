//! The subscription resolver over an entity hierarchy.
//!
//! Every operation is a short, fixed sequence of batched lookups followed by
//! in-memory set arithmetic. The number of directory and store calls does not
//! depend on how deep or wide the hierarchy is, nor on how many entities are
//! checked.

use std::collections::HashSet;

use tracing::debug;
use uuid::Uuid;

use crate::{
  Error, Result,
  catalog::{Medium, Source},
  directory::EntityDirectory,
  entity::{Entity, EntityKind},
  query::{GrantQuery, GrantScope, RevocationQuery},
  store::SubscriptionStore,
};

/// Answers "who receives what, where" questions against a directory and a
/// subscription store.
///
/// The resolver holds no state of its own; concurrent calls need no
/// coordination. Callers wanting a consistent view across several calls must
/// arrange a read snapshot at the store layer.
#[derive(Debug, Clone)]
pub struct Resolver<D, S> {
  directory: D,
  store:     S,
}

impl<D, S> Resolver<D, S>
where
  D: EntityDirectory,
  S: SubscriptionStore,
{
  pub fn new(directory: D, store: S) -> Self { Self { directory, store } }

  pub fn directory(&self) -> &D { &self.directory }

  pub fn store(&self) -> &S { &self.store }

  // ── Medium sets ───────────────────────────────────────────────────────────

  /// Return the mediums subscribed to for `source`.
  ///
  /// Without `subentity_kind`, this is the set `entity` itself is entitled
  /// to: its individual grants plus group grants for its kind anchored at any
  /// of its ancestors, minus its own unsubscribes.
  ///
  /// With `subentity_kind`, this is every medium that *some* descendant of
  /// `entity` of that kind might receive. Unsubscribes are not applied in
  /// this mode since no single member is named.
  ///
  /// The result holds each medium once, ordered by name.
  #[tracing::instrument(
    skip_all,
    fields(source = %source.name, entity = %entity, kind = ?subentity_kind.map(EntityKind::as_str))
  )]
  pub async fn mediums_subscribed(
    &self,
    source: &Source,
    entity: &Entity,
    subentity_kind: Option<&EntityKind>,
  ) -> Result<Vec<Medium>> {
    match subentity_kind {
      None => self.mediums_subscribed_individual(source, entity).await,
      Some(kind) => self.mediums_subscribed_group(source, entity, kind).await,
    }
  }

  async fn mediums_subscribed_individual(
    &self,
    source: &Source,
    entity: &Entity,
  ) -> Result<Vec<Medium>> {
    let query = self.individual_query(source, entity).await?;
    let granted = self
      .store
      .subscribed_mediums(&query)
      .await
      .map_err(Error::store)?;

    let revocations = RevocationQuery::new(source.source_id).entities([entity.entity_id]);
    let revoked: HashSet<Uuid> = self
      .store
      .unsubscribes(&revocations)
      .await
      .map_err(Error::store)?
      .into_iter()
      .map(|u| u.medium_id)
      .collect();

    let mediums = distinct_mediums(
      granted
        .into_iter()
        .filter(|m| !revoked.contains(&m.medium_id)),
    );
    debug!(granted = mediums.len(), revoked = revoked.len(), "resolved individual mediums");
    Ok(mediums)
  }

  async fn mediums_subscribed_group(
    &self,
    source: &Source,
    entity: &Entity,
    kind: &EntityKind,
  ) -> Result<Vec<Medium>> {
    let Some(query) = self.group_query(source, entity, kind).await? else {
      debug!("group has no members");
      return Ok(Vec::new());
    };
    let granted = self
      .store
      .subscribed_mediums(&query)
      .await
      .map_err(Error::store)?;

    let mediums = distinct_mediums(granted);
    debug!(granted = mediums.len(), "resolved group mediums");
    Ok(mediums)
  }

  // ── Membership ────────────────────────────────────────────────────────────

  /// Return true if subscribed to this source/medium combination.
  ///
  /// Without `subentity_kind`, `entity` must hold an individual grant or
  /// inherit a group grant for its kind from an ancestor, and must not have
  /// unsubscribed. With `subentity_kind`, this reports whether any
  /// descendant of that kind could be notified, ignoring unsubscribes.
  #[tracing::instrument(
    skip_all,
    fields(
      source = %source.name,
      medium = %medium.name,
      entity = %entity,
      kind = ?subentity_kind.map(EntityKind::as_str)
    )
  )]
  pub async fn is_subscribed(
    &self,
    source: &Source,
    medium: &Medium,
    entity: &Entity,
    subentity_kind: Option<&EntityKind>,
  ) -> Result<bool> {
    match subentity_kind {
      None => self.is_subscribed_individual(source, medium, entity).await,
      Some(kind) => self.is_subscribed_group(source, medium, entity, kind).await,
    }
  }

  async fn is_subscribed_individual(
    &self,
    source: &Source,
    medium: &Medium,
    entity: &Entity,
  ) -> Result<bool> {
    let query = self
      .individual_query(source, entity)
      .await?
      .medium(medium.medium_id);
    let granted = self.store.grant_exists(&query).await.map_err(Error::store)?;
    if !granted {
      debug!("no grant");
      return Ok(false);
    }

    let unsubscribed = self.is_unsubscribed(source, medium, entity).await?;
    debug!(unsubscribed, "grant found");
    Ok(!unsubscribed)
  }

  async fn is_subscribed_group(
    &self,
    source: &Source,
    medium: &Medium,
    entity: &Entity,
    kind: &EntityKind,
  ) -> Result<bool> {
    let Some(query) = self.group_query(source, entity, kind).await? else {
      debug!("group has no members");
      return Ok(false);
    };
    let query = query.medium(medium.medium_id);
    let granted = self.store.grant_exists(&query).await.map_err(Error::store)?;
    debug!(granted, "resolved group membership");
    Ok(granted)
  }

  // ── Batch filter ──────────────────────────────────────────────────────────

  /// Return only the entities subscribed to `source` by `medium`.
  ///
  /// All entities must share one kind; otherwise this fails with
  /// [`Error::InvalidArgument`] before touching the store. The result is a
  /// subset of the input, in input order, with duplicates collapsed.
  #[tracing::instrument(
    skip_all,
    fields(source = %source.name, medium = %medium.name, candidates = entities.len())
  )]
  pub async fn filter_subscribed(
    &self,
    source: &Source,
    medium: &Medium,
    entities: &[Entity],
  ) -> Result<Vec<Entity>> {
    let Some(first) = entities.first() else {
      return Ok(Vec::new());
    };
    let kind = &first.kind;
    if let Some(other) = entities.iter().find(|e| &e.kind != kind) {
      return Err(Error::InvalidArgument(format!(
        "all entities must be of the same kind, found {:?} and {:?}",
        kind.as_str(),
        other.kind.as_str()
      )));
    }

    let mut seen = HashSet::new();
    let candidates: Vec<Uuid> = entities
      .iter()
      .map(|e| e.entity_id)
      .filter(|id| seen.insert(*id))
      .collect();

    // Anchors of group grants aimed at this kind.
    let group = GrantQuery::new(source.source_id)
      .medium(medium.medium_id)
      .scope(GrantScope::Group { kind: kind.clone(), anchors: None });
    let mut seen_anchors = HashSet::new();
    let anchors: Vec<Uuid> = self
      .store
      .subscriptions(&group)
      .await
      .map_err(Error::store)?
      .into_iter()
      .map(|s| s.entity_id)
      .filter(|id| seen_anchors.insert(*id))
      .collect();

    let via_group = if anchors.is_empty() {
      HashSet::new()
    } else {
      self
        .directory
        .descendants_among(&anchors, &candidates)
        .await
        .map_err(Error::directory)?
    };

    let individual = GrantQuery::new(source.source_id)
      .medium(medium.medium_id)
      .scope(GrantScope::Individual { entity_ids: Some(candidates.clone()) });
    let via_individual: HashSet<Uuid> = self
      .store
      .subscriptions(&individual)
      .await
      .map_err(Error::store)?
      .into_iter()
      .map(|s| s.entity_id)
      .collect();

    let revocations = RevocationQuery::new(source.source_id)
      .medium(medium.medium_id)
      .entities(candidates);
    let revoked: HashSet<Uuid> = self
      .store
      .unsubscribes(&revocations)
      .await
      .map_err(Error::store)?
      .into_iter()
      .map(|u| u.entity_id)
      .collect();

    let mut emitted = HashSet::new();
    let subscribed: Vec<Entity> = entities
      .iter()
      .filter(|e| via_group.contains(&e.entity_id) || via_individual.contains(&e.entity_id))
      .filter(|e| !revoked.contains(&e.entity_id))
      .filter(|e| emitted.insert(e.entity_id))
      .cloned()
      .collect();

    debug!(
      anchors = anchors.len(),
      via_group = via_group.len(),
      via_individual = via_individual.len(),
      revoked = revoked.len(),
      subscribed = subscribed.len(),
      "filtered entities"
    );
    Ok(subscribed)
  }

  // ── Revocations ───────────────────────────────────────────────────────────

  /// Return true if `entity` has opted out of this source/medium combination.
  pub async fn is_unsubscribed(
    &self,
    source: &Source,
    medium: &Medium,
    entity: &Entity,
  ) -> Result<bool> {
    self
      .store
      .is_unsubscribed(source.source_id, medium.medium_id, entity.entity_id)
      .await
      .map_err(Error::store)
  }

  // ── Query plans ───────────────────────────────────────────────────────────

  /// Grants naming `entity` directly, or anchored at one of its ancestors
  /// for its own kind.
  async fn individual_query(&self, source: &Source, entity: &Entity) -> Result<GrantQuery> {
    let mut ancestors = self
      .directory
      .ancestors_of(entity)
      .await
      .map_err(Error::directory)?;
    // An anchor never inherits its own group grant.
    ancestors.remove(&entity.entity_id);
    debug!(ancestors = ancestors.len(), "loaded ancestors");

    Ok(
      GrantQuery::new(source.source_id)
        .scope(GrantScope::individual(entity.entity_id))
        .scope(GrantScope::group_anchored_in(entity.kind.clone(), ancestors)),
    )
  }

  /// Group grants for `kind` anchored at any super entity of any descendant
  /// of `entity` of that kind. `None` when `entity` has no such descendants.
  async fn group_query(
    &self,
    source: &Source,
    entity: &Entity,
    kind: &EntityKind,
  ) -> Result<Option<GrantQuery>> {
    let members: Vec<Uuid> = self
      .directory
      .descendants_of(entity, kind)
      .await
      .map_err(Error::directory)?
      .into_iter()
      .collect();
    if members.is_empty() {
      return Ok(None);
    }

    let supers = self
      .directory
      .ancestors_of_any(&members)
      .await
      .map_err(Error::directory)?;
    debug!(members = members.len(), supers = supers.len(), "loaded group");

    Ok(Some(
      GrantQuery::new(source.source_id)
        .scope(GrantScope::group_anchored_in(kind.clone(), supers)),
    ))
  }
}

/// Collapse duplicate mediums and order them by name.
fn distinct_mediums(mediums: impl IntoIterator<Item = Medium>) -> Vec<Medium> {
  let mut seen = HashSet::new();
  let mut out: Vec<Medium> = mediums
    .into_iter()
    .filter(|m| seen.insert(m.medium_id))
    .collect();
  out.sort_by(|a, b| a.name.cmp(&b.name));
  out
}
