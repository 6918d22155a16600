//! In-memory implementations of [`EntityDirectory`] and
//! [`SubscriptionStore`].
//!
//! Useful for tests and for embedding Herald where the hierarchy and grants
//! already live in process memory. Neither type can fail, so both use
//! [`Infallible`] as their error.

use std::{
  collections::{HashMap, HashSet, VecDeque},
  convert::Infallible,
};

use chrono::Utc;
use uuid::Uuid;

use crate::{
  catalog::{Medium, NewCatalogEntry, Source},
  directory::EntityDirectory,
  entity::{Entity, EntityKind},
  query::{GrantQuery, RevocationQuery},
  store::SubscriptionStore,
  subscription::{NewSubscription, NewUnsubscribe, Subscription, Unsubscribe},
};

// ─── Directory ───────────────────────────────────────────────────────────────

/// An entity hierarchy held in adjacency maps.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
  kinds:  HashMap<Uuid, EntityKind>,
  /// sub entity → direct super entities
  supers: HashMap<Uuid, HashSet<Uuid>>,
  /// super entity → direct sub entities
  subs:   HashMap<Uuid, HashSet<Uuid>>,
}

impl MemoryDirectory {
  pub fn new() -> Self { Self::default() }

  /// Create an entity of `kind` with a fresh id.
  pub fn add_entity(&mut self, kind: impl Into<EntityKind>) -> Entity {
    let entity = Entity::new(Uuid::new_v4(), kind);
    self.insert_entity(entity.clone());
    entity
  }

  /// Register an entity with a caller-supplied id.
  pub fn insert_entity(&mut self, entity: Entity) {
    self.kinds.insert(entity.entity_id, entity.kind);
  }

  /// Record that `sub` sits directly beneath `sup`. Self-edges are ignored.
  pub fn relate(&mut self, sup: &Entity, sub: &Entity) {
    if sup.entity_id == sub.entity_id {
      return;
    }
    self.supers.entry(sub.entity_id).or_default().insert(sup.entity_id);
    self.subs.entry(sup.entity_id).or_default().insert(sub.entity_id);
  }

  pub fn kind_of(&self, entity_id: Uuid) -> Option<&EntityKind> {
    self.kinds.get(&entity_id)
  }
}

/// Breadth-first closure of `start` over `edges`, excluding the start nodes
/// themselves unless reached through a cycle.
fn closure(
  edges: &HashMap<Uuid, HashSet<Uuid>>,
  start: impl IntoIterator<Item = Uuid>,
) -> HashSet<Uuid> {
  let mut reached = HashSet::new();
  let mut queue: VecDeque<Uuid> = start.into_iter().collect();
  while let Some(node) = queue.pop_front() {
    for next in edges.get(&node).into_iter().flatten() {
      if reached.insert(*next) {
        queue.push_back(*next);
      }
    }
  }
  reached
}

impl EntityDirectory for MemoryDirectory {
  type Error = Infallible;

  async fn ancestors_of(&self, entity: &Entity) -> Result<HashSet<Uuid>, Infallible> {
    let mut ancestors = closure(&self.supers, [entity.entity_id]);
    ancestors.remove(&entity.entity_id);
    Ok(ancestors)
  }

  async fn descendants_of(
    &self,
    entity: &Entity,
    kind: &EntityKind,
  ) -> Result<HashSet<Uuid>, Infallible> {
    let mut descendants = closure(&self.subs, [entity.entity_id]);
    descendants.remove(&entity.entity_id);
    descendants.retain(|id| self.kinds.get(id) == Some(kind));
    Ok(descendants)
  }

  async fn ancestors_of_any(&self, entity_ids: &[Uuid]) -> Result<HashSet<Uuid>, Infallible> {
    Ok(closure(&self.supers, entity_ids.iter().copied()))
  }

  async fn descendants_among(
    &self,
    anchors: &[Uuid],
    candidates: &[Uuid],
  ) -> Result<HashSet<Uuid>, Infallible> {
    let anchors: HashSet<Uuid> = anchors.iter().copied().collect();
    Ok(
      candidates
        .iter()
        .copied()
        .filter(|c| {
          closure(&self.supers, [*c])
            .iter()
            .any(|a| a != c && anchors.contains(a))
        })
        .collect(),
    )
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Catalog, grant, and revocation tables held in vectors and maps.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  sources:       HashMap<Uuid, Source>,
  mediums:       HashMap<Uuid, Medium>,
  subscriptions: Vec<Subscription>,
  unsubscribes:  Vec<Unsubscribe>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  pub fn add_source(&mut self, entry: NewCatalogEntry) -> Source {
    let source = Source {
      source_id:    Uuid::new_v4(),
      name:         entry.name,
      display_name: entry.display_name,
      description:  entry.description,
    };
    self.sources.insert(source.source_id, source.clone());
    source
  }

  pub fn add_medium(&mut self, entry: NewCatalogEntry) -> Medium {
    let medium = Medium {
      medium_id:    Uuid::new_v4(),
      name:         entry.name,
      display_name: entry.display_name,
      description:  entry.description,
    };
    self.mediums.insert(medium.medium_id, medium.clone());
    medium
  }

  /// Record a grant. Identical grants are stored again, not merged.
  pub fn subscribe(&mut self, input: NewSubscription) -> Subscription {
    let subscription = Subscription {
      subscription_id: Uuid::new_v4(),
      source_id:       input.source_id,
      medium_id:       input.medium_id,
      entity_id:       input.entity_id,
      subentity_kind:  input.subentity_kind,
      created_at:      Utc::now(),
    };
    self.subscriptions.push(subscription.clone());
    subscription
  }

  pub fn unsubscribe(&mut self, input: NewUnsubscribe) -> Unsubscribe {
    let unsubscribe = Unsubscribe {
      unsubscribe_id: Uuid::new_v4(),
      entity_id:      input.entity_id,
      source_id:      input.source_id,
      medium_id:      input.medium_id,
      created_at:     Utc::now(),
    };
    self.unsubscribes.push(unsubscribe.clone());
    unsubscribe
  }

  /// Remove a grant; returns false if it did not exist.
  pub fn delete_subscription(&mut self, subscription_id: Uuid) -> bool {
    let before = self.subscriptions.len();
    self.subscriptions.retain(|s| s.subscription_id != subscription_id);
    self.subscriptions.len() != before
  }

  /// Remove an opt-out; returns false if it did not exist.
  pub fn delete_unsubscribe(&mut self, unsubscribe_id: Uuid) -> bool {
    let before = self.unsubscribes.len();
    self.unsubscribes.retain(|u| u.unsubscribe_id != unsubscribe_id);
    self.unsubscribes.len() != before
  }
}

impl SubscriptionStore for MemoryStore {
  type Error = Infallible;

  async fn subscriptions(&self, query: &GrantQuery) -> Result<Vec<Subscription>, Infallible> {
    Ok(
      self
        .subscriptions
        .iter()
        .filter(|s| query.matches(s))
        .cloned()
        .collect(),
    )
  }

  async fn subscribed_mediums(&self, query: &GrantQuery) -> Result<Vec<Medium>, Infallible> {
    let mut seen = HashSet::new();
    Ok(
      self
        .subscriptions
        .iter()
        .filter(|s| query.matches(s))
        .filter(|s| seen.insert(s.medium_id))
        .filter_map(|s| self.mediums.get(&s.medium_id).cloned())
        .collect(),
    )
  }

  async fn grant_exists(&self, query: &GrantQuery) -> Result<bool, Infallible> {
    Ok(self.subscriptions.iter().any(|s| query.matches(s)))
  }

  async fn unsubscribes(&self, query: &RevocationQuery) -> Result<Vec<Unsubscribe>, Infallible> {
    Ok(
      self
        .unsubscribes
        .iter()
        .filter(|u| query.matches(u))
        .cloned()
        .collect(),
    )
  }

  async fn is_unsubscribed(
    &self,
    source_id: Uuid,
    medium_id: Uuid,
    entity_id: Uuid,
  ) -> Result<bool, Infallible> {
    Ok(self.unsubscribes.iter().any(|u| {
      u.source_id == source_id && u.medium_id == medium_id && u.entity_id == entity_id
    }))
  }
}
