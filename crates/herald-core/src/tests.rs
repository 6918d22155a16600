//! Resolver tests against the in-memory directory and store.

use std::{
  collections::HashSet,
  future::Future,
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
};

use uuid::Uuid;

use crate::{
  Error, Resolver,
  catalog::{Medium, NewCatalogEntry, Source},
  directory::EntityDirectory,
  entity::{Entity, EntityKind},
  memory::{MemoryDirectory, MemoryStore},
  query::{GrantQuery, RevocationQuery},
  store::SubscriptionStore,
  subscription::{NewSubscription, NewUnsubscribe, Subscription, Unsubscribe},
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

struct World {
  dir:      MemoryDirectory,
  store:    MemoryStore,
  source_1: Source,
  source_2: Source,
  medium_1: Medium,
  medium_2: Medium,
}

impl World {
  fn new() -> Self {
    let mut store = MemoryStore::new();
    let source_1 = store.add_source(NewCatalogEntry::new("billing", "Billing"));
    let source_2 = store.add_source(NewCatalogEntry::new("security", "Security"));
    let medium_1 = store.add_medium(NewCatalogEntry::new("email", "Email"));
    let medium_2 = store.add_medium(NewCatalogEntry::new("sms", "SMS"));
    Self { dir: MemoryDirectory::new(), store, source_1, source_2, medium_1, medium_2 }
  }

  fn resolver(&self) -> Resolver<&MemoryDirectory, &MemoryStore> {
    Resolver::new(&self.dir, &self.store)
  }

  fn entity(&mut self, kind: &str) -> Entity { self.dir.add_entity(kind) }

  fn grant(&mut self, source: &Source, medium: &Medium, entity: &Entity) {
    self.store.subscribe(NewSubscription::individual(
      source.source_id,
      medium.medium_id,
      entity.entity_id,
    ));
  }

  fn group_grant(&mut self, source: &Source, medium: &Medium, anchor: &Entity, kind: &str) {
    self.store.subscribe(NewSubscription::group(
      source.source_id,
      medium.medium_id,
      anchor.entity_id,
      kind,
    ));
  }

  fn revoke(&mut self, source: &Source, medium: &Medium, entity: &Entity) {
    self.store.unsubscribe(NewUnsubscribe {
      entity_id: entity.entity_id,
      source_id: source.source_id,
      medium_id: medium.medium_id,
    });
  }
}

fn names(mediums: &[Medium]) -> Vec<&str> {
  mediums.iter().map(|m| m.name.as_str()).collect()
}

fn ids(entities: &[Entity]) -> HashSet<Uuid> {
  entities.iter().map(|e| e.entity_id).collect()
}

// ─── Call counting ───────────────────────────────────────────────────────────

/// Wraps a collaborator and counts how many calls reach it.
struct Counting<T> {
  inner: T,
  calls: Arc<AtomicUsize>,
}

impl<T> Counting<T> {
  fn new(inner: T) -> (Self, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (Self { inner, calls: calls.clone() }, calls)
  }

  fn bump(&self) { self.calls.fetch_add(1, Ordering::SeqCst); }
}

impl<T: EntityDirectory> EntityDirectory for Counting<T> {
  type Error = T::Error;

  fn ancestors_of<'a>(
    &'a self,
    entity: &'a Entity,
  ) -> impl Future<Output = Result<HashSet<Uuid>, Self::Error>> + Send + 'a {
    self.bump();
    self.inner.ancestors_of(entity)
  }

  fn descendants_of<'a>(
    &'a self,
    entity: &'a Entity,
    kind: &'a EntityKind,
  ) -> impl Future<Output = Result<HashSet<Uuid>, Self::Error>> + Send + 'a {
    self.bump();
    self.inner.descendants_of(entity, kind)
  }

  fn ancestors_of_any<'a>(
    &'a self,
    entity_ids: &'a [Uuid],
  ) -> impl Future<Output = Result<HashSet<Uuid>, Self::Error>> + Send + 'a {
    self.bump();
    self.inner.ancestors_of_any(entity_ids)
  }

  fn descendants_among<'a>(
    &'a self,
    anchors: &'a [Uuid],
    candidates: &'a [Uuid],
  ) -> impl Future<Output = Result<HashSet<Uuid>, Self::Error>> + Send + 'a {
    self.bump();
    self.inner.descendants_among(anchors, candidates)
  }
}

impl<T: SubscriptionStore> SubscriptionStore for Counting<T> {
  type Error = T::Error;

  fn subscriptions<'a>(
    &'a self,
    query: &'a GrantQuery,
  ) -> impl Future<Output = Result<Vec<Subscription>, Self::Error>> + Send + 'a {
    self.bump();
    self.inner.subscriptions(query)
  }

  fn subscribed_mediums<'a>(
    &'a self,
    query: &'a GrantQuery,
  ) -> impl Future<Output = Result<Vec<Medium>, Self::Error>> + Send + 'a {
    self.bump();
    self.inner.subscribed_mediums(query)
  }

  fn grant_exists<'a>(
    &'a self,
    query: &'a GrantQuery,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a {
    self.bump();
    self.inner.grant_exists(query)
  }

  fn unsubscribes<'a>(
    &'a self,
    query: &'a RevocationQuery,
  ) -> impl Future<Output = Result<Vec<Unsubscribe>, Self::Error>> + Send + 'a {
    self.bump();
    self.inner.unsubscribes(query)
  }

  fn is_unsubscribed(
    &self,
    source_id: Uuid,
    medium_id: Uuid,
    entity_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_ {
    self.bump();
    self.inner.is_unsubscribed(source_id, medium_id, entity_id)
  }
}

// ─── mediums_subscribed, individual ──────────────────────────────────────────

#[tokio::test]
async fn individual_subscription() {
  let mut w = World::new();
  let e = w.entity("user");
  let (s1, m1) = (w.source_1.clone(), w.medium_1.clone());
  w.grant(&s1, &m1, &e);

  let mediums = w.resolver().mediums_subscribed(&s1, &e, None).await.unwrap();
  assert_eq!(mediums, vec![m1]);
}

#[tokio::test]
async fn group_subscription_is_inherited() {
  let mut w = World::new();
  let team = w.entity("team");
  let user = w.entity("user");
  w.dir.relate(&team, &user);
  let (s1, m1) = (w.source_1.clone(), w.medium_1.clone());
  w.group_grant(&s1, &m1, &team, "user");

  let mediums = w.resolver().mediums_subscribed(&s1, &user, None).await.unwrap();
  assert_eq!(mediums, vec![m1]);
}

#[tokio::test]
async fn group_subscription_is_inherited_transitively() {
  let mut w = World::new();
  let org = w.entity("organization");
  let team = w.entity("team");
  let user = w.entity("user");
  w.dir.relate(&org, &team);
  w.dir.relate(&team, &user);
  let (s1, m1) = (w.source_1.clone(), w.medium_1.clone());
  w.group_grant(&s1, &m1, &org, "user");

  let r = w.resolver();
  assert_eq!(r.mediums_subscribed(&s1, &user, None).await.unwrap(), vec![m1.clone()]);
  assert!(r.is_subscribed(&s1, &m1, &user, None).await.unwrap());
}

#[tokio::test]
async fn multiple_mediums() {
  let mut w = World::new();
  let e = w.entity("user");
  let (s1, m1, m2) = (w.source_1.clone(), w.medium_1.clone(), w.medium_2.clone());
  w.grant(&s1, &m1, &e);
  w.grant(&s1, &m2, &e);

  let mediums = w.resolver().mediums_subscribed(&s1, &e, None).await.unwrap();
  assert_eq!(names(&mediums), ["email", "sms"]);
}

#[tokio::test]
async fn unsubscribed_medium_is_removed() {
  let mut w = World::new();
  let e = w.entity("user");
  let (s1, m1, m2) = (w.source_1.clone(), w.medium_1.clone(), w.medium_2.clone());
  w.grant(&s1, &m1, &e);
  w.grant(&s1, &m2, &e);
  w.revoke(&s1, &m1, &e);

  let mediums = w.resolver().mediums_subscribed(&s1, &e, None).await.unwrap();
  assert_eq!(mediums, vec![m2]);
}

#[tokio::test]
async fn individual_mediums_filter_by_source() {
  let mut w = World::new();
  let e = w.entity("user");
  let (s1, s2, m1, m2) =
    (w.source_1.clone(), w.source_2.clone(), w.medium_1.clone(), w.medium_2.clone());
  w.grant(&s1, &m1, &e);
  w.grant(&s2, &m2, &e);

  let mediums = w.resolver().mediums_subscribed(&s1, &e, None).await.unwrap();
  assert_eq!(mediums, vec![m1]);
}

#[tokio::test]
async fn unsubscribe_for_other_source_does_not_apply() {
  let mut w = World::new();
  let e = w.entity("user");
  let (s1, s2, m1) = (w.source_1.clone(), w.source_2.clone(), w.medium_1.clone());
  w.grant(&s1, &m1, &e);
  w.revoke(&s2, &m1, &e);

  let mediums = w.resolver().mediums_subscribed(&s1, &e, None).await.unwrap();
  assert_eq!(mediums, vec![m1]);
}

#[tokio::test]
async fn kind_mismatch_blocks_inheritance() {
  let mut w = World::new();
  let team = w.entity("team");
  let user = w.entity("user");
  w.dir.relate(&team, &user);
  let (s1, m1) = (w.source_1.clone(), w.medium_1.clone());
  w.group_grant(&s1, &m1, &team, "admin");

  let r = w.resolver();
  assert!(r.mediums_subscribed(&s1, &user, None).await.unwrap().is_empty());
  assert!(!r.is_subscribed(&s1, &m1, &user, None).await.unwrap());
}

#[tokio::test]
async fn anchor_does_not_inherit_its_own_group_grant() {
  let mut w = World::new();
  let team = w.entity("team");
  let other = w.entity("team");
  w.dir.relate(&team, &other);
  let (s1, m1) = (w.source_1.clone(), w.medium_1.clone());
  // Anchored at `team` for its own kind: only descendants qualify.
  w.group_grant(&s1, &m1, &team, "team");

  let r = w.resolver();
  assert!(r.mediums_subscribed(&s1, &team, None).await.unwrap().is_empty());
  assert!(!r.is_subscribed(&s1, &m1, &team, None).await.unwrap());
  assert!(r.is_subscribed(&s1, &m1, &other, None).await.unwrap());
}

#[tokio::test]
async fn duplicate_grants_are_idempotent() {
  let mut w = World::new();
  let team = w.entity("team");
  let user = w.entity("user");
  w.dir.relate(&team, &user);
  let (s1, m1) = (w.source_1.clone(), w.medium_1.clone());
  w.grant(&s1, &m1, &user);
  w.group_grant(&s1, &m1, &team, "user");
  w.group_grant(&s1, &m1, &team, "user");

  let kind = EntityKind::from("user");
  let r = w.resolver();
  assert_eq!(r.mediums_subscribed(&s1, &user, None).await.unwrap(), vec![m1.clone()]);
  assert_eq!(r.mediums_subscribed(&s1, &team, Some(&kind)).await.unwrap(), vec![m1.clone()]);
  assert_eq!(r.filter_subscribed(&s1, &m1, &[user.clone()]).await.unwrap(), vec![user]);
}

// ─── mediums_subscribed, group ───────────────────────────────────────────────

#[tokio::test]
async fn one_subscription_matches_across_supers() {
  let mut w = World::new();
  let super_1 = w.entity("team");
  let super_2 = w.entity("team");
  let sub = w.entity("user");
  w.dir.relate(&super_1, &sub);
  w.dir.relate(&super_2, &sub);
  let (s1, m1) = (w.source_1.clone(), w.medium_1.clone());
  w.group_grant(&s1, &m1, &super_1, "user");

  let kind = EntityKind::from("user");
  let mediums = w.resolver().mediums_subscribed(&s1, &super_2, Some(&kind)).await.unwrap();
  assert_eq!(mediums, vec![m1]);
}

#[tokio::test]
async fn multiple_subscriptions_match_across_supers() {
  let mut w = World::new();
  let super_1 = w.entity("team");
  let super_2 = w.entity("team");
  let super_3 = w.entity("team");
  let sub = w.entity("user");
  for sup in [&super_1, &super_2, &super_3] {
    w.dir.relate(sup, &sub);
  }
  let (s1, m1, m2) = (w.source_1.clone(), w.medium_1.clone(), w.medium_2.clone());
  w.group_grant(&s1, &m1, &super_1, "user");
  w.group_grant(&s1, &m2, &super_2, "user");

  let kind = EntityKind::from("user");
  let mediums = w.resolver().mediums_subscribed(&s1, &super_3, Some(&kind)).await.unwrap();
  assert_eq!(names(&mediums), ["email", "sms"]);
}

#[tokio::test]
async fn group_mediums_filter_by_source() {
  let mut w = World::new();
  let super_1 = w.entity("team");
  let super_2 = w.entity("team");
  let sub = w.entity("user");
  w.dir.relate(&super_1, &sub);
  w.dir.relate(&super_2, &sub);
  let (s1, s2, m1, m2) =
    (w.source_1.clone(), w.source_2.clone(), w.medium_1.clone(), w.medium_2.clone());
  w.group_grant(&s1, &m1, &super_1, "user");
  w.group_grant(&s2, &m2, &super_1, "user");

  let kind = EntityKind::from("user");
  let mediums = w.resolver().mediums_subscribed(&s1, &super_2, Some(&kind)).await.unwrap();
  assert_eq!(mediums, vec![m1]);
}

#[tokio::test]
async fn group_mediums_filter_by_super_entity_intersections() {
  let mut w = World::new();
  let super_1 = w.entity("team");
  let super_2 = w.entity("team");
  let super_3 = w.entity("team");
  let sub = w.entity("user");
  w.dir.relate(&super_1, &sub);
  w.dir.relate(&super_3, &sub);
  let (s1, m1, m2) = (w.source_1.clone(), w.medium_1.clone(), w.medium_2.clone());
  w.group_grant(&s1, &m1, &super_1, "user");
  // super_2 shares no member with super_3.
  w.group_grant(&s1, &m2, &super_2, "user");

  let kind = EntityKind::from("user");
  let mediums = w.resolver().mediums_subscribed(&s1, &super_3, Some(&kind)).await.unwrap();
  assert_eq!(mediums, vec![m1]);
}

#[tokio::test]
async fn group_mediums_ignore_unsubscribes() {
  let mut w = World::new();
  let team = w.entity("team");
  let user = w.entity("user");
  w.dir.relate(&team, &user);
  let (s1, m1) = (w.source_1.clone(), w.medium_1.clone());
  w.group_grant(&s1, &m1, &team, "user");
  w.revoke(&s1, &m1, &user);

  let kind = EntityKind::from("user");
  let r = w.resolver();
  assert_eq!(r.mediums_subscribed(&s1, &team, Some(&kind)).await.unwrap(), vec![m1.clone()]);
  assert!(r.is_subscribed(&s1, &m1, &team, Some(&kind)).await.unwrap());
  assert!(!r.is_subscribed(&s1, &m1, &user, None).await.unwrap());
}

#[tokio::test]
async fn group_without_members_has_no_mediums() {
  let mut w = World::new();
  let team = w.entity("team");
  let (s1, m1) = (w.source_1.clone(), w.medium_1.clone());
  w.group_grant(&s1, &m1, &team, "user");

  let kind = EntityKind::from("user");
  let r = w.resolver();
  assert!(r.mediums_subscribed(&s1, &team, Some(&kind)).await.unwrap().is_empty());
  assert!(!r.is_subscribed(&s1, &m1, &team, Some(&kind)).await.unwrap());
}

// ─── is_subscribed ───────────────────────────────────────────────────────────

#[tokio::test]
async fn is_subscribed_individual_grant() {
  let mut w = World::new();
  let e = w.entity("user");
  let (s1, m1, m2) = (w.source_1.clone(), w.medium_1.clone(), w.medium_2.clone());
  w.grant(&s1, &m1, &e);

  let r = w.resolver();
  assert!(r.is_subscribed(&s1, &m1, &e, None).await.unwrap());
  assert!(!r.is_subscribed(&s1, &m2, &e, None).await.unwrap());
}

#[tokio::test]
async fn unsubscribe_overrides_individual_and_group_grants() {
  let mut w = World::new();
  let team = w.entity("team");
  let user = w.entity("user");
  w.dir.relate(&team, &user);
  let (s1, m1) = (w.source_1.clone(), w.medium_1.clone());
  w.grant(&s1, &m1, &user);
  w.group_grant(&s1, &m1, &team, "user");
  assert!(w.resolver().is_subscribed(&s1, &m1, &user, None).await.unwrap());

  w.revoke(&s1, &m1, &user);
  let r = w.resolver();
  assert!(!r.is_subscribed(&s1, &m1, &user, None).await.unwrap());
  assert!(r.mediums_subscribed(&s1, &user, None).await.unwrap().is_empty());
  assert!(r.is_unsubscribed(&s1, &m1, &user).await.unwrap());
}

#[tokio::test]
async fn is_subscribed_group_across_supers() {
  let mut w = World::new();
  let super_1 = w.entity("team");
  let super_2 = w.entity("team");
  let sub = w.entity("user");
  w.dir.relate(&super_1, &sub);
  w.dir.relate(&super_2, &sub);
  let (s1, m1, m2) = (w.source_1.clone(), w.medium_1.clone(), w.medium_2.clone());
  w.group_grant(&s1, &m1, &super_1, "user");

  let kind = EntityKind::from("user");
  let r = w.resolver();
  assert!(r.is_subscribed(&s1, &m1, &super_2, Some(&kind)).await.unwrap());
  assert!(!r.is_subscribed(&s1, &m2, &super_2, Some(&kind)).await.unwrap());
}

#[tokio::test]
async fn super_and_sub_scenario() {
  let mut w = World::new();
  let sup = w.entity("k_super");
  let sub = w.entity("k_sub");
  w.dir.relate(&sup, &sub);
  let (s1, m1) = (w.source_1.clone(), w.medium_1.clone());
  w.group_grant(&s1, &m1, &sup, "k_sub");

  let r = w.resolver();
  assert_eq!(r.mediums_subscribed(&s1, &sub, None).await.unwrap(), vec![m1.clone()]);
  assert!(r.is_subscribed(&s1, &m1, &sub, None).await.unwrap());
  assert!(!r.is_subscribed(&s1, &m1, &sup, None).await.unwrap());

  w.revoke(&s1, &m1, &sub);
  let r = w.resolver();
  assert!(r.mediums_subscribed(&s1, &sub, None).await.unwrap().is_empty());
  assert!(!r.is_subscribed(&s1, &m1, &sub, None).await.unwrap());
  assert!(!r.is_subscribed(&s1, &m1, &sup, None).await.unwrap());
}

// ─── filter_subscribed ───────────────────────────────────────────────────────

#[tokio::test]
async fn filter_returns_individual_and_group_members() {
  let mut w = World::new();
  let team = w.entity("team");
  let e1 = w.entity("user");
  let e2 = w.entity("user");
  let e3 = w.entity("user");
  let e4 = w.entity("user");
  w.dir.relate(&team, &e3);
  let (s1, m1) = (w.source_1.clone(), w.medium_1.clone());
  w.grant(&s1, &m1, &e1);
  w.group_grant(&s1, &m1, &team, "user");

  let input = [e1.clone(), e2, e3.clone(), e4];
  let got = w.resolver().filter_subscribed(&s1, &m1, &input).await.unwrap();
  assert_eq!(got, vec![e1, e3]);
}

#[tokio::test]
async fn filter_removes_unsubscribed() {
  let mut w = World::new();
  let team = w.entity("team");
  let e1 = w.entity("user");
  let e2 = w.entity("user");
  w.dir.relate(&team, &e1);
  w.dir.relate(&team, &e2);
  let (s1, m1) = (w.source_1.clone(), w.medium_1.clone());
  w.group_grant(&s1, &m1, &team, "user");
  w.revoke(&s1, &m1, &e2);

  let got = w
    .resolver()
    .filter_subscribed(&s1, &m1, &[e1.clone(), e2])
    .await
    .unwrap();
  assert_eq!(got, vec![e1]);
}

#[tokio::test]
async fn filter_is_a_subset_of_input() {
  let mut w = World::new();
  let team = w.entity("team");
  let inside = w.entity("user");
  let outside = w.entity("user");
  w.dir.relate(&team, &inside);
  w.dir.relate(&team, &outside);
  let (s1, m1) = (w.source_1.clone(), w.medium_1.clone());
  w.group_grant(&s1, &m1, &team, "user");
  w.grant(&s1, &m1, &outside);

  let input = [inside.clone(), inside.clone()];
  let got = w.resolver().filter_subscribed(&s1, &m1, &input).await.unwrap();
  assert_eq!(got, vec![inside.clone()]);
  assert!(ids(&got).is_subset(&ids(&input)));
}

#[tokio::test]
async fn filter_respects_medium_and_kind() {
  let mut w = World::new();
  let team = w.entity("team");
  let e1 = w.entity("user");
  let e2 = w.entity("user");
  w.dir.relate(&team, &e1);
  let (s1, m1, m2) = (w.source_1.clone(), w.medium_1.clone(), w.medium_2.clone());
  w.group_grant(&s1, &m1, &team, "admin");
  w.grant(&s1, &m2, &e2);

  let got = w.resolver().filter_subscribed(&s1, &m1, &[e1, e2]).await.unwrap();
  assert!(got.is_empty());
}

#[tokio::test]
async fn filter_does_not_count_anchor_as_member() {
  let mut w = World::new();
  let t1 = w.entity("team");
  let t2 = w.entity("team");
  let (s1, m1) = (w.source_1.clone(), w.medium_1.clone());
  w.group_grant(&s1, &m1, &t1, "team");

  let got = w.resolver().filter_subscribed(&s1, &m1, &[t1, t2]).await.unwrap();
  assert!(got.is_empty());
}

#[tokio::test]
async fn filter_rejects_mixed_kinds_before_any_lookup() {
  let mut w = World::new();
  let user = w.entity("user");
  let team = w.entity("team");
  let (s1, m1) = (w.source_1.clone(), w.medium_1.clone());

  let (dir, dir_calls) = Counting::new(&w.dir);
  let (store, store_calls) = Counting::new(&w.store);
  let r = Resolver::new(dir, store);

  let err = r.filter_subscribed(&s1, &m1, &[user, team]).await.unwrap_err();
  assert!(matches!(err, Error::InvalidArgument(_)));
  assert_eq!(dir_calls.load(Ordering::SeqCst), 0);
  assert_eq!(store_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn filter_empty_input_is_empty() {
  let w = World::new();
  let (store, store_calls) = Counting::new(&w.store);
  let r = Resolver::new(&w.dir, store);

  let got = r.filter_subscribed(&w.source_1, &w.medium_1, &[]).await.unwrap();
  assert!(got.is_empty());
  assert_eq!(store_calls.load(Ordering::SeqCst), 0);
}

// ─── Round-trip bounds ───────────────────────────────────────────────────────

/// A team of `n` users, each also in a sub-team, with a mix of grants.
fn wide_world(n: usize) -> (World, Entity, Vec<Entity>) {
  let mut w = World::new();
  let org = w.entity("organization");
  let (s1, m1, m2) = (w.source_1.clone(), w.medium_1.clone(), w.medium_2.clone());
  let mut users = Vec::new();
  for i in 0..n {
    let team = w.entity("team");
    w.dir.relate(&org, &team);
    let user = w.entity("user");
    w.dir.relate(&team, &user);
    if i % 3 == 0 {
      w.group_grant(&s1, &m1, &team, "user");
    }
    if i % 5 == 0 {
      w.grant(&s1, &m1, &user);
      w.grant(&s1, &m2, &user);
    }
    users.push(user);
  }
  (w, org, users)
}

#[tokio::test]
async fn individual_resolution_uses_fixed_round_trips() {
  let (w, _, users) = wide_world(40);
  let (dir, dir_calls) = Counting::new(&w.dir);
  let (store, store_calls) = Counting::new(&w.store);
  let r = Resolver::new(dir, store);

  r.mediums_subscribed(&w.source_1, &users[0], None).await.unwrap();
  assert_eq!(dir_calls.load(Ordering::SeqCst), 1);
  assert_eq!(store_calls.load(Ordering::SeqCst), 2);

  dir_calls.store(0, Ordering::SeqCst);
  store_calls.store(0, Ordering::SeqCst);
  r.is_subscribed(&w.source_1, &w.medium_1, &users[0], None).await.unwrap();
  assert_eq!(dir_calls.load(Ordering::SeqCst), 1);
  assert!(store_calls.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn group_resolution_uses_fixed_round_trips() {
  let (w, org, _) = wide_world(40);
  let (dir, dir_calls) = Counting::new(&w.dir);
  let (store, store_calls) = Counting::new(&w.store);
  let r = Resolver::new(dir, store);
  let kind = EntityKind::from("user");

  let mediums = r.mediums_subscribed(&w.source_1, &org, Some(&kind)).await.unwrap();
  assert_eq!(names(&mediums), ["email"]);
  assert_eq!(dir_calls.load(Ordering::SeqCst), 2);
  assert_eq!(store_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn filter_uses_fixed_round_trips() {
  for n in [3, 60] {
    let (w, _, users) = wide_world(n);
    let (dir, dir_calls) = Counting::new(&w.dir);
    let (store, store_calls) = Counting::new(&w.store);
    let r = Resolver::new(dir, store);

    let got = r.filter_subscribed(&w.source_1, &w.medium_1, &users).await.unwrap();
    let expected: Vec<Entity> = users
      .iter()
      .enumerate()
      .filter(|(i, _)| i % 3 == 0 || i % 5 == 0)
      .map(|(_, u)| u.clone())
      .collect();
    assert_eq!(got, expected);
    assert!(dir_calls.load(Ordering::SeqCst) <= 1);
    assert!(store_calls.load(Ordering::SeqCst) <= 3);
  }
}

#[tokio::test]
async fn is_unsubscribed_is_a_single_lookup() {
  let mut w = World::new();
  let e = w.entity("user");
  let (s1, m1, m2) = (w.source_1.clone(), w.medium_1.clone(), w.medium_2.clone());
  w.revoke(&s1, &m1, &e);

  let (store, store_calls) = Counting::new(&w.store);
  let r = Resolver::new(&w.dir, store);
  assert!(r.is_unsubscribed(&s1, &m1, &e).await.unwrap());
  assert!(!r.is_unsubscribed(&s1, &m2, &e).await.unwrap());
  assert_eq!(store_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn resolver_exposes_its_collaborators() {
  let mut w = World::new();
  let team = w.entity("team");
  let user = w.entity("user");
  w.dir.relate(&team, &user);
  let (s1, m1) = (w.source_1.clone(), w.medium_1.clone());
  w.revoke(&s1, &m1, &user);

  let r = w.resolver();
  assert_eq!(r.directory().kind_of(user.entity_id), Some(&user.kind));
  assert_eq!(r.directory().kind_of(Uuid::new_v4()), None);
  let members = r.directory().descendants_of(&team, &user.kind).await.unwrap();
  assert_eq!(members, HashSet::from([user.entity_id]));

  let revoked = r
    .store()
    .unsubscribes(&RevocationQuery::new(s1.source_id).entities([user.entity_id]))
    .await
    .unwrap();
  assert_eq!(revoked.len(), 1);
  assert_eq!(revoked[0].medium_id, m1.medium_id);
}
