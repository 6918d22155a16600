//! Command implementations and output formatting.

use std::collections::HashMap;

use anyhow::{Context as _, Result, anyhow, bail};
use herald_core::{
  Resolver,
  catalog::{Medium, NewCatalogEntry, Source},
  entity::{Entity, EntityKind},
  query::{GrantQuery, GrantScope, RevocationQuery},
  store::SubscriptionStore,
  subscription::{NewSubscription, NewUnsubscribe},
};
use herald_store_sqlite::SqliteStore;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::{CatalogAction, Command, EntityAction, RecordAction};

pub async fn run(store: &SqliteStore, command: Command, json: bool) -> Result<()> {
  let out = Output { json };
  let resolver = Resolver::new(store, store);

  match command {
    // ── Catalog ─────────────────────────────────────────────────────────────
    Command::Source { action } => match action {
      CatalogAction::Add { name, display_name, description } => {
        let source = store
          .add_source(NewCatalogEntry { name, display_name, description })
          .await
          .context("failed to add source")?;
        out.record(&source, &format!("{} ({})", source.name, source.source_id))
      }
      CatalogAction::List => {
        let sources = store.list_sources().await.context("failed to list sources")?;
        out.list(&sources, |s| format!("{}\t{}\t{}", s.name, s.display_name, s.source_id))
      }
    },
    Command::Medium { action } => match action {
      CatalogAction::Add { name, display_name, description } => {
        let medium = store
          .add_medium(NewCatalogEntry { name, display_name, description })
          .await
          .context("failed to add medium")?;
        out.record(&medium, &format!("{} ({})", medium.name, medium.medium_id))
      }
      CatalogAction::List => {
        let mediums = store.list_mediums().await.context("failed to list mediums")?;
        out.list(&mediums, |m| format!("{}\t{}\t{}", m.name, m.display_name, m.medium_id))
      }
    },

    // ── Entities ────────────────────────────────────────────────────────────
    Command::Entity { action } => match action {
      EntityAction::Add { kind } => {
        let entity = store.add_entity(kind).await.context("failed to add entity")?;
        out.record(&entity, &entity.entity_id.to_string())
      }
      EntityAction::Relate { super_id, sub_id } => {
        store
          .relate(super_id, sub_id)
          .await
          .with_context(|| format!("failed to relate {super_id} to {sub_id}"))?;
        out.record(
          &json!({ "super_entity_id": super_id, "sub_entity_id": sub_id }),
          &format!("{super_id} -> {sub_id}"),
        )
      }
    },

    // ── Grants and revocations ──────────────────────────────────────────────
    Command::Subscribe { source, medium, entity, subentity_kind } => {
      let (source, medium, entity) = lookup(store, &source, &medium, entity).await?;
      let input = match subentity_kind {
        None => NewSubscription::individual(source.source_id, medium.medium_id, entity.entity_id),
        Some(kind) => {
          NewSubscription::group(source.source_id, medium.medium_id, entity.entity_id, kind)
        }
      };
      let subscription = store.subscribe(input).await.context("failed to subscribe")?;
      out.record(&subscription, &subscription.describe(&entity, &source, &medium))
    }
    Command::Unsubscribe { source, medium, entity } => {
      let (source, medium, entity) = lookup(store, &source, &medium, entity).await?;
      let unsubscribe = store
        .unsubscribe(NewUnsubscribe {
          entity_id: entity.entity_id,
          source_id: source.source_id,
          medium_id: medium.medium_id,
        })
        .await
        .context("failed to unsubscribe")?;
      out.record(&unsubscribe, &unsubscribe.describe(&entity, &source, &medium))
    }

    // ── Resolution ──────────────────────────────────────────────────────────
    Command::Mediums { source, entity, subentity_kind } => {
      let source = find_source(store, &source).await?;
      let entity = find_entity(store, entity).await?;
      let kind = subentity_kind.map(EntityKind::new);
      let mediums = resolver
        .mediums_subscribed(&source, &entity, kind.as_ref())
        .await
        .context("failed to resolve mediums")?;
      out.list(&mediums, |m| m.name.clone())
    }
    Command::Check { source, medium, entity, subentity_kind } => {
      let (source, medium, entity) = lookup(store, &source, &medium, entity).await?;
      let kind = subentity_kind.map(EntityKind::new);
      let subscribed = resolver
        .is_subscribed(&source, &medium, &entity, kind.as_ref())
        .await
        .context("failed to check subscription")?;
      out.flag("subscribed", subscribed)
    }
    Command::Filter { source, medium, entities } => {
      let source = find_source(store, &source).await?;
      let medium = find_medium(store, &medium).await?;
      let entities = find_entities(store, &entities).await?;
      let subscribed = resolver
        .filter_subscribed(&source, &medium, &entities)
        .await
        .context("failed to filter entities")?;
      out.list(&subscribed, |e| e.entity_id.to_string())
    }
    Command::Unsubscribed { source, medium, entity } => {
      let (source, medium, entity) = lookup(store, &source, &medium, entity).await?;
      let unsubscribed = resolver
        .is_unsubscribed(&source, &medium, &entity)
        .await
        .context("failed to check unsubscribe")?;
      out.flag("unsubscribed", unsubscribed)
    }

    // ── Stored records ──────────────────────────────────────────────────────
    Command::Subscriptions { action } => match action {
      RecordAction::List { source, medium, entity } => {
        let source = find_source(store, &source).await?;
        let scope = GrantScope::Any { entity_ids: entity.map(|id| vec![id]) };
        let mut query = GrantQuery::new(source.source_id).scope(scope);
        if let Some(name) = medium {
          query = query.medium(find_medium(store, &name).await?.medium_id);
        }
        let mut rows = store
          .subscriptions(&query)
          .await
          .context("failed to list subscriptions")?;
        rows.sort_by_key(|r| r.created_at);

        let labels = Labels::load(store, rows.iter().map(|r| r.entity_id)).await?;
        let lines = rows
          .iter()
          .map(|r| {
            let (entity, medium) = labels.get(r.entity_id, r.medium_id)?;
            let kind = r.subentity_kind.as_ref().map_or("-", EntityKind::as_str);
            Ok(format!("{}\t{kind}\t{}", r.subscription_id, r.describe(entity, &source, medium)))
          })
          .collect::<Result<Vec<_>>>()?;
        out.table(&rows, &lines)
      }
      RecordAction::Delete { id } => {
        let deleted = store
          .delete_subscription(id)
          .await
          .context("failed to delete subscription")?;
        if !deleted {
          bail!("unknown subscription {id}");
        }
        out.record(&json!({ "subscription_id": id }), &format!("deleted {id}"))
      }
    },
    Command::Unsubscribes { action } => match action {
      RecordAction::List { source, medium, entity } => {
        let source = find_source(store, &source).await?;
        let mut query = RevocationQuery::new(source.source_id);
        if let Some(name) = medium {
          query = query.medium(find_medium(store, &name).await?.medium_id);
        }
        if let Some(id) = entity {
          query = query.entities([id]);
        }
        let mut rows = store
          .unsubscribes(&query)
          .await
          .context("failed to list unsubscribes")?;
        rows.sort_by_key(|r| r.created_at);

        let labels = Labels::load(store, rows.iter().map(|r| r.entity_id)).await?;
        let lines = rows
          .iter()
          .map(|r| {
            let (entity, medium) = labels.get(r.entity_id, r.medium_id)?;
            Ok(format!("{}\t{}", r.unsubscribe_id, r.describe(entity, &source, medium)))
          })
          .collect::<Result<Vec<_>>>()?;
        out.table(&rows, &lines)
      }
      RecordAction::Delete { id } => {
        let deleted = store
          .delete_unsubscribe(id)
          .await
          .context("failed to delete unsubscribe")?;
        if !deleted {
          bail!("unknown unsubscribe {id}");
        }
        out.record(&json!({ "unsubscribe_id": id }), &format!("deleted {id}"))
      }
    },
  }
}

// ─── Lookups ─────────────────────────────────────────────────────────────────

async fn find_source(store: &SqliteStore, name: &str) -> Result<Source> {
  store
    .source_by_name(name)
    .await
    .context("failed to look up source")?
    .ok_or_else(|| anyhow!("unknown source {name:?}"))
}

async fn find_medium(store: &SqliteStore, name: &str) -> Result<Medium> {
  store
    .medium_by_name(name)
    .await
    .context("failed to look up medium")?
    .ok_or_else(|| anyhow!("unknown medium {name:?}"))
}

async fn find_entity(store: &SqliteStore, id: Uuid) -> Result<Entity> {
  store
    .get_entity(id)
    .await
    .context("failed to look up entity")?
    .ok_or_else(|| anyhow!("unknown entity {id}"))
}

/// Resolve every id, preserving the order given on the command line.
async fn find_entities(store: &SqliteStore, ids: &[Uuid]) -> Result<Vec<Entity>> {
  let found = store
    .get_entities(ids)
    .await
    .context("failed to look up entities")?;
  ids
    .iter()
    .map(|id| {
      found
        .iter()
        .find(|e| e.entity_id == *id)
        .cloned()
        .ok_or_else(|| anyhow!("unknown entity {id}"))
    })
    .collect()
}

async fn lookup(
  store: &SqliteStore,
  source: &str,
  medium: &str,
  entity: Uuid,
) -> Result<(Source, Medium, Entity)> {
  Ok((
    find_source(store, source).await?,
    find_medium(store, medium).await?,
    find_entity(store, entity).await?,
  ))
}

/// The entities and mediums referenced by a batch of stored records.
struct Labels {
  entities: HashMap<Uuid, Entity>,
  mediums:  HashMap<Uuid, Medium>,
}

impl Labels {
  async fn load(store: &SqliteStore, entity_ids: impl Iterator<Item = Uuid>) -> Result<Self> {
    let entity_ids: Vec<Uuid> = entity_ids.collect();
    let entities = store
      .get_entities(&entity_ids)
      .await
      .context("failed to look up entities")?
      .into_iter()
      .map(|e| (e.entity_id, e))
      .collect();
    let mediums = store
      .list_mediums()
      .await
      .context("failed to list mediums")?
      .into_iter()
      .map(|m| (m.medium_id, m))
      .collect();
    Ok(Self { entities, mediums })
  }

  fn get(&self, entity_id: Uuid, medium_id: Uuid) -> Result<(&Entity, &Medium)> {
    let entity = self
      .entities
      .get(&entity_id)
      .ok_or_else(|| anyhow!("unknown entity {entity_id}"))?;
    let medium = self
      .mediums
      .get(&medium_id)
      .ok_or_else(|| anyhow!("unknown medium {medium_id}"))?;
    Ok((entity, medium))
  }
}

// ─── Output ──────────────────────────────────────────────────────────────────

struct Output {
  json: bool,
}

impl Output {
  fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
  }

  fn record<T: Serialize>(&self, value: &T, line: &str) -> Result<()> {
    if self.json {
      return self.print_json(value);
    }
    println!("{line}");
    Ok(())
  }

  fn list<T: Serialize>(&self, items: &[T], line: impl Fn(&T) -> String) -> Result<()> {
    if self.json {
      return self.print_json(items);
    }
    for item in items {
      println!("{}", line(item));
    }
    Ok(())
  }

  /// Like [`Output::list`], with the plain-text lines prepared by the caller.
  fn table<T: Serialize>(&self, items: &[T], lines: &[String]) -> Result<()> {
    if self.json {
      return self.print_json(items);
    }
    for line in lines {
      println!("{line}");
    }
    Ok(())
  }

  fn flag(&self, key: &str, value: bool) -> Result<()> {
    if self.json {
      let mut object = serde_json::Map::new();
      object.insert(key.to_owned(), value.into());
      return self.print_json(&object);
    }
    println!("{value}");
    Ok(())
  }
}
