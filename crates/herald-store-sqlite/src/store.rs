//! The SQLite implementation of [`SubscriptionStore`], plus
//! the administrative writes for the catalog, entities, and grants.

use std::{collections::HashSet, path::Path};

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use herald_core::{
  catalog::{Medium, NewCatalogEntry, Source},
  entity::{Entity, EntityKind},
  query::{GrantQuery, RevocationQuery},
  store::SubscriptionStore,
  subscription::{NewSubscription, NewUnsubscribe, Subscription, Unsubscribe},
};

use crate::{
  Error, Result,
  encode::{
    MEDIUM_COLUMNS, RawCatalogEntry, RawEntity, RawSubscription, RawUnsubscribe,
    ID_SET, SOURCE_COLUMNS, SUBSCRIPTION_COLUMNS, UNSUBSCRIBE_COLUMNS, decode_uuid_set,
    encode_dt, encode_uuid, encode_uuid_set,
  },
  filter::{grant_predicate, revocation_predicate},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Herald store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    tracing::debug!(path = %path.display(), "opened store");
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a single-column query returning entity ids.
  pub(crate) async fn query_ids(
    &self,
    sql: String,
    params: Vec<String>,
  ) -> Result<HashSet<Uuid>> {
    let raw: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    decode_uuid_set(raw)
  }

  // ── Catalog ───────────────────────────────────────────────────────────────

  /// Insert a catalog row, failing with [`Error::Duplicate`] if the name is
  /// taken.
  async fn insert_catalog(
    &self,
    table: &'static str,
    id_column: &'static str,
    id: Uuid,
    entry: &NewCatalogEntry,
  ) -> Result<()> {
    let id_str       = encode_uuid(id);
    let name         = entry.name.clone();
    let display_name = entry.display_name.clone();
    let description  = entry.description.clone();

    let inserted: bool = self
      .conn
      .call(move |conn| {
        let taken = conn
          .query_row(
            &format!("SELECT 1 FROM {table} WHERE name = ?1"),
            rusqlite::params![name],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if taken {
          return Ok(false);
        }

        conn.execute(
          &format!(
            "INSERT INTO {table} ({id_column}, name, display_name, description)
             VALUES (?1, ?2, ?3, ?4)"
          ),
          rusqlite::params![id_str, name, display_name, description],
        )?;
        Ok(true)
      })
      .await?;

    if !inserted {
      return Err(Error::Duplicate(entry.name.clone()));
    }
    Ok(())
  }

  async fn select_catalog(
    &self,
    sql: String,
    params: Vec<String>,
  ) -> Result<Vec<RawCatalogEntry>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          let mut stmt = conn.prepare(&sql)?;
          let rows = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), RawCatalogEntry::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?,
    )
  }

  /// Create a source. Names are unique.
  pub async fn add_source(&self, entry: NewCatalogEntry) -> Result<Source> {
    let source_id = Uuid::new_v4();
    self
      .insert_catalog("sources", "source_id", source_id, &entry)
      .await?;
    Ok(Source {
      source_id,
      name: entry.name,
      display_name: entry.display_name,
      description: entry.description,
    })
  }

  /// Create a medium. Names are unique.
  pub async fn add_medium(&self, entry: NewCatalogEntry) -> Result<Medium> {
    let medium_id = Uuid::new_v4();
    self
      .insert_catalog("mediums", "medium_id", medium_id, &entry)
      .await?;
    Ok(Medium {
      medium_id,
      name: entry.name,
      display_name: entry.display_name,
      description: entry.description,
    })
  }

  /// Look up a source by its unique name. Returns `None` if not found.
  pub async fn source_by_name(&self, name: &str) -> Result<Option<Source>> {
    let sql = format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE name = ?");
    let raws = self.select_catalog(sql, vec![name.to_owned()]).await?;
    raws.into_iter().next().map(RawCatalogEntry::into_source).transpose()
  }

  /// Look up a medium by its unique name. Returns `None` if not found.
  pub async fn medium_by_name(&self, name: &str) -> Result<Option<Medium>> {
    let sql = format!("SELECT {MEDIUM_COLUMNS} FROM mediums WHERE name = ?");
    let raws = self.select_catalog(sql, vec![name.to_owned()]).await?;
    raws.into_iter().next().map(RawCatalogEntry::into_medium).transpose()
  }

  /// All sources, ordered by name.
  pub async fn list_sources(&self) -> Result<Vec<Source>> {
    let sql = format!("SELECT {SOURCE_COLUMNS} FROM sources ORDER BY name");
    let raws = self.select_catalog(sql, Vec::new()).await?;
    raws.into_iter().map(RawCatalogEntry::into_source).collect()
  }

  /// All mediums, ordered by name.
  pub async fn list_mediums(&self) -> Result<Vec<Medium>> {
    let sql = format!("SELECT {MEDIUM_COLUMNS} FROM mediums ORDER BY name");
    let raws = self.select_catalog(sql, Vec::new()).await?;
    raws.into_iter().map(RawCatalogEntry::into_medium).collect()
  }

  // ── Entities ──────────────────────────────────────────────────────────────

  /// Create and persist a new entity of `kind`.
  pub async fn add_entity(&self, kind: impl Into<EntityKind>) -> Result<Entity> {
    let entity = Entity::new(Uuid::new_v4(), kind);
    self.insert_entity(&entity).await?;
    Ok(entity)
  }

  /// Persist an entity with a caller-supplied id, e.g. one mirrored from an
  /// external directory.
  pub async fn insert_entity(&self, entity: &Entity) -> Result<()> {
    let id_str   = encode_uuid(entity.entity_id);
    let kind_str = entity.kind.as_str().to_owned();
    let at_str   = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO entities (entity_id, kind, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, kind_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Retrieve an entity by id. Returns `None` if not found.
  pub async fn get_entity(&self, entity_id: Uuid) -> Result<Option<Entity>> {
    Ok(self.get_entities(&[entity_id]).await?.into_iter().next())
  }

  /// Retrieve every listed entity that exists, in no particular order.
  pub async fn get_entities(&self, entity_ids: &[Uuid]) -> Result<Vec<Entity>> {
    if entity_ids.is_empty() {
      return Ok(Vec::new());
    }
    let sql = format!("SELECT entity_id, kind FROM entities WHERE entity_id IN ({ID_SET})");
    let params = vec![encode_uuid_set(entity_ids)];

    let raws: Vec<RawEntity> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            Ok(RawEntity { entity_id: row.get(0)?, kind: row.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntity::into_entity).collect()
  }

  /// Record that `sub_id` sits directly beneath `super_id`. Recording an
  /// existing edge again is a no-op.
  pub async fn relate(&self, super_id: Uuid, sub_id: Uuid) -> Result<()> {
    if super_id == sub_id {
      return Err(Error::SelfRelationship(super_id));
    }
    let super_str = encode_uuid(super_id);
    let sub_str   = encode_uuid(sub_id);

    let missing: Option<Uuid> = self
      .conn
      .call(move |conn| {
        for (id, uuid) in [(&super_str, super_id), (&sub_str, sub_id)] {
          let exists = conn
            .query_row(
              "SELECT 1 FROM entities WHERE entity_id = ?1",
              rusqlite::params![id],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
          if !exists {
            return Ok(Some(uuid));
          }
        }

        conn.execute(
          "INSERT OR IGNORE INTO entity_relationships (super_entity_id, sub_entity_id)
           VALUES (?1, ?2)",
          rusqlite::params![super_str, sub_str],
        )?;
        Ok(None)
      })
      .await?;

    match missing {
      Some(id) => Err(Error::UnknownEntity(id)),
      None => Ok(()),
    }
  }

  // ── Grants and revocations ────────────────────────────────────────────────

  /// Record a grant. Identical grants are stored again, not merged.
  pub async fn subscribe(&self, input: NewSubscription) -> Result<Subscription> {
    let subscription = Subscription {
      subscription_id: Uuid::new_v4(),
      source_id:       input.source_id,
      medium_id:       input.medium_id,
      entity_id:       input.entity_id,
      subentity_kind:  input.subentity_kind,
      created_at:      Utc::now(),
    };

    let id_str     = encode_uuid(subscription.subscription_id);
    let source_str = encode_uuid(subscription.source_id);
    let medium_str = encode_uuid(subscription.medium_id);
    let entity_str = encode_uuid(subscription.entity_id);
    let kind_str   = subscription
      .subentity_kind
      .as_ref()
      .map(|k| k.as_str().to_owned());
    let at_str     = encode_dt(subscription.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO subscriptions (
             subscription_id, source_id, medium_id, entity_id, subentity_kind, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, source_str, medium_str, entity_str, kind_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(subscription)
  }

  /// Record an individual opt-out.
  pub async fn unsubscribe(&self, input: NewUnsubscribe) -> Result<Unsubscribe> {
    let unsubscribe = Unsubscribe {
      unsubscribe_id: Uuid::new_v4(),
      entity_id:      input.entity_id,
      source_id:      input.source_id,
      medium_id:      input.medium_id,
      created_at:     Utc::now(),
    };

    let id_str     = encode_uuid(unsubscribe.unsubscribe_id);
    let entity_str = encode_uuid(unsubscribe.entity_id);
    let source_str = encode_uuid(unsubscribe.source_id);
    let medium_str = encode_uuid(unsubscribe.medium_id);
    let at_str     = encode_dt(unsubscribe.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO unsubscribes (unsubscribe_id, entity_id, source_id, medium_id, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, entity_str, source_str, medium_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(unsubscribe)
  }

  /// Remove a grant; returns `false` if it did not exist.
  pub async fn delete_subscription(&self, subscription_id: Uuid) -> Result<bool> {
    self
      .delete_by_id(
        "DELETE FROM subscriptions WHERE subscription_id = ?1",
        subscription_id,
      )
      .await
  }

  /// Remove an opt-out; returns `false` if it did not exist.
  pub async fn delete_unsubscribe(&self, unsubscribe_id: Uuid) -> Result<bool> {
    self
      .delete_by_id(
        "DELETE FROM unsubscribes WHERE unsubscribe_id = ?1",
        unsubscribe_id,
      )
      .await
  }

  async fn delete_by_id(&self, sql: &'static str, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let affected: usize = self
      .conn
      .call(move |conn| Ok(conn.execute(sql, rusqlite::params![id_str])?))
      .await?;
    Ok(affected > 0)
  }
}

// ─── SubscriptionStore impl ──────────────────────────────────────────────────

impl SubscriptionStore for SqliteStore {
  type Error = Error;

  async fn subscriptions(&self, query: &GrantQuery) -> Result<Vec<Subscription>> {
    if query.is_empty() {
      return Ok(Vec::new());
    }
    let predicate = grant_predicate(query);
    let sql = format!(
      "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions s WHERE {}",
      predicate.sql
    );
    let params = predicate.params;

    let raws: Vec<RawSubscription> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawSubscription::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubscription::into_subscription).collect()
  }

  async fn subscribed_mediums(&self, query: &GrantQuery) -> Result<Vec<Medium>> {
    if query.is_empty() {
      return Ok(Vec::new());
    }
    let predicate = grant_predicate(query);
    let sql = format!(
      "SELECT DISTINCT m.medium_id, m.name, m.display_name, m.description
       FROM subscriptions s
       JOIN mediums m ON m.medium_id = s.medium_id
       WHERE {}
       ORDER BY m.name",
      predicate.sql
    );

    let raws = self.select_catalog(sql, predicate.params).await?;
    raws.into_iter().map(RawCatalogEntry::into_medium).collect()
  }

  async fn grant_exists(&self, query: &GrantQuery) -> Result<bool> {
    if query.is_empty() {
      return Ok(false);
    }
    let predicate = grant_predicate(query);
    let sql = format!(
      "SELECT EXISTS (SELECT 1 FROM subscriptions s WHERE {})",
      predicate.sql
    );
    let params = predicate.params;

    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(conn.query_row(&sql, rusqlite::params_from_iter(params.iter()), |row| {
            row.get::<_, bool>(0)
          })?)
        })
        .await?,
    )
  }

  async fn unsubscribes(&self, query: &RevocationQuery) -> Result<Vec<Unsubscribe>> {
    if query.is_empty() {
      return Ok(Vec::new());
    }
    let predicate = revocation_predicate(query);
    let sql = format!(
      "SELECT {UNSUBSCRIBE_COLUMNS} FROM unsubscribes u WHERE {}",
      predicate.sql
    );
    let params = predicate.params;

    let raws: Vec<RawUnsubscribe> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawUnsubscribe::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUnsubscribe::into_unsubscribe).collect()
  }

  async fn is_unsubscribed(
    &self,
    source_id: Uuid,
    medium_id: Uuid,
    entity_id: Uuid,
  ) -> Result<bool> {
    let source_str = encode_uuid(source_id);
    let medium_str = encode_uuid(medium_id);
    let entity_str = encode_uuid(entity_id);

    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(conn.query_row(
            "SELECT EXISTS (
               SELECT 1 FROM unsubscribes
               WHERE source_id = ?1 AND medium_id = ?2 AND entity_id = ?3
             )",
            rusqlite::params![source_str, medium_str, entity_str],
            |row| row.get::<_, bool>(0),
          )?)
        })
        .await?,
    )
  }
}
