//! [`EntityDirectory`] over the `entities` and `entity_relationships` tables.
//!
//! Each lookup is a single recursive CTE, so traversal cost in round-trips is
//! constant regardless of hierarchy depth. Id lists enter as one JSON array
//! parameter, so breadth is not capped by SQLite's bound-variable limit.
//! `UNION` (not `UNION ALL`) keeps the recursion finite if the edges ever
//! contain a cycle.

use std::collections::HashSet;

use herald_core::{
  directory::EntityDirectory,
  entity::{Entity, EntityKind},
};
use uuid::Uuid;

use crate::{
  Error, Result, SqliteStore,
  encode::{ID_SET, encode_uuid, encode_uuid_set},
};

impl EntityDirectory for SqliteStore {
  type Error = Error;

  async fn ancestors_of(&self, entity: &Entity) -> Result<HashSet<Uuid>> {
    let id = encode_uuid(entity.entity_id);
    let sql = "
      WITH RECURSIVE ancestors(entity_id) AS (
        SELECT super_entity_id FROM entity_relationships WHERE sub_entity_id = ?1
        UNION
        SELECT r.super_entity_id
        FROM entity_relationships r
        JOIN ancestors a ON r.sub_entity_id = a.entity_id
      )
      SELECT entity_id FROM ancestors WHERE entity_id != ?1"
      .to_owned();

    self.query_ids(sql, vec![id]).await
  }

  async fn descendants_of(&self, entity: &Entity, kind: &EntityKind) -> Result<HashSet<Uuid>> {
    let id = encode_uuid(entity.entity_id);
    let sql = "
      WITH RECURSIVE descendants(entity_id) AS (
        SELECT sub_entity_id FROM entity_relationships WHERE super_entity_id = ?1
        UNION
        SELECT r.sub_entity_id
        FROM entity_relationships r
        JOIN descendants d ON r.super_entity_id = d.entity_id
      )
      SELECT d.entity_id
      FROM descendants d
      JOIN entities e ON e.entity_id = d.entity_id
      WHERE e.kind = ?2 AND d.entity_id != ?1"
      .to_owned();

    self.query_ids(sql, vec![id, kind.as_str().to_owned()]).await
  }

  async fn ancestors_of_any(&self, entity_ids: &[Uuid]) -> Result<HashSet<Uuid>> {
    if entity_ids.is_empty() {
      return Ok(HashSet::new());
    }
    let sql = format!(
      "WITH RECURSIVE ancestors(entity_id) AS (
         SELECT super_entity_id FROM entity_relationships WHERE sub_entity_id IN ({ID_SET})
         UNION
         SELECT r.super_entity_id
         FROM entity_relationships r
         JOIN ancestors a ON r.sub_entity_id = a.entity_id
       )
       SELECT entity_id FROM ancestors"
    );

    self.query_ids(sql, vec![encode_uuid_set(entity_ids)]).await
  }

  async fn descendants_among(
    &self,
    anchors: &[Uuid],
    candidates: &[Uuid],
  ) -> Result<HashSet<Uuid>> {
    if anchors.is_empty() || candidates.is_empty() {
      return Ok(HashSet::new());
    }
    // Walk upwards from each candidate, remembering where the walk started.
    let sql = format!(
      "WITH RECURSIVE lineage(sub_id, super_id) AS (
         SELECT sub_entity_id, super_entity_id
         FROM entity_relationships
         WHERE sub_entity_id IN ({ID_SET})
         UNION
         SELECT l.sub_id, r.super_entity_id
         FROM lineage l
         JOIN entity_relationships r ON r.sub_entity_id = l.super_id
       )
       SELECT DISTINCT sub_id FROM lineage
       WHERE super_id != sub_id AND super_id IN ({ID_SET})"
    );
    let params = vec![encode_uuid_set(candidates), encode_uuid_set(anchors)];

    self.query_ids(sql, params).await
  }
}
