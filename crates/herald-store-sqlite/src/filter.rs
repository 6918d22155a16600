//! Translation of [`GrantQuery`] and [`RevocationQuery`] into SQL predicates.
//!
//! Predicates use anonymous `?` placeholders; the returned parameter list is
//! in textual order and is bound with [`rusqlite::params_from_iter`]. Each id
//! list costs one parameter, however long it is.

use herald_core::query::{GrantQuery, GrantScope, RevocationQuery};
use uuid::Uuid;

use crate::encode::{ID_SET, encode_uuid, encode_uuid_set};

/// A WHERE-clause body plus its bind values.
pub struct Predicate {
  pub sql:    String,
  pub params: Vec<String>,
}

/// `" AND {column} IN (SELECT value FROM json_each(?))"`, binding `ids`.
fn push_id_set(sql: &mut String, params: &mut Vec<String>, column: &str, ids: &[Uuid]) {
  sql.push_str(&format!(" AND {column} IN ({ID_SET})"));
  params.push(encode_uuid_set(ids));
}

/// Predicate over `subscriptions s`. The caller must have checked
/// [`GrantQuery::is_empty`] first; empty scopes are skipped here.
pub fn grant_predicate(query: &GrantQuery) -> Predicate {
  let mut params = vec![encode_uuid(query.source_id)];
  let mut sql = String::from("s.source_id = ?");

  if let Some(medium_id) = query.medium_id {
    sql.push_str(" AND s.medium_id = ?");
    params.push(encode_uuid(medium_id));
  }

  let mut scopes = Vec::new();
  for scope in query.scopes.iter().filter(|s| !s.is_empty()) {
    let (mut clause, ids) = match scope {
      GrantScope::Individual { entity_ids } => {
        (String::from("s.subentity_kind IS NULL"), entity_ids)
      }
      GrantScope::Group { kind, anchors } => {
        params.push(kind.as_str().to_owned());
        (String::from("s.subentity_kind = ?"), anchors)
      }
      GrantScope::Any { entity_ids } => (String::from("1"), entity_ids),
    };
    if let Some(ids) = ids {
      push_id_set(&mut clause, &mut params, "s.entity_id", ids);
    }
    scopes.push(format!("({clause})"));
  }

  if scopes.is_empty() {
    sql.push_str(" AND 0");
  } else {
    sql.push_str(&format!(" AND ({})", scopes.join(" OR ")));
  }

  Predicate { sql, params }
}

/// Predicate over `unsubscribes u`.
pub fn revocation_predicate(query: &RevocationQuery) -> Predicate {
  let mut params = vec![encode_uuid(query.source_id)];
  let mut sql = String::from("u.source_id = ?");

  if let Some(medium_id) = query.medium_id {
    sql.push_str(" AND u.medium_id = ?");
    params.push(encode_uuid(medium_id));
  }
  if let Some(ids) = &query.entity_ids {
    push_id_set(&mut sql, &mut params, "u.entity_id", ids);
  }

  Predicate { sql, params }
}

#[cfg(test)]
mod tests {
  use herald_core::entity::EntityKind;

  use super::*;

  #[test]
  fn grant_predicate_binds_in_textual_order() {
    let e = Uuid::new_v4();
    let a = Uuid::new_v4();
    let m = Uuid::new_v4();
    let query = GrantQuery::new(Uuid::nil())
      .medium(m)
      .scope(GrantScope::individual(e))
      .scope(GrantScope::group_anchored_in(EntityKind::from("user"), [a]));

    let p = grant_predicate(&query);
    assert_eq!(
      p.sql,
      "s.source_id = ? AND s.medium_id = ? AND \
       ((s.subentity_kind IS NULL AND s.entity_id IN (SELECT value FROM json_each(?))) \
       OR (s.subentity_kind = ? AND s.entity_id IN (SELECT value FROM json_each(?))))"
    );
    assert_eq!(p.params, [
      encode_uuid(Uuid::nil()),
      encode_uuid(m),
      format!("[\"{e}\"]"),
      "user".to_owned(),
      format!("[\"{a}\"]"),
    ]);
  }

  #[test]
  fn id_lists_cost_one_parameter() {
    let ids: Vec<Uuid> = (0..40_000).map(|_| Uuid::new_v4()).collect();
    let query = GrantQuery::new(Uuid::nil())
      .scope(GrantScope::Individual { entity_ids: Some(ids.clone()) });
    assert_eq!(grant_predicate(&query).params.len(), 2);

    let revocations = RevocationQuery::new(Uuid::nil()).entities(ids);
    let p = revocation_predicate(&revocations);
    assert_eq!(p.sql, "u.source_id = ? AND u.entity_id IN (SELECT value FROM json_each(?))");
    assert_eq!(p.params.len(), 2);
  }

  #[test]
  fn empty_scopes_are_dropped() {
    let e = Uuid::new_v4();
    let query = GrantQuery::new(Uuid::nil())
      .scope(GrantScope::individual(e))
      .scope(GrantScope::group_anchored_in(EntityKind::from("user"), Vec::new()));

    let p = grant_predicate(&query);
    assert_eq!(
      p.sql,
      "s.source_id = ? AND \
       ((s.subentity_kind IS NULL AND s.entity_id IN (SELECT value FROM json_each(?))))"
    );
    assert_eq!(p.params.len(), 2);
  }

  #[test]
  fn unrestricted_scopes_have_no_id_list() {
    let query = GrantQuery::new(Uuid::nil())
      .scope(GrantScope::Group { kind: EntityKind::from("team"), anchors: None });
    let p = grant_predicate(&query);
    assert_eq!(p.sql, "s.source_id = ? AND ((s.subentity_kind = ?))");

    let query = GrantQuery::new(Uuid::nil()).scope(GrantScope::Any { entity_ids: None });
    assert_eq!(grant_predicate(&query).sql, "s.source_id = ? AND ((1))");
  }
}
