//! SQL schema for the Herald SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS sources (
    source_id    TEXT PRIMARY KEY,
    name         TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL,
    description  TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS mediums (
    medium_id    TEXT PRIMARY KEY,
    name         TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL,
    description  TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS entities (
    entity_id  TEXT PRIMARY KEY,
    kind       TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Direct super/sub edges. Traversal is transitive at query time.
CREATE TABLE IF NOT EXISTS entity_relationships (
    super_entity_id TEXT NOT NULL REFERENCES entities(entity_id),
    sub_entity_id   TEXT NOT NULL REFERENCES entities(entity_id),
    PRIMARY KEY (super_entity_id, sub_entity_id),
    CHECK (super_entity_id != sub_entity_id)
);

-- Identical grants may coexist; readers treat them as a set.
CREATE TABLE IF NOT EXISTS subscriptions (
    subscription_id TEXT PRIMARY KEY,
    source_id       TEXT NOT NULL REFERENCES sources(source_id),
    medium_id       TEXT NOT NULL REFERENCES mediums(medium_id),
    entity_id       TEXT NOT NULL REFERENCES entities(entity_id),
    subentity_kind  TEXT,            -- NULL for an individual grant
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS unsubscribes (
    unsubscribe_id TEXT PRIMARY KEY,
    entity_id      TEXT NOT NULL REFERENCES entities(entity_id),
    source_id      TEXT NOT NULL REFERENCES sources(source_id),
    medium_id      TEXT NOT NULL REFERENCES mediums(medium_id),
    created_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS relationships_sub_idx     ON entity_relationships(sub_entity_id);
CREATE INDEX IF NOT EXISTS subscriptions_lookup_idx  ON subscriptions(source_id, medium_id);
CREATE INDEX IF NOT EXISTS subscriptions_entity_idx  ON subscriptions(entity_id);
CREATE INDEX IF NOT EXISTS unsubscribes_lookup_idx   ON unsubscribes(entity_id, source_id, medium_id);

PRAGMA user_version = 1;
";
