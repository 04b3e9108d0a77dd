//! SQL schema for the lifelog SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per calendar date; created on demand.
CREATE TABLE IF NOT EXISTS days (
    day_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    date    TEXT NOT NULL UNIQUE          -- YYYY-MM-DD
);

-- Attribution to a day is derived on read from `end_at`.
CREATE TABLE IF NOT EXISTS sleeps (
    sleep_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    start_at  TEXT NOT NULL,              -- YYYY-MM-DD HH:MM:SS
    end_at    TEXT NOT NULL,
    CHECK (start_at < end_at)
);

CREATE TABLE IF NOT EXISTS counters (
    counter_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    day_id      INTEGER NOT NULL UNIQUE REFERENCES days(day_id),
    count       REAL NOT NULL CHECK (count > 0)
);

CREATE TABLE IF NOT EXISTS record_groups (
    group_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    description  TEXT NOT NULL UNIQUE,
    countable    INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS group_relations (
    relation_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_id    INTEGER NOT NULL REFERENCES record_groups(group_id),
    child_id     INTEGER NOT NULL REFERENCES record_groups(group_id),
    UNIQUE (parent_id, child_id),
    CHECK  (parent_id != child_id)
);

-- Applied in alias_id order within a group.
CREATE TABLE IF NOT EXISTS group_aliases (
    alias_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id  INTEGER NOT NULL REFERENCES record_groups(group_id),
    name      TEXT NOT NULL,
    patterns  TEXT NOT NULL DEFAULT '[]' -- JSON array of regexes
);

CREATE TABLE IF NOT EXISTS basic_records (
    record_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    day_id     INTEGER NOT NULL REFERENCES days(day_id),
    group_id   INTEGER NOT NULL REFERENCES record_groups(group_id)
);

CREATE TABLE IF NOT EXISTS extra_records (
    extra_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    record_id  INTEGER NOT NULL REFERENCES basic_records(record_id),
    key        TEXT NOT NULL
               CHECK (key IN ('description', 'magnitude', 'scale', 'time', 'distance')),
    value      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS records_day_idx    ON basic_records(day_id);
CREATE INDEX IF NOT EXISTS records_group_idx  ON basic_records(group_id);
CREATE INDEX IF NOT EXISTS extras_record_idx  ON extra_records(record_id);
CREATE INDEX IF NOT EXISTS relations_child_idx ON group_relations(child_id);

PRAGMA user_version = 1;
";
