//! Event-log schema and its versioning.
//!
//! Follows the `PRAGMA user_version` check used elsewhere in this
//! codebase's embedded-SQLite layer, but adapted for an append-only store:
//! a version mismatch here is reported as an error rather than handled by
//! dropping and recreating tables, since this log is not safe to discard.

use rusqlite::Connection;

use crate::error::{Error, Result};

pub const SCHEMA_VERSION: i32 = 1;

const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS trace_events (
    event_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp   TEXT NOT NULL,
    event_type  TEXT NOT NULL,
    trace_id    TEXT NOT NULL,
    span_id     TEXT NOT NULL,
    data        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_trace_events_trace ON trace_events(trace_id);
CREATE INDEX IF NOT EXISTS idx_trace_events_span ON trace_events(span_id);
CREATE INDEX IF NOT EXISTS idx_trace_events_type ON trace_events(event_type);

CREATE TABLE IF NOT EXISTS artifacts (
    artifact_hash TEXT PRIMARY KEY,
    artifact_type TEXT NOT NULL,
    content_type  TEXT NOT NULL,
    byte_len      INTEGER NOT NULL,
    storage_path  TEXT NOT NULL,
    created_ts    TEXT NOT NULL,
    metadata      TEXT
);

CREATE TABLE IF NOT EXISTS provenance (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    trace_id             TEXT NOT NULL,
    relation             TEXT NOT NULL,
    subject_span_id      TEXT NOT NULL,
    object_span_id       TEXT,
    object_artifact_hash TEXT,
    timestamp            TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_provenance_trace ON provenance(trace_id);

CREATE TABLE IF NOT EXISTS checkpoints (
    checkpoint_id        TEXT PRIMARY KEY,
    trace_id             TEXT NOT NULL,
    created_ts           TEXT NOT NULL,
    status               TEXT NOT NULL,
    step_number          INTEGER NOT NULL,
    description          TEXT NOT NULL,
    state_artifact_hash  TEXT NOT NULL,
    parent_checkpoint_id TEXT,
    metadata             TEXT
);
CREATE INDEX IF NOT EXISTS idx_checkpoints_trace ON checkpoints(trace_id);
CREATE INDEX IF NOT EXISTS idx_checkpoints_step ON checkpoints(step_number);
CREATE INDEX IF NOT EXISTS idx_checkpoints_status ON checkpoints(status);

CREATE TABLE IF NOT EXISTS cognitive_events (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    trace_id   TEXT NOT NULL,
    event_type TEXT NOT NULL,
    timestamp  REAL NOT NULL,
    phase      TEXT,
    content    TEXT NOT NULL,
    metadata   TEXT
);
CREATE INDEX IF NOT EXISTS idx_cognitive_events_trace ON cognitive_events(trace_id);
"#;

pub fn init_schema(conn: &Connection) -> Result<()> {
    let current: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if current != 0 && current != SCHEMA_VERSION {
        return Err(Error::Corrupt(format!(
            "event log schema version {} is not compatible with this build (expected {}); \
             migrating an append-only log requires a dedicated migration, not a destructive reset",
            current, SCHEMA_VERSION
        )));
    }

    conn.execute_batch(DDL)?;

    if current == 0 {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }

    Ok(())
}
