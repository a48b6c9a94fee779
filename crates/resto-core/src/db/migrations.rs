//! Database migrations
//!
//! Every schema version bump gets its own migration function, even when the
//! change is additive, so an existing mirror is upgraded in place instead of
//! being dropped and refetched.

use crate::error::Result;
use rusqlite::{params, Connection};

/// Current schema version
pub const CURRENT_VERSION: i32 = 4;

/// Run all pending migrations
pub fn run(conn: &mut Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        apply(conn, 1, MIGRATION_V1)?;
    }
    if version < 2 {
        apply(conn, 2, MIGRATION_V2)?;
    }
    if version < 3 {
        apply(conn, 3, MIGRATION_V3)?;
    }
    if version < 4 {
        apply(conn, 4, MIGRATION_V4)?;
    }

    Ok(())
}

/// Get the current schema version
pub fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Version 1: mirrored collections
const MIGRATION_V1: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS restaurants (
        id INTEGER PRIMARY KEY,
        updated_at INTEGER NOT NULL,
        body TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS reviews (
        id INTEGER PRIMARY KEY,
        restaurant_id INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        body TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_reviews_restaurant ON reviews(restaurant_id)",
];

/// Version 2: persisted sync scalars (temporary review id counter)
const MIGRATION_V2: &[&str] = &["CREATE TABLE IF NOT EXISTS sync_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )"];

/// Version 3: last-writer-wins conflict log
const MIGRATION_V3: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS sync_conflicts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        collection TEXT NOT NULL,
        record_id INTEGER NOT NULL,
        local_updated_at INTEGER NOT NULL,
        remote_updated_at INTEGER NOT NULL,
        winner TEXT NOT NULL,
        resolved_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_sync_conflicts_resolved_at ON sync_conflicts(resolved_at DESC)",
];

/// Version 4: confirmed review ids the mirror has held, so a review missing
/// locally can be told apart from one this mirror has never seen
const MIGRATION_V4: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS synced_reviews (
        id INTEGER PRIMARY KEY
    )",
    "INSERT OR IGNORE INTO synced_reviews (id) SELECT id FROM reviews WHERE id > 0",
];

/// Apply one migration's statements and record its version atomically
fn apply(conn: &mut Connection, version: i32, statements: &[&str]) -> Result<()> {
    let tx = conn.transaction()?;
    for statement in statements {
        tx.execute(statement, [])?;
    }
    tx.execute(
        "INSERT INTO schema_version (version) VALUES (?)",
        params![version],
    )?;
    tx.commit()?;

    tracing::info!("Migrated local mirror to version {version}");
    Ok(())
}
