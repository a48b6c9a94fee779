//! Persisted sync scalars

use crate::error::{Error, Result};
use rusqlite::{params, Connection, OptionalExtension};

/// Key of the last minted temporary review id
pub const LAST_LOCAL_REVIEW_ID: &str = "lastLocalReviewId";

/// Trait for small key/value scalars that must survive restarts
pub trait MetaRepository {
    /// Read a scalar, `None` when never written
    fn get_value(&self, key: &str) -> Result<Option<String>>;

    /// Write a scalar
    fn set_value(&self, key: &str, value: &str) -> Result<()>;

    /// Mint the next temporary review id (`-1`, `-2`, ...).
    ///
    /// Callers must run this inside a transaction so the read-decrement-write
    /// cannot interleave with another mint.
    fn next_local_review_id(&self) -> Result<i64> {
        let last = match self.get_value(LAST_LOCAL_REVIEW_ID)? {
            Some(value) => value.trim().parse::<i64>().map_err(|error| {
                Error::Database(rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(error),
                ))
            })?,
            None => 0,
        };
        // Never hand out a positive id even if the stored counter was tampered with
        let next = last.min(0) - 1;
        self.set_value(LAST_LOCAL_REVIEW_ID, &next.to_string())?;
        Ok(next)
    }
}

/// `SQLite` implementation of `MetaRepository`
pub struct SqliteMetaRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteMetaRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl MetaRepository for SqliteMetaRepository<'_> {
    fn get_value(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM sync_meta WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO sync_meta (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }
}
