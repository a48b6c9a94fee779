//! Keyed collection access for mirrored records

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::models::{Collection, Restaurant, Review, SyncConflict, Winner};

/// A record that lives in one of the mirrored collections
pub trait Record: Serialize + DeserializeOwned + Clone + Send + 'static {
    /// Collection the record belongs to
    const COLLECTION: Collection;

    /// Primary key
    fn key(&self) -> i64;

    /// Last update timestamp (Unix ms)
    fn updated_at(&self) -> i64;

    /// Extra indexed column written next to the JSON body
    fn secondary_key(&self) -> Option<i64> {
        None
    }
}

impl Record for Restaurant {
    const COLLECTION: Collection = Collection::Restaurants;

    fn key(&self) -> i64 {
        self.id.get()
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }
}

impl Record for Review {
    const COLLECTION: Collection = Collection::Reviews;

    fn key(&self) -> i64 {
        self.id.get()
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn secondary_key(&self) -> Option<i64> {
        Some(self.restaurant_id.get())
    }
}

/// Collection operations over a connection or an open transaction
///
/// A `rusqlite::Transaction` derefs to `Connection`, so the same type serves
/// single-statement calls and grouped writes.
pub struct CollectionStore<'a> {
    conn: &'a Connection,
}

impl<'a> CollectionStore<'a> {
    /// Create a new store view over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Get a record by id
    pub fn get<R: Record>(&self, id: i64) -> Result<Option<R>> {
        let sql = format!("SELECT body FROM {} WHERE id = ?", R::COLLECTION.name());
        let body: Option<String> = self
            .conn
            .query_row(&sql, params![id], |row| row.get(0))
            .optional()?;

        body.map(|body| serde_json::from_str(&body).map_err(Into::into))
            .transpose()
    }

    /// Get every record of the collection, ordered by id
    pub fn get_all<R: Record>(&self) -> Result<Vec<R>> {
        let sql = format!("SELECT body FROM {} ORDER BY id", R::COLLECTION.name());
        let mut stmt = self.conn.prepare(&sql)?;
        let bodies = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(Into::into))
            .collect()
    }

    /// Insert or replace a record by id
    pub fn put<R: Record>(&self, record: &R) -> Result<()> {
        let body = serde_json::to_string(record)?;
        match R::COLLECTION {
            Collection::Restaurants => {
                self.conn.execute(
                    "INSERT OR REPLACE INTO restaurants (id, updated_at, body) VALUES (?, ?, ?)",
                    params![record.key(), record.updated_at(), body],
                )?;
            }
            Collection::Reviews => {
                self.conn.execute(
                    "INSERT OR REPLACE INTO reviews (id, restaurant_id, updated_at, body) VALUES (?, ?, ?, ?)",
                    params![
                        record.key(),
                        record.secondary_key().unwrap_or_default(),
                        record.updated_at(),
                        body
                    ],
                )?;
                if record.key() > 0 {
                    self.mark_review_synced(record.key())?;
                }
            }
        }
        Ok(())
    }

    /// Remember that the mirror has held the confirmed review `id`.
    ///
    /// Local deletes keep the mark; it goes away only through
    /// [`Self::forget_synced_review`].
    pub fn mark_review_synced(&self, id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO synced_reviews (id) VALUES (?)",
            params![id],
        )?;
        Ok(())
    }

    pub fn forget_synced_review(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM synced_reviews WHERE id = ?", params![id])?;
        Ok(())
    }

    /// Confirmed review ids the mirror has held, in id order
    pub fn synced_review_ids(&self) -> Result<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM synced_reviews ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }

    /// Delete a record by id; returns whether a row was removed
    pub fn delete(&self, collection: Collection, id: i64) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?", collection.name());
        let rows = self.conn.execute(&sql, params![id])?;
        Ok(rows > 0)
    }

    /// Remove every record of a collection
    pub fn clear(&self, collection: Collection) -> Result<()> {
        let sql = format!("DELETE FROM {}", collection.name());
        self.conn.execute(&sql, [])?;
        Ok(())
    }

    /// `updatedAt` of the stored copy, if any
    pub fn updated_at_of(&self, collection: Collection, id: i64) -> Result<Option<i64>> {
        let sql = format!("SELECT updated_at FROM {} WHERE id = ?", collection.name());
        Ok(self
            .conn
            .query_row(&sql, params![id], |row| row.get(0))
            .optional()?)
    }

    /// Reviews of one restaurant, in id order
    pub fn reviews_for_restaurant(&self, restaurant_id: i64) -> Result<Vec<Review>> {
        let mut stmt = self
            .conn
            .prepare("SELECT body FROM reviews WHERE restaurant_id = ? ORDER BY id")?;
        let bodies = stmt
            .query_map(params![restaurant_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(Into::into))
            .collect()
    }

    /// Append a resolved conflict to the conflict log
    pub fn log_conflict(&self, conflict: &SyncConflict) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sync_conflicts (
                collection, record_id, local_updated_at, remote_updated_at, winner, resolved_at
            ) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                conflict.collection.name(),
                conflict.record_id,
                conflict.local_updated_at,
                conflict.remote_updated_at,
                conflict.winner.as_str(),
                conflict.resolved_at
            ],
        )?;
        Ok(())
    }

    /// Most recently resolved conflicts first
    pub fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, collection, record_id, local_updated_at, remote_updated_at, winner, resolved_at
             FROM sync_conflicts
             ORDER BY resolved_at DESC, id DESC
             LIMIT ?",
        )?;

        let conflicts = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
                let collection: String = row.get(1)?;
                let winner: String = row.get(5)?;
                Ok(SyncConflict {
                    id: row.get(0)?,
                    collection: Collection::parse(&collection).unwrap_or(Collection::Reviews),
                    record_id: row.get(2)?,
                    local_updated_at: row.get(3)?,
                    remote_updated_at: row.get(4)?,
                    winner: Winner::parse(&winner).unwrap_or(Winner::Remote),
                    resolved_at: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(conflicts)
    }
}
