//! Shared local mirror store used by every sync component.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

use crate::db::{CollectionStore, Database, MetaRepository, Record, SqliteMetaRepository};
use crate::models::{Collection, Review, ReviewId, SyncConflict};
use crate::{Error, Result};

/// Thread-safe handle to the local mirror.
///
/// Each call is atomic on its own. Work that must become visible all at once
/// goes through [`MirrorStore::transaction`].
#[derive(Clone)]
pub struct MirrorStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl MirrorStore {
    /// Open the mirror at the given filesystem path.
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let db = Database::open(&db_path)?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory mirror (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Path of the backing file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    /// Fetch a record by id.
    pub async fn get<R: Record>(&self, id: i64) -> Result<Option<R>> {
        let db = self.db.lock().await;
        CollectionStore::new(db.connection()).get(id)
    }

    /// Fetch every record of a collection.
    pub async fn get_all<R: Record>(&self) -> Result<Vec<R>> {
        let db = self.db.lock().await;
        CollectionStore::new(db.connection()).get_all()
    }

    /// Insert or replace a record.
    pub async fn put<R: Record>(&self, record: &R) -> Result<()> {
        let db = self.db.lock().await;
        CollectionStore::new(db.connection()).put(record)
    }

    /// Delete a record; returns whether it existed.
    pub async fn delete(&self, collection: Collection, id: i64) -> Result<bool> {
        let db = self.db.lock().await;
        CollectionStore::new(db.connection()).delete(collection, id)
    }

    /// Remove every record of a collection.
    pub async fn clear(&self, collection: Collection) -> Result<()> {
        let db = self.db.lock().await;
        CollectionStore::new(db.connection()).clear(collection)
    }

    /// Run `work` inside one scoped transaction.
    ///
    /// The transaction commits when `work` returns `Ok` and rolls back when
    /// it returns `Err`, so readers never observe a partial batch.
    pub async fn transaction<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&CollectionStore<'_>) -> Result<T>,
    {
        let mut db = self.db.lock().await;
        let tx = db.connection_mut().transaction()?;
        let value = work(&CollectionStore::new(&tx))?;
        tx.commit()?;
        Ok(value)
    }

    /// Clear a collection and repopulate it with `records` atomically.
    pub async fn replace_all<R: Record>(&self, records: &[R]) -> Result<()> {
        self.transaction(|store| {
            store.clear(R::COLLECTION)?;
            for record in records {
                store.put(record)?;
            }
            Ok(())
        })
        .await
    }

    /// Reviews of one restaurant.
    pub async fn reviews_for_restaurant(&self, restaurant_id: i64) -> Result<Vec<Review>> {
        let db = self.db.lock().await;
        CollectionStore::new(db.connection()).reviews_for_restaurant(restaurant_id)
    }

    /// Mint the next temporary review id from the persisted counter.
    pub async fn next_local_review_id(&self) -> Result<ReviewId> {
        let mut db = self.db.lock().await;
        let tx = db.connection_mut().transaction()?;
        let id = SqliteMetaRepository::new(&tx).next_local_review_id()?;
        tx.commit()?;
        Ok(ReviewId::new(id))
    }

    /// List recently resolved sync conflicts.
    pub async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let db = self.db.lock().await;
        CollectionStore::new(db.connection()).list_conflicts(limit)
    }
}

enum StoreSource {
    Path(PathBuf),
    Memory,
}

/// Lazily opened mirror store, opened at most once per process.
///
/// Concurrent first callers wait on the same open. A failed open is kept and
/// handed to every caller as [`Error::StoreUnavailable`] instead of being
/// retried.
pub struct StoreCell {
    source: StoreSource,
    cell: OnceCell<std::result::Result<MirrorStore, String>>,
}

impl StoreCell {
    /// Open the store at `path` on first use.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: StoreSource::Path(path.into()),
            cell: OnceCell::new(),
        }
    }

    /// Open an in-memory store on first use.
    pub fn in_memory() -> Self {
        Self {
            source: StoreSource::Memory,
            cell: OnceCell::new(),
        }
    }

    /// Wrap a store that is already open.
    pub fn ready(store: MirrorStore) -> Self {
        Self {
            source: StoreSource::Memory,
            cell: OnceCell::new_with(Some(Ok(store))),
        }
    }

    /// The opened store, or the reason it could not be opened.
    pub async fn get(&self) -> Result<&MirrorStore> {
        let opened = self
            .cell
            .get_or_init(|| async {
                let result = match &self.source {
                    StoreSource::Path(path) => MirrorStore::open_path(path.clone()),
                    StoreSource::Memory => MirrorStore::open_in_memory(),
                };
                result.map_err(|error| {
                    tracing::error!("Failed to open local mirror: {error}");
                    error.to_string()
                })
            })
            .await;

        opened
            .as_ref()
            .map_err(|message| Error::StoreUnavailable(message.clone()))
    }
}
