//! Shared local store handle used by repositories and the sync orchestrator.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::Transaction;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::db::{
    Database, SqliteCacheRepository, SqlitePreferenceRepository, SqliteQueueRepository,
};
use crate::models::{CachedEntity, EntityFamily, QueueId, QueueItem, QueuePriority, QueuedOperation};
use crate::util::unix_millis_now;
use crate::Result;

/// Thread-safe handle to the durable local store.
///
/// Cloning is cheap; every clone shares one connection. Multi-row mutations
/// go through [`LocalStore::transaction`] so they land atomically.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
}

impl LocalStore {
    /// Open the store at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let db = Database::open(&db_path)?;
        tracing::debug!("Opened local store at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Run a read or single-statement write against the connection.
    pub async fn read<R>(&self, f: impl FnOnce(&Database) -> Result<R>) -> Result<R> {
        let db = self.db.lock().await;
        f(&db)
    }

    /// Run `f` in one transaction; nothing is persisted unless it succeeds.
    pub async fn transaction<R>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<R>,
    ) -> Result<R> {
        let mut db = self.db.lock().await;
        db.transaction(f)
    }

    /// Typed view of one entity family's cache collection.
    pub fn cache<E: CachedEntity>(&self) -> EntityCache<E> {
        EntityCache {
            store: self.clone(),
            _entity: PhantomData,
        }
    }

    /// Typed view of one operation family's queue.
    pub fn queue<O: QueuedOperation>(&self) -> MutationQueue<O> {
        MutationQueue {
            store: self.clone(),
            _operation: PhantomData,
        }
    }

    pub fn preferences(&self, family: EntityFamily) -> PreferenceStore {
        PreferenceStore {
            store: self.clone(),
            family,
        }
    }
}

/// Durable snapshots of one entity family, keyed by id
pub struct EntityCache<E> {
    store: LocalStore,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for EntityCache<E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: CachedEntity> EntityCache<E> {
    pub async fn get(&self, id: &str) -> Result<Option<E>> {
        self.store
            .read(|db| SqliteCacheRepository::new(db.connection()).get(id))
            .await
    }

    /// All cached entities, most recently updated first
    pub async fn list(&self) -> Result<Vec<E>> {
        self.store
            .read(|db| SqliteCacheRepository::new(db.connection()).list())
            .await
    }

    pub async fn put(&self, entity: &E) -> Result<()> {
        self.store
            .read(|db| SqliteCacheRepository::new(db.connection()).put(entity))
            .await
    }

    /// Upsert every entity in one transaction
    pub async fn put_many(&self, entities: &[E]) -> Result<()> {
        self.store
            .transaction(|tx| {
                let repo = SqliteCacheRepository::new(tx);
                for entity in entities {
                    repo.put(entity)?;
                }
                Ok(())
            })
            .await
    }

    pub async fn remove(&self, id: &str) -> Result<bool> {
        self.store
            .read(|db| SqliteCacheRepository::new(db.connection()).remove::<E>(id))
            .await
    }

}

/// FIFO queue of pending writes for one operation family
pub struct MutationQueue<O> {
    store: LocalStore,
    _operation: PhantomData<fn() -> O>,
}

impl<O> Clone for MutationQueue<O> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _operation: PhantomData,
        }
    }
}

impl<O: QueuedOperation> MutationQueue<O> {
    /// Build a queue item stamped with a fresh id and the current time.
    pub fn new_item(operation: O, priority: QueuePriority) -> QueueItem<O> {
        QueueItem {
            id: QueueId::new(),
            operation,
            priority,
            enqueued_at: unix_millis_now(),
        }
    }

    /// Append `operation` to the tail of the queue.
    pub async fn enqueue(&self, operation: O, priority: QueuePriority) -> Result<QueueItem<O>> {
        let item = Self::new_item(operation, priority);
        self.store
            .read(|db| SqliteQueueRepository::new(db.connection()).push(&item))
            .await?;
        tracing::debug!(
            family = %O::FAMILY,
            operation = %item.operation_type(),
            queue_id = %item.id,
            "Queued mutation"
        );
        Ok(item)
    }

    /// Pending items in replay order
    pub async fn list_all(&self) -> Result<Vec<QueueItem<O>>> {
        self.store
            .read(|db| SqliteQueueRepository::new(db.connection()).list())
            .await
    }

    pub async fn get(&self, id: &QueueId) -> Result<Option<QueueItem<O>>> {
        self.store
            .read(|db| SqliteQueueRepository::new(db.connection()).get(id))
            .await
    }

    /// Remove a single item, typically after a successful replay.
    pub async fn dequeue(&self, id: &QueueId) -> Result<bool> {
        self.store
            .read(|db| SqliteQueueRepository::new(db.connection()).remove::<O>(id))
            .await
    }

    pub async fn clear(&self) -> Result<usize> {
        self.store
            .read(|db| SqliteQueueRepository::new(db.connection()).clear::<O>())
            .await
    }

    pub async fn len(&self) -> Result<usize> {
        self.store
            .read(|db| SqliteQueueRepository::new(db.connection()).count::<O>())
            .await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

/// Per-family key/value preferences
#[derive(Clone)]
pub struct PreferenceStore {
    store: LocalStore,
    family: EntityFamily,
}

impl PreferenceStore {
    pub async fn load<T: DeserializeOwned>(&self) -> Result<BTreeMap<String, T>> {
        let family = self.family;
        self.store
            .read(|db| SqlitePreferenceRepository::new(db.connection(), family).load())
            .await
    }

    pub async fn replace<T: Serialize>(&self, preferences: &BTreeMap<String, T>) -> Result<()> {
        let family = self.family;
        self.store
            .transaction(|tx| SqlitePreferenceRepository::new(tx, family).replace_all(preferences))
            .await
    }
}
