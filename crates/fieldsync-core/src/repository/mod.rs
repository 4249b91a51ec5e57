//! Offline-first repositories, one per entity family.
//!
//! A repository composes the connectivity oracle, the local store and a
//! remote gateway. Every method asks [`policy::resolve`](crate::policy::resolve)
//! for its access path; the helpers here implement the paths that are shared
//! between families: optimistic writes, cache refresh and local recording of
//! replayed items.

mod calendar;
mod notifications;

pub use calendar::{CalendarRepository, ScheduledEvent};
pub use notifications::NotificationRepository;

use std::collections::{BTreeMap, HashSet};

use rusqlite::Transaction;

use crate::db::{SqliteCacheRepository, SqliteQueueRepository};
use crate::error::{Error, GatewayError, Result};
use crate::models::{CachedEntity, QueueId, QueueItem, QueuePriority, QueuedOperation};
use crate::policy::{self, AccessPath, Operation};
use crate::services::{LocalStore, MutationQueue};
use crate::util::{is_temporary_id, unix_millis_now};

/// Local, optimistic effect of a queued operation on cached entities.
///
/// The same effect is applied when the write happens offline and again when
/// a remote snapshot is rebased over still-pending items.
pub trait LocalEffect: QueuedOperation {
    type Entity: CachedEntity + PartialEq;

    fn apply_local(&self, entities: &mut BTreeMap<String, Self::Entity>, now: i64);
}

/// What a write touches, used to keep direct remote writes from overtaking
/// queued ones.
#[derive(Debug, Clone, Copy)]
pub(crate) enum WriteScope<'a> {
    /// Creates a new entity
    New,
    /// Targets one existing entity
    Entity(&'a str),
    /// Affects every entity of the family (or family-wide state)
    Family,
}

/// Access path for a write, given connectivity and the pending queue.
///
/// A connected write still goes through the queue when it could interact with
/// an item that has not been replayed yet, so replay order stays enqueue order.
pub(crate) fn write_path<O: QueuedOperation>(
    connected: bool,
    scope: WriteScope<'_>,
    pending: &[QueueItem<O>],
) -> AccessPath {
    let path = policy::resolve(Operation::Write, connected);
    if path != AccessPath::RemoteFirst {
        return path;
    }

    let must_queue = match scope {
        WriteScope::New => false,
        WriteScope::Entity(id) => {
            is_temporary_id(id)
                || pending.iter().any(|item| {
                    item.operation.target_id().is_none() || item.operation.target_id() == Some(id)
                })
        }
        WriteScope::Family => !pending.is_empty(),
    };
    if must_queue {
        AccessPath::QueueOptimistic
    } else {
        path
    }
}

/// Decide how to continue after a remote-first call failed.
///
/// Reads fall back to the cache on any failure. Writes and connected-only
/// operations surface service rejections; a transport fault degrades writes to
/// the queue and fails connected-only operations.
pub(crate) fn degrade(operation: Operation, action: &str, error: GatewayError) -> Result<AccessPath> {
    match (operation, error) {
        (Operation::Read, error) => {
            tracing::warn!("Remote {action} failed, serving from cache: {error}");
            Ok(AccessPath::CacheOnly)
        }
        (Operation::Write, GatewayError::Transport(message)) => {
            tracing::warn!("Remote {action} unreachable, queueing for replay: {message}");
            Ok(policy::after_transport_failure(Operation::Write))
        }
        (_, error) => Err(error.into()),
    }
}

/// Result of an optimistic write
pub(crate) struct LocalWrite<O: LocalEffect> {
    pub items: Vec<QueueItem<O>>,
    pub entities: BTreeMap<String, O::Entity>,
    pub changed: usize,
    pub removed: usize,
}

/// Apply `operations` to the cache and append them to the queue, atomically.
///
/// Only the entities the operations target are loaded; family-wide operations
/// load the whole collection.
pub(crate) async fn write_optimistic<O: LocalEffect>(
    store: &LocalStore,
    operations: Vec<O>,
    priority: QueuePriority,
) -> Result<LocalWrite<O>> {
    let items = operations
        .into_iter()
        .map(|operation| MutationQueue::new_item(operation, priority))
        .collect::<Vec<_>>();

    let (entities, changed, removed) = store
        .transaction(|tx| {
            let cache = SqliteCacheRepository::new(tx);
            let queue = SqliteQueueRepository::new(tx);

            let mut before = BTreeMap::new();
            let family_wide = items
                .iter()
                .any(|item| item.operation.target_id().is_none());
            if family_wide {
                for entity in cache.list::<O::Entity>()? {
                    before.insert(entity.id().to_string(), entity);
                }
            } else {
                for item in &items {
                    if let Some(id) = item.operation.target_id() {
                        if let Some(entity) = cache.get::<O::Entity>(id)? {
                            before.insert(id.to_string(), entity);
                        }
                    }
                }
            }

            let mut entities = before.clone();
            for item in &items {
                item.operation.apply_local(&mut entities, item.enqueued_at);
            }

            let mut removed = 0;
            for id in before.keys() {
                if !entities.contains_key(id) && cache.remove::<O::Entity>(id)? {
                    removed += 1;
                }
            }
            let mut changed = 0;
            for (id, entity) in &entities {
                if before.get(id) != Some(entity) {
                    cache.put(entity)?;
                    changed += 1;
                }
            }
            for item in &items {
                queue.push(item)?;
            }

            Ok((entities, changed, removed))
        })
        .await?;

    for item in &items {
        tracing::debug!(
            family = %O::FAMILY,
            operation = %item.operation_type(),
            queue_id = %item.id,
            "Applied optimistic write"
        );
    }
    Ok(LocalWrite {
        items,
        entities,
        changed,
        removed,
    })
}

/// Apply an operation that already succeeded remotely to the cache only.
pub(crate) async fn apply_confirmed<O: LocalEffect>(store: &LocalStore, operation: &O) -> Result<()> {
    let now = unix_millis_now();
    store
        .transaction(|tx| {
            let cache = SqliteCacheRepository::new(tx);
            let before = cache
                .list::<O::Entity>()?
                .into_iter()
                .map(|entity| (entity.id().to_string(), entity))
                .collect::<BTreeMap<_, _>>();
            let mut after = before.clone();
            operation.apply_local(&mut after, now);

            for id in before.keys().filter(|id| !after.contains_key(*id)) {
                cache.remove::<O::Entity>(id)?;
            }
            for (id, entity) in &after {
                if before.get(id) != Some(entity) {
                    cache.put(entity)?;
                }
            }
            Ok(())
        })
        .await
}

/// Replay `pending` over a remote snapshot, in enqueue order.
///
/// The result never shows an entity older than its last optimistic update.
pub(crate) fn rebase<O: LocalEffect>(
    remote: impl IntoIterator<Item = O::Entity>,
    pending: &[QueueItem<O>],
) -> BTreeMap<String, O::Entity> {
    let mut entities = remote
        .into_iter()
        .map(|entity| (entity.id().to_string(), entity))
        .collect::<BTreeMap<_, _>>();
    for item in pending {
        item.operation.apply_local(&mut entities, item.enqueued_at);
    }
    entities
}

/// Pending items that can affect entity `id`
pub(crate) fn pending_for<O: QueuedOperation>(
    pending: &[QueueItem<O>],
    id: &str,
) -> Vec<QueueItem<O>> {
    pending
        .iter()
        .filter(|item| {
            let target = item.operation.target_id();
            target.is_none() || target == Some(id)
        })
        .cloned()
        .collect()
}

/// Store a remote list result, rebased over pending items.
///
/// An unscoped result replaces the collection; a scoped one is upserted.
/// Returns the rebased entities.
pub(crate) async fn refresh_cache<O: LocalEffect>(
    store: &LocalStore,
    remote: Vec<O::Entity>,
    unscoped: bool,
) -> Result<Vec<O::Entity>> {
    store
        .transaction(|tx| {
            let cache = SqliteCacheRepository::new(tx);
            let pending = SqliteQueueRepository::new(tx).list::<O>()?;
            let rebased = rebase(remote, &pending);

            if unscoped {
                let keep: HashSet<String> = rebased.keys().cloned().collect();
                cache.retain::<O::Entity>(&keep)?;
            }
            for entity in rebased.values() {
                cache.put(entity)?;
            }
            Ok(rebased.into_values().collect())
        })
        .await
}

/// Record the entity returned by a replayed item and drop the item from the
/// queue, in one transaction.
///
/// `replaced_id` is the temporary id of a replayed create: its cache entry is
/// dropped and every remaining queued item that targets it is rewritten to the
/// server id. The stored entity is rebased over the items still pending for it.
pub(crate) async fn record_replayed<O: LocalEffect>(
    store: &LocalStore,
    entity: O::Entity,
    replayed: &QueueId,
    replaced_id: Option<&str>,
) -> Result<Option<O::Entity>> {
    store
        .transaction(|tx| {
            let cache = SqliteCacheRepository::new(tx);
            let queue = SqliteQueueRepository::new(tx);
            let id = entity.id().to_string();
            queue.remove::<O>(replayed)?;

            if let Some(temp_id) = replaced_id.filter(|temp_id| *temp_id != id) {
                cache.remove::<O::Entity>(temp_id)?;
                let rewritten = queue.retarget::<O>(temp_id, &id)?;
                if rewritten > 0 {
                    tracing::debug!("Retargeted {rewritten} queued item(s) from {temp_id} to {id}");
                }
            }

            let pending = queue.list::<O>()?;
            let mut rebased = rebase([entity], &pending_for(&pending, &id));
            match rebased.remove(&id) {
                Some(entity) => {
                    cache.put(&entity)?;
                    Ok(Some(entity))
                }
                None => {
                    cache.remove::<O::Entity>(&id)?;
                    Ok(None)
                }
            }
        })
        .await
}

/// Drop a replayed item that returned no entity, together with the local
/// effects in `record`.
pub(crate) async fn complete_replayed<O: QueuedOperation>(
    store: &LocalStore,
    replayed: &QueueId,
    record: impl FnOnce(&Transaction<'_>) -> Result<()>,
) -> Result<()> {
    store
        .transaction(|tx| {
            record(tx)?;
            SqliteQueueRepository::new(tx).remove::<O>(replayed)?;
            Ok(())
        })
        .await
}

/// Store one remote entity rebased over the items pending for it.
pub(crate) async fn refresh_entity<O: LocalEffect>(
    store: &LocalStore,
    remote: O::Entity,
) -> Result<O::Entity> {
    store
        .transaction(|tx| {
            let id = remote.id().to_string();
            let pending = SqliteQueueRepository::new(tx).list::<O>()?;
            let mut rebased = rebase([remote], &pending_for(&pending, &id));
            let entity = take_entity(&mut rebased, &id)?;
            SqliteCacheRepository::new(tx).put(&entity)?;
            Ok(entity)
        })
        .await
}

/// Remove `id` from `entities`, reporting a cache miss if it is absent.
pub(crate) fn take_entity<E>(entities: &mut BTreeMap<String, E>, id: &str) -> Result<E> {
    entities
        .remove(id)
        .ok_or_else(|| Error::NotFoundInCache(id.to_string()))
}
