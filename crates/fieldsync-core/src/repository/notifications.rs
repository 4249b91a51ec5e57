//! Notification repository

use std::collections::BTreeMap;

use tokio::sync::Mutex;

use super::{
    apply_confirmed, complete_replayed, degrade, record_replayed, refresh_cache, refresh_entity, take_entity,
    write_optimistic, write_path, LocalEffect, WriteScope,
};
use crate::connectivity::ConnectivityOracle;
use crate::db::{SqlitePreferenceRepository, SqliteQueueRepository};
use crate::error::{Error, GatewayError, Result};
use crate::gateway::NotificationGateway;
use crate::models::{
    default_preferences, retain_known_preferences, EntityFamily, Notification, NotificationDraft,
    NotificationFilters, NotificationOp, NotificationPatch, NotificationPreferences,
    NotificationStatus, NotificationSummary, QueueItem, QueuePriority, QueuedOperation,
};
use crate::policy::{self, AccessPath, Operation};
use crate::services::{EntityCache, LocalStore, MutationQueue, PreferenceStore};
use crate::sync::{replay_queue, ReplayTarget, SyncFilter, SyncSession};
use crate::util::{is_temporary_id, temporary_id};

impl LocalEffect for NotificationOp {
    type Entity = Notification;

    fn apply_local(&self, entities: &mut BTreeMap<String, Notification>, now: i64) {
        match self {
            Self::Create { temp_id, draft } => {
                entities.insert(
                    temp_id.clone(),
                    Notification::from_draft(temp_id.clone(), draft, now),
                );
            }
            Self::Update { id, patch } => {
                if let Some(notification) = entities.get_mut(id) {
                    notification.apply_patch(patch, now);
                }
            }
            Self::Delete { id } => {
                entities.remove(id);
            }
            Self::MarkRead { id } => {
                if let Some(notification) = entities.get_mut(id) {
                    notification.set_status(NotificationStatus::Read, now);
                }
            }
            Self::MarkDismissed { id } => {
                if let Some(notification) = entities.get_mut(id) {
                    notification.set_status(NotificationStatus::Dismissed, now);
                }
            }
            Self::MarkAllRead => {
                for notification in entities.values_mut().filter(|n| n.is_unread()) {
                    notification.set_status(NotificationStatus::Read, now);
                }
            }
            Self::ClearAll => entities.clear(),
            Self::UpdatePreferences { .. } => {}
        }
    }
}

/// Offline-first access to notifications and notification preferences.
pub struct NotificationRepository<G, C> {
    gateway: G,
    connectivity: C,
    store: LocalStore,
    cache: EntityCache<Notification>,
    queue: MutationQueue<NotificationOp>,
    preferences: PreferenceStore,
    priority: QueuePriority,
    write_lock: Mutex<()>,
}

impl<G, C> NotificationRepository<G, C>
where
    G: NotificationGateway,
    C: ConnectivityOracle,
{
    pub fn new(store: &LocalStore, gateway: G, connectivity: C) -> Self {
        Self {
            gateway,
            connectivity,
            store: store.clone(),
            cache: store.cache(),
            queue: store.queue(),
            preferences: store.preferences(EntityFamily::Notifications),
            priority: QueuePriority::Normal,
            write_lock: Mutex::new(()),
        }
    }

    /// Queue writes made through this repository at `priority`.
    #[must_use]
    pub fn with_priority(mut self, priority: QueuePriority) -> Self {
        self.priority = priority;
        self
    }

    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    fn connected(&self) -> bool {
        self.connectivity.is_connected()
    }

    async fn write_path(&self, scope: WriteScope<'_>) -> Result<AccessPath> {
        let pending = self.queue.list_all().await?;
        Ok(write_path(self.connected(), scope, &pending))
    }

    /// List notifications matching `filters`.
    ///
    /// Remote results are rebased over pending writes before they are cached
    /// and returned.
    pub async fn list(&self, filters: &NotificationFilters) -> Result<Vec<Notification>> {
        if policy::resolve(Operation::Read, self.connected()) == AccessPath::RemoteFirst {
            match self.gateway.list_notifications(filters).await {
                Ok(remote) => {
                    let rebased = refresh_cache::<NotificationOp>(
                        &self.store,
                        remote,
                        filters.is_unscoped(),
                    )
                    .await?;
                    return Ok(filters.apply(rebased));
                }
                Err(error) => {
                    degrade(Operation::Read, "notification list", error)?;
                }
            }
        }

        tracing::debug!("Listing notifications from cache");
        Ok(filters.apply(self.cache.list().await?))
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Notification> {
        let remote_first = policy::resolve(Operation::Read, self.connected())
            == AccessPath::RemoteFirst
            && !is_temporary_id(id);
        if remote_first {
            match self.gateway.get_notification(id).await {
                Ok(remote) => return refresh_entity::<NotificationOp>(&self.store, remote).await,
                Err(error) => {
                    degrade(Operation::Read, "notification fetch", error)?;
                }
            }
        }

        self.cache
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFoundInCache(id.to_string()))
    }

    pub async fn create(&self, draft: NotificationDraft) -> Result<Notification> {
        if draft.title.trim().is_empty() {
            return Err(Error::InvalidInput(
                "notification title cannot be empty".into(),
            ));
        }

        let _guard = self.write_lock.lock().await;
        if self.write_path(WriteScope::New).await? == AccessPath::RemoteFirst {
            let idempotency_key = uuid::Uuid::now_v7().to_string();
            match self
                .gateway
                .create_notification(&draft, &idempotency_key)
                .await
            {
                Ok(created) => {
                    self.cache.put(&created).await?;
                    return Ok(created);
                }
                Err(error) => {
                    degrade(Operation::Write, "notification create", error)?;
                }
            }
        }

        let temp_id = temporary_id();
        let mut write = write_optimistic(
            &self.store,
            vec![NotificationOp::Create {
                temp_id: temp_id.clone(),
                draft,
            }],
            self.priority,
        )
        .await?;
        take_entity(&mut write.entities, &temp_id)
    }

    pub async fn update(&self, id: &str, patch: NotificationPatch) -> Result<Notification> {
        let _guard = self.write_lock.lock().await;
        if self.write_path(WriteScope::Entity(id)).await? == AccessPath::RemoteFirst {
            match self.gateway.update_notification(id, &patch).await {
                Ok(updated) => {
                    self.cache.put(&updated).await?;
                    return Ok(updated);
                }
                Err(error) => {
                    degrade(Operation::Write, "notification update", error)?;
                }
            }
        }

        self.require_cached(id).await?;
        let mut write = write_optimistic(
            &self.store,
            vec![NotificationOp::Update {
                id: id.to_string(),
                patch,
            }],
            self.priority,
        )
        .await?;
        take_entity(&mut write.entities, id)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.write_path(WriteScope::Entity(id)).await? == AccessPath::RemoteFirst {
            match self.gateway.delete_notification(id).await {
                Ok(()) => {
                    self.cache.remove(id).await?;
                    return Ok(());
                }
                Err(error) => {
                    degrade(Operation::Write, "notification delete", error)?;
                }
            }
        }

        write_optimistic(
            &self.store,
            vec![NotificationOp::Delete { id: id.to_string() }],
            self.priority,
        )
        .await?;
        Ok(())
    }

    pub async fn mark_as_read(&self, id: &str) -> Result<Notification> {
        self.set_status(id, NotificationStatus::Read).await
    }

    pub async fn mark_as_dismissed(&self, id: &str) -> Result<Notification> {
        self.set_status(id, NotificationStatus::Dismissed).await
    }

    async fn set_status(&self, id: &str, status: NotificationStatus) -> Result<Notification> {
        let _guard = self.write_lock.lock().await;
        if self.write_path(WriteScope::Entity(id)).await? == AccessPath::RemoteFirst {
            let result = match status {
                NotificationStatus::Dismissed => self.gateway.mark_as_dismissed(id).await,
                _ => self.gateway.mark_as_read(id).await,
            };
            match result {
                Ok(updated) => {
                    self.cache.put(&updated).await?;
                    return Ok(updated);
                }
                Err(error) => {
                    degrade(Operation::Write, "notification status change", error)?;
                }
            }
        }

        self.require_cached(id).await?;
        let operation = match status {
            NotificationStatus::Dismissed => NotificationOp::MarkDismissed { id: id.to_string() },
            _ => NotificationOp::MarkRead { id: id.to_string() },
        };
        let mut write = write_optimistic(&self.store, vec![operation], self.priority).await?;
        take_entity(&mut write.entities, id)
    }

    /// Mark every notification read. Returns how many changed.
    pub async fn mark_all_as_read(&self) -> Result<u64> {
        self.family_write(NotificationOp::MarkAllRead).await
    }

    /// Remove every notification. Returns how many were removed.
    pub async fn clear_all(&self) -> Result<u64> {
        self.family_write(NotificationOp::ClearAll).await
    }

    async fn family_write(&self, operation: NotificationOp) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        if self.write_path(WriteScope::Family).await? == AccessPath::RemoteFirst {
            let result = match operation {
                NotificationOp::ClearAll => self.gateway.clear_all().await,
                _ => self.gateway.mark_all_as_read().await,
            };
            match result {
                Ok(count) => {
                    apply_confirmed(&self.store, &operation).await?;
                    return Ok(count);
                }
                Err(error) => {
                    degrade(Operation::Write, operation.operation_type().as_str(), error)?;
                }
            }
        }

        let write = write_optimistic(&self.store, vec![operation], self.priority).await?;
        let count = if write.removed > 0 {
            write.removed
        } else {
            write.changed
        };
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    /// Aggregate counts; computed locally while writes are pending.
    pub async fn get_summary(&self) -> Result<NotificationSummary> {
        let remote_first = policy::resolve(Operation::Read, self.connected())
            == AccessPath::RemoteFirst
            && self.queue.is_empty().await?;
        if remote_first {
            match self.gateway.notification_summary().await {
                Ok(summary) => return Ok(summary),
                Err(error) => {
                    degrade(Operation::Read, "notification summary", error)?;
                }
            }
        }

        let cached = self.cache.list().await?;
        Ok(NotificationSummary::from_notifications(&cached))
    }

    /// Effective preferences: known types default to enabled.
    pub async fn get_preferences(&self) -> Result<NotificationPreferences> {
        if policy::resolve(Operation::Read, self.connected()) == AccessPath::RemoteFirst {
            match self.gateway.get_preferences().await {
                Ok(mut remote) => {
                    for item in self.queue.list_all().await? {
                        if let NotificationOp::UpdatePreferences { preferences } = item.operation {
                            remote.extend(preferences);
                        }
                    }
                    self.preferences.replace(&remote).await?;
                    return Ok(with_defaults(remote));
                }
                Err(error) => {
                    degrade(Operation::Read, "preference fetch", error)?;
                }
            }
        }

        let stored: NotificationPreferences = self.preferences.load().await?;
        Ok(with_defaults(stored))
    }

    pub async fn update_preferences(
        &self,
        preferences: NotificationPreferences,
    ) -> Result<NotificationPreferences> {
        let _guard = self.write_lock.lock().await;
        if self.write_path(WriteScope::Family).await? == AccessPath::RemoteFirst {
            match self.gateway.update_preferences(&preferences).await {
                Ok(confirmed) => {
                    self.preferences.replace(&confirmed).await?;
                    return Ok(with_defaults(confirmed));
                }
                Err(error) => {
                    degrade(Operation::Write, "preference update", error)?;
                }
            }
        }

        let item = MutationQueue::new_item(
            NotificationOp::UpdatePreferences {
                preferences: preferences.clone(),
            },
            self.priority,
        );
        self.store
            .transaction(|tx| {
                SqlitePreferenceRepository::new(tx, EntityFamily::Notifications)
                    .save_all(&preferences)?;
                SqliteQueueRepository::new(tx).push(&item)
            })
            .await?;
        tracing::debug!(queue_id = %item.id, "Queued preference update");

        let stored: NotificationPreferences = self.preferences.load().await?;
        Ok(with_defaults(stored))
    }

    pub async fn subscribe(&self, topic: &str) -> Result<()> {
        self.connected_only("subscribe")?;
        match self.gateway.subscribe(topic).await {
            Ok(()) => Ok(()),
            Err(error) => degrade(Operation::ConnectedOnly, "subscribe", error).map(|_| ()),
        }
    }

    pub async fn unsubscribe(&self, topic: &str) -> Result<()> {
        self.connected_only("unsubscribe")?;
        match self.gateway.unsubscribe(topic).await {
            Ok(()) => Ok(()),
            Err(error) => degrade(Operation::ConnectedOnly, "unsubscribe", error).map(|_| ()),
        }
    }

    fn connected_only(&self, operation: &'static str) -> Result<()> {
        match policy::resolve(Operation::ConnectedOnly, self.connected()) {
            AccessPath::Unavailable => Err(Error::NoConnectivity(operation)),
            _ => Ok(()),
        }
    }

    async fn require_cached(&self, id: &str) -> Result<()> {
        if self.cache.get(id).await?.is_some() {
            Ok(())
        } else {
            Err(Error::NotFoundInCache(id.to_string()))
        }
    }

    /// Pending writes in replay order
    pub async fn get_queued(&self) -> Result<Vec<QueueItem<NotificationOp>>> {
        self.queue.list_all().await
    }

    /// Drop every pending write. Returns how many were dropped.
    pub async fn clear_queued(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let cleared = self.queue.clear().await?;
        tracing::info!("Cleared {cleared} queued notification write(s)");
        Ok(cleared)
    }

    /// Replay every queued write. Requires connectivity.
    pub async fn sync(&self) -> Result<SyncSession> {
        replay_queue(self, &SyncFilter::all(), None).await
    }
}

impl<G, C> ReplayTarget for NotificationRepository<G, C>
where
    G: NotificationGateway,
    C: ConnectivityOracle,
{
    type Op = NotificationOp;

    fn queue(&self) -> &MutationQueue<NotificationOp> {
        &self.queue
    }

    fn is_connected(&self) -> bool {
        self.connected()
    }

    async fn replay(&self, item: &QueueItem<NotificationOp>) -> Result<()> {
        let replayed = match &item.operation {
            NotificationOp::Create { temp_id, draft } => {
                let created = self
                    .gateway
                    .create_notification(draft, &item.id.as_str())
                    .await?;
                Some((created, Some(temp_id.as_str())))
            }
            NotificationOp::Update { id, patch } => {
                Some((self.gateway.update_notification(id, patch).await?, None))
            }
            NotificationOp::Delete { id } => match self.gateway.delete_notification(id).await {
                Ok(()) => None,
                Err(error) if is_not_found(&error) => {
                    tracing::debug!("Notification {id} already deleted remotely");
                    None
                }
                Err(error) => return Err(error.into()),
            },
            NotificationOp::MarkRead { id } => Some((self.gateway.mark_as_read(id).await?, None)),
            NotificationOp::MarkDismissed { id } => {
                Some((self.gateway.mark_as_dismissed(id).await?, None))
            }
            NotificationOp::MarkAllRead => {
                self.gateway.mark_all_as_read().await?;
                None
            }
            NotificationOp::ClearAll => {
                self.gateway.clear_all().await?;
                None
            }
            NotificationOp::UpdatePreferences { preferences } => {
                let (known, ignored) = retain_known_preferences(preferences);
                if !ignored.is_empty() {
                    tracing::debug!(
                        "Ignoring unknown notification preference keys: {}",
                        ignored.join(", ")
                    );
                }
                let confirmed = self.gateway.update_preferences(&known).await?;
                let _guard = self.write_lock.lock().await;
                return complete_replayed::<NotificationOp>(&self.store, &item.id, |tx| {
                    SqlitePreferenceRepository::new(tx, EntityFamily::Notifications)
                        .replace_all(&confirmed)
                })
                .await;
            }
        };

        let _guard = self.write_lock.lock().await;
        match replayed {
            Some((entity, replaced_id)) => {
                record_replayed::<NotificationOp>(&self.store, entity, &item.id, replaced_id)
                    .await?;
                Ok(())
            }
            None => complete_replayed::<NotificationOp>(&self.store, &item.id, |_| Ok(())).await,
        }
    }
}

fn with_defaults(preferences: NotificationPreferences) -> NotificationPreferences {
    let mut effective = default_preferences();
    effective.extend(preferences);
    effective
}

fn is_not_found(error: &GatewayError) -> bool {
    matches!(error, GatewayError::Service(service) if service.status == Some(404))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn notification(id: &str, status: NotificationStatus) -> Notification {
        let mut notification = Notification::from_draft(id, &NotificationDraft::new(id), 1);
        notification.status = status;
        notification
    }

    #[test]
    fn mark_all_read_only_touches_unread() {
        let mut entities = BTreeMap::from([
            ("a".to_string(), notification("a", NotificationStatus::Unread)),
            ("b".to_string(), notification("b", NotificationStatus::Dismissed)),
        ]);
        NotificationOp::MarkAllRead.apply_local(&mut entities, 9);

        assert_eq!(entities["a"].status, NotificationStatus::Read);
        assert_eq!(entities["a"].read_at, Some(9));
        assert_eq!(entities["b"].status, NotificationStatus::Dismissed);
        assert_eq!(entities["b"].updated_at, 1);
    }

    #[test]
    fn preference_updates_have_no_entity_effect() {
        let mut entities = BTreeMap::from([(
            "a".to_string(),
            notification("a", NotificationStatus::Unread),
        )]);
        let before = entities.clone();
        NotificationOp::UpdatePreferences {
            preferences: BTreeMap::from([("general".to_string(), false)]),
        }
        .apply_local(&mut entities, 9);
        assert_eq!(entities, before);
    }

    #[test]
    fn defaults_fill_missing_preference_keys() {
        let effective = with_defaults(BTreeMap::from([("system".to_string(), false)]));
        assert_eq!(effective.get("system"), Some(&false));
        assert_eq!(effective.get("general"), Some(&true));
    }
}
