//! Calendar event repository

use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::Mutex;

use super::{
    complete_replayed, degrade, record_replayed, refresh_cache, refresh_entity, take_entity,
    write_optimistic, write_path, LocalEffect, WriteScope,
};
use crate::conflict::find_conflicts;
use crate::connectivity::ConnectivityOracle;
use crate::db::SqliteCacheRepository;
use crate::error::{Error, GatewayError, Result};
use crate::gateway::CalendarGateway;
use crate::models::{
    CalendarData, CalendarEvent, EventDraft, EventFilters, EventOp, EventPatch, EventStatus,
    ExportFormat, QueueItem, QueuePriority, TimeRange,
};
use crate::policy::{self, AccessPath, Operation};
use crate::services::{EntityCache, LocalStore, MutationQueue};
use crate::sync::{replay_queue, ReplayTarget, SyncFilter, SyncSession};
use crate::util::{is_temporary_id, temporary_id};

impl LocalEffect for EventOp {
    type Entity = CalendarEvent;

    fn apply_local(&self, entities: &mut BTreeMap<String, CalendarEvent>, now: i64) {
        match self {
            Self::Create { temp_id, draft } => {
                entities.insert(
                    temp_id.clone(),
                    CalendarEvent::from_draft(temp_id.clone(), draft, now),
                );
            }
            Self::Update { id, patch } => {
                if let Some(event) = entities.get_mut(id) {
                    event.apply_patch(patch, now);
                }
            }
            Self::Delete { id } => {
                entities.remove(id);
            }
            Self::UpdateStatus { id, status } => {
                if let Some(event) = entities.get_mut(id) {
                    event.status = *status;
                    event.updated_at = now;
                }
            }
        }
    }
}

/// A written event together with the events it overlaps.
///
/// Conflicts are advisory; the write has already happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledEvent {
    pub event: CalendarEvent,
    pub conflicts: Vec<CalendarEvent>,
}

/// Offline-first access to calendar events.
pub struct CalendarRepository<G, C> {
    gateway: G,
    connectivity: C,
    store: LocalStore,
    cache: EntityCache<CalendarEvent>,
    queue: MutationQueue<EventOp>,
    priority: QueuePriority,
    write_lock: Mutex<()>,
}

impl<G, C> CalendarRepository<G, C>
where
    G: CalendarGateway,
    C: ConnectivityOracle,
{
    pub fn new(store: &LocalStore, gateway: G, connectivity: C) -> Self {
        Self {
            gateway,
            connectivity,
            store: store.clone(),
            cache: store.cache(),
            queue: store.queue(),
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

    fn reads_remote(&self) -> bool {
        policy::resolve(Operation::Read, self.connected()) == AccessPath::RemoteFirst
    }

    async fn write_path(&self, scope: WriteScope<'_>) -> Result<AccessPath> {
        let pending = self.queue.list_all().await?;
        Ok(write_path(self.connected(), scope, &pending))
    }

    pub async fn list(&self, filters: &EventFilters) -> Result<Vec<CalendarEvent>> {
        if self.reads_remote() {
            match self.gateway.list_events(filters).await {
                Ok(remote) => {
                    let rebased =
                        refresh_cache::<EventOp>(&self.store, remote, filters.is_unscoped())
                            .await?;
                    return Ok(filters.apply(rebased));
                }
                Err(error) => {
                    degrade(Operation::Read, "event list", error)?;
                }
            }
        }

        tracing::debug!("Listing events from cache");
        Ok(filters.apply(self.cache.list().await?))
    }

    pub async fn get_by_id(&self, id: &str) -> Result<CalendarEvent> {
        if self.reads_remote() && !is_temporary_id(id) {
            match self.gateway.get_event(id).await {
                Ok(remote) => return refresh_entity::<EventOp>(&self.store, remote).await,
                Err(error) => {
                    degrade(Operation::Read, "event fetch", error)?;
                }
            }
        }

        self.cache
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFoundInCache(id.to_string()))
    }

    /// Create an event, reporting the cached events it overlaps.
    pub async fn create(&self, draft: EventDraft) -> Result<ScheduledEvent> {
        draft.validate()?;

        let event = {
            let _guard = self.write_lock.lock().await;
            self.create_locked(draft).await?
        };
        self.scheduled(event).await
    }

    async fn create_locked(&self, draft: EventDraft) -> Result<CalendarEvent> {
        if self.write_path(WriteScope::New).await? == AccessPath::RemoteFirst {
            let idempotency_key = uuid::Uuid::now_v7().to_string();
            match self.gateway.create_event(&draft, &idempotency_key).await {
                Ok(created) => {
                    self.cache.put(&created).await?;
                    return Ok(created);
                }
                Err(error) => {
                    degrade(Operation::Write, "event create", error)?;
                }
            }
        }

        let temp_id = temporary_id();
        let mut write = write_optimistic(
            &self.store,
            vec![EventOp::Create {
                temp_id: temp_id.clone(),
                draft,
            }],
            self.priority,
        )
        .await?;
        take_entity(&mut write.entities, &temp_id)
    }

    /// Update an event, reporting overlaps when it moved in time.
    pub async fn update(&self, id: &str, patch: EventPatch) -> Result<ScheduledEvent> {
        if let (Some(start), Some(end)) = (patch.start, patch.end) {
            TimeRange::new(start, end)?;
        }

        let event = {
            let _guard = self.write_lock.lock().await;
            self.update_locked(id, &patch).await?
        };
        if patch.changes_time() {
            self.scheduled(event).await
        } else {
            Ok(ScheduledEvent {
                event,
                conflicts: Vec::new(),
            })
        }
    }

    async fn update_locked(&self, id: &str, patch: &EventPatch) -> Result<CalendarEvent> {
        if self.write_path(WriteScope::Entity(id)).await? == AccessPath::RemoteFirst {
            match self.gateway.update_event(id, patch).await {
                Ok(updated) => {
                    self.cache.put(&updated).await?;
                    return Ok(updated);
                }
                Err(error) => {
                    degrade(Operation::Write, "event update", error)?;
                }
            }
        }

        let mut candidate = self
            .cache
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFoundInCache(id.to_string()))?;
        candidate.apply_patch(patch, 0);
        if let Some(end) = candidate.end {
            TimeRange::new(candidate.start, end)?;
        }

        let mut write = write_optimistic(
            &self.store,
            vec![EventOp::Update {
                id: id.to_string(),
                patch: patch.clone(),
            }],
            self.priority,
        )
        .await?;
        take_entity(&mut write.entities, id)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.write_path(WriteScope::Entity(id)).await? == AccessPath::RemoteFirst {
            match self.gateway.delete_event(id).await {
                Ok(()) => {
                    self.cache.remove(id).await?;
                    return Ok(());
                }
                Err(error) => {
                    degrade(Operation::Write, "event delete", error)?;
                }
            }
        }

        write_optimistic(
            &self.store,
            vec![EventOp::Delete { id: id.to_string() }],
            self.priority,
        )
        .await?;
        Ok(())
    }

    pub async fn update_status(&self, id: &str, status: EventStatus) -> Result<CalendarEvent> {
        let _guard = self.write_lock.lock().await;
        if self.write_path(WriteScope::Entity(id)).await? == AccessPath::RemoteFirst {
            match self.gateway.update_event_status(id, status).await {
                Ok(updated) => {
                    self.cache.put(&updated).await?;
                    return Ok(updated);
                }
                Err(error) => {
                    degrade(Operation::Write, "event status change", error)?;
                }
            }
        }

        if self.cache.get(id).await?.is_none() {
            return Err(Error::NotFoundInCache(id.to_string()));
        }
        let mut write = write_optimistic(
            &self.store,
            vec![EventOp::UpdateStatus {
                id: id.to_string(),
                status,
            }],
            self.priority,
        )
        .await?;
        take_entity(&mut write.entities, id)
    }

    /// Events overlapping `range`, excluding `exclude_id`.
    ///
    /// Delegates to the remote when connected and nothing is pending; otherwise
    /// computed against the cache.
    pub async fn check_conflicts(
        &self,
        range: &TimeRange,
        exclude_id: Option<&str>,
    ) -> Result<Vec<CalendarEvent>> {
        if self.reads_remote() && self.queue.is_empty().await? {
            match self.gateway.check_conflicts(range, exclude_id).await {
                Ok(conflicts) => return Ok(conflicts),
                Err(error) => {
                    degrade(Operation::Read, "conflict check", error)?;
                }
            }
        }

        let cached = self.cache.list().await?;
        Ok(find_conflicts(range, &cached, exclude_id))
    }

    /// Events in `range` grouped by day.
    pub async fn get_calendar_data(&self, range: &TimeRange) -> Result<CalendarData> {
        if self.reads_remote() && self.queue.is_empty().await? {
            match self.gateway.calendar_data(range).await {
                Ok(data) => {
                    let events = data
                        .days
                        .iter()
                        .flat_map(|day| day.events.iter().cloned())
                        .collect::<Vec<_>>();
                    self.cache.put_many(&events).await?;
                    return Ok(data);
                }
                Err(error) => {
                    degrade(Operation::Read, "calendar data", error)?;
                }
            }
        }

        let cached = self.cache.list().await?;
        Ok(CalendarData::from_events(*range, cached))
    }

    /// Import events in bulk; offline each draft becomes a queued create.
    pub async fn import_events(&self, drafts: Vec<EventDraft>) -> Result<Vec<CalendarEvent>> {
        for draft in &drafts {
            draft.validate()?;
        }
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let _guard = self.write_lock.lock().await;
        if self.write_path(WriteScope::New).await? == AccessPath::RemoteFirst {
            match self.gateway.import_events(&drafts).await {
                Ok(imported) => {
                    self.cache.put_many(&imported).await?;
                    tracing::info!("Imported {} event(s)", imported.len());
                    return Ok(imported);
                }
                Err(error) => {
                    degrade(Operation::Write, "event import", error)?;
                }
            }
        }

        let operations = drafts
            .into_iter()
            .map(|draft| EventOp::Create {
                temp_id: temporary_id(),
                draft,
            })
            .collect::<Vec<_>>();
        let temp_ids = operations
            .iter()
            .filter_map(|operation| match operation {
                EventOp::Create { temp_id, .. } => Some(temp_id.clone()),
                _ => None,
            })
            .collect::<Vec<_>>();

        let mut write = write_optimistic(&self.store, operations, self.priority).await?;
        temp_ids
            .iter()
            .map(|temp_id| take_entity(&mut write.entities, temp_id))
            .collect()
    }

    /// Export events in `range`. Requires a live connection.
    pub async fn export_events(&self, range: &TimeRange, format: ExportFormat) -> Result<String> {
        if policy::resolve(Operation::ConnectedOnly, self.connected()) == AccessPath::Unavailable {
            return Err(Error::NoConnectivity("event export"));
        }
        let exported = self.gateway.export_events(range, format).await?;
        tracing::debug!("Exported events as {}", format.as_str());
        Ok(exported)
    }

    pub async fn get_queued(&self) -> Result<Vec<QueueItem<EventOp>>> {
        self.queue.list_all().await
    }

    pub async fn clear_queued(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let cleared = self.queue.clear().await?;
        tracing::info!("Cleared {cleared} queued calendar write(s)");
        Ok(cleared)
    }

    /// Replay every queued write. Requires connectivity.
    pub async fn sync(&self) -> Result<SyncSession> {
        replay_queue(self, &SyncFilter::all(), None).await
    }

    async fn scheduled(&self, event: CalendarEvent) -> Result<ScheduledEvent> {
        let cached = self.cache.list().await?;
        let conflicts = find_conflicts(&event.time_range(), &cached, Some(&event.id));
        if !conflicts.is_empty() {
            tracing::debug!(
                "Event {} overlaps {} other event(s)",
                event.id,
                conflicts.len()
            );
        }
        Ok(ScheduledEvent { event, conflicts })
    }
}

impl<G, C> ReplayTarget for CalendarRepository<G, C>
where
    G: CalendarGateway,
    C: ConnectivityOracle,
{
    type Op = EventOp;

    fn queue(&self) -> &MutationQueue<EventOp> {
        &self.queue
    }

    fn is_connected(&self) -> bool {
        self.connected()
    }

    async fn replay(&self, item: &QueueItem<EventOp>) -> Result<()> {
        let (event, replaced_id) = match &item.operation {
            EventOp::Create { temp_id, draft } => (
                self.gateway.create_event(draft, &item.id.as_str()).await?,
                Some(temp_id.as_str()),
            ),
            EventOp::Update { id, patch } => (self.gateway.update_event(id, patch).await?, None),
            EventOp::UpdateStatus { id, status } => {
                (self.gateway.update_event_status(id, *status).await?, None)
            }
            EventOp::Delete { id } => {
                match self.gateway.delete_event(id).await {
                    Ok(()) => {}
                    Err(GatewayError::Service(service)) if service.status == Some(404) => {
                        tracing::debug!("Event {id} already deleted remotely");
                    }
                    Err(error) => return Err(error.into()),
                }
                let _guard = self.write_lock.lock().await;
                return complete_replayed::<EventOp>(&self.store, &item.id, |tx| {
                    SqliteCacheRepository::new(tx).remove::<CalendarEvent>(id)?;
                    Ok(())
                })
                .await;
            }
        };

        let _guard = self.write_lock.lock().await;
        record_replayed::<EventOp>(&self.store, event, &item.id, replaced_id).await?;
        Ok(())
    }
}
