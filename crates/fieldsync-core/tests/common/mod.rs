//! In-memory gateway doubles shared by the integration tests.
//!
//! Each double behaves like a conforming backend: creates are de-duplicated by
//! idempotency key, unknown ids answer 404, and every call is counted. Calls
//! can be made to fail on demand with a service rejection or a transport
//! fault.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, TimeZone, Utc};
use fieldsync_core::conflict::find_conflicts;
use fieldsync_core::gateway::{CalendarGateway, NotificationGateway};
use fieldsync_core::models::{
    CalendarData, CalendarEvent, EventDraft, EventFilters, EventPatch, EventStatus, ExportFormat,
    Notification, NotificationDraft, NotificationFilters, NotificationPatch,
    NotificationPreferences, NotificationStatus, NotificationSummary, TimeRange,
};
use fieldsync_core::{
    CalendarRepository, ConnectivityFlag, GatewayError, GatewayResult, LocalStore,
    NotificationRepository, ServiceError, SyncCancelHandle,
};
use tokio::sync::Notify;

pub type Notifications = NotificationRepository<FakeNotificationGateway, ConnectivityFlag>;
pub type Calendar = CalendarRepository<FakeCalendarGateway, ConnectivityFlag>;

/// How a double fails a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Service,
    Transport,
}

impl Failure {
    fn error(self, call: &str) -> GatewayError {
        match self {
            Self::Service => GatewayError::Service(
                ServiceError::new(format!("{call} rejected"))
                    .with_status(500)
                    .with_code("internal"),
            ),
            Self::Transport => GatewayError::transport(format!("{call}: connection refused")),
        }
    }
}

fn not_found(id: &str) -> GatewayError {
    GatewayError::Service(
        ServiceError::new(format!("{id} not found"))
            .with_status(404)
            .with_code("not_found"),
    )
}

fn rejected(id: &str) -> GatewayError {
    GatewayError::Service(
        ServiceError::new(format!("{id} is not allowed"))
            .with_status(422)
            .with_code("validation_failed"),
    )
}

/// Call bookkeeping shared by both doubles
#[derive(Default)]
struct Controls {
    calls: HashMap<&'static str, usize>,
    failure: Option<Failure>,
    /// Ids (or create titles) that the backend always rejects
    rejected: HashSet<String>,
    cancel_after_call: Option<SyncCancelHandle>,
    hold: Option<(Arc<Notify>, Arc<Notify>)>,
    clock: i64,
}

impl Controls {
    fn begin(&mut self, call: &'static str, key: Option<&str>) -> GatewayResult<i64> {
        *self.calls.entry(call).or_default() += 1;
        if let Some(handle) = &self.cancel_after_call {
            handle.cancel();
        }
        if let Some(failure) = self.failure {
            return Err(failure.error(call));
        }
        if let Some(key) = key.filter(|key| self.rejected.contains(*key)) {
            return Err(rejected(key));
        }
        self.clock += 1;
        Ok(1_700_000_000_000 + self.clock)
    }

    fn count(&self, call: &str) -> usize {
        self.calls.get(call).copied().unwrap_or_default()
    }
}

/// Pause the first call after `hold_next_call` until released.
async fn pause_if_held(controls: &Mutex<Controls>) {
    let hold = controls.lock().unwrap().hold.take();
    if let Some((entered, release)) = hold {
        entered.notify_one();
        release.notified().await;
    }
}

macro_rules! control_methods {
    () => {
        pub fn fail_with(&self, failure: Failure) {
            self.controls.lock().unwrap().failure = Some(failure);
        }

        pub fn recover(&self) {
            self.controls.lock().unwrap().failure = None;
        }

        /// Reject every call that targets `key` (an id, or a create title).
        pub fn reject(&self, key: &str) {
            self.controls.lock().unwrap().rejected.insert(key.to_string());
        }

        pub fn accept(&self, key: &str) {
            self.controls.lock().unwrap().rejected.remove(key);
        }

        pub fn calls(&self, call: &str) -> usize {
            self.controls.lock().unwrap().count(call)
        }

        /// Trip `handle` as soon as the next remote call is made.
        pub fn cancel_on_call(&self, handle: SyncCancelHandle) {
            self.controls.lock().unwrap().cancel_after_call = Some(handle);
        }

        /// Block the next call until `release` is notified; `entered` fires
        /// once the call is in flight.
        pub fn hold_next_call(&self) -> (Arc<Notify>, Arc<Notify>) {
            let entered = Arc::new(Notify::new());
            let release = Arc::new(Notify::new());
            self.controls.lock().unwrap().hold = Some((entered.clone(), release.clone()));
            (entered, release)
        }
    };
}

#[derive(Default)]
struct NotificationBackend {
    notifications: BTreeMap<String, Notification>,
    preferences: NotificationPreferences,
    subscriptions: HashSet<String>,
    idempotency: HashMap<String, String>,
    next_id: u64,
}

/// In-memory notification backend
#[derive(Default)]
pub struct FakeNotificationGateway {
    controls: Mutex<Controls>,
    backend: Mutex<NotificationBackend>,
}

impl FakeNotificationGateway {
    control_methods!();

    pub fn seed(&self, notification: Notification) {
        self.backend
            .lock()
            .unwrap()
            .notifications
            .insert(notification.id.clone(), notification);
    }

    pub fn stored(&self) -> Vec<Notification> {
        self.backend
            .lock()
            .unwrap()
            .notifications
            .values()
            .cloned()
            .collect()
    }

    pub fn remote_preferences(&self) -> NotificationPreferences {
        self.backend.lock().unwrap().preferences.clone()
    }

    pub fn subscriptions(&self) -> HashSet<String> {
        self.backend.lock().unwrap().subscriptions.clone()
    }

    async fn begin(&self, call: &'static str, key: Option<&str>) -> GatewayResult<i64> {
        pause_if_held(&self.controls).await;
        self.controls.lock().unwrap().begin(call, key)
    }

    fn backend(&self) -> MutexGuard<'_, NotificationBackend> {
        self.backend.lock().unwrap()
    }

    fn with_notification(
        &self,
        id: &str,
        update: impl FnOnce(&mut Notification),
    ) -> GatewayResult<Notification> {
        let mut backend = self.backend();
        let notification = backend
            .notifications
            .get_mut(id)
            .ok_or_else(|| not_found(id))?;
        update(notification);
        Ok(notification.clone())
    }
}

impl NotificationGateway for FakeNotificationGateway {
    async fn list_notifications(
        &self,
        filters: &NotificationFilters,
    ) -> GatewayResult<Vec<Notification>> {
        self.begin("list_notifications", None).await?;
        Ok(filters.apply(self.stored()))
    }

    async fn get_notification(&self, id: &str) -> GatewayResult<Notification> {
        self.begin("get_notification", Some(id)).await?;
        self.with_notification(id, |_| {})
    }

    async fn create_notification(
        &self,
        draft: &NotificationDraft,
        idempotency_key: &str,
    ) -> GatewayResult<Notification> {
        let now = self.begin("create_notification", Some(&draft.title)).await?;
        let mut backend = self.backend();
        if let Some(id) = backend.idempotency.get(idempotency_key).cloned() {
            return backend.notifications.get(&id).cloned().ok_or_else(|| not_found(&id));
        }
        backend.next_id += 1;
        let id = format!("n-{}", backend.next_id);
        let notification = Notification::from_draft(id.clone(), draft, now);
        backend
            .idempotency
            .insert(idempotency_key.to_string(), id.clone());
        backend.notifications.insert(id, notification.clone());
        Ok(notification)
    }

    async fn update_notification(
        &self,
        id: &str,
        patch: &NotificationPatch,
    ) -> GatewayResult<Notification> {
        let now = self.begin("update_notification", Some(id)).await?;
        self.with_notification(id, |notification| notification.apply_patch(patch, now))
    }

    async fn delete_notification(&self, id: &str) -> GatewayResult<()> {
        self.begin("delete_notification", Some(id)).await?;
        self.backend()
            .notifications
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }

    async fn mark_as_read(&self, id: &str) -> GatewayResult<Notification> {
        let now = self.begin("mark_as_read", Some(id)).await?;
        self.with_notification(id, |notification| {
            notification.set_status(NotificationStatus::Read, now);
        })
    }

    async fn mark_as_dismissed(&self, id: &str) -> GatewayResult<Notification> {
        let now = self.begin("mark_as_dismissed", Some(id)).await?;
        self.with_notification(id, |notification| {
            notification.set_status(NotificationStatus::Dismissed, now);
        })
    }

    async fn mark_all_as_read(&self) -> GatewayResult<u64> {
        let now = self.begin("mark_all_as_read", None).await?;
        let mut backend = self.backend();
        let mut count = 0;
        for notification in backend.notifications.values_mut() {
            if notification.is_unread() {
                notification.set_status(NotificationStatus::Read, now);
                count += 1;
            }
        }
        Ok(count)
    }

    async fn clear_all(&self) -> GatewayResult<u64> {
        self.begin("clear_all", None).await?;
        let mut backend = self.backend();
        let count = u64::try_from(backend.notifications.len()).unwrap();
        backend.notifications.clear();
        Ok(count)
    }

    async fn notification_summary(&self) -> GatewayResult<NotificationSummary> {
        self.begin("notification_summary", None).await?;
        Ok(NotificationSummary::from_notifications(&self.stored()))
    }

    async fn get_preferences(&self) -> GatewayResult<NotificationPreferences> {
        self.begin("get_preferences", None).await?;
        Ok(self.remote_preferences())
    }

    async fn update_preferences(
        &self,
        preferences: &NotificationPreferences,
    ) -> GatewayResult<NotificationPreferences> {
        self.begin("update_preferences", None).await?;
        let mut backend = self.backend();
        backend.preferences.extend(preferences.clone());
        Ok(backend.preferences.clone())
    }

    async fn subscribe(&self, topic: &str) -> GatewayResult<()> {
        self.begin("subscribe", Some(topic)).await?;
        self.backend().subscriptions.insert(topic.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> GatewayResult<()> {
        self.begin("unsubscribe", Some(topic)).await?;
        self.backend().subscriptions.remove(topic);
        Ok(())
    }
}

#[derive(Default)]
struct CalendarBackend {
    events: BTreeMap<String, CalendarEvent>,
    idempotency: HashMap<String, String>,
    next_id: u64,
}

/// In-memory calendar backend
#[derive(Default)]
pub struct FakeCalendarGateway {
    controls: Mutex<Controls>,
    backend: Mutex<CalendarBackend>,
}

impl FakeCalendarGateway {
    control_methods!();

    pub fn seed(&self, event: CalendarEvent) {
        self.backend
            .lock()
            .unwrap()
            .events
            .insert(event.id.clone(), event);
    }

    pub fn stored(&self) -> Vec<CalendarEvent> {
        self.backend.lock().unwrap().events.values().cloned().collect()
    }

    async fn begin(&self, call: &'static str, key: Option<&str>) -> GatewayResult<i64> {
        pause_if_held(&self.controls).await;
        self.controls.lock().unwrap().begin(call, key)
    }

    fn insert(&self, draft: &EventDraft, idempotency_key: Option<&str>, now: i64) -> CalendarEvent {
        let mut backend = self.backend.lock().unwrap();
        if let Some(existing) = idempotency_key
            .and_then(|key| backend.idempotency.get(key))
            .and_then(|id| backend.events.get(id))
        {
            return existing.clone();
        }
        backend.next_id += 1;
        let id = format!("e-{}", backend.next_id);
        let event = CalendarEvent::from_draft(id.clone(), draft, now);
        if let Some(key) = idempotency_key {
            backend.idempotency.insert(key.to_string(), id.clone());
        }
        backend.events.insert(id, event.clone());
        event
    }

    fn with_event(
        &self,
        id: &str,
        update: impl FnOnce(&mut CalendarEvent),
    ) -> GatewayResult<CalendarEvent> {
        let mut backend = self.backend.lock().unwrap();
        let event = backend.events.get_mut(id).ok_or_else(|| not_found(id))?;
        update(event);
        Ok(event.clone())
    }
}

impl CalendarGateway for FakeCalendarGateway {
    async fn list_events(&self, filters: &EventFilters) -> GatewayResult<Vec<CalendarEvent>> {
        self.begin("list_events", None).await?;
        Ok(filters.apply(self.stored()))
    }

    async fn get_event(&self, id: &str) -> GatewayResult<CalendarEvent> {
        self.begin("get_event", Some(id)).await?;
        self.with_event(id, |_| {})
    }

    async fn create_event(
        &self,
        draft: &EventDraft,
        idempotency_key: &str,
    ) -> GatewayResult<CalendarEvent> {
        let now = self.begin("create_event", Some(&draft.title)).await?;
        Ok(self.insert(draft, Some(idempotency_key), now))
    }

    async fn update_event(&self, id: &str, patch: &EventPatch) -> GatewayResult<CalendarEvent> {
        let now = self.begin("update_event", Some(id)).await?;
        self.with_event(id, |event| event.apply_patch(patch, now))
    }

    async fn delete_event(&self, id: &str) -> GatewayResult<()> {
        self.begin("delete_event", Some(id)).await?;
        self.backend
            .lock()
            .unwrap()
            .events
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }

    async fn update_event_status(
        &self,
        id: &str,
        status: EventStatus,
    ) -> GatewayResult<CalendarEvent> {
        let now = self.begin("update_event_status", Some(id)).await?;
        self.with_event(id, |event| {
            event.status = status;
            event.updated_at = now;
        })
    }

    async fn check_conflicts(
        &self,
        range: &TimeRange,
        exclude_id: Option<&str>,
    ) -> GatewayResult<Vec<CalendarEvent>> {
        self.begin("check_conflicts", None).await?;
        Ok(find_conflicts(range, &self.stored(), exclude_id))
    }

    async fn calendar_data(&self, range: &TimeRange) -> GatewayResult<CalendarData> {
        self.begin("calendar_data", None).await?;
        Ok(CalendarData::from_events(*range, self.stored()))
    }

    async fn import_events(&self, drafts: &[EventDraft]) -> GatewayResult<Vec<CalendarEvent>> {
        let now = self.begin("import_events", None).await?;
        Ok(drafts
            .iter()
            .map(|draft| self.insert(draft, None, now))
            .collect())
    }

    async fn export_events(
        &self,
        range: &TimeRange,
        format: ExportFormat,
    ) -> GatewayResult<String> {
        self.begin("export_events", None).await?;
        let events = EventFilters::in_range(*range).apply(self.stored());
        Ok(match format {
            ExportFormat::Json => serde_json::to_string(&events).unwrap_or_default(),
            ExportFormat::Ical => {
                let mut ical = String::from("BEGIN:VCALENDAR\n");
                for event in &events {
                    ical.push_str(&format!("BEGIN:VEVENT\nSUMMARY:{}\nEND:VEVENT\n", event.title));
                }
                ical.push_str("END:VCALENDAR\n");
                ical
            }
        })
    }
}

/// 2025-03-14 at `hour:minute` UTC
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, hour, minute, 0).unwrap()
}

pub fn range(start: DateTime<Utc>, end: DateTime<Utc>) -> TimeRange {
    TimeRange::new(start, end).unwrap()
}

pub fn remote_notification(id: &str, title: &str) -> Notification {
    Notification::from_draft(id, &NotificationDraft::new(title), 1_600_000_000_000)
}

pub fn remote_event(id: &str, title: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> CalendarEvent {
    CalendarEvent::from_draft(id, &EventDraft::new(title, start, Some(end)), 1_600_000_000_000)
}

pub async fn notifications(connected: bool) -> (Notifications, ConnectivityFlag, LocalStore) {
    let store = LocalStore::open_in_memory().await.unwrap();
    let connectivity = ConnectivityFlag::new(connected);
    let repository = NotificationRepository::new(
        &store,
        FakeNotificationGateway::default(),
        connectivity.clone(),
    );
    (repository, connectivity, store)
}

pub async fn calendar(connected: bool) -> (Calendar, ConnectivityFlag, LocalStore) {
    let store = LocalStore::open_in_memory().await.unwrap();
    let connectivity = ConnectivityFlag::new(connected);
    let repository =
        CalendarRepository::new(&store, FakeCalendarGateway::default(), connectivity.clone());
    (repository, connectivity, store)
}
