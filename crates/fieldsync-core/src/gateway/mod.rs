//! Remote gateway contracts.
//!
//! One request/response method per domain operation. Every call resolves to
//! the domain result or a [`GatewayError`](crate::error::GatewayError) that
//! tells a service rejection apart from a transport fault.

mod http;

pub use http::HttpGateway;

use crate::error::GatewayResult;
use crate::models::{
    CalendarData, CalendarEvent, EventDraft, EventFilters, EventPatch, EventStatus, ExportFormat,
    Notification, NotificationDraft, NotificationFilters, NotificationPatch,
    NotificationPreferences, NotificationSummary, TimeRange,
};

/// Remote operations of the notification family
#[allow(async_fn_in_trait)]
pub trait NotificationGateway: Send + Sync {
    async fn list_notifications(
        &self,
        filters: &NotificationFilters,
    ) -> GatewayResult<Vec<Notification>>;

    async fn get_notification(&self, id: &str) -> GatewayResult<Notification>;

    /// Create a notification. Replays of the same create reuse `idempotency_key`.
    async fn create_notification(
        &self,
        draft: &NotificationDraft,
        idempotency_key: &str,
    ) -> GatewayResult<Notification>;

    async fn update_notification(
        &self,
        id: &str,
        patch: &NotificationPatch,
    ) -> GatewayResult<Notification>;

    async fn delete_notification(&self, id: &str) -> GatewayResult<()>;

    async fn mark_as_read(&self, id: &str) -> GatewayResult<Notification>;

    async fn mark_as_dismissed(&self, id: &str) -> GatewayResult<Notification>;

    /// Returns the number of notifications that changed
    async fn mark_all_as_read(&self) -> GatewayResult<u64>;

    /// Returns the number of notifications removed
    async fn clear_all(&self) -> GatewayResult<u64>;

    async fn notification_summary(&self) -> GatewayResult<NotificationSummary>;

    async fn get_preferences(&self) -> GatewayResult<NotificationPreferences>;

    async fn update_preferences(
        &self,
        preferences: &NotificationPreferences,
    ) -> GatewayResult<NotificationPreferences>;

    async fn subscribe(&self, topic: &str) -> GatewayResult<()>;

    async fn unsubscribe(&self, topic: &str) -> GatewayResult<()>;
}

/// Remote operations of the calendar family
#[allow(async_fn_in_trait)]
pub trait CalendarGateway: Send + Sync {
    async fn list_events(&self, filters: &EventFilters) -> GatewayResult<Vec<CalendarEvent>>;

    async fn get_event(&self, id: &str) -> GatewayResult<CalendarEvent>;

    /// Create an event. Replays of the same create reuse `idempotency_key`.
    async fn create_event(
        &self,
        draft: &EventDraft,
        idempotency_key: &str,
    ) -> GatewayResult<CalendarEvent>;

    async fn update_event(&self, id: &str, patch: &EventPatch) -> GatewayResult<CalendarEvent>;

    async fn delete_event(&self, id: &str) -> GatewayResult<()>;

    async fn update_event_status(
        &self,
        id: &str,
        status: EventStatus,
    ) -> GatewayResult<CalendarEvent>;

    async fn check_conflicts(
        &self,
        range: &TimeRange,
        exclude_id: Option<&str>,
    ) -> GatewayResult<Vec<CalendarEvent>>;

    async fn calendar_data(&self, range: &TimeRange) -> GatewayResult<CalendarData>;

    async fn import_events(&self, drafts: &[EventDraft]) -> GatewayResult<Vec<CalendarEvent>>;

    /// Render events in `range` as `format` text
    async fn export_events(&self, range: &TimeRange, format: ExportFormat)
        -> GatewayResult<String>;
}
