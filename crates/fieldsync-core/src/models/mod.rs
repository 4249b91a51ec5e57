//! Data models for Fieldsync

mod event;
mod notification;
mod queue;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use event::{
    CalendarData, CalendarDay, CalendarEvent, EventDraft, EventFilters, EventPatch, EventStatus,
    ExportFormat, TimeRange, DEFAULT_EVENT_DURATION_MINUTES,
};
pub use notification::{
    default_preferences, retain_known_preferences, Notification, NotificationDraft,
    NotificationFilters, NotificationPatch, NotificationPreferences, NotificationPriority,
    NotificationStatus, NotificationSummary, NotificationType,
};
pub use queue::{
    EventOp, NotificationOp, OperationType, QueueId, QueueItem, QueuePriority, QueuedOperation,
};

/// Entity family a cache collection, queue or preference map belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityFamily {
    Notifications,
    Calendar,
}

impl EntityFamily {
    /// Stable storage key, e.g. the `<family>` in `cache:<family>`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Notifications => "notifications",
            Self::Calendar => "calendar",
        }
    }
}

impl fmt::Display for EntityFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entity that can be snapshotted into the local cache.
pub trait CachedEntity: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Family whose cache collection stores this entity
    const FAMILY: EntityFamily;

    /// Entity id (server-assigned or temporary)
    fn id(&self) -> &str;

    /// Last update timestamp (Unix ms)
    fn updated_at(&self) -> i64;
}
