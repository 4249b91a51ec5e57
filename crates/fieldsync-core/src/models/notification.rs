//! Notification model

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{CachedEntity, EntityFamily};

/// Read state of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    #[default]
    Unread,
    Read,
    Dismissed,
}

impl NotificationStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unread => "unread",
            Self::Read => "read",
            Self::Dismissed => "dismissed",
        }
    }
}

impl FromStr for NotificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unread" => Ok(Self::Unread),
            "read" => Ok(Self::Read),
            "dismissed" => Ok(Self::Dismissed),
            other => Err(format!("unknown notification status '{other}'")),
        }
    }
}

/// Urgency of a notification
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl NotificationPriority {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl FromStr for NotificationPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(format!("unknown notification priority '{other}'")),
        }
    }
}

/// Category of a notification; also the key space of notification preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    #[default]
    General,
    Announcement,
    Reminder,
    Event,
    Election,
    System,
}

impl NotificationType {
    pub const ALL: [Self; 6] = [
        Self::General,
        Self::Announcement,
        Self::Reminder,
        Self::Event,
        Self::Election,
        Self::System,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Announcement => "announcement",
            Self::Reminder => "reminder",
            Self::Event => "event",
            Self::Election => "election",
            Self::System => "system",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == key)
            .ok_or_else(|| format!("unknown notification type '{key}'"))
    }
}

/// A notification delivered to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Server id, or a temporary id while the create is queued
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub notification_type: NotificationType,
    #[serde(default)]
    pub status: NotificationStatus,
    #[serde(default)]
    pub priority: NotificationPriority,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
    /// When the notification was first read (Unix ms)
    #[serde(default)]
    pub read_at: Option<i64>,
}

impl Notification {
    /// Build the local version of a notification created from `draft`.
    pub fn from_draft(id: impl Into<String>, draft: &NotificationDraft, now: i64) -> Self {
        Self {
            id: id.into(),
            title: draft.title.clone(),
            body: draft.body.clone(),
            notification_type: draft.notification_type,
            status: NotificationStatus::Unread,
            priority: draft.priority,
            metadata: draft.metadata.clone(),
            created_at: now,
            updated_at: now,
            read_at: None,
        }
    }

    /// Merge the provided fields of `patch` over this notification.
    pub fn apply_patch(&mut self, patch: &NotificationPatch, now: i64) {
        if let Some(title) = &patch.title {
            self.title.clone_from(title);
        }
        if let Some(body) = &patch.body {
            self.body.clone_from(body);
        }
        if let Some(kind) = patch.notification_type {
            self.notification_type = kind;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(status) = patch.status {
            self.set_status(status, now);
        }
        if let Some(metadata) = &patch.metadata {
            self.metadata.extend(metadata.clone());
        }
        self.updated_at = now;
    }

    /// Move to `status`, stamping `read_at` the first time it leaves unread.
    pub fn set_status(&mut self, status: NotificationStatus, now: i64) {
        if status != NotificationStatus::Unread && self.read_at.is_none() {
            self.read_at = Some(now);
        }
        self.status = status;
        self.updated_at = now;
    }

    pub fn is_unread(&self) -> bool {
        self.status == NotificationStatus::Unread
    }
}

impl CachedEntity for Notification {
    const FAMILY: EntityFamily = EntityFamily::Notifications;

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }
}

/// Fields for creating a notification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationDraft {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub notification_type: NotificationType,
    #[serde(default)]
    pub priority: NotificationPriority,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl NotificationDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial update of a notification; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<NotificationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<NotificationPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NotificationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
}

/// Query filters for listing notifications
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NotificationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<NotificationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<NotificationPriority>,
    #[serde(default)]
    pub unread_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl NotificationFilters {
    /// Whether the query covers the whole collection.
    pub const fn is_unscoped(&self) -> bool {
        self.status.is_none()
            && self.notification_type.is_none()
            && self.priority.is_none()
            && !self.unread_only
            && self.limit.is_none()
    }

    pub fn matches(&self, notification: &Notification) -> bool {
        if self.unread_only && !notification.is_unread() {
            return false;
        }
        if self.status.is_some_and(|status| status != notification.status) {
            return false;
        }
        if self
            .notification_type
            .is_some_and(|kind| kind != notification.notification_type)
        {
            return false;
        }
        if self
            .priority
            .is_some_and(|priority| priority != notification.priority)
        {
            return false;
        }
        true
    }

    /// Filter, order newest first and truncate to `limit`.
    pub fn apply(&self, notifications: Vec<Notification>) -> Vec<Notification> {
        let mut matching = notifications
            .into_iter()
            .filter(|notification| self.matches(notification))
            .collect::<Vec<_>>();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        if let Some(limit) = self.limit {
            matching.truncate(limit);
        }
        matching
    }
}

/// Aggregate counts over a user's notifications
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSummary {
    pub total: usize,
    pub unread: usize,
    pub read: usize,
    pub dismissed: usize,
    #[serde(default)]
    pub by_type: BTreeMap<String, usize>,
    #[serde(default)]
    pub by_priority: BTreeMap<String, usize>,
}

impl NotificationSummary {
    /// Compute a summary from locally known notifications.
    pub fn from_notifications(notifications: &[Notification]) -> Self {
        let mut summary = Self {
            total: notifications.len(),
            ..Self::default()
        };
        for notification in notifications {
            match notification.status {
                NotificationStatus::Unread => summary.unread += 1,
                NotificationStatus::Read => summary.read += 1,
                NotificationStatus::Dismissed => summary.dismissed += 1,
            }
            *summary
                .by_type
                .entry(notification.notification_type.as_str().to_string())
                .or_default() += 1;
            *summary
                .by_priority
                .entry(notification.priority.as_str().to_string())
                .or_default() += 1;
        }
        summary
    }
}

/// Notification type key -> enabled
pub type NotificationPreferences = BTreeMap<String, bool>;

/// Every known notification type enabled.
pub fn default_preferences() -> NotificationPreferences {
    NotificationType::ALL
        .into_iter()
        .map(|kind| (kind.as_str().to_string(), true))
        .collect()
}

/// Split `preferences` into known-type entries and ignored unknown keys.
pub fn retain_known_preferences(
    preferences: &NotificationPreferences,
) -> (NotificationPreferences, Vec<String>) {
    let mut known = NotificationPreferences::new();
    let mut ignored = Vec::new();
    for (key, enabled) in preferences {
        match key.parse::<NotificationType>() {
            Ok(kind) => {
                known.insert(kind.as_str().to_string(), *enabled);
            }
            Err(_) => ignored.push(key.clone()),
        }
    }
    (known, ignored)
}
