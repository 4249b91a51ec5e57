//! Queued mutation model

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    EntityFamily, EventDraft, EventPatch, EventStatus, NotificationDraft, NotificationPatch,
    NotificationPreferences,
};

/// Closed set of queued operation kinds, used for filtering and inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Create,
    Update,
    Delete,
    MarkRead,
    MarkDismissed,
    MarkAllRead,
    ClearAll,
    UpdatePreferences,
    UpdateStatus,
}

impl OperationType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::MarkRead => "mark_read",
            Self::MarkDismissed => "mark_dismissed",
            Self::MarkAllRead => "mark_all_read",
            Self::ClearAll => "clear_all",
            Self::UpdatePreferences => "update_preferences",
            Self::UpdateStatus => "update_status",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            "mark_read" => Ok(Self::MarkRead),
            "mark_dismissed" => Ok(Self::MarkDismissed),
            "mark_all_read" => Ok(Self::MarkAllRead),
            "clear_all" => Ok(Self::ClearAll),
            "update_preferences" => Ok(Self::UpdatePreferences),
            "update_status" => Ok(Self::UpdateStatus),
            other => Err(format!("unknown operation type '{other}'")),
        }
    }
}

/// Replay priority of a queued item
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum QueuePriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl QueuePriority {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for QueuePriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown queue priority '{other}'")),
        }
    }
}

/// A unique identifier for a queue item, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueId(Uuid);

impl QueueId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for QueueId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A typed, replayable write operation for one entity family.
pub trait QueuedOperation: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync {
    /// Family whose queue stores this operation
    const FAMILY: EntityFamily;

    fn operation_type(&self) -> OperationType;

    /// Entity the operation targets, if it targets a single entity
    fn target_id(&self) -> Option<&str>;

    /// Point the operation at `to` if it currently targets `from`.
    ///
    /// Returns whether the operation changed.
    fn retarget(&mut self, from: &str, to: &str) -> bool;
}

/// One pending write awaiting replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem<O> {
    pub id: QueueId,
    pub operation: O,
    pub priority: QueuePriority,
    /// Enqueue timestamp (Unix ms)
    pub enqueued_at: i64,
}

impl<O: QueuedOperation> QueueItem<O> {
    pub fn operation_type(&self) -> OperationType {
        self.operation.operation_type()
    }
}

/// Queued notification writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum NotificationOp {
    Create {
        temp_id: String,
        draft: NotificationDraft,
    },
    Update {
        id: String,
        patch: NotificationPatch,
    },
    Delete {
        id: String,
    },
    MarkRead {
        id: String,
    },
    MarkDismissed {
        id: String,
    },
    MarkAllRead,
    ClearAll,
    UpdatePreferences {
        preferences: NotificationPreferences,
    },
}

impl QueuedOperation for NotificationOp {
    const FAMILY: EntityFamily = EntityFamily::Notifications;

    fn operation_type(&self) -> OperationType {
        match self {
            Self::Create { .. } => OperationType::Create,
            Self::Update { .. } => OperationType::Update,
            Self::Delete { .. } => OperationType::Delete,
            Self::MarkRead { .. } => OperationType::MarkRead,
            Self::MarkDismissed { .. } => OperationType::MarkDismissed,
            Self::MarkAllRead => OperationType::MarkAllRead,
            Self::ClearAll => OperationType::ClearAll,
            Self::UpdatePreferences { .. } => OperationType::UpdatePreferences,
        }
    }

    fn target_id(&self) -> Option<&str> {
        match self {
            Self::Create { temp_id, .. } => Some(temp_id.as_str()),
            Self::Update { id, .. }
            | Self::Delete { id }
            | Self::MarkRead { id }
            | Self::MarkDismissed { id } => Some(id.as_str()),
            Self::MarkAllRead | Self::ClearAll | Self::UpdatePreferences { .. } => None,
        }
    }

    fn retarget(&mut self, from: &str, to: &str) -> bool {
        match self {
            Self::Update { id, .. }
            | Self::Delete { id }
            | Self::MarkRead { id }
            | Self::MarkDismissed { id }
                if *id == from =>
            {
                *id = to.to_string();
                true
            }
            _ => false,
        }
    }
}

/// Queued calendar writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EventOp {
    Create { temp_id: String, draft: EventDraft },
    Update { id: String, patch: EventPatch },
    Delete { id: String },
    UpdateStatus { id: String, status: EventStatus },
}

impl QueuedOperation for EventOp {
    const FAMILY: EntityFamily = EntityFamily::Calendar;

    fn operation_type(&self) -> OperationType {
        match self {
            Self::Create { .. } => OperationType::Create,
            Self::Update { .. } => OperationType::Update,
            Self::Delete { .. } => OperationType::Delete,
            Self::UpdateStatus { .. } => OperationType::UpdateStatus,
        }
    }

    fn target_id(&self) -> Option<&str> {
        match self {
            Self::Create { temp_id, .. } => Some(temp_id.as_str()),
            Self::Update { id, .. } | Self::Delete { id } | Self::UpdateStatus { id, .. } => {
                Some(id.as_str())
            }
        }
    }

    fn retarget(&mut self, from: &str, to: &str) -> bool {
        match self {
            Self::Update { id, .. } | Self::Delete { id } | Self::UpdateStatus { id, .. }
                if *id == from =>
            {
                *id = to.to_string();
                true
            }
            _ => false,
        }
    }
}
