use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{OperationType, QueueId};

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Completed,
    Cancelled,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued item that failed during a run and is still queued
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub queue_id: QueueId,
    pub operation_type: OperationType,
    pub message: String,
}

/// Outcome of one sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSession {
    /// Items selected for this run
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub status: SyncStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failures: Vec<ItemFailure>,
}

impl SyncSession {
    pub fn start(total: usize) -> Self {
        Self {
            total,
            succeeded: 0,
            failed: 0,
            status: SyncStatus::Syncing,
            started_at: Utc::now(),
            finished_at: None,
            failures: Vec::new(),
        }
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_failure(
        &mut self,
        queue_id: QueueId,
        operation_type: OperationType,
        message: impl Into<String>,
    ) {
        self.failed += 1;
        self.failures.push(ItemFailure {
            queue_id,
            operation_type,
            message: message.into(),
        });
    }

    /// Drop an item that left the queue before it was attempted.
    pub fn record_skipped(&mut self) {
        self.total = self.total.saturating_sub(1);
    }

    /// Items selected but never attempted
    pub const fn unattempted(&self) -> usize {
        self.total
            .saturating_sub(self.succeeded)
            .saturating_sub(self.failed)
    }

    pub fn finish(&mut self, status: SyncStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }
}

/// Cooperative cancellation signal, checked between items.
#[derive(Debug, Clone, Default)]
pub struct SyncCancelHandle(Arc<AtomicBool>);

impl SyncCancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
