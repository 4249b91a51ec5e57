use tokio::sync::Mutex;

use super::{replay_queue, ReplayTarget, SyncCancelHandle, SyncFilter, SyncSession, SyncStatus};
use crate::error::{Error, Result};
use crate::models::{OperationType, QueuePriority};

#[derive(Debug, Default)]
struct OrchestratorState {
    status: SyncStatus,
    last_session: Option<SyncSession>,
}

/// Manual sync state machine for one entity family.
///
/// `Idle -> Syncing -> Completed | Cancelled -> Idle`. A finished session
/// stays visible until it is acknowledged or a new run starts.
pub struct SyncOrchestrator<T> {
    target: T,
    state: Mutex<OrchestratorState>,
    cancel: SyncCancelHandle,
}

impl<T: ReplayTarget> SyncOrchestrator<T> {
    pub fn new(target: T) -> Self {
        Self::with_cancel_handle(target, SyncCancelHandle::new())
    }

    /// Use an externally owned cancellation handle.
    pub fn with_cancel_handle(target: T, cancel: SyncCancelHandle) -> Self {
        Self {
            target,
            state: Mutex::new(OrchestratorState::default()),
            cancel,
        }
    }

    pub const fn target(&self) -> &T {
        &self.target
    }

    pub fn cancel_handle(&self) -> SyncCancelHandle {
        self.cancel.clone()
    }

    pub async fn status(&self) -> SyncStatus {
        self.state.lock().await.status
    }

    pub async fn last_session(&self) -> Option<SyncSession> {
        self.state.lock().await.last_session.clone()
    }

    /// Return to `Idle` after a finished run. Returns whether anything changed.
    pub async fn acknowledge(&self) -> bool {
        let mut state = self.state.lock().await;
        match state.status {
            SyncStatus::Completed | SyncStatus::Cancelled => {
                state.status = SyncStatus::Idle;
                true
            }
            SyncStatus::Idle | SyncStatus::Syncing => false,
        }
    }

    /// Replay the queued items selected by `filter`.
    pub async fn start_manual_sync(&self, filter: &SyncFilter) -> Result<SyncSession> {
        {
            let mut state = self.state.lock().await;
            match state.status {
                SyncStatus::Syncing => return Err(Error::SyncInProgress),
                SyncStatus::Completed | SyncStatus::Cancelled => {
                    tracing::debug!("Acknowledging previous {} sync run", state.status);
                    state.status = SyncStatus::Idle;
                }
                SyncStatus::Idle => {}
            }
            if !self.target.is_connected() {
                return Err(Error::NoConnectivity("sync"));
            }
            state.status = SyncStatus::Syncing;
            self.cancel.reset();
        }

        let result = replay_queue(&self.target, filter, Some(&self.cancel)).await;

        let mut state = self.state.lock().await;
        match result {
            Ok(session) => {
                state.status = session.status;
                state.last_session = Some(session.clone());
                Ok(session)
            }
            Err(error) => {
                state.status = SyncStatus::Idle;
                Err(error)
            }
        }
    }

    pub async fn sync_all(&self) -> Result<SyncSession> {
        self.start_manual_sync(&SyncFilter::all()).await
    }

    pub async fn sync_by_operation_types(
        &self,
        operation_types: impl Into<Vec<OperationType>>,
    ) -> Result<SyncSession> {
        self.start_manual_sync(&SyncFilter::by_operation_types(operation_types))
            .await
    }

    pub async fn sync_by_priorities(
        &self,
        priorities: impl Into<Vec<QueuePriority>>,
    ) -> Result<SyncSession> {
        self.start_manual_sync(&SyncFilter::by_priorities(priorities))
            .await
    }

    /// Request cancellation of the current run. Returns `false` when no run
    /// is in progress.
    pub async fn cancel_sync(&self) -> bool {
        let state = self.state.lock().await;
        if state.status != SyncStatus::Syncing {
            return false;
        }
        self.cancel.cancel();
        tracing::info!("Sync cancellation requested");
        true
    }
}
