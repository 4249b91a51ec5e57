//! Queue replay and the manual sync state machine.
//!
//! Items are replayed one at a time in queue order: a queued update may target
//! an entity whose create is earlier in the same queue. A failed item stays
//! queued and the run moves on to the next one.

mod filter;
mod orchestrator;
mod session;

pub use filter::SyncFilter;
pub use orchestrator::SyncOrchestrator;
pub use session::{ItemFailure, SyncCancelHandle, SyncSession, SyncStatus};

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::{QueueItem, QueuedOperation};
use crate::services::MutationQueue;

/// A repository whose mutation queue can be replayed against its remote.
#[allow(async_fn_in_trait)]
pub trait ReplayTarget {
    type Op: QueuedOperation;

    fn queue(&self) -> &MutationQueue<Self::Op>;

    fn is_connected(&self) -> bool;

    /// Send one queued item to the remote and record the confirmed result
    /// locally.
    ///
    /// Implementations should drop the item from the queue in the same
    /// transaction that records the result. Any item still queued after a
    /// successful replay is dequeued by the caller.
    async fn replay(&self, item: &QueueItem<Self::Op>) -> Result<()>;
}

impl<T: ReplayTarget> ReplayTarget for Arc<T> {
    type Op = T::Op;

    fn queue(&self) -> &MutationQueue<T::Op> {
        (**self).queue()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    async fn replay(&self, item: &QueueItem<T::Op>) -> Result<()> {
        (**self).replay(item).await
    }
}

impl<T: ReplayTarget> ReplayTarget for &T {
    type Op = T::Op;

    fn queue(&self) -> &MutationQueue<T::Op> {
        (**self).queue()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    async fn replay(&self, item: &QueueItem<T::Op>) -> Result<()> {
        (**self).replay(item).await
    }
}

/// Replay the queued items selected by `filter`, in order.
///
/// Cancellation is checked before each item; an item in flight always
/// completes. Per-item failures are recorded in the session and never abort
/// the run.
pub async fn replay_queue<T: ReplayTarget>(
    target: &T,
    filter: &SyncFilter,
    cancel: Option<&SyncCancelHandle>,
) -> Result<SyncSession> {
    if !target.is_connected() {
        return Err(Error::NoConnectivity("sync"));
    }

    let family = <T::Op as QueuedOperation>::FAMILY;
    let selected = filter.select(target.queue().list_all().await?);
    let mut session = SyncSession::start(selected.len());
    tracing::info!(%family, "Starting sync of {} queued item(s)", selected.len());

    for candidate in selected {
        if cancel.is_some_and(SyncCancelHandle::is_cancelled) {
            session.finish(SyncStatus::Cancelled);
            tracing::info!(
                %family,
                "Sync cancelled: {} succeeded, {} failed, {} left queued",
                session.succeeded,
                session.failed,
                session.unattempted()
            );
            return Ok(session);
        }

        // An earlier replay in this run may have retargeted or removed it.
        let Some(item) = target.queue().get(&candidate.id).await? else {
            session.record_skipped();
            continue;
        };

        let outcome = match target.replay(&item).await {
            // Usually already gone; the row is removed when the result is recorded.
            Ok(()) => target.queue().dequeue(&item.id).await.map(|_| ()),
            Err(error) => Err(error),
        };
        match outcome {
            Ok(()) => session.record_success(),
            Err(error) => {
                tracing::warn!(
                    %family,
                    queue_id = %item.id,
                    operation = %item.operation_type(),
                    "Replay failed, item stays queued: {error}"
                );
                session.record_failure(item.id, item.operation_type(), error.to_string());
            }
        }
    }

    session.finish(SyncStatus::Completed);
    tracing::info!(
        %family,
        "Sync completed: {} succeeded, {} failed",
        session.succeeded,
        session.failed
    );
    Ok(session)
}
