use std::future::Future;

use fieldsync_core::models::{OperationType, QueuePriority};
use fieldsync_core::sync::ReplayTarget;
use fieldsync_core::{SyncCancelHandle, SyncFilter, SyncOrchestrator, SyncSession, SyncStatus};
use serde::Serialize;

use crate::cli::Family;
use crate::commands::common::{print_json, CommandContext};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct FamilySession {
    pub family: &'static str,
    #[serde(flatten)]
    pub session: SyncSession,
}

pub fn build_filter(
    operations: Vec<OperationType>,
    priorities: Vec<QueuePriority>,
    prioritized: bool,
) -> SyncFilter {
    SyncFilter {
        operation_types: (!operations.is_empty()).then_some(operations),
        priorities: (!priorities.is_empty()).then_some(priorities),
        prioritized,
    }
}

/// Replay each selected family in turn. Ctrl-C stops after the in-flight item.
pub async fn run_sync(
    family: Option<Family>,
    filter: &SyncFilter,
    as_json: bool,
    context: &CommandContext,
) -> Result<(), CliError> {
    let engine = context.engine().await?;
    let cancel = SyncCancelHandle::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Cancelling sync after the in-flight item");
                cancel.cancel();
            }
        }
    });

    let result = sync_families(Family::selected(family), &cancel, |family| {
        let cancel = cancel.clone();
        let engine = &engine;
        async move {
            match family {
                Family::Notifications => {
                    sync_family(engine.notifications(), &cancel, filter).await
                }
                Family::Calendar => sync_family(engine.calendar(), &cancel, filter).await,
            }
        }
    })
    .await;
    watcher.abort();
    let sessions = result?;

    if as_json {
        return print_json(&sessions);
    }
    for line in format_session_lines(&sessions) {
        println!("{line}");
    }
    Ok(())
}

/// Run `run` for each family in order. Stops once a run is cancelled, and
/// does not start another family after Ctrl-C.
pub async fn sync_families<F, Fut>(
    families: Vec<Family>,
    cancel: &SyncCancelHandle,
    mut run: F,
) -> Result<Vec<FamilySession>, CliError>
where
    F: FnMut(Family) -> Fut,
    Fut: Future<Output = Result<SyncSession, CliError>>,
{
    let mut sessions = Vec::new();
    for family in families {
        if cancel.is_cancelled() {
            tracing::info!("Sync cancelled before {} started", family_name(family));
            break;
        }

        let session = run(family).await?;
        let cancelled = session.status == SyncStatus::Cancelled;
        sessions.push(FamilySession {
            family: family_name(family),
            session,
        });
        if cancelled {
            break;
        }
    }
    Ok(sessions)
}

async fn sync_family<T: ReplayTarget>(
    target: T,
    cancel: &SyncCancelHandle,
    filter: &SyncFilter,
) -> Result<SyncSession, CliError> {
    let orchestrator = SyncOrchestrator::with_cancel_handle(target, cancel.clone());
    Ok(orchestrator.start_manual_sync(filter).await?)
}

const fn family_name(family: Family) -> &'static str {
    match family {
        Family::Notifications => "notifications",
        Family::Calendar => "calendar",
    }
}

pub fn format_session_lines(sessions: &[FamilySession]) -> Vec<String> {
    let mut lines = Vec::new();
    for FamilySession { family, session } in sessions {
        if session.total == 0 {
            lines.push(format!("{family}: nothing to sync"));
            continue;
        }
        lines.push(format!(
            "{family}: {} of {} succeeded, {} failed ({})",
            session.succeeded, session.total, session.failed, session.status
        ));
        let unattempted = session.unattempted();
        if unattempted > 0 {
            lines.push(format!("  {unattempted} item(s) left queued"));
        }
        for failure in &session.failures {
            lines.push(format!(
                "  {} {}: {}",
                failure.queue_id, failure.operation_type, failure.message
            ));
        }
    }
    lines
}
