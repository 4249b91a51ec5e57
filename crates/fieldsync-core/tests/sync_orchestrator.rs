mod common;

use common::{notifications, remote_notification};
use fieldsync_core::models::{
    NotificationDraft, NotificationFilters, OperationType, QueuePriority,
};
use fieldsync_core::{Error, SyncCancelHandle, SyncFilter, SyncOrchestrator, SyncStatus};
use pretty_assertions::assert_eq;

/// Offline repository with one queued mark-read per id.
async fn with_queued_reads(
    ids: &[&str],
) -> (common::Notifications, fieldsync_core::ConnectivityFlag) {
    let (repo, connectivity, _store) = notifications(true).await;
    for id in ids {
        repo.gateway().seed(remote_notification(id, id));
    }
    repo.list(&NotificationFilters::default()).await.unwrap();

    connectivity.set_connected(false);
    for id in ids {
        repo.mark_as_read(id).await.unwrap();
    }
    connectivity.set_connected(true);
    (repo, connectivity)
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelling_after_first_item_leaves_the_rest_queued() {
    let (repo, _connectivity) = with_queued_reads(&["n1", "n2", "n3"]).await;
    let queued = repo.get_queued().await.unwrap();

    let cancel = SyncCancelHandle::new();
    repo.gateway().cancel_on_call(cancel.clone());
    let orchestrator = SyncOrchestrator::with_cancel_handle(&repo, cancel);

    let session = orchestrator.sync_all().await.unwrap();

    assert_eq!(session.status, SyncStatus::Cancelled);
    assert_eq!((session.total, session.succeeded, session.failed), (3, 1, 0));
    assert_eq!(repo.get_queued().await.unwrap(), queued[1..].to_vec());
    assert_eq!(repo.gateway().calls("mark_as_read"), 1);
    assert_eq!(orchestrator.status().await, SyncStatus::Cancelled);
}

#[tokio::test(flavor = "multi_thread")]
async fn second_start_while_syncing_is_rejected() {
    let (repo, _connectivity) = with_queued_reads(&["n1", "n2"]).await;
    let (entered, release) = repo.gateway().hold_next_call();
    let orchestrator = SyncOrchestrator::new(&repo);

    let (first, (status, second, cancel_requested)) = tokio::join!(orchestrator.sync_all(), async {
        entered.notified().await;
        let status = orchestrator.status().await;
        let second = orchestrator.sync_all().await;
        let cancel_requested = orchestrator.cancel_sync().await;
        release.notify_one();
        (status, second, cancel_requested)
    });

    assert_eq!(status, SyncStatus::Syncing);
    assert!(matches!(second, Err(Error::SyncInProgress)));
    assert!(cancel_requested);

    // the in-flight item completes; the second one is never attempted
    let first = first.unwrap();
    assert_eq!(first.status, SyncStatus::Cancelled);
    assert_eq!(first.succeeded, 1);
    assert_eq!(repo.get_queued().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn finished_session_is_kept_until_acknowledged() {
    let (repo, _connectivity) = with_queued_reads(&["n1"]).await;
    let orchestrator = SyncOrchestrator::new(&repo);
    assert_eq!(orchestrator.status().await, SyncStatus::Idle);
    assert!(orchestrator.last_session().await.is_none());

    let session = orchestrator.sync_all().await.unwrap();
    assert_eq!(orchestrator.status().await, SyncStatus::Completed);
    assert_eq!(orchestrator.last_session().await, Some(session));

    assert!(orchestrator.acknowledge().await);
    assert_eq!(orchestrator.status().await, SyncStatus::Idle);
    assert!(orchestrator.last_session().await.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn filtered_sync_only_attempts_matching_items() {
    let (repo, connectivity) = with_queued_reads(&["n1"]).await;
    connectivity.set_connected(false);
    repo.create(NotificationDraft::new("draft")).await.unwrap();
    connectivity.set_connected(true);

    let orchestrator = SyncOrchestrator::new(&repo);
    let session = orchestrator
        .sync_by_operation_types([OperationType::Create])
        .await
        .unwrap();

    assert_eq!((session.total, session.succeeded), (1, 1));
    let remaining = repo.get_queued().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].operation_type(), OperationType::MarkRead);
    assert_eq!(repo.gateway().calls("mark_as_read"), 0);

    // the next run implicitly acknowledges the previous one
    let rest = orchestrator.sync_all().await.unwrap();
    assert_eq!(rest.succeeded, 1);
    assert!(repo.get_queued().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn disconnected_orchestrator_refuses_to_start() {
    let (repo, connectivity) = with_queued_reads(&["n1"]).await;
    connectivity.set_connected(false);
    let orchestrator = SyncOrchestrator::new(&repo);

    assert!(matches!(
        orchestrator.sync_all().await,
        Err(Error::NoConnectivity(_))
    ));
    assert_eq!(orchestrator.status().await, SyncStatus::Idle);
    assert_eq!(repo.get_queued().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn priority_scoped_sync_replays_only_matching_repository_writes() {
    let (repo, connectivity, _store) = notifications(false).await;
    repo.create(NotificationDraft::new("routine")).await.unwrap();
    let repo = repo.with_priority(QueuePriority::High);
    repo.create(NotificationDraft::new("urgent")).await.unwrap();

    let priorities = repo
        .get_queued()
        .await
        .unwrap()
        .iter()
        .map(|item| item.priority)
        .collect::<Vec<_>>();
    assert_eq!(priorities, vec![QueuePriority::Normal, QueuePriority::High]);

    connectivity.set_connected(true);
    let orchestrator = SyncOrchestrator::new(&repo);
    let session = orchestrator
        .sync_by_priorities([QueuePriority::High])
        .await
        .unwrap();

    assert_eq!((session.total, session.succeeded), (1, 1));
    let titles = repo
        .gateway()
        .stored()
        .into_iter()
        .map(|notification| notification.title)
        .collect::<Vec<_>>();
    assert_eq!(titles, vec!["urgent"]);
    let left = repo.get_queued().await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].priority, QueuePriority::Normal);
}

#[tokio::test(flavor = "multi_thread")]
async fn prioritized_sync_replays_higher_priority_writes_first() {
    let (repo, connectivity, _store) = notifications(false).await;
    repo.create(NotificationDraft::new("routine")).await.unwrap();
    let repo = repo.with_priority(QueuePriority::Critical);
    repo.create(NotificationDraft::new("urgent")).await.unwrap();

    connectivity.set_connected(true);
    let session = SyncOrchestrator::new(&repo)
        .start_manual_sync(&SyncFilter::all().prioritized())
        .await
        .unwrap();
    assert_eq!((session.total, session.succeeded), (2, 2));

    let mut stored = repo.gateway().stored();
    stored.sort_by_key(|notification| notification.created_at);
    let titles = stored
        .into_iter()
        .map(|notification| notification.title)
        .collect::<Vec<_>>();
    assert_eq!(titles, vec!["urgent", "routine"]);
}
