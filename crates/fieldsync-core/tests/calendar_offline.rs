mod common;

use common::{at, calendar, range, remote_event, Failure};
use fieldsync_core::models::{
    EventDraft, EventFilters, EventPatch, EventStatus, ExportFormat, OperationType,
};
use fieldsync_core::util::is_temporary_id;
use fieldsync_core::Error;
use pretty_assertions::assert_eq;

/// Seed the remote with `(id, start, end)` events and pull them into the cache.
async fn seeded(
    events: &[(&str, (u32, u32), (u32, u32))],
) -> (common::Calendar, fieldsync_core::ConnectivityFlag) {
    let (repo, connectivity, _store) = calendar(true).await;
    for (id, (start_h, start_m), (end_h, end_m)) in events {
        repo.gateway().seed(remote_event(
            id,
            &format!("event {id}"),
            at(*start_h, *start_m),
            at(*end_h, *end_m),
        ));
    }
    repo.list(&EventFilters::default()).await.unwrap();
    (repo, connectivity)
}

#[tokio::test(flavor = "multi_thread")]
async fn touching_ranges_do_not_conflict_online_or_offline() {
    let (repo, connectivity) = seeded(&[("e1", (10, 0), (11, 0))]).await;
    let candidate = range(at(11, 0), at(12, 0));

    assert!(repo.check_conflicts(&candidate, None).await.unwrap().is_empty());
    assert_eq!(repo.gateway().calls("check_conflicts"), 1);

    connectivity.set_connected(false);
    assert!(repo.check_conflicts(&candidate, None).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn intersecting_ranges_conflict_online_or_offline() {
    let (repo, connectivity) = seeded(&[("e1", (10, 0), (11, 30))]).await;
    let candidate = range(at(11, 0), at(12, 0));

    let online = repo.check_conflicts(&candidate, None).await.unwrap();
    assert_eq!(online.len(), 1);
    assert_eq!(online[0].id, "e1");

    connectivity.set_connected(false);
    let offline = repo.check_conflicts(&candidate, None).await.unwrap();
    assert_eq!(offline, online);

    assert!(repo
        .check_conflicts(&candidate, Some("e1"))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn conflict_check_falls_back_to_cache_when_remote_fails() {
    let (repo, _connectivity) = seeded(&[("e1", (10, 0), (11, 30))]).await;
    repo.gateway().fail_with(Failure::Service);

    let conflicts = repo
        .check_conflicts(&range(at(11, 0), at(12, 0)), None)
        .await
        .unwrap();
    assert_eq!(conflicts.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn create_reports_conflicts_without_blocking_the_write() {
    let (repo, connectivity) = seeded(&[("e1", (10, 0), (11, 0))]).await;
    connectivity.set_connected(false);

    let scheduled = repo
        .create(EventDraft::new("overlap", at(10, 30), Some(at(11, 30))))
        .await
        .unwrap();

    assert!(is_temporary_id(&scheduled.event.id));
    assert_eq!(
        scheduled
            .conflicts
            .iter()
            .map(|event| event.id.as_str())
            .collect::<Vec<_>>(),
        vec!["e1"]
    );
    assert_eq!(repo.get_queued().await.unwrap().len(), 1);

    // the queued event itself now shows up as a conflict candidate
    let offline = repo
        .check_conflicts(&range(at(11, 0), at(12, 0)), None)
        .await
        .unwrap();
    assert_eq!(offline.len(), 1);
    assert_eq!(offline[0].id, scheduled.event.id);
}

#[tokio::test(flavor = "multi_thread")]
async fn conflicts_are_local_while_writes_are_pending() {
    let (repo, connectivity) = seeded(&[("e1", (9, 0), (10, 0))]).await;
    connectivity.set_connected(false);
    repo.create(EventDraft::new("pending", at(13, 0), None))
        .await
        .unwrap();
    connectivity.set_connected(true);

    let conflicts = repo
        .check_conflicts(&range(at(13, 30), at(14, 0)), None)
        .await
        .unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(repo.gateway().calls("check_conflicts"), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_update_and_status_change_replay_in_order() {
    let (repo, connectivity) = seeded(&[("e1", (10, 0), (11, 0))]).await;
    connectivity.set_connected(false);

    let moved = repo
        .update(
            "e1",
            EventPatch {
                start: Some(at(14, 0)),
                end: Some(at(15, 0)),
                ..EventPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.event.start, at(14, 0));
    assert!(moved.conflicts.is_empty());

    let cancelled = repo.update_status("e1", EventStatus::Cancelled).await.unwrap();
    assert_eq!(cancelled.status, EventStatus::Cancelled);

    let types = repo
        .get_queued()
        .await
        .unwrap()
        .iter()
        .map(|item| item.operation_type())
        .collect::<Vec<_>>();
    assert_eq!(types, vec![OperationType::Update, OperationType::UpdateStatus]);

    connectivity.set_connected(true);
    let session = repo.sync().await.unwrap();
    assert_eq!((session.succeeded, session.failed), (2, 0));

    let remote = &repo.gateway().stored()[0];
    assert_eq!(remote.start, at(14, 0));
    assert_eq!(remote.status, EventStatus::Cancelled);
}

#[tokio::test(flavor = "multi_thread")]
async fn update_rejects_inverted_ranges() {
    let (repo, connectivity) = seeded(&[("e1", (10, 0), (11, 0))]).await;

    let inverted = EventPatch {
        start: Some(at(12, 0)),
        end: Some(at(11, 0)),
        ..EventPatch::default()
    };
    assert!(matches!(
        repo.update("e1", inverted).await,
        Err(Error::InvalidInput(_))
    ));

    // start moved past the cached end
    connectivity.set_connected(false);
    let past_end = EventPatch {
        start: Some(at(12, 0)),
        ..EventPatch::default()
    };
    assert!(matches!(
        repo.update("e1", past_end).await,
        Err(Error::InvalidInput(_))
    ));
    assert!(repo.get_queued().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_import_queues_one_create_per_draft() {
    let (repo, connectivity, _store) = calendar(false).await;

    let imported = repo
        .import_events(vec![
            EventDraft::new("Orientation", at(9, 0), None),
            EventDraft::new("Elections", at(15, 0), Some(at(17, 0))),
        ])
        .await
        .unwrap();

    assert_eq!(imported.len(), 2);
    assert!(imported.iter().all(|event| is_temporary_id(&event.id)));
    assert_eq!(repo.get_queued().await.unwrap().len(), 2);

    connectivity.set_connected(true);
    let session = repo.sync().await.unwrap();
    assert_eq!(session.succeeded, 2);
    assert_eq!(repo.gateway().stored().len(), 2);
    assert_eq!(repo.gateway().calls("import_events"), 0);
    assert_eq!(repo.gateway().calls("create_event"), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn connected_import_uses_bulk_endpoint() {
    let (repo, _connectivity, _store) = calendar(true).await;

    let imported = repo
        .import_events(vec![EventDraft::new("Orientation", at(9, 0), None)])
        .await
        .unwrap();

    assert_eq!(imported[0].id, "e-1");
    assert_eq!(repo.gateway().calls("import_events"), 1);
    assert!(repo.get_queued().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn calendar_data_is_grouped_from_cache_offline() {
    let (repo, connectivity) =
        seeded(&[("e2", (14, 0), (15, 0)), ("e1", (9, 0), (10, 0))]).await;
    connectivity.set_connected(false);

    let data = repo
        .get_calendar_data(&range(at(0, 0), at(23, 59)))
        .await
        .unwrap();

    assert_eq!(data.days.len(), 1);
    assert_eq!(
        data.days[0]
            .events
            .iter()
            .map(|event| event.id.as_str())
            .collect::<Vec<_>>(),
        vec!["e1", "e2"]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn export_requires_a_connection() {
    let (repo, connectivity, _store) = calendar(false).await;
    let day = range(at(0, 0), at(23, 59));

    assert!(matches!(
        repo.export_events(&day, ExportFormat::Ical).await,
        Err(Error::NoConnectivity(_))
    ));
    assert_eq!(repo.gateway().calls("export_events"), 0);

    connectivity.set_connected(true);
    let ical = repo.export_events(&day, ExportFormat::Ical).await.unwrap();
    assert!(ical.starts_with("BEGIN:VCALENDAR"));

    repo.gateway().fail_with(Failure::Transport);
    assert!(matches!(
        repo.export_events(&day, ExportFormat::Json).await,
        Err(Error::Transport(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_delete_hides_event_until_replayed() {
    let (repo, connectivity) = seeded(&[("e1", (10, 0), (11, 0))]).await;
    connectivity.set_connected(false);

    repo.delete("e1").await.unwrap();
    assert!(matches!(
        repo.get_by_id("e1").await,
        Err(Error::NotFoundInCache(_))
    ));

    // a stale remote listing does not resurrect it
    connectivity.set_connected(true);
    assert!(repo
        .list(&EventFilters::default())
        .await
        .unwrap()
        .is_empty());

    repo.sync().await.unwrap();
    assert!(repo.gateway().stored().is_empty());
}
