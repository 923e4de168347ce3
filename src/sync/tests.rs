use crate::cache::{
    EventCache, EventSort, FakeEventCache, Partition, SortDirection, SyncState,
};
use crate::config::SyncConfig;
use crate::s3::FakeStore;
use crate::sync::{Reconciler, SyncError};
use bytes::Bytes;
use chrono::Utc;
use std::time::Duration as StdDuration;

const BASE_PREFIX: &str = "us-prod/submitted/video/";

fn test_reconciler(
    store: &FakeStore,
    cache: &FakeEventCache,
) -> Reconciler<FakeStore, FakeEventCache> {
    Reconciler::new(
        store.clone(),
        cache.clone(),
        BASE_PREFIX.to_string(),
        SyncConfig::default(),
    )
}

async fn seed_partition_objects(store: &FakeStore) {
    let now = Utc::now();
    for key in [
        "us-prod/submitted/video/2024/01/alice_devA_5_CamX_2024-01-02-03-04-05.mp4",
        "us-prod/submitted/video/2024/01/alice_devA_5_CamX_2024-01-02-03-04-05.json",
        "us-prod/submitted/video/2024/01/bob_devB_6_CamY_2024-01-03-10-00-00.jpg",
    ] {
        store
            .fake_add_object(key, Bytes::from_static(b"payload"), Some(now))
            .await;
    }
}

#[tokio::test]
async fn sync_aggregates_files_into_events() {
    let store = FakeStore::new();
    let cache = FakeEventCache::new();
    seed_partition_objects(&store).await;
    let reconciler = test_reconciler(&store, &cache);
    let partition = Partition::new("2024", "01");

    let outcome = reconciler.sync_partition(&partition, false).await.unwrap();

    assert!(!outcome.skipped);
    assert_eq!(outcome.events_synced, 2);
    assert_eq!(outcome.files_synced, 3);
    assert!(outcome.last_synced_at.is_some());

    let events = cache
        .get_events(&partition, EventSort::EventId, SortDirection::Asc)
        .await
        .unwrap();
    assert_eq!(events.len(), 2);

    let event5 = &events[0];
    assert_eq!(event5.event.event_id, "5");
    assert_eq!(event5.event.user_id, "alice");
    assert_eq!(event5.event.device_id, "devA");
    assert_eq!(event5.event.camera_model, "CamX");
    assert_eq!(event5.file_count, 2);
    assert_eq!(event5.file_types.video, 1);
    assert_eq!(event5.file_types.json, 1);
    assert_eq!(event5.file_types.jpg, 0);

    let event6 = &events[1];
    assert_eq!(event6.event.event_id, "6");
    assert_eq!(event6.file_count, 1);
    assert_eq!(event6.file_types.jpg, 1);
    assert_eq!(event6.file_types.video, 0);
}

#[tokio::test]
async fn sync_records_idle_status_with_timestamp() {
    let store = FakeStore::new();
    let cache = FakeEventCache::new();
    seed_partition_objects(&store).await;
    let reconciler = test_reconciler(&store, &cache);
    let partition = Partition::new("2024", "01");

    reconciler.sync_partition(&partition, false).await.unwrap();

    let status = reconciler.get_sync_status(&partition).await.unwrap();
    assert_eq!(status.status, SyncState::Idle);
    assert!(status.last_synced_at.is_some());
}

#[tokio::test]
async fn recent_sync_is_skipped_without_cache_writes() {
    let store = FakeStore::new();
    let cache = FakeEventCache::new();
    seed_partition_objects(&store).await;
    let reconciler = test_reconciler(&store, &cache);
    let partition = Partition::new("2024", "01");

    let first = reconciler.sync_partition(&partition, false).await.unwrap();
    let writes_after_first = cache.fake_write_count();

    let second = reconciler.sync_partition(&partition, false).await.unwrap();

    assert!(second.skipped);
    assert_eq!(second.events_synced, 0);
    assert_eq!(second.files_synced, 0);
    assert_eq!(second.last_synced_at, first.last_synced_at);
    assert_eq!(cache.fake_write_count(), writes_after_first);
}

#[tokio::test]
async fn force_bypasses_the_freshness_window() {
    let store = FakeStore::new();
    let cache = FakeEventCache::new();
    seed_partition_objects(&store).await;
    let reconciler = test_reconciler(&store, &cache);
    let partition = Partition::new("2024", "01");

    reconciler.sync_partition(&partition, false).await.unwrap();
    let outcome = reconciler.sync_partition(&partition, true).await.unwrap();

    assert!(!outcome.skipped);
    assert_eq!(outcome.events_synced, 2);
}

#[tokio::test]
async fn forced_resync_of_unchanged_listing_is_idempotent() {
    let store = FakeStore::new();
    let cache = FakeEventCache::new();
    seed_partition_objects(&store).await;
    let reconciler = test_reconciler(&store, &cache);
    let partition = Partition::new("2024", "01");

    reconciler.sync_partition(&partition, true).await.unwrap();
    let events_before = cache.fake_events();
    let files_before = cache.fake_files();

    reconciler.sync_partition(&partition, true).await.unwrap();

    assert_eq!(cache.fake_events(), events_before);
    assert_eq!(cache.fake_files(), files_before);
}

#[tokio::test]
async fn download_state_survives_resync() {
    let store = FakeStore::new();
    let cache = FakeEventCache::new();
    seed_partition_objects(&store).await;
    let reconciler = test_reconciler(&store, &cache);
    let partition = Partition::new("2024", "01");
    let key = "us-prod/submitted/video/2024/01/alice_devA_5_CamX_2024-01-02-03-04-05.mp4";

    reconciler.sync_partition(&partition, true).await.unwrap();
    cache.set_file_downloaded(key, "/local/video.mp4").await.unwrap();

    reconciler.sync_partition(&partition, true).await.unwrap();

    let files = cache.get_event_files("5").await.unwrap();
    let video = files.iter().find(|f| f.key == key).unwrap();
    assert!(video.downloaded);
    assert_eq!(video.local_path.as_deref(), Some("/local/video.mp4"));
}

#[tokio::test]
async fn listing_failure_sets_error_status_and_propagates() {
    let store = FakeStore::new();
    let cache = FakeEventCache::new();
    seed_partition_objects(&store).await;
    store
        .fake_fail_listing("us-prod/submitted/video/2024/01/")
        .await;
    let reconciler = test_reconciler(&store, &cache);
    let partition = Partition::new("2024", "01");

    let result = reconciler.sync_partition(&partition, true).await;
    assert!(matches!(result, Err(SyncError::Listing(_))));

    let status = reconciler.get_sync_status(&partition).await.unwrap();
    assert_eq!(status.status, SyncState::Error);
    assert!(status.last_synced_at.is_none());
}

#[tokio::test]
async fn paginated_listing_is_fully_consumed() {
    let store = FakeStore::with_page_size(1);
    let cache = FakeEventCache::new();
    seed_partition_objects(&store).await;
    let reconciler = test_reconciler(&store, &cache);
    let partition = Partition::new("2024", "01");

    let outcome = reconciler.sync_partition(&partition, false).await.unwrap();

    assert_eq!(outcome.files_synced, 3);
    assert_eq!(outcome.events_synced, 2);
}

#[tokio::test]
async fn empty_partition_syncs_to_nothing() {
    let store = FakeStore::new();
    let cache = FakeEventCache::new();
    let reconciler = test_reconciler(&store, &cache);
    let partition = Partition::new("2030", "12");

    let outcome = reconciler.sync_partition(&partition, false).await.unwrap();

    assert!(!outcome.skipped);
    assert_eq!(outcome.events_synced, 0);
    assert_eq!(outcome.files_synced, 0);

    let status = reconciler.get_sync_status(&partition).await.unwrap();
    assert_eq!(status.status, SyncState::Idle);
}

#[tokio::test]
async fn empty_partition_identifiers_are_rejected() {
    let store = FakeStore::new();
    let cache = FakeEventCache::new();
    let reconciler = test_reconciler(&store, &cache);

    let result = reconciler
        .sync_partition(&Partition::new("", "01"), false)
        .await;
    assert!(matches!(result, Err(SyncError::InvalidPartition(_))));

    let result = reconciler
        .sync_partition(&Partition::new("2024", ""), false)
        .await;
    assert!(matches!(result, Err(SyncError::InvalidPartition(_))));

    // Nothing was written for the bogus partitions
    assert_eq!(cache.fake_write_count(), 0);
}

#[tokio::test]
async fn combined_format_filenames_group_by_leading_digits() {
    let store = FakeStore::new();
    let cache = FakeEventCache::new();
    store
        .fake_add_object(
            "us-prod/submitted/video/2024/01/carol_devC_123CameraX_2024-01-02-03-04-05.mp4",
            Bytes::from_static(b"payload"),
            Some(Utc::now()),
        )
        .await;
    let reconciler = test_reconciler(&store, &cache);
    let partition = Partition::new("2024", "01");

    reconciler.sync_partition(&partition, false).await.unwrap();

    let events = cache
        .get_events(&partition, EventSort::Timestamp, SortDirection::Desc)
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event.event_id, "123");
    assert_eq!(events[0].event.camera_model, "CameraX");
    assert_eq!(events[0].file_types.video, 1);
}

#[tokio::test]
async fn discover_partitions_lists_years_and_months() {
    let store = FakeStore::new();
    let cache = FakeEventCache::new();
    seed_partition_objects(&store).await;
    store
        .fake_add_object(
            "us-prod/submitted/video/2025/03/dan_devD_9_CamZ_2025-03-01-00-00-00.mp4",
            Bytes::from_static(b"payload"),
            Some(Utc::now()),
        )
        .await;
    let reconciler = test_reconciler(&store, &cache);

    let partitions = reconciler.discover_partitions().await.unwrap();

    assert_eq!(
        partitions,
        vec![Partition::new("2024", "01"), Partition::new("2025", "03")]
    );
}

#[tokio::test]
async fn sync_stale_skips_recently_synced_partitions() {
    let store = FakeStore::new();
    let cache = FakeEventCache::new();
    seed_partition_objects(&store).await;
    store
        .fake_add_object(
            "us-prod/submitted/video/2025/03/dan_devD_9_CamZ_2025-03-01-00-00-00.mp4",
            Bytes::from_static(b"payload"),
            Some(Utc::now()),
        )
        .await;
    let reconciler = test_reconciler(&store, &cache);

    // 2024/01 was just synced; only 2025/03 is stale
    reconciler
        .sync_partition(&Partition::new("2024", "01"), false)
        .await
        .unwrap();

    let outcome = reconciler.sync_stale(false).await.unwrap();

    assert_eq!(outcome.partitions_synced, 1);
    assert_eq!(outcome.partitions_skipped, 1);
    assert_eq!(outcome.events_synced, 1);
    assert_eq!(outcome.files_synced, 1);
}

#[tokio::test]
async fn sync_stale_with_force_resyncs_everything() {
    let store = FakeStore::new();
    let cache = FakeEventCache::new();
    seed_partition_objects(&store).await;
    let reconciler = test_reconciler(&store, &cache);

    reconciler
        .sync_partition(&Partition::new("2024", "01"), false)
        .await
        .unwrap();

    let outcome = reconciler.sync_stale(true).await.unwrap();

    assert_eq!(outcome.partitions_synced, 1);
    assert_eq!(outcome.partitions_skipped, 0);
}

#[tokio::test]
async fn watch_returns_once_status_is_terminal() {
    let store = FakeStore::new();
    let cache = FakeEventCache::new();
    seed_partition_objects(&store).await;
    let reconciler = test_reconciler(&store, &cache);
    let partition = Partition::new("2024", "01");

    reconciler.sync_partition(&partition, false).await.unwrap();

    let status = reconciler
        .watch_until_terminal(&partition, StdDuration::from_millis(10))
        .await
        .unwrap();
    assert_eq!(status.status, SyncState::Idle);
}
