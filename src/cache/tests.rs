use crate::cache::models::{
    EventRecord, EventSort, EventStatus, FileRecord, Partition, SortDirection, SyncState,
};
use crate::cache::{CacheError, EventCache, FakeEventCache, SqliteEventCache};
use crate::metadata::FileType;
use chrono::{Duration, TimeZone, Utc};

// Type alias to simplify the complex type for cache factory functions
type CacheFactory =
    Box<dyn Fn() -> futures::future::BoxFuture<'static, Box<dyn EventCache + Send + Sync>>>;

/// Each test runs against both the fake and an in-memory SQLite cache
fn get_test_caches() -> Vec<CacheFactory> {
    vec![
        Box::new(|| {
            Box::pin(async { Box::new(FakeEventCache::new()) as Box<dyn EventCache + Send + Sync> })
        }),
        Box::new(|| {
            Box::pin(async {
                let cache = SqliteEventCache::new(":memory:")
                    .expect("Failed to create in-memory SQLite cache");
                Box::new(cache) as Box<dyn EventCache + Send + Sync>
            })
        }),
    ]
}

fn test_partition() -> Partition {
    Partition::new("2024", "01")
}

fn test_prefix() -> String {
    test_partition().prefix("us-prod/submitted/video/")
}

fn test_event(event_id: &str) -> EventRecord {
    EventRecord {
        event_id: event_id.to_string(),
        user_id: "user1".to_string(),
        device_id: "devA".to_string(),
        camera_model: "CamX".to_string(),
        timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        source_prefix: test_prefix(),
        status: EventStatus::Available,
    }
}

fn test_file(key: &str, event_id: &str, file_type: FileType) -> FileRecord {
    FileRecord {
        key: key.to_string(),
        event_id: event_id.to_string(),
        file_type,
        size_bytes: 1024,
        last_modified: Some(Utc.with_ymd_and_hms(2024, 1, 2, 4, 0, 0).unwrap()),
        downloaded: false,
        local_path: None,
    }
}

#[tokio::test]
async fn apply_sync_batch_creates_events_and_files() {
    for factory in get_test_caches() {
        let cache = factory().await;

        cache
            .apply_sync_batch(
                vec![test_event("5")],
                vec![
                    test_file("p/a_d_5_C.mp4", "5", FileType::Video),
                    test_file("p/a_d_5_C.json", "5", FileType::Json),
                ],
            )
            .await
            .unwrap();

        let events = cache
            .get_events(&test_partition(), EventSort::Timestamp, SortDirection::Desc)
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.event_id, "5");
        assert_eq!(events[0].file_count, 2);
        assert_eq!(events[0].file_types.video, 1);
        assert_eq!(events[0].file_types.json, 1);

        let files = cache.get_event_files("5").await.unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| !f.downloaded));
    }
}

#[tokio::test]
async fn file_upsert_preserves_download_state() {
    for factory in get_test_caches() {
        let cache = factory().await;
        let key = "p/a_d_5_C.mp4";

        cache
            .apply_sync_batch(
                vec![test_event("5")],
                vec![test_file(key, "5", FileType::Video)],
            )
            .await
            .unwrap();

        cache.set_file_downloaded(key, "/x").await.unwrap();

        // Re-sync with fresh listing data: size changes, download state must not
        let mut updated = test_file(key, "5", FileType::Video);
        updated.size_bytes = 4096;
        cache
            .apply_sync_batch(vec![test_event("5")], vec![updated])
            .await
            .unwrap();

        let files = cache.get_event_files("5").await.unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].downloaded);
        assert_eq!(files[0].local_path.as_deref(), Some("/x"));
        assert_eq!(files[0].size_bytes, 4096);
    }
}

#[tokio::test]
async fn event_upsert_keeps_identity_fields_from_first_insert() {
    for factory in get_test_caches() {
        let cache = factory().await;

        cache
            .apply_sync_batch(vec![test_event("5")], vec![])
            .await
            .unwrap();

        let mut later = test_event("5");
        later.user_id = "someone-else".to_string();
        later.camera_model = "OtherCam".to_string();
        cache.apply_sync_batch(vec![later], vec![]).await.unwrap();

        let events = cache
            .get_events(&test_partition(), EventSort::Timestamp, SortDirection::Desc)
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.user_id, "user1");
        assert_eq!(events[0].event.camera_model, "CamX");
    }
}

#[tokio::test]
async fn event_upsert_overwrites_status() {
    for factory in get_test_caches() {
        let cache = factory().await;

        cache
            .apply_sync_batch(vec![test_event("5")], vec![])
            .await
            .unwrap();
        cache.mark_event_downloaded("5").await.unwrap();

        // A plain re-sync resets the status to available
        cache
            .apply_sync_batch(vec![test_event("5")], vec![])
            .await
            .unwrap();

        let events = cache
            .get_events(&test_partition(), EventSort::Timestamp, SortDirection::Desc)
            .await
            .unwrap();
        assert_eq!(events[0].event.status, EventStatus::Available);
    }
}

#[tokio::test]
async fn get_events_filters_by_partition() {
    for factory in get_test_caches() {
        let cache = factory().await;

        let mut other = test_event("9");
        other.source_prefix = Partition::new("2024", "02").prefix("us-prod/submitted/video/");
        cache
            .apply_sync_batch(vec![test_event("5"), other], vec![])
            .await
            .unwrap();

        let events = cache
            .get_events(&test_partition(), EventSort::Timestamp, SortDirection::Desc)
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.event_id, "5");
    }
}

#[tokio::test]
async fn get_events_sorts_by_requested_column() {
    for factory in get_test_caches() {
        let cache = factory().await;

        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut e1 = test_event("1");
        e1.timestamp = base + Duration::hours(2);
        let mut e2 = test_event("2");
        e2.timestamp = base;
        let mut e3 = test_event("3");
        e3.timestamp = base + Duration::hours(1);

        cache
            .apply_sync_batch(
                vec![e1, e2, e3],
                vec![
                    test_file("p/f1.mp4", "1", FileType::Video),
                    test_file("p/f2a.mp4", "2", FileType::Video),
                    test_file("p/f2b.json", "2", FileType::Json),
                ],
            )
            .await
            .unwrap();

        let by_time_desc = cache
            .get_events(&test_partition(), EventSort::Timestamp, SortDirection::Desc)
            .await
            .unwrap();
        let ids: Vec<&str> = by_time_desc
            .iter()
            .map(|e| e.event.event_id.as_str())
            .collect();
        assert_eq!(ids, vec!["1", "3", "2"]);

        let by_count_desc = cache
            .get_events(&test_partition(), EventSort::FileCount, SortDirection::Desc)
            .await
            .unwrap();
        assert_eq!(by_count_desc[0].event.event_id, "2");
        assert_eq!(by_count_desc[0].file_count, 2);

        let by_id_asc = cache
            .get_events(&test_partition(), EventSort::EventId, SortDirection::Asc)
            .await
            .unwrap();
        let ids: Vec<&str> = by_id_asc
            .iter()
            .map(|e| e.event.event_id.as_str())
            .collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }
}

#[tokio::test]
async fn sync_status_defaults_to_idle_when_unknown() {
    for factory in get_test_caches() {
        let cache = factory().await;

        let status = cache.get_sync_status(&test_partition()).await.unwrap();
        assert_eq!(status.status, SyncState::Idle);
        assert!(status.last_synced_at.is_none());
    }
}

#[tokio::test]
async fn status_only_update_preserves_last_synced_at() {
    for factory in get_test_caches() {
        let cache = factory().await;
        let partition = test_partition();
        let synced_at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 0, 0).unwrap();

        cache
            .update_sync_status(&partition, SyncState::Idle, Some(synced_at))
            .await
            .unwrap();
        cache
            .update_sync_status(&partition, SyncState::Syncing, None)
            .await
            .unwrap();

        let status = cache.get_sync_status(&partition).await.unwrap();
        assert_eq!(status.status, SyncState::Syncing);
        assert_eq!(status.last_synced_at, Some(synced_at));
    }
}

#[tokio::test]
async fn set_file_downloaded_fails_for_unknown_key() {
    for factory in get_test_caches() {
        let cache = factory().await;

        let result = cache.set_file_downloaded("missing", "/x").await;
        assert!(matches!(result, Err(CacheError::FileNotFound(ref k)) if k == "missing"));
    }
}

#[tokio::test]
async fn mark_event_downloaded_fails_for_unknown_event() {
    for factory in get_test_caches() {
        let cache = factory().await;

        let result = cache.mark_event_downloaded("missing").await;
        assert!(matches!(result, Err(CacheError::EventNotFound(ref id)) if id == "missing"));
    }
}

#[tokio::test]
async fn mark_event_downloaded_updates_status() {
    for factory in get_test_caches() {
        let cache = factory().await;

        cache
            .apply_sync_batch(vec![test_event("5")], vec![])
            .await
            .unwrap();
        cache.mark_event_downloaded("5").await.unwrap();

        let events = cache
            .get_events(&test_partition(), EventSort::Timestamp, SortDirection::Desc)
            .await
            .unwrap();
        assert_eq!(events[0].event.status, EventStatus::Downloaded);
    }
}

#[tokio::test]
async fn clear_all_removes_everything() {
    for factory in get_test_caches() {
        let cache = factory().await;
        let partition = test_partition();

        cache
            .apply_sync_batch(
                vec![test_event("5")],
                vec![test_file("p/a.mp4", "5", FileType::Video)],
            )
            .await
            .unwrap();
        cache
            .update_sync_status(&partition, SyncState::Idle, Some(Utc::now()))
            .await
            .unwrap();

        cache.clear_all().await.unwrap();

        assert!(cache
            .get_events(&partition, EventSort::Timestamp, SortDirection::Desc)
            .await
            .unwrap()
            .is_empty());
        assert!(cache.get_event_files("5").await.unwrap().is_empty());
        let status = cache.get_sync_status(&partition).await.unwrap();
        assert!(status.last_synced_at.is_none());
    }
}
