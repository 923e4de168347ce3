use crate::cache::error::CacheError;
use crate::cache::models::{
    EventRecord, EventSort, EventSummary, FileRecord, Partition, PartitionSync, SortDirection,
    SyncState,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// EventCache trait defining the interface for the persistent submission cache
///
/// Upsert rules: event identity fields (user/device/camera/timestamp) are fixed
/// by the first insert and only `status` is overwritten afterwards; file
/// `size_bytes`/`last_modified` always overwrite while `downloaded`/`local_path`
/// keep their existing value once set.
#[async_trait]
pub trait EventCache: Send + Sync + 'static {
    /// Apply one partition's parsed listing in a single transaction.
    async fn apply_sync_batch(
        &self,
        events: Vec<EventRecord>,
        files: Vec<FileRecord>,
    ) -> Result<(), CacheError>;

    /// Events for a partition with derived file aggregates, sorted as requested.
    async fn get_events(
        &self,
        partition: &Partition,
        sort: EventSort,
        direction: SortDirection,
    ) -> Result<Vec<EventSummary>, CacheError>;

    /// All cached files of an event, ordered by key.
    async fn get_event_files(&self, event_id: &str) -> Result<Vec<FileRecord>, CacheError>;

    /// Sync provenance for a partition; defaults to idle/never-synced when
    /// the partition has not been seen.
    async fn get_sync_status(&self, partition: &Partition) -> Result<PartitionSync, CacheError>;

    /// Record a sync-state transition. `last_synced_at = None` leaves any
    /// previously recorded timestamp in place.
    async fn update_sync_status(
        &self,
        partition: &Partition,
        state: SyncState,
        last_synced_at: Option<DateTime<Utc>>,
    ) -> Result<(), CacheError>;

    /// Record that a file has been fetched to a local path.
    async fn set_file_downloaded(&self, key: &str, local_path: &str) -> Result<(), CacheError>;

    /// Mark an event as fully downloaded.
    async fn mark_event_downloaded(&self, event_id: &str) -> Result<(), CacheError>;

    /// Drop every cached event, file and sync-status row.
    async fn clear_all(&self) -> Result<(), CacheError>;
}

/// Implementation of EventCache for Arc<T> where T implements EventCache
///
/// This allows sharing cache instances across threads and components
/// efficiently via thread-safe reference counting.
#[async_trait]
impl<T: EventCache + ?Sized> EventCache for Arc<T> {
    async fn apply_sync_batch(
        &self,
        events: Vec<EventRecord>,
        files: Vec<FileRecord>,
    ) -> Result<(), CacheError> {
        (**self).apply_sync_batch(events, files).await
    }

    async fn get_events(
        &self,
        partition: &Partition,
        sort: EventSort,
        direction: SortDirection,
    ) -> Result<Vec<EventSummary>, CacheError> {
        (**self).get_events(partition, sort, direction).await
    }

    async fn get_event_files(&self, event_id: &str) -> Result<Vec<FileRecord>, CacheError> {
        (**self).get_event_files(event_id).await
    }

    async fn get_sync_status(&self, partition: &Partition) -> Result<PartitionSync, CacheError> {
        (**self).get_sync_status(partition).await
    }

    async fn update_sync_status(
        &self,
        partition: &Partition,
        state: SyncState,
        last_synced_at: Option<DateTime<Utc>>,
    ) -> Result<(), CacheError> {
        (**self)
            .update_sync_status(partition, state, last_synced_at)
            .await
    }

    async fn set_file_downloaded(&self, key: &str, local_path: &str) -> Result<(), CacheError> {
        (**self).set_file_downloaded(key, local_path).await
    }

    async fn mark_event_downloaded(&self, event_id: &str) -> Result<(), CacheError> {
        (**self).mark_event_downloaded(event_id).await
    }

    async fn clear_all(&self) -> Result<(), CacheError> {
        (**self).clear_all().await
    }
}
