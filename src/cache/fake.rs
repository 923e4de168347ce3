use crate::cache::error::CacheError;
use crate::cache::event_cache::EventCache;
use crate::cache::models::{
    EventRecord, EventSort, EventStatus, EventSummary, FileRecord, FileTypeCounts, Partition,
    PartitionSync, SortDirection, SyncState,
};
use crate::metadata::FileType;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};

/// A fake in-memory implementation of the EventCache trait for testing.
/// Mirrors the SQLite upsert semantics, including the COALESCE rules for
/// download state, and counts write operations so tests can assert that a
/// skipped sync touched nothing.
#[derive(Clone, Default)]
pub struct FakeEventCache {
    events: Arc<RwLock<HashMap<String, EventRecord>>>,
    files: Arc<RwLock<HashMap<String, FileRecord>>>,
    sync_status: Arc<RwLock<HashMap<String, PartitionSync>>>,
    writes: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl FakeEventCache {
    /// Create a new empty FakeEventCache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of write operations performed so far
    pub fn fake_write_count(&self) -> usize {
        self.writes.load(AtomicOrdering::SeqCst)
    }

    /// Snapshot of all cached events, keyed by event id
    pub fn fake_events(&self) -> HashMap<String, EventRecord> {
        self.events.read().unwrap().clone()
    }

    /// Snapshot of all cached files, keyed by object key
    pub fn fake_files(&self) -> HashMap<String, FileRecord> {
        self.files.read().unwrap().clone()
    }
}

#[async_trait]
impl EventCache for FakeEventCache {
    async fn apply_sync_batch(
        &self,
        events: Vec<EventRecord>,
        files: Vec<FileRecord>,
    ) -> Result<(), CacheError> {
        self.writes.fetch_add(1, AtomicOrdering::SeqCst);

        {
            let mut cached = self.events.write().unwrap();
            for event in events {
                match cached.get_mut(&event.event_id) {
                    // Identity fields are fixed by the first insert
                    Some(existing) => existing.status = event.status,
                    None => {
                        cached.insert(event.event_id.clone(), event);
                    }
                }
            }
        }

        {
            let mut cached = self.files.write().unwrap();
            for file in files {
                match cached.get_mut(&file.key) {
                    Some(existing) => {
                        existing.size_bytes = file.size_bytes;
                        existing.last_modified = file.last_modified;
                        if existing.local_path.is_none() {
                            existing.local_path = file.local_path;
                        }
                        // `downloaded` is never null, so the stored value wins
                    }
                    None => {
                        cached.insert(file.key.clone(), file);
                    }
                }
            }
        }

        Ok(())
    }

    async fn get_events(
        &self,
        partition: &Partition,
        sort: EventSort,
        direction: SortDirection,
    ) -> Result<Vec<EventSummary>, CacheError> {
        let suffix = format!("/{}/{}/", partition.year, partition.month);
        let events = self.events.read().unwrap();
        let files = self.files.read().unwrap();

        let mut summaries: Vec<EventSummary> = events
            .values()
            .filter(|event| event.source_prefix.ends_with(&suffix))
            .map(|event| {
                let mut file_count = 0;
                let mut counts = FileTypeCounts::default();
                for file in files.values().filter(|f| f.event_id == event.event_id) {
                    file_count += 1;
                    match file.file_type {
                        FileType::Video => counts.video += 1,
                        FileType::Json => counts.json += 1,
                        FileType::Jpg => counts.jpg += 1,
                        FileType::JsonGz => counts.json_gz += 1,
                        FileType::Other => {}
                    }
                }
                EventSummary {
                    event: event.clone(),
                    file_count,
                    file_types: counts,
                }
            })
            .collect();

        summaries.sort_by(|a, b| {
            let ordering = match sort {
                EventSort::EventId => a.event.event_id.cmp(&b.event.event_id),
                EventSort::UserId => a.event.user_id.cmp(&b.event.user_id),
                EventSort::DeviceId => a.event.device_id.cmp(&b.event.device_id),
                EventSort::Timestamp => a.event.timestamp.cmp(&b.event.timestamp),
                EventSort::FileCount => a.file_count.cmp(&b.file_count),
            };
            let ordering = match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            // Deterministic tiebreak
            ordering.then_with(|| a.event.event_id.cmp(&b.event.event_id))
        });

        Ok(summaries)
    }

    async fn get_event_files(&self, event_id: &str) -> Result<Vec<FileRecord>, CacheError> {
        let files = self.files.read().unwrap();
        let mut matching: Vec<FileRecord> = files
            .values()
            .filter(|file| file.event_id == event_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(matching)
    }

    async fn get_sync_status(&self, partition: &Partition) -> Result<PartitionSync, CacheError> {
        let status = self.sync_status.read().unwrap();
        Ok(status
            .get(&partition.year_month())
            .copied()
            .unwrap_or_default())
    }

    async fn update_sync_status(
        &self,
        partition: &Partition,
        state: SyncState,
        last_synced_at: Option<DateTime<Utc>>,
    ) -> Result<(), CacheError> {
        self.writes.fetch_add(1, AtomicOrdering::SeqCst);

        let mut status = self.sync_status.write().unwrap();
        let entry = status.entry(partition.year_month()).or_default();
        entry.status = state;
        if last_synced_at.is_some() {
            entry.last_synced_at = last_synced_at;
        }
        Ok(())
    }

    async fn set_file_downloaded(&self, key: &str, local_path: &str) -> Result<(), CacheError> {
        self.writes.fetch_add(1, AtomicOrdering::SeqCst);

        let mut files = self.files.write().unwrap();
        match files.get_mut(key) {
            Some(file) => {
                file.downloaded = true;
                file.local_path = Some(local_path.to_string());
                Ok(())
            }
            None => Err(CacheError::FileNotFound(key.to_string())),
        }
    }

    async fn mark_event_downloaded(&self, event_id: &str) -> Result<(), CacheError> {
        self.writes.fetch_add(1, AtomicOrdering::SeqCst);

        let mut events = self.events.write().unwrap();
        match events.get_mut(event_id) {
            Some(event) => {
                event.status = EventStatus::Downloaded;
                Ok(())
            }
            None => Err(CacheError::EventNotFound(event_id.to_string())),
        }
    }

    async fn clear_all(&self) -> Result<(), CacheError> {
        self.writes.fetch_add(1, AtomicOrdering::SeqCst);

        self.events.write().unwrap().clear();
        self.files.write().unwrap().clear();
        self.sync_status.write().unwrap().clear();
        Ok(())
    }
}
