use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::time::Duration as StdDuration;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::cache::{
    CacheError, EventCache, EventRecord, EventStatus, FileRecord, Partition, PartitionSync,
    SyncState,
};
use crate::config::SyncConfig;
use crate::metadata::{basename, parse_filename, FileType};
use crate::s3::{ListedObject, ObjectStore, StorageError};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid partition: {0}")]
    InvalidPartition(String),

    #[error("Listing failed: {0}")]
    Listing(#[from] StorageError),

    #[error("Cache write failed: {0}")]
    Persistence(#[from] CacheError),
}

/// Result of a single-partition sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub events_synced: usize,
    pub files_synced: usize,
    /// True when the partition was fresh and nothing was touched.
    pub skipped: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Result of a stale-partition batch sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub partitions_synced: usize,
    pub partitions_skipped: usize,
    pub events_synced: usize,
    pub files_synced: usize,
}

/// Reconciles object-store listings into the local event cache.
///
/// Each sync pages the partition's listing to completion, parses every
/// basename, groups files by event id and upserts the result in one cache
/// transaction. Sync provenance is recorded per partition so callers can
/// skip fresh partitions and observe in-progress state.
pub struct Reconciler<S: ObjectStore, C: EventCache> {
    store: S,
    cache: C,
    base_prefix: String,
    config: SyncConfig,
}

impl<S: ObjectStore, C: EventCache> Reconciler<S, C> {
    /// Creates a new reconciler over the provided store and cache
    pub fn new(store: S, cache: C, base_prefix: String, config: SyncConfig) -> Self {
        Reconciler {
            store,
            cache,
            base_prefix,
            config,
        }
    }

    /// Synchronize one partition's metadata into the cache.
    ///
    /// Unless `force` is set, a partition synced within the freshness window
    /// is skipped without touching the store or the cache. The freshness
    /// check is advisory only; concurrent force-syncs of the same partition
    /// race benignly at row granularity.
    pub async fn sync_partition(
        &self,
        partition: &Partition,
        force: bool,
    ) -> Result<SyncOutcome, SyncError> {
        if partition.year.is_empty() || partition.month.is_empty() {
            return Err(SyncError::InvalidPartition(
                "year and month must be non-empty".to_string(),
            ));
        }

        let status = self.cache.get_sync_status(partition).await?;
        if !force {
            if let Some(last) = status.last_synced_at {
                let age = Utc::now() - last;
                if age < Duration::hours(self.config.freshness_hours) {
                    info!("Partition {partition} synced recently, skipping");
                    return Ok(SyncOutcome {
                        events_synced: 0,
                        files_synced: 0,
                        skipped: true,
                        last_synced_at: Some(last),
                    });
                }
            }
        }

        // Persisted before listing starts so concurrent readers observe it
        self.cache
            .update_sync_status(partition, SyncState::Syncing, None)
            .await?;

        let result = async {
            let (events_synced, files_synced) = self.run_sync(partition).await?;
            let now = Utc::now();
            self.cache
                .update_sync_status(partition, SyncState::Idle, Some(now))
                .await?;
            Ok::<_, SyncError>((events_synced, files_synced, now))
        }
        .await;

        match result {
            Ok((events_synced, files_synced, now)) => {
                info!("Synced {events_synced} events ({files_synced} files) for {partition}");
                Ok(SyncOutcome {
                    events_synced,
                    files_synced,
                    skipped: false,
                    last_synced_at: Some(now),
                })
            }
            Err(e) => {
                error!("Sync failed for {partition}: {e}");
                if let Err(status_err) = self
                    .cache
                    .update_sync_status(partition, SyncState::Error, None)
                    .await
                {
                    error!("Failed to record error status for {partition}: {status_err}");
                }
                Err(e)
            }
        }
    }

    async fn run_sync(&self, partition: &Partition) -> Result<(usize, usize), SyncError> {
        let prefix = partition.prefix(&self.base_prefix);

        // Page through the listing; each token depends on the previous page
        let mut listed: Vec<ListedObject> = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.store.list_page(&prefix, token.as_deref()).await?;
            listed.extend(page.objects);
            debug!("Fetched {} objects so far for {partition}", listed.len());
            match page.next_continuation_token {
                Some(t) => token = Some(t),
                None => break,
            }
        }

        // Group by parsed event id; the first file seen fixes the event's
        // identity fields, later files only add to the count
        let mut events: HashMap<String, EventRecord> = HashMap::new();
        let mut files: Vec<FileRecord> = Vec::with_capacity(listed.len());

        for object in &listed {
            let filename = basename(&object.key);
            let meta = parse_filename(filename);
            let file_type = FileType::from_filename(filename);

            events
                .entry(meta.event_id.clone())
                .or_insert_with(|| EventRecord {
                    event_id: meta.event_id.clone(),
                    user_id: meta.user_id.clone(),
                    device_id: meta.device_id.clone(),
                    camera_model: meta.camera_model.clone(),
                    timestamp: meta.timestamp,
                    source_prefix: prefix.clone(),
                    status: EventStatus::Available,
                });

            files.push(FileRecord {
                key: object.key.clone(),
                event_id: meta.event_id,
                file_type,
                size_bytes: object.size_bytes,
                last_modified: object.last_modified,
                downloaded: false,
                local_path: None,
            });
        }

        let mut events: Vec<EventRecord> = events.into_values().collect();
        events.sort_by(|a, b| a.event_id.cmp(&b.event_id));

        let events_synced = events.len();
        let files_synced = files.len();

        self.cache.apply_sync_batch(events, files).await?;

        Ok((events_synced, files_synced))
    }

    /// Discover every year/month partition present under the base prefix.
    pub async fn discover_partitions(&self) -> Result<Vec<Partition>, SyncError> {
        let years = self.store.list_common_prefixes(&self.base_prefix).await?;

        let mut partitions = Vec::new();
        for year in years {
            let year_prefix = format!("{}{}/", self.base_prefix, year);
            let months = self.store.list_common_prefixes(&year_prefix).await?;
            for month in months {
                partitions.push(Partition::new(year.clone(), month));
            }
        }

        info!("Discovered {} partitions", partitions.len());
        Ok(partitions)
    }

    /// Discover partitions and sync the ones that are stale.
    ///
    /// A partition is stale when it has never completed a sync or its last
    /// sync is older than `stale_after_hours`. With `force`, everything is
    /// re-synced regardless of age.
    pub async fn sync_stale(&self, force: bool) -> Result<BatchOutcome, SyncError> {
        let partitions = self.discover_partitions().await?;
        let mut outcome = BatchOutcome::default();

        for partition in &partitions {
            if !force {
                let status = self.cache.get_sync_status(partition).await?;
                let stale = match status.last_synced_at {
                    None => true,
                    Some(last) => {
                        Utc::now() - last > Duration::hours(self.config.stale_after_hours)
                    }
                };
                if !stale {
                    debug!("Partition {partition} is up to date, skipping");
                    outcome.partitions_skipped += 1;
                    continue;
                }
            }

            // Staleness was already decided against the batch threshold
            let result = self.sync_partition(partition, true).await?;
            outcome.partitions_synced += 1;
            outcome.events_synced += result.events_synced;
            outcome.files_synced += result.files_synced;
        }

        info!(
            "Batch sync complete: {} partitions synced, {} skipped",
            outcome.partitions_synced, outcome.partitions_skipped
        );
        Ok(outcome)
    }

    /// Read a partition's sync provenance.
    pub async fn get_sync_status(&self, partition: &Partition) -> Result<PartitionSync, SyncError> {
        Ok(self.cache.get_sync_status(partition).await?)
    }

    /// Poll a partition's sync status until a terminal state is observed.
    pub async fn watch_until_terminal(
        &self,
        partition: &Partition,
        interval: StdDuration,
    ) -> Result<PartitionSync, SyncError> {
        loop {
            let status = self.cache.get_sync_status(partition).await?;
            match status.status {
                SyncState::Syncing => {
                    debug!("Partition {partition} still syncing");
                    tokio::time::sleep(interval).await;
                }
                _ => return Ok(status),
            }
        }
    }
}
