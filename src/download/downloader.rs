use flate2::read::GzDecoder;
use std::io::Read;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

use crate::cache::{CacheError, EventCache, Partition};
use crate::metadata::basename;
use crate::s3::{ObjectStore, StorageError};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("No files recorded for event {0}")]
    EventNotFound(String),

    #[error("Failed to fetch object: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to update cache: {0}")]
    Cache(#[from] CacheError),

    #[error("Failed to write {0}: {1}")]
    Io(String, String),

    #[error("Failed to decompress {0}: {1}")]
    Decompress(String, String),
}

/// Result of downloading one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSummary {
    pub event_id: String,
    pub files: usize,
    pub path: PathBuf,
}

/// Fetches an event's files from the object store into a local directory
/// and records download state back into the cache. Gzipped JSON metadata is
/// decompressed on the way down and stored with a plain `.json` name.
pub struct Downloader<S: ObjectStore, C: EventCache> {
    store: S,
    cache: C,
    downloads_dir: PathBuf,
}

impl<S: ObjectStore, C: EventCache> Downloader<S, C> {
    /// Creates a new downloader writing under `downloads_dir`
    pub fn new(store: S, cache: C, downloads_dir: impl Into<PathBuf>) -> Self {
        Downloader {
            store,
            cache,
            downloads_dir: downloads_dir.into(),
        }
    }

    fn event_dir(&self, partition: &Partition, event_id: &str) -> PathBuf {
        self.downloads_dir
            .join(&partition.year)
            .join(&partition.month)
            .join(event_id)
    }

    /// Download every cached file of an event.
    pub async fn download_event(
        &self,
        partition: &Partition,
        event_id: &str,
    ) -> Result<DownloadSummary, DownloadError> {
        let files = self.cache.get_event_files(event_id).await?;
        if files.is_empty() {
            return Err(DownloadError::EventNotFound(event_id.to_string()));
        }

        let event_dir = self.event_dir(partition, event_id);
        tokio::fs::create_dir_all(&event_dir)
            .await
            .map_err(|e| DownloadError::Io(event_dir.display().to_string(), e.to_string()))?;

        for file in &files {
            let filename = basename(&file.key);
            debug!("Fetching object: {}", file.key);
            let data = self.store.get_object(&file.key).await?;

            // .json.gz metadata lands locally as decompressed .json
            let (local_name, payload) = if filename.to_ascii_lowercase().ends_with(".json.gz") {
                let stem = &filename[..filename.len() - ".gz".len()];
                (stem.to_string(), gunzip(&data, &file.key)?)
            } else {
                (filename.to_string(), data.to_vec())
            };

            let local_path = event_dir.join(&local_name);
            tokio::fs::write(&local_path, &payload)
                .await
                .map_err(|e| DownloadError::Io(local_path.display().to_string(), e.to_string()))?;

            self.cache
                .set_file_downloaded(&file.key, &local_path.to_string_lossy())
                .await?;
            debug!("Stored {} ({} bytes)", local_path.display(), payload.len());
        }

        self.cache.mark_event_downloaded(event_id).await?;

        info!(
            "Downloaded {} files for event {event_id} to {}",
            files.len(),
            event_dir.display()
        );
        Ok(DownloadSummary {
            event_id: event_id.to_string(),
            files: files.len(),
            path: event_dir,
        })
    }

    /// Remove an event's local download directory. Returns false when there
    /// was nothing to remove.
    pub async fn remove_download(
        &self,
        partition: &Partition,
        event_id: &str,
    ) -> Result<bool, DownloadError> {
        let event_dir = self.event_dir(partition, event_id);
        if !event_dir.exists() {
            return Ok(false);
        }

        tokio::fs::remove_dir_all(&event_dir)
            .await
            .map_err(|e| DownloadError::Io(event_dir.display().to_string(), e.to_string()))?;

        info!("Removed download directory {}", event_dir.display());
        Ok(true)
    }
}

fn gunzip(data: &[u8], key: &str) -> Result<Vec<u8>, DownloadError> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| DownloadError::Decompress(key.to_string(), e.to_string()))?;
    Ok(out)
}
