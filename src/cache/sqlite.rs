use crate::cache::error::CacheError;
use crate::cache::event_cache::EventCache;
use crate::cache::models::{
    EventRecord, EventSort, EventStatus, EventSummary, FileRecord, FileTypeCounts, Partition,
    PartitionSync, SortDirection, SyncState,
};
use crate::metadata::FileType;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tokio::task;
use tracing::{debug, error, info, warn};

/// A SQLite implementation of the EventCache trait
pub struct SqliteEventCache {
    connection: Arc<Mutex<Connection>>,
}

impl SqliteEventCache {
    /// Create a new SqliteEventCache with the given database path
    pub fn new(db_path: &str) -> Result<Self, CacheError> {
        info!("Creating SQLite event cache at path: {db_path}");

        if db_path != ":memory:" {
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.exists() {
                    debug!("Creating parent directory: {:?}", parent);
                    fs::create_dir_all(parent).map_err(|e| {
                        error!("Failed to create directory {parent:?}: {e}");
                        CacheError::OpenError(format!("Failed to create directory: {e}"))
                    })?;
                }
            }
        }

        let connection = Connection::open(db_path).map_err(|e| {
            error!("Failed to open SQLite database at {db_path}: {e}");
            CacheError::OpenError(format!("Failed to open SQLite database: {e}"))
        })?;

        connection
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS events (
                    event_id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    device_id TEXT NOT NULL,
                    camera_model TEXT NOT NULL,
                    timestamp TEXT NOT NULL,
                    source_prefix TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'available',
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS files (
                    key TEXT PRIMARY KEY,
                    event_id TEXT NOT NULL REFERENCES events(event_id),
                    file_type TEXT NOT NULL,
                    size_bytes INTEGER NOT NULL DEFAULT 0,
                    last_modified TEXT,
                    downloaded INTEGER NOT NULL DEFAULT 0,
                    local_path TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS sync_status (
                    year_month TEXT PRIMARY KEY,
                    last_synced_at TEXT,
                    status TEXT NOT NULL DEFAULT 'idle'
                );

                CREATE INDEX IF NOT EXISTS idx_files_event_id ON files(event_id);
                CREATE INDEX IF NOT EXISTS idx_files_file_type ON files(file_type);
                CREATE INDEX IF NOT EXISTS idx_events_source_prefix ON events(source_prefix);
                CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp DESC);
                CREATE INDEX IF NOT EXISTS idx_events_user_id ON events(user_id);",
            )
            .map_err(|e| {
                error!("Failed to create cache schema: {e}");
                CacheError::OpenError(format!("Failed to create cache schema: {e}"))
            })?;

        info!("SQLite event cache initialized successfully at: {db_path}");
        Ok(SqliteEventCache {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn datetime_to_string(dt: DateTime<Utc>) -> String {
        dt.to_rfc3339()
    }

    fn string_to_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| CacheError::OperationError(format!("Failed to parse datetime: {e}")))
    }

    fn decode_file_row(
        key: String,
        event_id: String,
        file_type: String,
        size_bytes: i64,
        last_modified: Option<String>,
        downloaded: bool,
        local_path: Option<String>,
    ) -> Result<FileRecord, CacheError> {
        let file_type = FileType::from_str(&file_type).map_err(|e| {
            error!("Failed to parse file type from cache: {e}");
            CacheError::OperationError(format!("Failed to parse file type: {e}"))
        })?;
        let last_modified = last_modified
            .map(|s| Self::string_to_datetime(&s))
            .transpose()?;

        Ok(FileRecord {
            key,
            event_id,
            file_type,
            size_bytes,
            last_modified,
            downloaded,
            local_path,
        })
    }
}

#[async_trait]
impl EventCache for SqliteEventCache {
    async fn apply_sync_batch(
        &self,
        events: Vec<EventRecord>,
        files: Vec<FileRecord>,
    ) -> Result<(), CacheError> {
        debug!(
            "Applying sync batch: {} events, {} files",
            events.len(),
            files.len()
        );

        let connection = Arc::clone(&self.connection);
        let now_str = Self::datetime_to_string(Utc::now());

        task::spawn_blocking(move || {
            let mut conn = match connection.lock() {
                Ok(conn) => conn,
                Err(_) => {
                    error!("Failed to acquire cache lock");
                    return Err(CacheError::Locked);
                }
            };

            let tx = conn.transaction().map_err(|e| {
                error!("Failed to begin cache transaction: {e}");
                CacheError::OperationError(format!("Failed to begin transaction: {e}"))
            })?;

            {
                let mut upsert_event = tx
                    .prepare(
                        "INSERT INTO events
                             (event_id, user_id, device_id, camera_model, timestamp, source_prefix, status, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                         ON CONFLICT(event_id) DO UPDATE SET
                             status = excluded.status,
                             updated_at = excluded.updated_at",
                    )
                    .map_err(|e| {
                        error!("Failed to prepare event upsert: {e}");
                        CacheError::OperationError(format!("Failed to prepare event upsert: {e}"))
                    })?;

                for event in &events {
                    upsert_event
                        .execute(params![
                            event.event_id,
                            event.user_id,
                            event.device_id,
                            event.camera_model,
                            Self::datetime_to_string(event.timestamp),
                            event.source_prefix,
                            event.status.as_str(),
                            now_str,
                        ])
                        .map_err(|e| {
                            error!("Failed to upsert event {}: {e}", event.event_id);
                            CacheError::OperationError(format!("Failed to upsert event: {e}"))
                        })?;
                }

                let mut upsert_file = tx
                    .prepare(
                        "INSERT INTO files
                             (key, event_id, file_type, size_bytes, last_modified, downloaded, local_path)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                         ON CONFLICT(key) DO UPDATE SET
                             size_bytes = excluded.size_bytes,
                             last_modified = excluded.last_modified,
                             downloaded = COALESCE(files.downloaded, excluded.downloaded),
                             local_path = COALESCE(files.local_path, excluded.local_path)",
                    )
                    .map_err(|e| {
                        error!("Failed to prepare file upsert: {e}");
                        CacheError::OperationError(format!("Failed to prepare file upsert: {e}"))
                    })?;

                for file in &files {
                    upsert_file
                        .execute(params![
                            file.key,
                            file.event_id,
                            file.file_type.as_str(),
                            file.size_bytes,
                            file.last_modified.map(Self::datetime_to_string),
                            file.downloaded,
                            file.local_path,
                        ])
                        .map_err(|e| {
                            error!("Failed to upsert file {}: {e}", file.key);
                            CacheError::OperationError(format!("Failed to upsert file: {e}"))
                        })?;
                }
            }

            tx.commit().map_err(|e| {
                error!("Failed to commit sync batch: {e}");
                CacheError::OperationError(format!("Failed to commit sync batch: {e}"))
            })?;

            debug!("Successfully applied sync batch");
            Ok(())
        })
        .await
        .map_err(|e| {
            error!("Task panic while applying sync batch: {e}");
            CacheError::OperationError(format!("Task panic: {e}"))
        })?
    }

    async fn get_events(
        &self,
        partition: &Partition,
        sort: EventSort,
        direction: SortDirection,
    ) -> Result<Vec<EventSummary>, CacheError> {
        debug!("Getting events for partition {partition} sorted by {sort:?} {direction:?}");

        let connection = Arc::clone(&self.connection);
        let prefix_filter = format!("%/{}/{}/", partition.year, partition.month);

        // Sort columns come from a closed enum, never from caller strings
        let order_column = match sort {
            EventSort::EventId => "e.event_id",
            EventSort::UserId => "e.user_id",
            EventSort::DeviceId => "e.device_id",
            EventSort::Timestamp => "e.timestamp",
            EventSort::FileCount => "file_count",
        };
        let order_direction = match direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };

        let query = format!(
            "SELECT e.event_id, e.user_id, e.device_id, e.camera_model, e.timestamp,
                    e.source_prefix, e.status,
                    COUNT(f.key) AS file_count,
                    COUNT(CASE WHEN f.file_type = 'video' THEN 1 END) AS video_count,
                    COUNT(CASE WHEN f.file_type = 'json' THEN 1 END) AS json_count,
                    COUNT(CASE WHEN f.file_type = 'jpg' THEN 1 END) AS jpg_count,
                    COUNT(CASE WHEN f.file_type = 'json.gz' THEN 1 END) AS json_gz_count
             FROM events e
             LEFT JOIN files f ON e.event_id = f.event_id
             WHERE e.source_prefix LIKE ?1
             GROUP BY e.event_id
             ORDER BY {order_column} {order_direction}"
        );

        task::spawn_blocking(move || {
            let conn = match connection.lock() {
                Ok(conn) => conn,
                Err(_) => {
                    error!("Failed to acquire cache lock");
                    return Err(CacheError::Locked);
                }
            };

            let mut stmt = conn.prepare(&query).map_err(|e| {
                error!("Failed to prepare events query: {e}");
                CacheError::OperationError(format!("Failed to prepare events query: {e}"))
            })?;

            let rows = stmt
                .query_map(params![prefix_filter], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, i64>(7)?,
                        row.get::<_, i64>(8)?,
                        row.get::<_, i64>(9)?,
                        row.get::<_, i64>(10)?,
                        row.get::<_, i64>(11)?,
                    ))
                })
                .map_err(|e| {
                    error!("Failed to query events: {e}");
                    CacheError::OperationError(format!("Failed to query events: {e}"))
                })?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| {
                    error!("Failed to collect event rows: {e}");
                    CacheError::OperationError(format!("Failed to collect event rows: {e}"))
                })?;

            let mut summaries = Vec::with_capacity(rows.len());
            for (
                event_id,
                user_id,
                device_id,
                camera_model,
                timestamp_str,
                source_prefix,
                status_str,
                file_count,
                video_count,
                json_count,
                jpg_count,
                json_gz_count,
            ) in rows
            {
                let timestamp = Self::string_to_datetime(&timestamp_str)?;
                let status = EventStatus::from_str(&status_str).map_err(|e| {
                    error!("Failed to parse event status from cache: {e}");
                    CacheError::OperationError(format!("Failed to parse event status: {e}"))
                })?;

                summaries.push(EventSummary {
                    event: EventRecord {
                        event_id,
                        user_id,
                        device_id,
                        camera_model,
                        timestamp,
                        source_prefix,
                        status,
                    },
                    file_count,
                    file_types: FileTypeCounts {
                        video: video_count,
                        json: json_count,
                        jpg: jpg_count,
                        json_gz: json_gz_count,
                    },
                });
            }

            info!("Found {} cached events", summaries.len());
            Ok(summaries)
        })
        .await
        .map_err(|e| {
            error!("Task panic while getting events: {e}");
            CacheError::OperationError(format!("Task panic: {e}"))
        })?
    }

    async fn get_event_files(&self, event_id: &str) -> Result<Vec<FileRecord>, CacheError> {
        debug!("Getting cached files for event: {event_id}");

        let connection = Arc::clone(&self.connection);
        let event_id = event_id.to_string();

        task::spawn_blocking(move || {
            let conn = match connection.lock() {
                Ok(conn) => conn,
                Err(_) => {
                    error!("Failed to acquire cache lock");
                    return Err(CacheError::Locked);
                }
            };

            let mut stmt = conn
                .prepare(
                    "SELECT key, event_id, file_type, size_bytes, last_modified, downloaded, local_path
                     FROM files
                     WHERE event_id = ?1
                     ORDER BY key",
                )
                .map_err(|e| {
                    error!("Failed to prepare files query: {e}");
                    CacheError::OperationError(format!("Failed to prepare files query: {e}"))
                })?;

            let rows = stmt
                .query_map(params![event_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, bool>(5)?,
                        row.get::<_, Option<String>>(6)?,
                    ))
                })
                .map_err(|e| {
                    error!("Failed to query files: {e}");
                    CacheError::OperationError(format!("Failed to query files: {e}"))
                })?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| {
                    error!("Failed to collect file rows: {e}");
                    CacheError::OperationError(format!("Failed to collect file rows: {e}"))
                })?;

            rows.into_iter()
                .map(
                    |(key, event_id, file_type, size_bytes, last_modified, downloaded, local_path)| {
                        Self::decode_file_row(
                            key,
                            event_id,
                            file_type,
                            size_bytes,
                            last_modified,
                            downloaded,
                            local_path,
                        )
                    },
                )
                .collect()
        })
        .await
        .map_err(|e| {
            error!("Task panic while getting event files: {e}");
            CacheError::OperationError(format!("Task panic: {e}"))
        })?
    }

    async fn get_sync_status(&self, partition: &Partition) -> Result<PartitionSync, CacheError> {
        debug!("Getting sync status for partition: {partition}");

        let connection = Arc::clone(&self.connection);
        let year_month = partition.year_month();

        task::spawn_blocking(move || {
            let conn = match connection.lock() {
                Ok(conn) => conn,
                Err(_) => {
                    error!("Failed to acquire cache lock");
                    return Err(CacheError::Locked);
                }
            };

            let row: Option<(Option<String>, String)> = conn
                .query_row(
                    "SELECT last_synced_at, status FROM sync_status WHERE year_month = ?1",
                    params![year_month],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .map_err(|e| {
                    error!("Failed to query sync status: {e}");
                    CacheError::OperationError(format!("Failed to query sync status: {e}"))
                })?;

            match row {
                Some((last_synced_at_str, status_str)) => {
                    let last_synced_at = last_synced_at_str
                        .map(|s| Self::string_to_datetime(&s))
                        .transpose()?;
                    let status = SyncState::from_str(&status_str).map_err(|e| {
                        error!("Failed to parse sync state from cache: {e}");
                        CacheError::OperationError(format!("Failed to parse sync state: {e}"))
                    })?;
                    Ok(PartitionSync {
                        last_synced_at,
                        status,
                    })
                }
                None => Ok(PartitionSync::default()),
            }
        })
        .await
        .map_err(|e| {
            error!("Task panic while getting sync status: {e}");
            CacheError::OperationError(format!("Task panic: {e}"))
        })?
    }

    async fn update_sync_status(
        &self,
        partition: &Partition,
        state: SyncState,
        last_synced_at: Option<DateTime<Utc>>,
    ) -> Result<(), CacheError> {
        debug!("Updating sync status for {partition}: {state:?}, last_synced_at={last_synced_at:?}");

        let connection = Arc::clone(&self.connection);
        let year_month = partition.year_month();
        let state_str = state.as_str();
        let last_synced_at_str = last_synced_at.map(Self::datetime_to_string);

        task::spawn_blocking(move || {
            let conn = match connection.lock() {
                Ok(conn) => conn,
                Err(_) => {
                    error!("Failed to acquire cache lock");
                    return Err(CacheError::Locked);
                }
            };

            let result = match &last_synced_at_str {
                Some(ts) => conn.execute(
                    "INSERT INTO sync_status (year_month, status, last_synced_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(year_month) DO UPDATE SET
                         status = excluded.status,
                         last_synced_at = excluded.last_synced_at",
                    params![year_month, state_str, ts],
                ),
                None => conn.execute(
                    "INSERT INTO sync_status (year_month, status)
                     VALUES (?1, ?2)
                     ON CONFLICT(year_month) DO UPDATE SET
                         status = excluded.status",
                    params![year_month, state_str],
                ),
            };

            result.map_err(|e| {
                error!("Failed to update sync status: {e}");
                CacheError::OperationError(format!("Failed to update sync status: {e}"))
            })?;

            debug!("Successfully updated sync status for: {year_month}");
            Ok(())
        })
        .await
        .map_err(|e| {
            error!("Task panic while updating sync status: {e}");
            CacheError::OperationError(format!("Task panic: {e}"))
        })?
    }

    async fn set_file_downloaded(&self, key: &str, local_path: &str) -> Result<(), CacheError> {
        debug!("Marking file downloaded: {key} -> {local_path}");

        let connection = Arc::clone(&self.connection);
        let key = key.to_string();
        let local_path = local_path.to_string();

        task::spawn_blocking(move || {
            let conn = match connection.lock() {
                Ok(conn) => conn,
                Err(_) => {
                    error!("Failed to acquire cache lock");
                    return Err(CacheError::Locked);
                }
            };

            let rows_affected = conn
                .execute(
                    "UPDATE files SET downloaded = 1, local_path = ?2 WHERE key = ?1",
                    params![key, local_path],
                )
                .map_err(|e| {
                    error!("Failed to mark file downloaded: {e}");
                    CacheError::OperationError(format!("Failed to mark file downloaded: {e}"))
                })?;

            if rows_affected == 0 {
                warn!("File not found for download update: {key}");
                return Err(CacheError::FileNotFound(key));
            }

            Ok(())
        })
        .await
        .map_err(|e| {
            error!("Task panic while marking file downloaded: {e}");
            CacheError::OperationError(format!("Task panic: {e}"))
        })?
    }

    async fn mark_event_downloaded(&self, event_id: &str) -> Result<(), CacheError> {
        debug!("Marking event downloaded: {event_id}");

        let connection = Arc::clone(&self.connection);
        let event_id = event_id.to_string();
        let now_str = Self::datetime_to_string(Utc::now());

        task::spawn_blocking(move || {
            let conn = match connection.lock() {
                Ok(conn) => conn,
                Err(_) => {
                    error!("Failed to acquire cache lock");
                    return Err(CacheError::Locked);
                }
            };

            let rows_affected = conn
                .execute(
                    "UPDATE events SET status = 'downloaded', updated_at = ?2 WHERE event_id = ?1",
                    params![event_id, now_str],
                )
                .map_err(|e| {
                    error!("Failed to mark event downloaded: {e}");
                    CacheError::OperationError(format!("Failed to mark event downloaded: {e}"))
                })?;

            if rows_affected == 0 {
                warn!("Event not found for download update: {event_id}");
                return Err(CacheError::EventNotFound(event_id));
            }

            Ok(())
        })
        .await
        .map_err(|e| {
            error!("Task panic while marking event downloaded: {e}");
            CacheError::OperationError(format!("Task panic: {e}"))
        })?
    }

    async fn clear_all(&self) -> Result<(), CacheError> {
        info!("Clearing all cached data");

        let connection = Arc::clone(&self.connection);

        task::spawn_blocking(move || {
            let conn = match connection.lock() {
                Ok(conn) => conn,
                Err(_) => {
                    error!("Failed to acquire cache lock");
                    return Err(CacheError::Locked);
                }
            };

            let files_deleted = conn.execute("DELETE FROM files", []).map_err(|e| {
                error!("Failed to clear files: {e}");
                CacheError::OperationError(format!("Failed to clear files: {e}"))
            })?;

            let events_deleted = conn.execute("DELETE FROM events", []).map_err(|e| {
                error!("Failed to clear events: {e}");
                CacheError::OperationError(format!("Failed to clear events: {e}"))
            })?;

            let status_deleted = conn.execute("DELETE FROM sync_status", []).map_err(|e| {
                error!("Failed to clear sync status: {e}");
                CacheError::OperationError(format!("Failed to clear sync status: {e}"))
            })?;

            info!(
                "Cleared {files_deleted} files, {events_deleted} events, {status_deleted} sync-status rows"
            );
            Ok(())
        })
        .await
        .map_err(|e| {
            error!("Task panic while clearing cache: {e}");
            CacheError::OperationError(format!("Task panic: {e}"))
        })?
    }
}
