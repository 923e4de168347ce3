use crate::metadata::FileType;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A year/month grouping, used both as object-store prefix and cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Partition {
    pub year: String,
    pub month: String,
}

impl Partition {
    pub fn new(year: impl Into<String>, month: impl Into<String>) -> Self {
        Partition {
            year: year.into(),
            month: month.into(),
        }
    }

    /// Cache key, e.g. `"2024-01"`.
    pub fn year_month(&self) -> String {
        format!("{}-{}", self.year, self.month)
    }

    /// Object-store prefix for this partition under `base_prefix`.
    pub fn prefix(&self, base_prefix: &str) -> String {
        format!("{}{}/{}/", base_prefix, self.year, self.month)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.year, self.month)
    }
}

/// Lifecycle status of a cached event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Available,
    Downloaded,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Available => "available",
            EventStatus::Downloaded => "downloaded",
        }
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(EventStatus::Available),
            "downloaded" => Ok(EventStatus::Downloaded),
            _ => Err(format!("Invalid event status: {s}")),
        }
    }
}

/// A logical submission: one or more files sharing an extracted event id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    pub event_id: String,
    pub user_id: String,
    pub device_id: String,
    pub camera_model: String,
    pub timestamp: DateTime<Utc>,
    pub source_prefix: String,
    pub status: EventStatus,
}

/// A single object-store file belonging to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub key: String,
    pub event_id: String,
    pub file_type: FileType,
    pub size_bytes: i64,
    pub last_modified: Option<DateTime<Utc>>,
    pub downloaded: bool,
    pub local_path: Option<String>,
}

/// Per-type file counts for an event, computed at read time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileTypeCounts {
    pub video: i64,
    pub json: i64,
    pub jpg: i64,
    pub json_gz: i64,
}

/// An event joined with its derived file aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventSummary {
    #[serde(flatten)]
    pub event: EventRecord,
    pub file_count: i64,
    pub file_types: FileTypeCounts,
}

/// Synchronization state of a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Syncing,
    Error,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Idle => "idle",
            SyncState::Syncing => "syncing",
            SyncState::Error => "error",
        }
    }
}

impl FromStr for SyncState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(SyncState::Idle),
            "syncing" => Ok(SyncState::Syncing),
            "error" => Ok(SyncState::Error),
            _ => Err(format!("Invalid sync state: {s}")),
        }
    }
}

/// Sync provenance for a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PartitionSync {
    pub last_synced_at: Option<DateTime<Utc>>,
    pub status: SyncState,
}

impl Default for PartitionSync {
    fn default() -> Self {
        PartitionSync {
            last_synced_at: None,
            status: SyncState::Idle,
        }
    }
}

/// Columns an event listing may be sorted by. A closed enum rather than a
/// caller-supplied column string keeps the SQL free of injected identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventSort {
    EventId,
    UserId,
    DeviceId,
    #[default]
    Timestamp,
    FileCount,
}

impl FromStr for EventSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "event-id" | "eventId" => Ok(EventSort::EventId),
            "user-id" | "userId" => Ok(EventSort::UserId),
            "device-id" | "deviceId" => Ok(EventSort::DeviceId),
            "timestamp" => Ok(EventSort::Timestamp),
            "file-count" | "fileCount" => Ok(EventSort::FileCount),
            _ => Err(format!("Invalid sort column: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(format!("Invalid sort direction: {s}")),
        }
    }
}
