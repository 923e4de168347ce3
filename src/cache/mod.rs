pub mod error;
pub mod event_cache;
pub mod fake;
pub mod models;
pub mod sqlite;
#[cfg(test)]
mod tests;

#[allow(unused_imports)]
pub use error::CacheError;
pub use event_cache::EventCache;
pub use fake::FakeEventCache;
pub use models::{
    EventRecord, EventSort, EventStatus, EventSummary, FileRecord, FileTypeCounts, Partition,
    PartitionSync, SortDirection, SyncState,
};
pub use sqlite::SqliteEventCache;
