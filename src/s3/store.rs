use crate::s3::error::StorageError;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// A single object returned by a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
    pub key: String,
    pub size_bytes: i64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ListedObject>,
    /// Token to resume the listing; `None` means the listing is exhausted.
    pub next_continuation_token: Option<String>,
}

/// ObjectStore trait defining the interface for listing and reading
/// objects from S3-compatible storage
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// List one page of objects under `prefix`, resuming from a
    /// continuation token returned by a previous page.
    async fn list_page(
        &self,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StorageError>;

    /// List the immediate child prefixes under `prefix` (delimiter `/`),
    /// returned with the leading `prefix` and trailing slash stripped.
    async fn list_common_prefixes(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Get an object's contents by key.
    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError>;
}

/// Implementation of ObjectStore for Arc<T> where T implements ObjectStore
///
/// This allows sharing store instances across threads and components
/// efficiently via thread-safe reference counting.
#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    async fn list_page(
        &self,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StorageError> {
        (**self).list_page(prefix, continuation_token).await
    }

    async fn list_common_prefixes(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        (**self).list_common_prefixes(prefix).await
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError> {
        (**self).get_object(key).await
    }
}
