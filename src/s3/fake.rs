use crate::s3::error::StorageError;
use crate::s3::store::{ListPage, ListedObject, ObjectStore};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
struct FakeObject {
    data: Bytes,
    last_modified: Option<DateTime<Utc>>,
}

/// `FakeStore` is an in-memory implementation of the `ObjectStore` trait for
/// testing purposes. Keys are kept sorted so listings page the way S3 does,
/// and individual prefixes/keys can be made to fail.
#[derive(Clone)]
pub struct FakeStore {
    objects: Arc<Mutex<BTreeMap<String, FakeObject>>>,
    fail_prefixes: Arc<Mutex<HashSet<String>>>,
    fail_objects: Arc<Mutex<HashSet<String>>>,
    page_size: usize,
}

#[allow(dead_code)]
impl FakeStore {
    /// Create a new empty FakeStore instance
    pub fn new() -> Self {
        FakeStore {
            objects: Arc::new(Mutex::new(BTreeMap::new())),
            fail_prefixes: Arc::new(Mutex::new(HashSet::new())),
            fail_objects: Arc::new(Mutex::new(HashSet::new())),
            page_size: 1000,
        }
    }

    /// Create a FakeStore whose listings return at most `page_size` objects
    /// per page, to exercise continuation-token handling.
    pub fn with_page_size(page_size: usize) -> Self {
        FakeStore {
            page_size,
            ..Self::new()
        }
    }

    /// Add an object to the fake store
    pub async fn fake_add_object(
        &self,
        key: &str,
        data: Bytes,
        last_modified: Option<DateTime<Utc>>,
    ) {
        let mut objects = self.objects.lock().await;
        objects.insert(
            key.to_string(),
            FakeObject {
                data,
                last_modified,
            },
        );
    }

    /// Simulate a listing failure for every prefix starting with `prefix`
    pub async fn fake_fail_listing(&self, prefix: &str) {
        let mut fail_prefixes = self.fail_prefixes.lock().await;
        fail_prefixes.insert(prefix.to_string());
    }

    /// Simulate a read failure for a specific object
    pub async fn fake_fail_object(&self, key: &str) {
        let mut fail_objects = self.fail_objects.lock().await;
        fail_objects.insert(key.to_string());
    }

    async fn check_listing_failure(&self, prefix: &str) -> Result<(), StorageError> {
        let fail_prefixes = self.fail_prefixes.lock().await;
        if fail_prefixes.iter().any(|p| prefix.starts_with(p.as_str())) {
            return Err(StorageError::ListError(
                prefix.to_string(),
                "injected listing failure".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FakeStore {
    async fn list_page(
        &self,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StorageError> {
        self.check_listing_failure(prefix).await?;

        let objects = self.objects.lock().await;
        let mut page = Vec::new();
        let mut next_continuation_token = None;

        for (key, object) in objects.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            // The token is the last key of the previous page; resume after it
            if let Some(token) = continuation_token {
                if key.as_str() <= token {
                    continue;
                }
            }
            if page.len() == self.page_size {
                next_continuation_token = page.last().map(|o: &ListedObject| o.key.clone());
                break;
            }
            page.push(ListedObject {
                key: key.clone(),
                size_bytes: object.data.len() as i64,
                last_modified: object.last_modified,
            });
        }

        Ok(ListPage {
            objects: page,
            next_continuation_token,
        })
    }

    async fn list_common_prefixes(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.check_listing_failure(prefix).await?;

        let objects = self.objects.lock().await;
        let mut names = BTreeSet::new();

        for key in objects.keys() {
            if let Some(rest) = key.strip_prefix(prefix) {
                if let Some((child, _)) = rest.split_once('/') {
                    if !child.is_empty() {
                        names.insert(child.to_string());
                    }
                }
            }
        }

        Ok(names.into_iter().collect())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError> {
        let fail_objects = self.fail_objects.lock().await;
        if fail_objects.contains(key) {
            return Err(StorageError::ReadError(
                key.to_string(),
                "injected read failure".to_string(),
            ));
        }

        let objects = self.objects.lock().await;
        match objects.get(key) {
            Some(object) => Ok(object.data.clone()),
            None => Err(StorageError::ObjectNotFound(key.to_string())),
        }
    }
}

impl Default for FakeStore {
    fn default() -> Self {
        Self::new()
    }
}
