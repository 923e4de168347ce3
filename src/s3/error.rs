use thiserror::Error;

/// Errors that can occur when interacting with the object store
#[derive(Error, Debug)]
#[allow(dead_code)]
pub enum StorageError {
    #[error("Failed to connect to storage: {0}")]
    ConnectionError(String),

    #[error("Object with key {0} not found")]
    ObjectNotFound(String),

    #[error("Access denied for {0}: {1}")]
    AccessDenied(String, String),

    #[error("Failed to list objects under {0}: {1}")]
    ListError(String, String),

    #[error("Failed to read object {0}: {1}")]
    ReadError(String, String),

    #[error("Other storage error: {0}")]
    Other(#[from] anyhow::Error),
}
