use thiserror::Error;

/// Errors that can occur when interacting with the event cache
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to open cache: {0}")]
    OpenError(String),

    #[error("Cache operation failed: {0}")]
    OperationError(String),

    #[error("No cached file with key {0}")]
    FileNotFound(String),

    #[error("No cached event with id {0}")]
    EventNotFound(String),

    #[error("Cache is locked")]
    Locked,

    #[error("Other cache error: {0}")]
    Other(#[from] anyhow::Error),
}
