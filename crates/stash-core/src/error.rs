//! Core error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Item {0} already exists")]
    KeyExists(String),

    #[error("Item {0} doesn't exist")]
    KeyNotFound(String),

    #[error("Cleanup task requires a running tokio runtime")]
    NoRuntime,
}
