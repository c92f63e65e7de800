//! File-artifact storage behind a backend trait. The formatter persists
//! uploaded blobs here and writes the returned handle into the payload.

mod local;

pub use local::LocalFileStorage;

use crate::payload::UploadedBlob;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid artifact handle: {0}")]
    InvalidHandle(String),
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),
}

/// Backend for persisted file artifacts. Handles are opaque strings that
/// round-trip through the data store and back into forms.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Persist a blob and return its handle.
    async fn store(&self, field: &str, blob: &UploadedBlob) -> Result<String, StorageError>;

    /// Delete a previously stored artifact. Removing a handle that no
    /// longer resolves is not an error.
    async fn remove(&self, handle: &str) -> Result<(), StorageError>;
}
