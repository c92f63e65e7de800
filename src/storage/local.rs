//! Local-disk storage backend. Handles are relative paths under the root:
//! `<field>/<uuid>-<sanitized filename>`.

use super::{FileStorage, StorageError};
use crate::payload::UploadedBlob;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalFileStorage { root: root.into() }
    }

    /// Absolute path for a handle, rejecting traversal outside the root.
    fn resolve(&self, handle: &str) -> Result<PathBuf, StorageError> {
        if handle.is_empty()
            || Path::new(handle).is_absolute()
            || handle.split('/').any(|seg| seg == "..")
        {
            return Err(StorageError::InvalidHandle(handle.to_string()));
        }
        Ok(self.root.join(handle))
    }
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn store(&self, field: &str, blob: &UploadedBlob) -> Result<String, StorageError> {
        let dir = sanitize(field);
        let handle = format!("{}/{}-{}", dir, Uuid::new_v4(), sanitize(&blob.filename));
        let path = self.resolve(&handle)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &blob.bytes).await?;
        tracing::debug!(handle = %handle, bytes = blob.bytes.len(), "stored artifact");
        Ok(handle)
    }

    async fn remove(&self, handle: &str) -> Result<(), StorageError> {
        let path = self.resolve(handle)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(handle = %handle, "removed artifact");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
