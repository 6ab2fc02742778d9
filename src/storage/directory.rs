//! Object store that mirrors the bucket layout into a local directory.
//!
//! Used for development and for serving the published files from a
//! plain web server.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::storage::ObjectStore;
use crate::storage::local::write_bytes;

/// Directory-backed [`ObjectStore`].
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root_dir: PathBuf,
}

impl DirectoryStore {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Resolve a key below the root, rejecting keys that would escape it.
    fn path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(AppError::store(key, "key does not name a file below the root"));
        }
        Ok(self.root_dir.join(relative))
    }
}

#[async_trait]
impl ObjectStore for DirectoryStore {
    async fn put_object(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<()> {
        let path = self.path(key)?;
        write_bytes(&path, &bytes)
            .await
            .map_err(|e| AppError::store(key, e))
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let path = self.path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::store(key, e)),
        }
    }
}
