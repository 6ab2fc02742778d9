//! Storage abstractions.
//!
//! - `local`: the crawler's data directory (status file, snapshots)
//! - `directory` / `s3`: publish targets behind the [`ObjectStore`] trait
//!
//! ## Published Layout
//!
//! ```text
//! {prefix}/
//! ├── addresses.json          # Address catalog
//! ├── coord-bounds.json       # Bounding box of geocoded addresses
//! └── addresses/
//!     └── {address}.json      # Drawings filed under one address
//! ```

pub mod directory;
pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::StorageConfig;

// Re-export for convenience
pub use directory::DirectoryStore;
pub use local::LocalStorage;
#[cfg(feature = "s3")]
pub use s3::S3Storage;

/// Key of the address catalog, relative to the prefix.
pub const ADDRESS_INDEX_KEY: &str = "addresses.json";
/// Key of the bounding box, relative to the prefix.
pub const COORD_BOUNDS_KEY: &str = "coord-bounds.json";
/// Folder of per-address objects, relative to the prefix.
pub const ADDRESS_FILES_PREFIX: &str = "addresses";

const JSON_CONTENT_TYPE: &str = "application/json";

/// Trait for object storage backends.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create or overwrite an object.
    async fn put_object(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// Remove an object; removing a missing object is not an error.
    async fn delete_object(&self, key: &str) -> Result<()>;
}

/// Publishes snapshot files under a key prefix.
#[derive(Clone)]
pub struct Uploader {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl Uploader {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    /// Upload one `<address>.json` file.
    pub async fn upload_address_file(&self, file_name: &str, bytes: Vec<u8>) -> Result<()> {
        let key = self.key(&format!("{ADDRESS_FILES_PREFIX}/{file_name}"));
        log::info!("Uploading {file_name} to {key}");
        self.store.put_object(&key, bytes, JSON_CONTENT_TYPE).await
    }

    /// Upload a top-level index artifact such as the address catalog.
    pub async fn upload_index_file(&self, name: &str, bytes: Vec<u8>) -> Result<()> {
        let key = self.key(name);
        log::info!("Uploading {name} to {key}");
        self.store.put_object(&key, bytes, JSON_CONTENT_TYPE).await
    }

    /// Remove the object of an address that disappeared.
    pub async fn delete_address_file(&self, file_name: &str) -> Result<()> {
        let key = self.key(&format!("{ADDRESS_FILES_PREFIX}/{file_name}"));
        log::info!("Removing {key}");
        self.store.delete_object(&key).await
    }

    fn key(&self, path: &str) -> String {
        if self.prefix.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", self.prefix, path)
        }
    }
}

/// Build the uploader for the `[storage]` backend.
pub async fn uploader_from_config(config: &StorageConfig) -> Result<Uploader> {
    let store: Arc<dyn ObjectStore> = match config.backend.as_str() {
        #[cfg(feature = "s3")]
        "s3" => Arc::new(S3Storage::from_config(config).await?),
        #[cfg(not(feature = "s3"))]
        "s3" => {
            return Err(AppError::config(
                "storage.backend = \"s3\" needs the s3 feature",
            ));
        }
        "directory" => Arc::new(DirectoryStore::new(&config.directory)),
        other => {
            return Err(AppError::config(format!(
                "unknown storage backend '{other}'"
            )));
        }
    };
    log::info!("Publishing to {} backend", config.backend);
    Ok(Uploader::new(store, config.prefix.clone()))
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory object store recording every call.

    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Put(String),
        Delete(String),
    }

    #[derive(Default)]
    pub struct MemoryStore {
        pub objects: Mutex<BTreeMap<String, Vec<u8>>>,
        pub calls: Mutex<Vec<Call>>,
        /// Key whose put fails
        pub fail_on: Mutex<Option<String>>,
    }

    impl MemoryStore {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn take_calls(&self) -> Vec<Call> {
            std::mem::take(&mut *self.calls.lock().unwrap())
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn put_object(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<()> {
            if self.fail_on.lock().unwrap().as_deref() == Some(key) {
                return Err(AppError::store(key, "injected failure"));
            }
            self.calls.lock().unwrap().push(Call::Put(key.to_string()));
            self.objects.lock().unwrap().insert(key.to_string(), bytes);
            Ok(())
        }

        async fn delete_object(&self, key: &str) -> Result<()> {
            self.calls.lock().unwrap().push(Call::Delete(key.to_string()));
            self.objects.lock().unwrap().remove(key);
            Ok(())
        }
    }
}
