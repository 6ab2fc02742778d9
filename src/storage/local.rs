//! Local filesystem storage for crawl state and snapshots.
//!
//! ## Storage Layout
//!
//! ```text
//! {data_dir}/
//! ├── status.json                 # Crawl state, rewritten after every page
//! ├── Stadfangaskra.csv           # Geocoding table
//! ├── {scrape_id}/addresses/      # Snapshot being filled by the crawler
//! │   └── {address}.json
//! ├── last/                       # Finished snapshot awaiting publish
//! │   ├── addresses/
//! │   ├── addresses.json
//! │   └── coord-bounds.json
//! └── uploaded/                   # Snapshot the store currently mirrors
//! ```
//!
//! Every write goes to a `.tmp` sibling first and is renamed into place,
//! so readers only ever see complete files.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{CrawlState, DrawingRecord};
use crate::services::snapshot::{Snapshot, is_storable_key};

/// Directory holding per-address files inside a snapshot directory.
pub const ADDRESSES_DIR: &str = "addresses";
/// Finished snapshot handed from the crawler to the publisher.
pub const LAST_DIR: &str = "last";
/// Snapshot that was last published successfully.
pub const UPLOADED_DIR: &str = "uploaded";

const ADDRESS_FILE_EXT: &str = "json";

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    status_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        let root_dir = root_dir.into();
        let status_path = root_dir.join("status.json");
        Self {
            root_dir,
            status_path,
        }
    }

    /// Use a status file outside the default location.
    pub fn with_status_path(mut self, status_path: impl Into<PathBuf>) -> Self {
        self.status_path = status_path.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    pub fn status_path(&self) -> &Path {
        &self.status_path
    }

    pub fn scrape_dir(&self, scrape_id: &str) -> PathBuf {
        self.root_dir.join(scrape_id)
    }

    pub fn last_dir(&self) -> PathBuf {
        self.root_dir.join(LAST_DIR)
    }

    pub fn uploaded_dir(&self) -> PathBuf {
        self.root_dir.join(UPLOADED_DIR)
    }

    // --- Crawl state ---

    /// Read the status file; a missing file is a fresh state.
    pub async fn load_state(&self) -> Result<CrawlState> {
        let state: Option<CrawlState> = read_json(&self.status_path).await.map_err(|e| {
            AppError::invariant(format!(
                "unreadable status file {}: {e}",
                self.status_path.display()
            ))
        })?;
        Ok(state.unwrap_or_default())
    }

    pub async fn save_state(&self, state: &CrawlState) -> Result<()> {
        write_bytes(&self.status_path, &serde_json::to_vec(state)?).await
    }

    // --- Scrape directories ---

    /// Create the output directory of a new scrape; it must not exist yet.
    pub async fn create_scrape_dir(&self, scrape_id: &str) -> Result<PathBuf> {
        let dir = self.scrape_dir(scrape_id);
        tokio::fs::create_dir_all(&self.root_dir).await?;
        tokio::fs::create_dir(&dir).await.map_err(|e| {
            AppError::invariant(format!("cannot create scrape dir {}: {e}", dir.display()))
        })?;
        tokio::fs::create_dir(dir.join(ADDRESSES_DIR)).await?;
        Ok(dir)
    }

    /// Append every record of `snapshot` to its address file.
    ///
    /// Records whose `originalHref` an address file already holds are left
    /// out, so replaying a partially stored page adds only what is missing.
    pub async fn append_snapshot(&self, scrape_id: &str, snapshot: &Snapshot) -> Result<usize> {
        let addresses_dir = self.scrape_dir(scrape_id).join(ADDRESSES_DIR);
        let mut written = 0;
        for (address, records) in snapshot.iter() {
            append_records(&addresses_dir, address, records).await?;
            written += 1;
        }
        Ok(written)
    }

    /// Every `originalHref` already stored under a scrape directory.
    pub async fn stored_hrefs(&self, scrape_id: &str) -> Result<HashSet<String>> {
        let addresses_dir = self.scrape_dir(scrape_id).join(ADDRESSES_DIR);
        let mut hrefs = HashSet::new();
        for address in list_address_keys(&addresses_dir).await? {
            for record in read_address_file(&addresses_dir, &address).await? {
                hrefs.insert(record.source_href);
            }
        }
        Ok(hrefs)
    }

    /// Move a finished scrape directory to `last`.
    ///
    /// Refuses to overwrite an existing `last`: that snapshot has not been
    /// published yet.
    pub async fn promote_to_last(&self, scrape_id: &str) -> Result<()> {
        let scrape_dir = self.scrape_dir(scrape_id);
        let last_dir = self.last_dir();
        if tokio::fs::try_exists(&last_dir).await? {
            return Err(AppError::invariant(format!(
                "cannot rename current scrape dir, {} exists",
                last_dir.display()
            )));
        }
        if !tokio::fs::try_exists(&scrape_dir).await? {
            log::warn!("Scrape dir {} is missing, nothing to promote", scrape_dir.display());
            return Ok(());
        }
        log::info!(
            "Renaming current scrape dir: {} -> {}",
            scrape_dir.display(),
            last_dir.display()
        );
        tokio::fs::rename(&scrape_dir, &last_dir).await?;
        Ok(())
    }
}

/// Replace `target` with `source`, removing whatever `target` held.
pub async fn replace_dir(source: &Path, target: &Path) -> Result<()> {
    if tokio::fs::try_exists(target).await? {
        tokio::fs::remove_dir_all(target).await?;
    }
    tokio::fs::rename(source, target).await?;
    Ok(())
}

/// File name of an address key.
pub fn address_file_name(address: &str) -> String {
    format!("{address}.{ADDRESS_FILE_EXT}")
}

/// Address keys stored in an `addresses` directory, sorted.
///
/// A missing directory has no addresses.
pub async fn list_address_keys(addresses_dir: &Path) -> Result<BTreeSet<String>> {
    let mut keys = BTreeSet::new();
    let mut entries = match tokio::fs::read_dir(addresses_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(keys),
        Err(e) => return Err(AppError::Io(e)),
    };
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(ADDRESS_FILE_EXT) {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            return Err(AppError::invariant(format!(
                "address file name is not UTF-8: {}",
                path.display()
            )));
        };
        let key = &name[..name.len() - ADDRESS_FILE_EXT.len() - 1];
        keys.insert(key.to_string());
    }
    Ok(keys)
}

/// Read the records stored for one address.
pub async fn read_address_file(addresses_dir: &Path, address: &str) -> Result<Vec<DrawingRecord>> {
    let path = addresses_dir.join(address_file_name(address));
    let records: Option<Vec<DrawingRecord>> = read_json(&path).await.map_err(|e| match e {
        AppError::Json(e) => {
            AppError::invariant(format!("corrupt address file {}: {e}", path.display()))
        }
        e => e,
    })?;
    Ok(records.unwrap_or_default())
}

async fn append_records(
    addresses_dir: &Path,
    address: &str,
    records: &[DrawingRecord],
) -> Result<()> {
    if !is_storable_key(address) {
        return Err(AppError::invariant(format!(
            "address `{address}` cannot be stored as a file name"
        )));
    }
    let mut existing = read_address_file(addresses_dir, address).await?;
    let stored: HashSet<&str> = existing.iter().map(|r| r.source_href.as_str()).collect();
    let fresh: Vec<DrawingRecord> = records
        .iter()
        .filter(|r| !stored.contains(r.source_href.as_str()))
        .cloned()
        .collect();
    if fresh.is_empty() {
        return Ok(());
    }

    existing.extend(fresh);
    let path = addresses_dir.join(address_file_name(address));
    write_json(&path, &existing).await
}

/// Write bytes atomically (write to temp, then rename).
pub async fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Write JSON data.
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    write_bytes(path, &bytes).await
}

/// Read bytes, returning None if file doesn't exist.
pub async fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Io(e)),
    }
}

/// Read JSON data.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match read_bytes(path).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::models::Phase;
    use tempfile::TempDir;

    fn record(href: &str) -> DrawingRecord {
        DrawingRecord {
            raw_address: "Gata 1".into(),
            date: None,
            description: "Útlit".into(),
            content_hash: crate::models::content_hash(href),
            previews_by_size: BTreeMap::new(),
            source_href: href.into(),
        }
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/test.txt");

        write_bytes(&path, b"hello").await.unwrap();
        assert_eq!(read_bytes(&path).await.unwrap(), Some(b"hello".to_vec()));
        assert!(!tmp.path().join("nested/test.txt.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        assert!(read_bytes(&tmp.path().join("nope.txt")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_state_round_trip_and_default() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert_eq!(storage.load_state().await.unwrap(), CrawlState::default());

        let state = CrawlState {
            scrape_id: Some("2026-10-15-08-00-00".into()),
            phase: Phase::FetchDescending,
            next_url: Some("https://example.com/;p=3".into()),
        };
        storage.save_state(&state).await.unwrap();
        assert_eq!(storage.load_state().await.unwrap(), state);
    }

    #[tokio::test]
    async fn test_corrupt_status_is_an_invariant_error() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        write_bytes(storage.status_path(), br#"{"phase":"upwards"}"#).await.unwrap();

        assert!(matches!(storage.load_state().await, Err(AppError::Invariant(_))));
    }

    #[tokio::test]
    async fn test_append_keeps_order_and_lists_keys() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        storage.create_scrape_dir("s1").await.unwrap();

        let mut first = Snapshot::default();
        first.insert("Gata 1".into(), record("/a"));
        first.insert("Sundahöfn 1.3".into(), record("/b"));
        storage.append_snapshot("s1", &first).await.unwrap();

        let mut second = Snapshot::default();
        second.insert("Gata 1".into(), record("/c"));
        storage.append_snapshot("s1", &second).await.unwrap();

        let dir = storage.scrape_dir("s1").join(ADDRESSES_DIR);
        let keys = list_address_keys(&dir).await.unwrap();
        assert_eq!(
            keys.into_iter().collect::<Vec<_>>(),
            vec!["Gata 1".to_string(), "Sundahöfn 1.3".to_string()]
        );

        let hrefs: Vec<_> = read_address_file(&dir, "Gata 1")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.source_href)
            .collect();
        assert_eq!(hrefs, vec!["/a", "/c"]);

        let stored = storage.stored_hrefs("s1").await.unwrap();
        assert_eq!(stored.len(), 3);
    }

    #[tokio::test]
    async fn test_replayed_append_adds_only_missing_records() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        storage.create_scrape_dir("s1").await.unwrap();

        let mut partial = Snapshot::default();
        partial.insert("Gata 1".into(), record("/a"));
        storage.append_snapshot("s1", &partial).await.unwrap();

        let mut replay = Snapshot::default();
        replay.insert("Gata 1".into(), record("/a"));
        replay.insert("Gata 1".into(), record("/b"));
        replay.insert("Gata 3".into(), record("/a"));
        storage.append_snapshot("s1", &replay).await.unwrap();
        storage.append_snapshot("s1", &replay).await.unwrap();

        let dir = storage.scrape_dir("s1").join(ADDRESSES_DIR);
        let hrefs = |records: Vec<DrawingRecord>| {
            records.into_iter().map(|r| r.source_href).collect::<Vec<_>>()
        };
        assert_eq!(hrefs(read_address_file(&dir, "Gata 1").await.unwrap()), vec!["/a", "/b"]);
        assert_eq!(hrefs(read_address_file(&dir, "Gata 3").await.unwrap()), vec!["/a"]);
    }

    #[tokio::test]
    async fn test_corrupt_address_file_is_an_invariant_error() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join(ADDRESSES_DIR);
        write_bytes(&dir.join("Gata 1.json"), b"[{").await.unwrap();

        assert!(matches!(
            read_address_file(&dir, "Gata 1").await,
            Err(AppError::Invariant(_))
        ));
    }

    #[tokio::test]
    async fn test_unreadable_address_file_keeps_io_error() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join(ADDRESSES_DIR);
        // A directory where the file should be fails the read itself.
        tokio::fs::create_dir_all(dir.join("Gata 1.json")).await.unwrap();

        assert!(matches!(
            read_address_file(&dir, "Gata 1").await,
            Err(AppError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_create_scrape_dir_twice_fails() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        storage.create_scrape_dir("s1").await.unwrap();
        assert!(storage.create_scrape_dir("s1").await.is_err());
    }

    #[tokio::test]
    async fn test_unstorable_key_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        storage.create_scrape_dir("s1").await.unwrap();

        let mut snapshot = Snapshot::default();
        snapshot.insert("a/b".into(), record("/a"));
        assert!(matches!(
            storage.append_snapshot("s1", &snapshot).await,
            Err(AppError::Invariant(_))
        ));
    }

    #[tokio::test]
    async fn test_promote_refuses_existing_last() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        storage.create_scrape_dir("s1").await.unwrap();
        storage.promote_to_last("s1").await.unwrap();
        assert!(storage.last_dir().join(ADDRESSES_DIR).exists());
        assert!(!storage.scrape_dir("s1").exists());

        storage.create_scrape_dir("s2").await.unwrap();
        assert!(matches!(
            storage.promote_to_last("s2").await,
            Err(AppError::Invariant(_))
        ));
        assert!(storage.scrape_dir("s2").exists());
    }

    #[tokio::test]
    async fn test_replace_dir_drops_old_target() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        write_bytes(&storage.uploaded_dir().join("old.txt"), b"old").await.unwrap();
        write_bytes(&storage.last_dir().join("new.txt"), b"new").await.unwrap();

        replace_dir(&storage.last_dir(), &storage.uploaded_dir()).await.unwrap();

        assert!(!storage.last_dir().exists());
        assert!(storage.uploaded_dir().join("new.txt").exists());
        assert!(!storage.uploaded_dir().join("old.txt").exists());
    }
}
