//! Diff calculation between two snapshot directories.
//!
//! Address files are compared byte for byte against the previously
//! published copy; only added or changed files need uploading, and files
//! that vanished need deleting from the store.

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{AppError, Result};
use crate::storage::local::{address_file_name, list_address_keys, read_bytes};

/// Address-level difference between the current and previous snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressDiff {
    /// Present now, absent before
    pub added: Vec<String>,
    /// Present in both with different bytes
    pub changed: Vec<String>,
    /// Present in both with identical bytes
    pub unchanged: Vec<String>,
    /// Present before, absent now
    pub removed: Vec<String>,
}

impl AddressDiff {
    /// Check if there are any changes.
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.changed.is_empty() || !self.removed.is_empty()
    }

    /// Get the total number of changes.
    pub fn change_count(&self) -> usize {
        self.added.len() + self.changed.len() + self.removed.len()
    }

    /// Addresses whose file must be (re)uploaded.
    pub fn to_upload(&self) -> impl Iterator<Item = &String> {
        self.added.iter().chain(self.changed.iter())
    }
}

/// Compare the `addresses` directories of two snapshots.
///
/// A missing `previous_dir` means nothing was published yet.
pub async fn diff_address_dirs(current_dir: &Path, previous_dir: &Path) -> Result<AddressDiff> {
    let current = list_address_keys(current_dir).await?;
    let previous = list_address_keys(previous_dir).await?;

    let mut diff = AddressDiff {
        removed: removed_addresses(&previous, &current),
        ..AddressDiff::default()
    };

    for address in &current {
        if !previous.contains(address) {
            diff.added.push(address.clone());
            continue;
        }
        let file_name = address_file_name(address);
        let now = read_bytes(&current_dir.join(&file_name)).await?;
        let before = read_bytes(&previous_dir.join(&file_name)).await?;
        match (now, before) {
            (Some(now), Some(before)) if now == before => diff.unchanged.push(address.clone()),
            (Some(_), _) => diff.changed.push(address.clone()),
            (None, _) => {
                return Err(AppError::invariant(format!(
                    "address file {file_name} vanished while diffing"
                )));
            }
        }
    }

    Ok(diff)
}

/// Addresses present in `previous` but not in `current`.
pub fn removed_addresses(previous: &BTreeSet<String>, current: &BTreeSet<String>) -> Vec<String> {
    previous.difference(current).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::local::write_bytes;
    use tempfile::TempDir;

    async fn put(dir: &Path, address: &str, body: &str) {
        write_bytes(&dir.join(address_file_name(address)), body.as_bytes())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_no_changes() {
        let tmp = TempDir::new().unwrap();
        let (cur, prev) = (tmp.path().join("cur"), tmp.path().join("prev"));
        put(&cur, "Gata 1", "[1]").await;
        put(&prev, "Gata 1", "[1]").await;

        let diff = diff_address_dirs(&cur, &prev).await.unwrap();
        assert!(!diff.has_changes());
        assert_eq!(diff.unchanged, vec!["Gata 1"]);
        assert_eq!(diff.to_upload().count(), 0);
    }

    #[tokio::test]
    async fn test_mixed_changes() {
        let tmp = TempDir::new().unwrap();
        let (cur, prev) = (tmp.path().join("cur"), tmp.path().join("prev"));
        put(&cur, "Keep 1", "[1]").await;
        put(&prev, "Keep 1", "[1]").await;
        put(&cur, "Update 2", "[1,2]").await;
        put(&prev, "Update 2", "[1]").await;
        put(&prev, "Remove 3", "[1]").await;
        put(&cur, "New 4", "[1]").await;

        let diff = diff_address_dirs(&cur, &prev).await.unwrap();
        assert_eq!(diff.added, vec!["New 4"]);
        assert_eq!(diff.changed, vec!["Update 2"]);
        assert_eq!(diff.unchanged, vec!["Keep 1"]);
        assert_eq!(diff.removed, vec!["Remove 3"]);
        assert_eq!(diff.change_count(), 3);
        assert_eq!(
            diff.to_upload().cloned().collect::<Vec<_>>(),
            vec!["New 4".to_string(), "Update 2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_nothing_published_yet() {
        let tmp = TempDir::new().unwrap();
        let cur = tmp.path().join("cur");
        put(&cur, "Gata 1", "[1]").await;

        let diff = diff_address_dirs(&cur, &tmp.path().join("missing")).await.unwrap();
        assert_eq!(diff.added, vec!["Gata 1"]);
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn test_removed_addresses() {
        let previous: BTreeSet<String> = ["A 1", "A 3"].iter().map(|s| s.to_string()).collect();
        let current: BTreeSet<String> = ["A 1"].iter().map(|s| s.to_string()).collect();
        assert_eq!(removed_addresses(&previous, &current), vec!["A 3"]);
    }
}
