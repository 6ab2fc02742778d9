//! Incremental publication of the finished snapshot.
//!
//! Only address files whose bytes changed since the last publish are
//! uploaded; the catalog and bounds always are. `last` becomes `uploaded`
//! only after every store operation succeeded, so a failed publish is
//! retried in full next time.

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{Config, CoordBounds};
use crate::pipeline::catalog::build_catalog;
use crate::pipeline::diff::diff_address_dirs;
use crate::services::geocode::GeocodeTable;
use crate::storage::local::{
    ADDRESSES_DIR, address_file_name, read_bytes, replace_dir, write_bytes,
};
use crate::storage::{
    ADDRESS_INDEX_KEY, COORD_BOUNDS_KEY, LocalStorage, Uploader, uploader_from_config,
};

/// Summary of one publish invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishReport {
    /// False when there was no `last` snapshot
    pub published: bool,
    pub addresses: usize,
    pub uploaded: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub geocoded: usize,
    pub bounds: Option<CoordBounds>,
}

/// Publishes `last` to an object store and rotates it to `uploaded`.
pub struct PublishEngine {
    uploader: Uploader,
    geocode: GeocodeTable,
}

impl PublishEngine {
    pub fn new(uploader: Uploader, geocode: GeocodeTable) -> Self {
        Self { uploader, geocode }
    }

    pub async fn publish(&self, last_dir: &Path, uploaded_dir: &Path) -> Result<PublishReport> {
        if !tokio::fs::try_exists(last_dir).await? {
            log::info!("No new snapshot in {}, nothing to publish", last_dir.display());
            return Ok(PublishReport::default());
        }

        let current = last_dir.join(ADDRESSES_DIR);
        let previous = uploaded_dir.join(ADDRESSES_DIR);

        let catalog = build_catalog(&current, &self.geocode).await?;
        log::info!(
            "Catalog has {} addresses, {} geocoded",
            catalog.entries.len(),
            catalog.geocoded
        );
        let index_bytes = serde_json::to_vec(&catalog.entries)?;
        let bounds_bytes = serde_json::to_vec(&catalog.bounds)?;
        write_bytes(&last_dir.join(ADDRESS_INDEX_KEY), &index_bytes).await?;
        write_bytes(&last_dir.join(COORD_BOUNDS_KEY), &bounds_bytes).await?;

        let diff = diff_address_dirs(&current, &previous).await?;
        if diff.has_changes() {
            log::info!(
                "{} address changes: {} new, {} changed, {} removed, {} unchanged",
                diff.change_count(),
                diff.added.len(),
                diff.changed.len(),
                diff.removed.len(),
                diff.unchanged.len()
            );
        } else {
            log::info!("No address changes since the last publish, refreshing the index only");
        }

        let mut uploaded = 0;
        for address in diff.to_upload() {
            let file_name = address_file_name(address);
            let bytes = read_bytes(&current.join(&file_name)).await?.ok_or_else(|| {
                AppError::invariant(format!("address file {file_name} vanished before upload"))
            })?;
            self.uploader.upload_address_file(&file_name, bytes).await?;
            uploaded += 1;
        }

        self.uploader.upload_index_file(ADDRESS_INDEX_KEY, index_bytes).await?;
        self.uploader.upload_index_file(COORD_BOUNDS_KEY, bounds_bytes).await?;

        for address in &diff.removed {
            self.uploader
                .delete_address_file(&address_file_name(address))
                .await?;
        }

        replace_dir(last_dir, uploaded_dir).await?;
        log::info!("Published snapshot is now {}", uploaded_dir.display());

        Ok(PublishReport {
            published: true,
            addresses: catalog.entries.len(),
            uploaded,
            unchanged: diff.unchanged.len(),
            deleted: diff.removed.len(),
            geocoded: catalog.geocoded,
            bounds: Some(catalog.bounds),
        })
    }
}

/// Publish the data directory's `last` snapshot to the configured store.
pub async fn run_publisher(config: &Config) -> Result<PublishReport> {
    let storage = LocalStorage::new(config.data_dir());
    let geocode = GeocodeTable::load(&config.geocode_path(), config.geocode.max_postcode).await?;

    let uploader = uploader_from_config(&config.storage).await?;
    let engine = PublishEngine::new(uploader, geocode);
    let report = engine
        .publish(&storage.last_dir(), &storage.uploaded_dir())
        .await?;

    if report.published {
        log::info!(
            "Publish finished: {} addresses, {} uploaded, {} deleted",
            report.addresses,
            report.uploaded,
            report.deleted
        );
    }
    Ok(report)
}
