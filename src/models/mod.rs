// src/models/mod.rs

//! Domain models for the harvester.
//!
//! Upstream payload shapes live in `listing`; everything past the
//! ingestion boundary works with [`DrawingRecord`].

mod catalog;
mod config;
mod crawl_state;
mod drawing;
mod listing;

// Re-export all public types
pub use catalog::{AddressEntry, CoordBounds};
pub use config::{
    Config, CrawlerConfig, FieldConfig, GeocodeConfig, LoggingConfig, PathsConfig, StorageConfig,
};
pub use crawl_state::{CrawlState, Phase};
pub use drawing::{AddressKey, DrawingRecord, content_hash};
pub use listing::{ListingPage, MetadataField, Paging, Preview, RawDrawing};
