//! Service layer for the harvester.
//!
//! This module contains the business logic for:
//! - Address parsing and range expansion (`parse_address`)
//! - Listing page fetching with retries (`HttpPageFetcher`)
//! - Converting listing items into drawing records (`SnapshotBuilder`)
//! - Street address geocoding (`GeocodeTable`)

pub mod address;
pub mod fetcher;
pub mod geocode;
pub mod snapshot;

pub use address::parse_address;
pub use fetcher::{HttpPageFetcher, PageFetcher};
pub use geocode::GeocodeTable;
pub use snapshot::{Snapshot, SnapshotBuilder};
