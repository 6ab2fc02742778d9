// src/services/snapshot.rs

//! Re-keys upstream drawings by street address.
//!
//! A [`SnapshotBuilder`] lives for one crawl cycle and remembers every
//! `originalHref` it has accepted, so the descending and ascending passes
//! (which overlap) never file the same drawing twice.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use serde_json::Value;

use crate::models::{AddressKey, DrawingRecord, FieldConfig, RawDrawing, content_hash};
use crate::services::address::parse_address;

/// Why a listing item was left out of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Item does not have the expected asset shape
    Malformed(String),
    /// Item carries no metadata at all
    MissingMetadata,
    /// Neither the combined address nor street name plus number is present
    MissingAddress,
    /// Every parsed address was unusable as a file name
    NoUsableAddress(String),
    /// Already accepted earlier in this crawl
    Duplicate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Malformed(e) => write!(f, "malformed item: {e}"),
            SkipReason::MissingMetadata => f.write_str("missing metadata"),
            SkipReason::MissingAddress => f.write_str("missing address"),
            SkipReason::NoUsableAddress(a) => write!(f, "no usable address in `{a}`"),
            SkipReason::Duplicate => f.write_str("already ingested"),
        }
    }
}

/// Outcome of ingesting a single listing item.
#[derive(Debug, Clone, PartialEq)]
pub enum Ingested {
    Accepted {
        addresses: BTreeSet<AddressKey>,
        record: DrawingRecord,
    },
    Skipped(SkipReason),
}

/// Address-indexed drawings, in discovery order per address.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    addresses: BTreeMap<AddressKey, Vec<DrawingRecord>>,
}

impl Snapshot {
    pub fn insert(&mut self, address: AddressKey, record: DrawingRecord) {
        self.addresses.entry(address).or_default().push(record);
    }

    pub fn get(&self, address: &str) -> Option<&[DrawingRecord]> {
        self.addresses.get(address).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AddressKey, &Vec<DrawingRecord>)> {
        self.addresses.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// Counters for one ingested page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageStats {
    pub accepted: usize,
    pub duplicates: usize,
    pub skipped: usize,
}

/// Longest file name common filesystems accept, in bytes.
const MAX_FILE_NAME_BYTES: usize = 255;

/// Longest suffix an address file carries on disk (`.json.tmp` while written).
const ADDRESS_FILE_SUFFIX_BYTES: usize = ".json.tmp".len();

/// Whether an address key can be stored as `<key>.json` in one directory.
pub fn is_storable_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() + ADDRESS_FILE_SUFFIX_BYTES <= MAX_FILE_NAME_BYTES
        && key != "."
        && key != ".."
        && !key.contains(['/', '\\', '\0'])
}

/// Turns listing items into address-keyed drawing records.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    fields: FieldConfig,
    seen: HashSet<String>,
}

impl SnapshotBuilder {
    pub fn new(fields: FieldConfig) -> Self {
        Self::with_seen(fields, HashSet::new())
    }

    /// Resume a crawl whose already-stored drawings are `seen`.
    pub fn with_seen(fields: FieldConfig, seen: HashSet<String>) -> Self {
        Self { fields, seen }
    }

    pub fn fields(&self) -> &FieldConfig {
        &self.fields
    }

    /// Number of distinct drawings accepted in this crawl.
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Forget the drawings of a page so the next ingestion accepts them again.
    ///
    /// Returns how many of them had been accepted before.
    pub fn forget_page(&mut self, items: &[Value]) -> usize {
        items
            .iter()
            .filter_map(|item| item.get("href").and_then(Value::as_str))
            .filter(|href| self.seen.remove(*href))
            .count()
    }

    /// Convert one listing item, recording its identity on acceptance.
    pub fn ingest(&mut self, item: &Value) -> Ingested {
        let raw = match RawDrawing::from_value(item) {
            Ok(raw) => raw,
            Err(e) => return Ingested::Skipped(SkipReason::Malformed(e.to_string())),
        };

        if self.seen.contains(&raw.href) {
            return Ingested::Skipped(SkipReason::Duplicate);
        }

        let (addresses, record) = match self.convert(&raw) {
            Ok(converted) => converted,
            Err(reason) => return Ingested::Skipped(reason),
        };

        self.seen.insert(record.source_href.clone());
        Ingested::Accepted { addresses, record }
    }

    /// Ingest a whole page; skipped items are logged and never abort it.
    pub fn ingest_page(&mut self, items: &[Value], url: &str) -> (Snapshot, PageStats) {
        let mut snapshot = Snapshot::default();
        let mut stats = PageStats::default();

        for (i, item) in items.iter().enumerate() {
            match self.ingest(item) {
                Ingested::Accepted { addresses, record } => {
                    stats.accepted += 1;
                    for address in addresses {
                        snapshot.insert(address, record.clone());
                    }
                }
                Ingested::Skipped(SkipReason::Duplicate) => {
                    stats.duplicates += 1;
                    log::debug!("Item {i} of {url} already ingested");
                }
                Ingested::Skipped(reason) => {
                    stats.skipped += 1;
                    log::warn!("Skipping item {i} of {url}: {reason}");
                }
            }
        }

        (snapshot, stats)
    }

    fn convert(
        &self,
        raw: &RawDrawing,
    ) -> Result<(BTreeSet<AddressKey>, DrawingRecord), SkipReason> {
        if raw.metadata.is_empty() {
            return Err(SkipReason::MissingMetadata);
        }

        let address = self.extract_address(raw).ok_or(SkipReason::MissingAddress)?;

        let (addresses, rejected): (BTreeSet<_>, BTreeSet<_>) = parse_address(&address)
            .into_iter()
            .partition(|key| is_storable_key(key));
        if !rejected.is_empty() {
            log::warn!("Dropping unstorable addresses {rejected:?} for {}", raw.href);
        }
        if addresses.is_empty() {
            return Err(SkipReason::NoUsableAddress(address));
        }

        let description = raw
            .field(&self.fields.description)
            .unwrap_or_else(|| self.fields.description_placeholder.clone());

        let record = DrawingRecord {
            raw_address: address,
            date: raw.field(&self.fields.date),
            description,
            content_hash: content_hash(&raw.href),
            previews_by_size: raw
                .previews
                .iter()
                .map(|p| (p.size.to_string(), p.clone()))
                .collect(),
            source_href: raw.href.clone(),
        };

        Ok((addresses, record))
    }

    /// Combined address field first, else street name and house number.
    fn extract_address(&self, raw: &RawDrawing) -> Option<String> {
        if let Some(address) = raw.field(&self.fields.address) {
            return Some(address);
        }
        let street = raw.field(&self.fields.street_name)?;
        let number = raw.field(&self.fields.house_number)?;
        Some(format!("{street} {number}"))
    }
}
