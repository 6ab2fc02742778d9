//! Address catalog and geographic bounds.
//!
//! The catalog lets clients search addresses without downloading every
//! address file; the bounds let a map open on the covered area.

use std::path::Path;

use crate::error::Result;
use crate::models::{AddressEntry, CoordBounds};
use crate::services::geocode::GeocodeTable;
use crate::storage::local::{list_address_keys, read_address_file};

/// Catalog built from one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub entries: Vec<AddressEntry>,
    pub bounds: CoordBounds,
    /// Entries with coordinates attached
    pub geocoded: usize,
}

impl Catalog {
    /// Build from `(address, drawing count)` pairs; entries are sorted.
    pub fn from_counts<I>(counts: I, geocode: &GeocodeTable) -> Self
    where
        I: IntoIterator<Item = (String, usize)>,
    {
        let mut bounds = CoordBounds::EMPTY;
        let mut geocoded = 0;

        let mut entries: Vec<AddressEntry> = counts
            .into_iter()
            .map(|(address, count)| {
                let coords = geocode.lookup(&address);
                if let Some([lat, lng]) = coords {
                    bounds.include(lat, lng);
                    geocoded += 1;
                }
                AddressEntry {
                    normalized: normalize(&address),
                    address,
                    count,
                    coords,
                }
            })
            .collect();
        entries.sort_by(|a, b| a.address.cmp(&b.address));

        Self {
            entries,
            bounds,
            geocoded,
        }
    }
}

/// Build the catalog for every address file in `addresses_dir`.
pub async fn build_catalog(addresses_dir: &Path, geocode: &GeocodeTable) -> Result<Catalog> {
    let mut counts = Vec::new();
    for address in list_address_keys(addresses_dir).await? {
        let drawings = read_address_file(addresses_dir, &address).await?;
        counts.push((address, drawings.len()));
    }
    Ok(Catalog::from_counts(counts, geocode))
}

/// Lower-case and fold Icelandic letters to ASCII for search.
pub fn normalize(address: &str) -> String {
    let mut out = String::with_capacity(address.len());
    for ch in address.chars().flat_map(char::to_lowercase) {
        match ch {
            'á' => out.push('a'),
            'é' => out.push('e'),
            'í' => out.push('i'),
            'ó' | 'ö' => out.push('o'),
            'ú' => out.push('u'),
            'ý' => out.push('y'),
            'þ' => out.push('t'),
            'æ' => out.push_str("ae"),
            'ð' => out.push('d'),
            other => out.push(other),
        }
    }
    out
}
