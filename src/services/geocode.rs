// src/services/geocode.rs

//! Address → coordinate lookup backed by the national address registry.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::error::{AppError, Result};

const REQUIRED_COLUMNS: [&str; 5] = [
    "HEITI_NF",
    "HUSNR",
    "POSTNR",
    "N_HNIT_WGS84",
    "E_HNIT_WGS84",
];

/// One registry row; only the columns the lookup needs.
#[derive(Debug, Deserialize)]
struct RegistryRow {
    #[serde(rename = "HEITI_NF")]
    street: String,
    #[serde(rename = "HUSNR")]
    house_number: String,
    #[serde(rename = "POSTNR")]
    postcode: String,
    #[serde(rename = "N_HNIT_WGS84")]
    lat: String,
    #[serde(rename = "E_HNIT_WGS84")]
    lng: String,
}

/// Exact-match table keyed by `"<street name> <house number>"`.
#[derive(Debug, Clone, Default)]
pub struct GeocodeTable {
    coords: HashMap<String, [f64; 2]>,
}

impl GeocodeTable {
    /// Load the registry CSV, keeping rows whose postcode is below
    /// `max_postcode`. A missing file yields an empty table.
    pub async fn load(path: &Path, max_postcode: u32) -> Result<Self> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!(
                    "Geocode table not found at {}, publishing without coordinates",
                    path.display()
                );
                return Ok(Self::default());
            }
            Err(e) => return Err(AppError::Io(e)),
        };
        let table = Self::from_reader(bytes.as_slice(), max_postcode)?;
        log::info!("Loaded {} geocoded addresses from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R, max_postcode: u32) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = csv_reader.headers()?;
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                return Err(AppError::validation(format!(
                    "geocode table has no {column} column"
                )));
            }
        }

        let mut coords = HashMap::new();
        for row in csv_reader.deserialize::<RegistryRow>() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    log::debug!("Skipping geocode row: {e}");
                    continue;
                }
            };
            let Ok(postcode) = row.postcode.trim().parse::<u32>() else {
                continue;
            };
            if postcode >= max_postcode {
                continue;
            }
            let (Ok(lat), Ok(lng)) = (row.lat.trim().parse::<f64>(), row.lng.trim().parse::<f64>())
            else {
                log::debug!(
                    "Skipping geocode row without coordinates: {} {}",
                    row.street,
                    row.house_number
                );
                continue;
            };
            coords.insert(format!("{} {}", row.street, row.house_number), [lat, lng]);
        }

        Ok(Self { coords })
    }

    pub fn lookup(&self, address: &str) -> Option<[f64; 2]> {
        self.coords.get(address).copied()
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }
}

impl FromIterator<(String, [f64; 2])> for GeocodeTable {
    fn from_iter<I: IntoIterator<Item = (String, [f64; 2])>>(iter: I) -> Self {
        Self {
            coords: iter.into_iter().collect(),
        }
    }
}
