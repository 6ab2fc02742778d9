//! Index artifacts published next to the address files.

use serde::{Deserialize, Serialize};

/// One row of the address catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressEntry {
    pub address: String,

    /// Lower-cased, diacritic-folded form used for search
    pub normalized: String,

    /// Number of drawings filed under the address
    pub count: usize,

    /// `[latitude, longitude]` when the address was geocoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<[f64; 2]>,
}

/// Geographic bounding box over every geocoded address.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
}

impl CoordBounds {
    /// Inverted box that any coordinate widens; published as-is when
    /// nothing could be geocoded.
    pub const EMPTY: CoordBounds = CoordBounds {
        lat_min: 1000.0,
        lat_max: -1000.0,
        lng_min: 1000.0,
        lng_max: -1000.0,
    };

    pub fn include(&mut self, lat: f64, lng: f64) {
        self.lat_min = self.lat_min.min(lat);
        self.lat_max = self.lat_max.max(lat);
        self.lng_min = self.lng_min.min(lng);
        self.lng_max = self.lng_max.max(lng);
    }

    pub fn is_empty(&self) -> bool {
        self.lat_min > self.lat_max
    }
}

impl Default for CoordBounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_over_two_points() {
        let mut bounds = CoordBounds::EMPTY;
        assert!(bounds.is_empty());

        bounds.include(64.1, -21.9);
        bounds.include(64.0, -22.0);

        assert!(!bounds.is_empty());
        assert_eq!(
            bounds,
            CoordBounds {
                lat_min: 64.0,
                lat_max: 64.1,
                lng_min: -22.0,
                lng_max: -21.9,
            }
        );
    }

    #[test]
    fn test_entry_omits_missing_coords() {
        let entry = AddressEntry {
            address: "Ljósaland 3".into(),
            normalized: "ljosaland 3".into(),
            count: 2,
            coords: None,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("coords"));
    }
}
