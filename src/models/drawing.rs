//! Drawing record data structure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::Preview;

/// Canonical street address used as the snapshot index and file name.
pub type AddressKey = String;

/// Hex characters kept from the digest of `source_href`.
const CONTENT_HASH_LEN: usize = 7;

/// One scanned drawing, as stored in the per-address files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawingRecord {
    /// Address string as received from upstream
    #[serde(rename = "address")]
    pub raw_address: String,

    pub date: Option<String>,

    pub description: String,

    /// Short stable key derived from `source_href`
    #[serde(rename = "hash")]
    pub content_hash: String,

    /// Previews keyed by their size label
    #[serde(rename = "images")]
    pub previews_by_size: BTreeMap<String, Preview>,

    /// Upstream identity of the asset
    #[serde(rename = "originalHref")]
    pub source_href: String,
}

/// Short hex digest identifying a drawing by its upstream href.
///
/// The first characters of the MD5 digest, the key earlier snapshots
/// were published with.
pub fn content_hash(source_href: &str) -> String {
    let mut hash = format!("{:x}", md5::compute(source_href.as_bytes()));
    hash.truncate(CONTENT_HASH_LEN);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_short_and_stable() {
        let a = content_hash("/fotoweb/archives/5000/Laugavegur-22.tif.info");
        let b = content_hash("/fotoweb/archives/5000/Laugavegur-22.tif.info");
        let c = content_hash("/fotoweb/archives/5000/Laugavegur-24.tif.info");

        assert_eq!(a.len(), 7);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_content_hash_matches_published_keys() {
        assert_eq!(
            content_hash("/fotoweb/archives/5000-A%C3%B0aluppdr%C3%A6ttir/x.tif.info"),
            "c557f15"
        );
    }

    #[test]
    fn test_serialized_field_names() {
        let record = DrawingRecord {
            raw_address: "Laugavegur 22".into(),
            date: None,
            description: "Útlit".into(),
            content_hash: "abc1234".into(),
            previews_by_size: BTreeMap::new(),
            source_href: "/a".into(),
        };
        let value = serde_json::to_value(&record).unwrap();

        for key in ["address", "date", "description", "hash", "images", "originalHref"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert!(value["date"].is_null());
    }
}
