//! Raw shapes returned by the upstream asset listing API.
//!
//! Pages are decoded eagerly, but each item is kept as a JSON value until
//! [`RawDrawing::from_value`] converts it, so one malformed asset never
//! invalidates the rest of its page.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of the paginated listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingPage {
    #[serde(default)]
    pub data: Vec<Value>,

    #[serde(default)]
    pub paging: Option<Paging>,
}

impl ListingPage {
    /// Relative path of the following page, if upstream returned one.
    pub fn next_link(&self) -> Option<&str> {
        self.paging
            .as_ref()
            .and_then(|p| p.next.as_deref())
            .filter(|next| !next.trim().is_empty())
    }
}

/// Paging links of a listing page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub next: Option<String>,

    #[serde(default)]
    pub prev: Option<String>,
}

/// A single asset as delivered by upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDrawing {
    pub href: String,

    #[serde(default)]
    pub metadata: HashMap<String, MetadataField>,

    #[serde(default)]
    pub previews: Vec<Preview>,
}

impl RawDrawing {
    /// Decode one listing item.
    pub fn from_value(value: &Value) -> serde_json::Result<Self> {
        Self::deserialize(value)
    }

    /// Trimmed text of a metadata field, `None` when absent or blank.
    pub fn field(&self, key: &str) -> Option<String> {
        self.metadata
            .get(key)
            .and_then(MetadataField::text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

/// A metadata entry; upstream wraps every value in `{"value": ...}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataField {
    #[serde(default)]
    pub value: Value,
}

impl MetadataField {
    /// Text content; list-valued fields yield their first string.
    pub fn text(&self) -> Option<&str> {
        match &self.value {
            Value::String(s) => Some(s),
            Value::Array(items) => items.iter().find_map(Value::as_str),
            _ => None,
        }
    }
}

/// A rendered preview of a drawing at one size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    pub size: u32,
    pub width: u32,
    pub height: u32,
    pub href: String,
    #[serde(default)]
    pub square: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_with_next_link() {
        let page: ListingPage = serde_json::from_value(json!({
            "data": [{"href": "/a"}],
            "paging": {"next": "/fotoweb/archives/5000/;p=1", "prev": ""}
        }))
        .unwrap();

        assert_eq!(page.data.len(), 1);
        assert_eq!(page.next_link(), Some("/fotoweb/archives/5000/;p=1"));
    }

    #[test]
    fn test_blank_next_link_is_none() {
        let page: ListingPage =
            serde_json::from_value(json!({"data": [], "paging": {"next": ""}})).unwrap();
        assert_eq!(page.next_link(), None);
    }

    #[test]
    fn test_metadata_text_variants() {
        let drawing = RawDrawing::from_value(&json!({
            "href": "/fotoweb/archives/5000/1.tif.info",
            "metadata": {
                "210": {"value": "  Laugavegur 22  "},
                "214": {"value": ["Útlit", "Snið"]},
                "30": {"value": 1926},
                "203": {"value": "   "}
            }
        }))
        .unwrap();

        assert_eq!(drawing.field("210").as_deref(), Some("Laugavegur 22"));
        assert_eq!(drawing.field("214").as_deref(), Some("Útlit"));
        assert_eq!(drawing.field("30"), None);
        assert_eq!(drawing.field("203"), None);
        assert_eq!(drawing.field("999"), None);
    }

    #[test]
    fn test_item_without_href_is_rejected() {
        assert!(RawDrawing::from_value(&json!({"metadata": {}})).is_err());
    }
}
