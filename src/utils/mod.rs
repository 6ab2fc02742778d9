//! Utility functions and helpers.

pub mod http;

use url::Url;

use crate::error::Result;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> Result<String> {
    Ok(base.join(href)?.to_string())
}

/// Resolve a URL string against a base URL string.
pub fn resolve(base_url: &str, href: &str) -> Result<String> {
    resolve_url(&Url::parse(base_url)?, href)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_absolute_path() {
        assert_eq!(
            resolve(
                "https://skjalasafn.reykjavik.is",
                "/fotoweb/archives/5000-A%C3%B0aluppdr%C3%A6ttir/;p=1"
            )
            .unwrap(),
            "https://skjalasafn.reykjavik.is/fotoweb/archives/5000-A%C3%B0aluppdr%C3%A6ttir/;p=1"
        );
    }

    #[test]
    fn test_resolve_keeps_absolute_url() {
        assert_eq!(
            resolve("https://example.com/path/", "https://other.com/x").unwrap(),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_resolve_rejects_bad_base() {
        assert!(resolve("not a url", "/x").is_err());
    }
}
