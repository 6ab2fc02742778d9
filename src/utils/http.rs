// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;

/// Create a configured asynchronous HTTP client for the listing API.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    let accept = HeaderValue::from_str(&config.accept)
        .map_err(|e| AppError::config(format!("invalid crawler.accept header: {e}")))?;
    headers.insert(ACCEPT, accept);

    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_with_defaults() {
        assert!(create_async_client(&CrawlerConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_header_with_newline() {
        let config = CrawlerConfig {
            accept: "application/json\r\nX-Evil: 1".into(),
            ..CrawlerConfig::default()
        };
        assert!(create_async_client(&config).is_err());
    }
}
