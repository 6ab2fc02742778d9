// src/services/fetcher.rs

//! Listing page fetcher.
//!
//! The crawl engine only sees the [`PageFetcher`] trait; the HTTP
//! implementation retries transient failures with exponential backoff
//! before giving up, and gives up loudly.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, ListingPage};
use crate::utils::http::create_async_client;

/// Upper bound for a single backoff pause.
const BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Source of listing pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch and decode the page at `url`.
    async fn fetch(&self, url: &str) -> Result<ListingPage>;
}

/// Fetches listing pages over HTTP.
pub struct HttpPageFetcher {
    client: Client,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl HttpPageFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            max_retries: config.max_retries,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
        })
    }

    async fn fetch_once(&self, url: &str) -> std::result::Result<ListingPage, Attempt> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Attempt::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("HTTP status {status}");
            return Err(if is_retryable(status) {
                Attempt::Transient(message)
            } else {
                Attempt::Fatal(message)
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| Attempt::Transient(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| Attempt::Fatal(format!("malformed page body: {e}")))
    }
}

/// Failure of a single request attempt.
enum Attempt {
    Transient(String),
    Fatal(String),
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<ListingPage> {
        let mut attempts = 0;
        let mut backoff = self.retry_base_delay;

        loop {
            log::debug!("GET {url}");
            match self.fetch_once(url).await {
                Ok(page) => return Ok(page),
                Err(Attempt::Fatal(message)) => return Err(AppError::fetch(url, message)),
                Err(Attempt::Transient(message)) => {
                    attempts += 1;
                    if attempts > self.max_retries {
                        return Err(AppError::fetch(
                            url,
                            format!("{message} (after {} retries)", self.max_retries),
                        ));
                    }
                    log::warn!(
                        "Fetch attempt {attempts} failed for {url}: {message}; retrying in {backoff:?}"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(BACKOFF_MAX);
                }
            }
        }
    }
}
