//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Upstream listing and request pacing
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Upstream metadata field keys
    #[serde(default)]
    pub fields: FieldConfig,

    /// Local data directory layout
    #[serde(default)]
    pub paths: PathsConfig,

    /// Geocoding lookup table filter
    #[serde(default)]
    pub geocode: GeocodeConfig,

    /// Publish target
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("crawler.base_url", &self.crawler.base_url),
            ("crawler.descending_url", &self.crawler.descending_url),
            ("crawler.ascending_url", &self.crawler.ascending_url),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::validation(format!("{name} is empty")));
            }
            url::Url::parse(value)
                .map_err(|e| AppError::validation(format!("{name} is not a URL: {e}")))?;
        }
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.fields.address.is_empty()
            || self.fields.street_name.is_empty()
            || self.fields.house_number.is_empty()
        {
            return Err(AppError::validation("fields: address keys must be set"));
        }
        if self.paths.data_dir.trim().is_empty() {
            return Err(AppError::validation("paths.data_dir is empty"));
        }
        match self.storage.backend.as_str() {
            "s3" => {
                if self.storage.bucket.trim().is_empty() {
                    return Err(AppError::validation(
                        "storage.bucket is required for the s3 backend",
                    ));
                }
            }
            "directory" => {
                if self.storage.directory.trim().is_empty() {
                    return Err(AppError::validation(
                        "storage.directory is required for the directory backend",
                    ));
                }
            }
            other => {
                return Err(AppError::validation(format!(
                    "unknown storage.backend '{other}'"
                )));
            }
        }
        Ok(())
    }

    /// Root of the local data directory.
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.paths.data_dir)
    }

    /// Location of the persisted crawl status file.
    pub fn status_path(&self) -> PathBuf {
        self.resolve(&self.paths.status_file)
    }

    /// Location of the geocoding CSV.
    pub fn geocode_path(&self) -> PathBuf {
        self.resolve(&self.paths.geocode_csv)
    }

    fn resolve(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir().join(path)
        }
    }
}

/// Upstream listing endpoints and request pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Base URL that relative `paging.next` links are resolved against
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// First page of the newest-first listing
    #[serde(default = "defaults::descending_url")]
    pub descending_url: String,

    /// First page of the oldest-first listing
    #[serde(default = "defaults::ascending_url")]
    pub ascending_url: String,

    /// Accept header sent with every listing request
    #[serde(default = "defaults::accept")]
    pub accept: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Pause between crawl iterations in milliseconds
    #[serde(default = "defaults::sleep_ms")]
    pub sleep_ms: u64,

    /// Wall-clock budget for one invocation in seconds
    #[serde(default = "defaults::run_for_secs")]
    pub run_for_secs: u64,

    /// Retries for a transient fetch failure before the run aborts
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// First retry delay in milliseconds, doubled on every attempt
    #[serde(default = "defaults::retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            descending_url: defaults::descending_url(),
            ascending_url: defaults::ascending_url(),
            accept: defaults::accept(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            sleep_ms: defaults::sleep_ms(),
            run_for_secs: defaults::run_for_secs(),
            max_retries: defaults::max_retries(),
            retry_base_delay_ms: defaults::retry_base_delay_ms(),
        }
    }
}

/// Metadata keys of the upstream asset records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    #[serde(default = "defaults::date_key")]
    pub date: String,

    #[serde(default = "defaults::street_name_key")]
    pub street_name: String,

    #[serde(default = "defaults::house_number_key")]
    pub house_number: String,

    /// Combined street name and number, preferred when present
    #[serde(default = "defaults::address_key")]
    pub address: String,

    #[serde(default = "defaults::description_key")]
    pub description: String,

    /// Stored when a drawing carries no description
    #[serde(default = "defaults::description_placeholder")]
    pub description_placeholder: String,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            date: defaults::date_key(),
            street_name: defaults::street_name_key(),
            house_number: defaults::house_number_key(),
            address: defaults::address_key(),
            description: defaults::description_key(),
            description_placeholder: defaults::description_placeholder(),
        }
    }
}

/// Local data directory layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::data_dir")]
    pub data_dir: String,

    /// Relative to `data_dir` unless absolute
    #[serde(default = "defaults::status_file")]
    pub status_file: String,

    /// Relative to `data_dir` unless absolute
    #[serde(default = "defaults::geocode_csv")]
    pub geocode_csv: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
            status_file: defaults::status_file(),
            geocode_csv: defaults::geocode_csv(),
        }
    }
}

/// Geocoding table filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeConfig {
    /// Rows with a postcode at or above this value are ignored
    #[serde(default = "defaults::max_postcode")]
    pub max_postcode: u32,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            max_postcode: defaults::max_postcode(),
        }
    }
}

/// Publish target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `s3` or `directory`
    #[serde(default = "defaults::backend")]
    pub backend: String,

    #[serde(default)]
    pub bucket: String,

    /// Key prefix inside the bucket (may be empty)
    #[serde(default)]
    pub prefix: String,

    /// Custom endpoint for S3-compatible stores
    #[serde(default)]
    pub endpoint_url: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    /// Target directory for the `directory` backend
    #[serde(default = "defaults::publish_directory")]
    pub directory: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: defaults::backend(),
            bucket: String::new(),
            prefix: String::new(),
            endpoint_url: None,
            region: None,
            directory: defaults::publish_directory(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,

    /// Append log lines to this file instead of stderr
    #[serde(default)]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            file: None,
        }
    }
}

mod defaults {
    // Crawler defaults
    pub fn base_url() -> String {
        "https://skjalasafn.reykjavik.is".into()
    }
    pub fn descending_url() -> String {
        "https://skjalasafn.reykjavik.is/fotoweb/archives/5000-A%C3%B0aluppdr%C3%A6ttir/".into()
    }
    pub fn ascending_url() -> String {
        "https://skjalasafn.reykjavik.is/fotoweb/archives/5000-A%C3%B0aluppdr%C3%A6ttir/;o=+"
            .into()
    }
    pub fn accept() -> String {
        "application/vnd.fotoware.assetlist+json, */*; q=0.01".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; teikningar/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn sleep_ms() -> u64 {
        3000
    }
    pub fn run_for_secs() -> u64 {
        3300
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn retry_base_delay_ms() -> u64 {
        1000
    }

    // Field defaults
    pub fn date_key() -> String {
        "30".into()
    }
    pub fn street_name_key() -> String {
        "203".into()
    }
    pub fn house_number_key() -> String {
        "204".into()
    }
    pub fn address_key() -> String {
        "210".into()
    }
    pub fn description_key() -> String {
        "214".into()
    }
    pub fn description_placeholder() -> String {
        "[Lýsingu vantar]".into()
    }

    // Path defaults
    pub fn data_dir() -> String {
        "data".into()
    }
    pub fn status_file() -> String {
        "status.json".into()
    }
    pub fn geocode_csv() -> String {
        "Stadfangaskra.csv".into()
    }

    pub fn max_postcode() -> u32 {
        200
    }

    // Storage defaults
    pub fn backend() -> String {
        "directory".into()
    }
    pub fn publish_directory() -> String {
        "public".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
