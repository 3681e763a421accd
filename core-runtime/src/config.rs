//! # Catalog Configuration
//!
//! Configuration for the catalog sync core, built with a builder and
//! validated fail-fast before anything is wired.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::CatalogConfig;
//! use std::time::Duration;
//!
//! let config = CatalogConfig::builder()
//!     .database_path("catalog.db")
//!     .store_url("https://shop.example.com/")
//!     .credentials("ck_live", "cs_live")
//!     .retry_delay(Duration::from_secs(10))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.remote.api_base(), "https://shop.example.com/wp-json/wc/v3");
//! ```
//!
//! ## Environment
//!
//! [`CatalogConfig::from_env`] reads:
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `WOOCOMMERCE_STORE_URL` | Store root URL |
//! | `WOOCOMMERCE_CONSUMER_KEY` | REST API consumer key |
//! | `WOOCOMMERCE_CONSUMER_SECRET` | REST API consumer secret |
//! | `WOOCOMMERCE_MOCK_MODE` | `true`/`1`/`yes`/`on` selects the in-memory catalog |
//! | `CATALOG_DATABASE_PATH` | SQLite file, or `:memory:` |
//! | `CATALOG_SYNC_WORKERS` | Propagation worker count |
//! | `CATALOG_RETRY_DELAY_SECS` | Delay between propagation attempts |
//!
//! Credentials are only required when mock mode is off.

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_STORE_URL: &str = "WOOCOMMERCE_STORE_URL";
pub const ENV_CONSUMER_KEY: &str = "WOOCOMMERCE_CONSUMER_KEY";
pub const ENV_CONSUMER_SECRET: &str = "WOOCOMMERCE_CONSUMER_SECRET";
pub const ENV_MOCK_MODE: &str = "WOOCOMMERCE_MOCK_MODE";
pub const ENV_DATABASE_PATH: &str = "CATALOG_DATABASE_PATH";
pub const ENV_SYNC_WORKERS: &str = "CATALOG_SYNC_WORKERS";
pub const ENV_RETRY_DELAY_SECS: &str = "CATALOG_RETRY_DELAY_SECS";

/// Largest page the WooCommerce REST API will return.
pub const MAX_REMOTE_PAGE_SIZE: u32 = 100;

/// Where the local catalog lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    InMemory,
}

impl DatabaseLocation {
    fn parse(raw: &str) -> Self {
        match raw.trim() {
            ":memory:" => DatabaseLocation::InMemory,
            path => DatabaseLocation::File(PathBuf::from(path)),
        }
    }
}

impl Default for DatabaseLocation {
    fn default() -> Self {
        DatabaseLocation::File(PathBuf::from("catalog.db"))
    }
}

/// Connection settings for the remote WooCommerce store.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Store root, without a trailing slash
    pub store_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    /// REST namespace, `wc/v3` unless overridden
    pub api_version: String,
    pub request_timeout: Duration,
    /// Use the in-memory catalog instead of the network
    pub mock_mode: bool,
}

impl RemoteConfig {
    /// `{store_url}/wp-json/{api_version}`
    pub fn api_base(&self) -> String {
        format!("{}/wp-json/{}", self.store_url, self.api_version)
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Remote request timeout must be greater than zero".to_string(),
            ));
        }

        if self.mock_mode {
            return Ok(());
        }

        if self.store_url.is_empty() {
            return Err(Error::Config(format!(
                "Store URL is required unless mock mode is enabled. Set {}.",
                ENV_STORE_URL
            )));
        }
        if !(self.store_url.starts_with("https://") || self.store_url.starts_with("http://")) {
            return Err(Error::Config(format!(
                "Store URL must start with http:// or https://: {}",
                self.store_url
            )));
        }
        if self.consumer_key.trim().is_empty() || self.consumer_secret.trim().is_empty() {
            return Err(Error::Config(format!(
                "Consumer key and secret are required unless mock mode is enabled. Set {} and {}.",
                ENV_CONSUMER_KEY, ENV_CONSUMER_SECRET
            )));
        }
        if self.api_version.trim().is_empty() {
            return Err(Error::Config("API version cannot be empty".to_string()));
        }

        Ok(())
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            store_url: String::new(),
            consumer_key: String::new(),
            consumer_secret: String::new(),
            api_version: "wc/v3".to_string(),
            request_timeout: Duration::from_secs(40),
            mock_mode: false,
        }
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("store_url", &self.store_url)
            .field("consumer_key", &"[REDACTED]")
            .field("consumer_secret", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .field("request_timeout", &self.request_timeout)
            .field("mock_mode", &self.mock_mode)
            .finish()
    }
}

/// Reconcile and propagation tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// `per_page` used when pulling the remote catalog
    pub reconcile_page_size: u32,
    /// Attempts per propagation before it is marked permanently failed
    pub max_attempts: u32,
    /// Fixed delay between propagation attempts
    pub retry_delay: Duration,
    /// Propagation worker pool size
    pub worker_count: usize,
    /// How often idle workers re-check the queue for delayed retries
    pub poll_interval: Duration,
}

impl SyncSettings {
    pub fn validate(&self) -> Result<()> {
        if self.reconcile_page_size == 0 || self.reconcile_page_size > MAX_REMOTE_PAGE_SIZE {
            return Err(Error::Config(format!(
                "Reconcile page size must be between 1 and {}",
                MAX_REMOTE_PAGE_SIZE
            )));
        }
        if self.max_attempts == 0 {
            return Err(Error::Config(
                "Max propagation attempts must be at least 1".to_string(),
            ));
        }
        if self.worker_count == 0 {
            return Err(Error::Config(
                "Worker count must be at least 1".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::Config(
                "Queue poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            reconcile_page_size: MAX_REMOTE_PAGE_SIZE,
            max_attempts: 3,
            retry_delay: Duration::from_secs(10),
            worker_count: 1,
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Complete configuration for the catalog sync core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    pub database: DatabaseLocation,
    pub remote: RemoteConfig,
    pub sync: SyncSettings,
    pub event_buffer_size: usize,
}

impl CatalogConfig {
    pub fn builder() -> CatalogConfigBuilder {
        CatalogConfigBuilder::default()
    }

    /// Load from the process environment. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup.
    ///
    /// ```
    /// use core_runtime::config::CatalogConfig;
    ///
    /// let config = CatalogConfig::from_lookup(|key| match key {
    ///     "WOOCOMMERCE_MOCK_MODE" => Some("true".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    /// assert!(config.remote.mock_mode);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(url) = lookup(ENV_STORE_URL) {
            builder = builder.store_url(url);
        }
        if let Some(key) = lookup(ENV_CONSUMER_KEY) {
            builder = builder.consumer_key(key);
        }
        if let Some(secret) = lookup(ENV_CONSUMER_SECRET) {
            builder = builder.consumer_secret(secret);
        }
        if let Some(flag) = lookup(ENV_MOCK_MODE) {
            builder = builder.mock_mode(parse_flag(&flag));
        }
        if let Some(path) = lookup(ENV_DATABASE_PATH) {
            builder = builder.database(DatabaseLocation::parse(&path));
        }
        if let Some(workers) = lookup(ENV_SYNC_WORKERS) {
            builder = builder.worker_count(parse_number(ENV_SYNC_WORKERS, &workers)?);
        }
        if let Some(secs) = lookup(ENV_RETRY_DELAY_SECS) {
            let secs: u64 = parse_number(ENV_RETRY_DELAY_SECS, &secs)?;
            builder = builder.retry_delay(Duration::from_secs(secs));
        }

        builder.build()
    }

    pub fn validate(&self) -> Result<()> {
        if let DatabaseLocation::File(path) = &self.database {
            if path.as_os_str().is_empty() {
                return Err(Error::Config("Database path cannot be empty".to_string()));
            }
        }
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than zero".to_string(),
            ));
        }
        self.remote.validate()?;
        self.sync.validate()
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a number, got {:?}", name, raw)))
}

/// Builder for [`CatalogConfig`]
#[derive(Debug, Default)]
pub struct CatalogConfigBuilder {
    database: Option<DatabaseLocation>,
    remote: RemoteConfig,
    sync: SyncSettings,
    event_buffer_size: Option<usize>,
}

impl CatalogConfigBuilder {
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database = Some(DatabaseLocation::File(path.into()));
        self
    }

    pub fn in_memory_database(mut self) -> Self {
        self.database = Some(DatabaseLocation::InMemory);
        self
    }

    pub fn database(mut self, location: DatabaseLocation) -> Self {
        self.database = Some(location);
        self
    }

    /// Trailing slashes are dropped.
    pub fn store_url(mut self, url: impl Into<String>) -> Self {
        self.remote.store_url = url.into().trim().trim_end_matches('/').to_string();
        self
    }

    pub fn consumer_key(mut self, key: impl Into<String>) -> Self {
        self.remote.consumer_key = key.into();
        self
    }

    pub fn consumer_secret(mut self, secret: impl Into<String>) -> Self {
        self.remote.consumer_secret = secret.into();
        self
    }

    pub fn credentials(self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.consumer_key(key).consumer_secret(secret)
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.remote.api_version = version.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.remote.request_timeout = timeout;
        self
    }

    pub fn mock_mode(mut self, enabled: bool) -> Self {
        self.remote.mock_mode = enabled;
        self
    }

    pub fn reconcile_page_size(mut self, size: u32) -> Self {
        self.sync.reconcile_page_size = size;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.sync.max_attempts = attempts;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.sync.retry_delay = delay;
        self
    }

    pub fn worker_count(mut self, count: usize) -> Self {
        self.sync.worker_count = count;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.sync.poll_interval = interval;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Build and validate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid setting.
    pub fn build(self) -> Result<CatalogConfig> {
        let config = CatalogConfig {
            database: self.database.unwrap_or_default(),
            remote: self.remote,
            sync: self.sync,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_in_mock_mode() {
        let config = CatalogConfig::builder().mock_mode(true).build().unwrap();

        assert_eq!(config.database, DatabaseLocation::File("catalog.db".into()));
        assert_eq!(config.remote.api_version, "wc/v3");
        assert_eq!(config.remote.request_timeout, Duration::from_secs(40));
        assert_eq!(config.sync.reconcile_page_size, 100);
        assert_eq!(config.sync.max_attempts, 3);
        assert_eq!(config.sync.retry_delay, Duration::from_secs(10));
        assert_eq!(config.sync.worker_count, 1);
    }

    #[test]
    fn test_credentials_required_without_mock_mode() {
        let result = CatalogConfig::builder()
            .store_url("https://shop.example.com")
            .build();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("Consumer key")));

        let result = CatalogConfig::builder().credentials("ck", "cs").build();
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("Store URL")));
    }

    #[test]
    fn test_store_url_trailing_slash_stripped() {
        let config = CatalogConfig::builder()
            .store_url("https://shop.example.com//")
            .credentials("ck", "cs")
            .build()
            .unwrap();
        assert_eq!(config.remote.store_url, "https://shop.example.com");
        assert_eq!(
            config.remote.api_base(),
            "https://shop.example.com/wp-json/wc/v3"
        );
    }

    #[test]
    fn test_rejects_non_http_url() {
        let result = CatalogConfig::builder()
            .store_url("ftp://shop.example.com")
            .credentials("ck", "cs")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_sync_settings_validation() {
        let base = || CatalogConfig::builder().mock_mode(true);
        assert!(base().reconcile_page_size(0).build().is_err());
        assert!(base().reconcile_page_size(101).build().is_err());
        assert!(base().max_attempts(0).build().is_err());
        assert!(base().worker_count(0).build().is_err());
        assert!(base().poll_interval(Duration::ZERO).build().is_err());
        assert!(base().request_timeout(Duration::ZERO).build().is_err());
        assert!(base().event_buffer_size(0).build().is_err());
    }

    #[test]
    fn test_from_lookup() {
        let config = CatalogConfig::from_lookup(lookup_from(&[
            (ENV_STORE_URL, "https://shop.example.com/"),
            (ENV_CONSUMER_KEY, "ck_abc"),
            (ENV_CONSUMER_SECRET, "cs_def"),
            (ENV_DATABASE_PATH, ":memory:"),
            (ENV_SYNC_WORKERS, "4"),
            (ENV_RETRY_DELAY_SECS, "2"),
        ]))
        .unwrap();

        assert!(!config.remote.mock_mode);
        assert_eq!(config.remote.store_url, "https://shop.example.com");
        assert_eq!(config.remote.consumer_key, "ck_abc");
        assert_eq!(config.database, DatabaseLocation::InMemory);
        assert_eq!(config.sync.worker_count, 4);
        assert_eq!(config.sync.retry_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_from_lookup_mock_flag_variants() {
        for raw in ["true", "1", "YES", " on "] {
            let config =
                CatalogConfig::from_lookup(lookup_from(&[(ENV_MOCK_MODE, raw)])).unwrap();
            assert!(config.remote.mock_mode, "{raw} should enable mock mode");
        }

        // "false" leaves mock mode off, so the missing credentials fail validation
        assert!(CatalogConfig::from_lookup(lookup_from(&[(ENV_MOCK_MODE, "false")])).is_err());
    }

    #[test]
    fn test_from_lookup_rejects_bad_numbers() {
        let result = CatalogConfig::from_lookup(lookup_from(&[
            (ENV_MOCK_MODE, "true"),
            (ENV_SYNC_WORKERS, "many"),
        ]));
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains(ENV_SYNC_WORKERS)));
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let config = CatalogConfig::builder()
            .store_url("https://shop.example.com")
            .credentials("ck_visible", "cs_visible")
            .build()
            .unwrap();

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("ck_visible"));
        assert!(!rendered.contains("cs_visible"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
