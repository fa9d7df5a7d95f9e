//! # Application Configuration
//!
//! Provides configuration management for the episode sync engine.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct an `AppConfig`.
//! Every value has a default, so an empty builder produces a working setup that
//! scrapes the filler list into `episodes.db`. Values can then be overridden
//! from `EPISODE_SYNC_*` environment variables and finally from CLI flags.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{AppConfig, SourceKind};
//!
//! let config = AppConfig::builder()
//!     .database_path("/var/lib/episodes.db")
//!     .source(SourceKind::EpisodeApi)
//!     .batch_size(250)
//!     .build()?;
//! ```
//!
//! ## Environment Overrides
//!
//! | Variable | Field |
//! |---|---|
//! | `EPISODE_SYNC_DATABASE` | `database_path` |
//! | `EPISODE_SYNC_SOURCE` | `source` |
//! | `EPISODE_SYNC_SOURCE_URL` | `source_url` |
//! | `EPISODE_SYNC_HTTP_TIMEOUT_SECS` | `http_timeout_secs` |
//! | `EPISODE_SYNC_BATCH_SIZE` | `batch_size` |
//! | `EPISODE_SYNC_ID_PAGE_SIZE` | `id_page_size` |
//! | `EPISODE_SYNC_FETCH_CONCURRENCY` | `fetch_concurrency` |
//! | `EPISODE_SYNC_TIMEOUT_SECS` | `sync_timeout_secs` |
//! | `EPISODE_SYNC_ID_RANGE` | `id_range` (`start..end`) |
//! | `EPISODE_SYNC_LOG_FORMAT` | `logging.format` |
//! | `EPISODE_SYNC_LOG_LEVEL` | `logging.level` |

use crate::error::{Error, Result};
use crate::logging::{LogFormat, LogLevel, LoggingConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_DATABASE_PATH: &str = "episodes.db";
pub const DEFAULT_FILLER_LIST_URL: &str = "https://www.animefillerlist.com/shows/one-piece";
pub const DEFAULT_EPISODE_API_URL: &str = "https://api.api-onepiece.com/v2";

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_ID_PAGE_SIZE: u32 = 1000;
pub const DEFAULT_FETCH_CONCURRENCY: usize = 5;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 3600;

const MAX_BATCH_SIZE: usize = 10_000;
const MAX_ID_PAGE_SIZE: u32 = 100_000;
const MAX_FETCH_CONCURRENCY: usize = 64;
/// Most ids a per-id fetch may request in one run
pub const MAX_ID_RANGE_LEN: u64 = 10_000;

const ENV_PREFIX: &str = "EPISODE_SYNC_";

// ============================================================================
// Source Selection
// ============================================================================

/// Which upstream the episode list is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// HTML episode table scraper
    #[default]
    FillerList,
    /// JSON episode API
    EpisodeApi,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::FillerList => "filler-list",
            SourceKind::EpisodeApi => "episode-api",
        }
    }

    /// URL used when none is configured
    pub fn default_url(&self) -> &'static str {
        match self {
            SourceKind::FillerList => DEFAULT_FILLER_LIST_URL,
            SourceKind::EpisodeApi => DEFAULT_EPISODE_API_URL,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "filler-list" | "fillerlist" | "html" => Ok(SourceKind::FillerList),
            "episode-api" | "api" | "json" => Ok(SourceKind::EpisodeApi),
            other => Err(Error::Config(format!(
                "Unknown source '{}'. Expected 'filler-list' or 'episode-api'",
                other
            ))),
        }
    }
}

// ============================================================================
// Id Range
// ============================================================================

/// Inclusive episode id range used by per-id fetching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRange {
    pub start: i64,
    pub end: i64,
}

impl IdRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Number of ids covered, saturating at `u64::MAX` for the full `i64` span
    pub fn len(&self) -> u64 {
        if self.end < self.start {
            return 0;
        }
        self.end
            .checked_sub(self.start)
            .and_then(|span| u64::try_from(span).ok())
            .and_then(|span| span.checked_add(1))
            .unwrap_or(u64::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for IdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl FromStr for IdRange {
    type Err = Error;

    /// Parses `start..end` or `start..=end`; both bounds are inclusive.
    fn from_str(s: &str) -> Result<Self> {
        let (start, end) = s
            .split_once("..=")
            .or_else(|| s.split_once(".."))
            .ok_or_else(|| {
                Error::Config(format!("Invalid id range '{}'. Expected 'start..end'", s))
            })?;

        let parse = |part: &str| {
            part.trim()
                .parse::<i64>()
                .map_err(|e| Error::Config(format!("Invalid id range bound '{}': {}", part, e)))
        };

        Ok(Self::new(parse(start)?, parse(end)?))
    }
}

// ============================================================================
// AppConfig
// ============================================================================

/// Top-level configuration for a sync deployment.
///
/// Use [`AppConfig::builder`] to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Path to the SQLite database file, or `:memory:`
    pub database_path: PathBuf,

    /// Upstream the candidates are read from
    pub source: SourceKind,

    /// Page URL for the scraper or base URL for the API
    pub source_url: String,

    /// Per-request HTTP timeout
    pub http_timeout_secs: u64,

    /// Records per committed batch
    pub batch_size: usize,

    /// Ids per page when scanning the existing store
    pub id_page_size: u32,

    /// Maximum in-flight per-id fetches
    pub fetch_concurrency: usize,

    /// Upper bound for a whole run
    pub sync_timeout_secs: u64,

    /// When set, the API source fetches these ids individually instead of the listing
    pub id_range: Option<IdRange>,

    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let source = SourceKind::default();
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            source,
            source_url: source.default_url().to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
            id_page_size: DEFAULT_ID_PAGE_SIZE,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            sync_timeout_secs: DEFAULT_SYNC_TIMEOUT_SECS,
            id_range: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Creates a new builder for constructing an `AppConfig`.
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Defaults overlaid with `EPISODE_SYNC_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is set but malformed, or the
    /// resulting configuration fails validation.
    pub fn from_env() -> Result<Self> {
        Self::builder()
            .apply_env(|key| std::env::var(key).ok())?
            .build()
    }

    /// Whether the database lives only in memory
    pub fn is_in_memory(&self) -> bool {
        let path = self.database_path.to_string_lossy();
        path == ":memory:" || path.starts_with("sqlite::memory:")
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database path and source URL are not empty
    /// - Batch size, page size and concurrency are within bounds
    /// - Timeouts are non-zero
    /// - An id range, when present, is ordered
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.source_url.trim().is_empty() {
            return Err(Error::Config("Source URL cannot be empty".to_string()));
        }

        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(Error::Config(format!(
                "Batch size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, self.batch_size
            )));
        }

        if self.id_page_size == 0 || self.id_page_size > MAX_ID_PAGE_SIZE {
            return Err(Error::Config(format!(
                "Id page size must be between 1 and {}, got {}",
                MAX_ID_PAGE_SIZE, self.id_page_size
            )));
        }

        if self.fetch_concurrency == 0 || self.fetch_concurrency > MAX_FETCH_CONCURRENCY {
            return Err(Error::Config(format!(
                "Fetch concurrency must be between 1 and {}, got {}",
                MAX_FETCH_CONCURRENCY, self.fetch_concurrency
            )));
        }

        if self.http_timeout_secs == 0 {
            return Err(Error::Config(
                "HTTP timeout must be greater than 0 seconds".to_string(),
            ));
        }

        if self.sync_timeout_secs == 0 {
            return Err(Error::Config(
                "Sync timeout must be greater than 0 seconds".to_string(),
            ));
        }

        if let Some(range) = self.id_range {
            if range.start > range.end {
                return Err(Error::Config(format!(
                    "Id range start ({}) must not exceed end ({})",
                    range.start, range.end
                )));
            }
            if range.len() > MAX_ID_RANGE_LEN {
                return Err(Error::Config(format!(
                    "Id range {} covers {} ids, at most {} allowed",
                    range,
                    range.len(),
                    MAX_ID_RANGE_LEN
                )));
            }
        }

        Ok(())
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`AppConfig`]. Unset fields fall back to their defaults.
#[derive(Debug, Default, Clone)]
pub struct AppConfigBuilder {
    database_path: Option<PathBuf>,
    source: Option<SourceKind>,
    source_url: Option<String>,
    http_timeout_secs: Option<u64>,
    batch_size: Option<usize>,
    id_page_size: Option<u32>,
    fetch_concurrency: Option<usize>,
    sync_timeout_secs: Option<u64>,
    id_range: Option<IdRange>,
    log_format: Option<LogFormat>,
    log_level: Option<LogLevel>,
    log_filter: Option<String>,
}

impl AppConfigBuilder {
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Selects the source. The URL follows the source unless set explicitly.
    pub fn source(mut self, source: SourceKind) -> Self {
        self.source = Some(source);
        self
    }

    pub fn source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn http_timeout_secs(mut self, secs: u64) -> Self {
        self.http_timeout_secs = Some(secs);
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn id_page_size(mut self, size: u32) -> Self {
        self.id_page_size = Some(size);
        self
    }

    pub fn fetch_concurrency(mut self, limit: usize) -> Self {
        self.fetch_concurrency = Some(limit);
        self
    }

    pub fn sync_timeout_secs(mut self, secs: u64) -> Self {
        self.sync_timeout_secs = Some(secs);
        self
    }

    pub fn id_range(mut self, range: IdRange) -> Self {
        self.id_range = Some(range);
        self
    }

    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.log_format = Some(format);
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    /// Overlays environment values read through `lookup`.
    ///
    /// Taking the lookup as a closure keeps tests away from process-global state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the variable when a value cannot be parsed.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty())
        };

        if let Some(path) = var("DATABASE") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(source) = var("SOURCE") {
            self.source = Some(source.parse()?);
        }
        if let Some(url) = var("SOURCE_URL") {
            self.source_url = Some(url);
        }
        if let Some(value) = var("HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = Some(parse_env("HTTP_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = var("BATCH_SIZE") {
            self.batch_size = Some(parse_env("BATCH_SIZE", &value)?);
        }
        if let Some(value) = var("ID_PAGE_SIZE") {
            self.id_page_size = Some(parse_env("ID_PAGE_SIZE", &value)?);
        }
        if let Some(value) = var("FETCH_CONCURRENCY") {
            self.fetch_concurrency = Some(parse_env("FETCH_CONCURRENCY", &value)?);
        }
        if let Some(value) = var("TIMEOUT_SECS") {
            self.sync_timeout_secs = Some(parse_env("TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = var("ID_RANGE") {
            self.id_range = Some(value.parse()?);
        }
        if let Some(value) = var("LOG_FORMAT") {
            self.log_format = Some(value.parse()?);
        }
        if let Some(value) = var("LOG_LEVEL") {
            self.log_level = Some(value.parse()?);
        }

        Ok(self)
    }

    /// Builds the final `AppConfig` instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the assembled configuration fails
    /// [`AppConfig::validate`].
    pub fn build(self) -> Result<AppConfig> {
        let defaults = AppConfig::default();
        let source = self.source.unwrap_or(defaults.source);

        let mut logging = defaults.logging;
        if let Some(format) = self.log_format {
            logging.format = format;
        }
        if let Some(level) = self.log_level {
            logging.level = level;
        }
        logging.filter = self.log_filter;

        let config = AppConfig {
            database_path: self.database_path.unwrap_or(defaults.database_path),
            source,
            source_url: self
                .source_url
                .unwrap_or_else(|| source.default_url().to_string()),
            http_timeout_secs: self.http_timeout_secs.unwrap_or(defaults.http_timeout_secs),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            id_page_size: self.id_page_size.unwrap_or(defaults.id_page_size),
            fetch_concurrency: self.fetch_concurrency.unwrap_or(defaults.fetch_concurrency),
            sync_timeout_secs: self.sync_timeout_secs.unwrap_or(defaults.sync_timeout_secs),
            id_range: self.id_range,
            logging,
        };

        config.validate()?;

        Ok(config)
    }
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| {
        Error::Config(format!(
            "Invalid value '{}' for {}{}: {}",
            value, ENV_PREFIX, name, e
        ))
    })
}
