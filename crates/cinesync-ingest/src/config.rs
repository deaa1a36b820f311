//! Configuration management
//!
//! Everything is read from the process environment (after `.env` is loaded by
//! the binary). Command line flags are applied on top through the `with_*`
//! builders.

use std::fmt;
use std::time::Duration;

use chrono::NaiveDate;
use cinesync_common::env;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::error::{IngestError, Result};
use crate::records::{CatalogRecord, LocalReleaseRow, MovieRow, ReleaseCountryRow};

// ============================================================================
// Source Defaults
// ============================================================================

/// TMDB v3 API root.
pub const DEFAULT_TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";

/// Language requested for localized movie fields.
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Outbound requests admitted per second, shared by every fetcher.
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 40;

/// Per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Longest a fetcher waits on the rate limiter before going ahead anyway.
pub const DEFAULT_RATE_LIMIT_MAX_WAIT_SECS: u64 = 120;

// ============================================================================
// Pipeline Defaults
// ============================================================================

/// Records per committed batch.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Change-list pages fetched at once.
pub const DEFAULT_PAGE_CONCURRENCY: usize = 16;

/// Movie documents fetched at once.
pub const DEFAULT_DETAIL_CONCURRENCY: usize = 64;

/// Page count assumed when page 1 of the change list cannot be fetched.
/// TMDB serves at most 500 pages of changes.
pub const DEFAULT_FALLBACK_TOTAL_PAGES: u32 = 500;

/// PostgreSQL rejects statements with more bind parameters than this.
pub const POSTGRES_MAX_BIND_PARAMS: usize = 65_535;

// ============================================================================
// Database Defaults
// ============================================================================

pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 1;
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_POSTGRES_PORT: u16 = 5432;

/// Bearer token for the source API. Never printed.
#[derive(Clone)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(***)")
    }
}

/// Settings for the TMDB client and the limiter in front of it
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub base_url: String,
    pub access_token: ApiToken,
    pub language: String,
    pub request_timeout_secs: u64,
    pub requests_per_second: u32,
    pub rate_limit_max_wait_secs: u64,
    /// Lower bound of the change window (TMDB defaults to the last 24 hours)
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl SourceConfig {
    pub fn new(access_token: ApiToken) -> Self {
        Self {
            base_url: DEFAULT_TMDB_BASE_URL.to_string(),
            access_token,
            language: DEFAULT_LANGUAGE.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            rate_limit_max_wait_secs: DEFAULT_RATE_LIMIT_MAX_WAIT_SECS,
            start_date: None,
            end_date: None,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn rate_limit_max_wait(&self) -> Duration {
        Duration::from_secs(self.rate_limit_max_wait_secs)
    }
}

/// Capacity of every stream between pipeline stages.
///
/// Later writer stages only start once earlier ones finish, so their streams
/// have to absorb a whole run's worth of rows; the defaults are sized for a
/// full change window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamCapacities {
    pub ids: usize,
    pub movies: usize,
    pub people: usize,
    pub actors: usize,
    pub directors: usize,
    pub genres: usize,
    pub countries: usize,
    pub release_countries: usize,
    pub local_releases: usize,
}

impl Default for StreamCapacities {
    fn default() -> Self {
        Self {
            ids: 20_000,
            movies: 20_000,
            people: 200_000,
            actors: 100_000,
            directors: 100_000,
            genres: 50_000,
            countries: 100_000,
            release_countries: 1_000_000,
            local_releases: 1_000_000,
        }
    }
}

impl StreamCapacities {
    /// The same capacity for every stream (handy in tests)
    pub fn uniform(capacity: usize) -> Self {
        Self {
            ids: capacity,
            movies: capacity,
            people: capacity,
            actors: capacity,
            directors: capacity,
            genres: capacity,
            countries: capacity,
            release_countries: capacity,
            local_releases: capacity,
        }
    }

    fn all(&self) -> [usize; 9] {
        [
            self.ids,
            self.movies,
            self.people,
            self.actors,
            self.directors,
            self.genres,
            self.countries,
            self.release_countries,
            self.local_releases,
        ]
    }
}

/// Ingestion job configuration
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub source: SourceConfig,
    pub batch_size: usize,
    pub page_concurrency: usize,
    /// 0 lets every discovered id fetch at once (the limiter still applies)
    pub detail_concurrency: usize,
    /// Upper bound on change-list pages, for trial runs
    pub page_limit: Option<u32>,
    /// Pages walked when page 1 fails and the real count is unknown
    pub fallback_total_pages: u32,
    pub capacities: StreamCapacities,
}

impl IngestConfig {
    pub fn new(source: SourceConfig) -> Self {
        Self {
            source,
            batch_size: DEFAULT_BATCH_SIZE,
            page_concurrency: DEFAULT_PAGE_CONCURRENCY,
            detail_concurrency: DEFAULT_DETAIL_CONCURRENCY,
            page_limit: None,
            fallback_total_pages: DEFAULT_FALLBACK_TOTAL_PAGES,
            capacities: StreamCapacities::default(),
        }
    }

    /// Load configuration from the environment.
    ///
    /// `API_ACCESS_TOKEN` is required; everything else has a default. Values
    /// are parsed but not validated, so that command line overrides can still
    /// replace them; [`IngestConfig::validate`] runs when the pipeline starts.
    pub fn from_env() -> Result<Self> {
        let source = SourceConfig {
            base_url: env::var_or("TMDB_BASE_URL", DEFAULT_TMDB_BASE_URL),
            access_token: ApiToken::new(env::require("API_ACCESS_TOKEN")?),
            language: env::var_or("TMDB_LANGUAGE", DEFAULT_LANGUAGE),
            request_timeout_secs: env::parse_or("TMDB_REQUEST_TIMEOUT", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            requests_per_second: env::parse_or(
                "TMDB_REQUESTS_PER_SECOND",
                DEFAULT_REQUESTS_PER_SECOND,
            )?,
            rate_limit_max_wait_secs: env::parse_or(
                "RATE_LIMIT_MAX_WAIT",
                DEFAULT_RATE_LIMIT_MAX_WAIT_SECS,
            )?,
            start_date: env::parse_var("INGEST_START_DATE")?,
            end_date: env::parse_var("INGEST_END_DATE")?,
        };

        let config = Self {
            source,
            batch_size: env::parse_or("INGEST_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            page_concurrency: env::parse_or("INGEST_PAGE_CONCURRENCY", DEFAULT_PAGE_CONCURRENCY)?,
            detail_concurrency: env::parse_or(
                "INGEST_DETAIL_CONCURRENCY",
                DEFAULT_DETAIL_CONCURRENCY,
            )?,
            page_limit: env::parse_var("INGEST_PAGE_LIMIT")?,
            fallback_total_pages: env::parse_or(
                "INGEST_FALLBACK_TOTAL_PAGES",
                DEFAULT_FALLBACK_TOTAL_PAGES,
            )?,
            capacities: StreamCapacities::default(),
        };

        Ok(config)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = Some(limit);
        self
    }

    pub fn with_fallback_total_pages(mut self, pages: u32) -> Self {
        self.fallback_total_pages = pages;
        self
    }

    pub fn with_date_window(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        if start.is_some() {
            self.source.start_date = start;
        }
        if end.is_some() {
            self.source.end_date = end;
        }
        self
    }

    pub fn with_capacities(mut self, capacities: StreamCapacities) -> Self {
        self.capacities = capacities;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.source.base_url.is_empty() {
            return Err(IngestError::config("TMDB base URL cannot be empty"));
        }

        if self.source.requests_per_second == 0 {
            return Err(IngestError::config("Requests per second must be greater than 0"));
        }

        if self.batch_size == 0 {
            return Err(IngestError::config("Batch size must be greater than 0"));
        }

        let widest = [
            MovieRow::COLUMNS.len(),
            ReleaseCountryRow::COLUMNS.len(),
            LocalReleaseRow::COLUMNS.len(),
        ]
        .into_iter()
        .max()
        .unwrap_or(1);
        if self.batch_size * widest > POSTGRES_MAX_BIND_PARAMS {
            return Err(IngestError::config(format!(
                "Batch size {} exceeds the PostgreSQL limit of {} bind parameters ({} columns per row)",
                self.batch_size, POSTGRES_MAX_BIND_PARAMS, widest
            )));
        }

        if self.page_concurrency == 0 {
            return Err(IngestError::config("Page concurrency must be greater than 0"));
        }

        if self.page_limit == Some(0) {
            return Err(IngestError::config("Page limit must be greater than 0"));
        }

        if self.fallback_total_pages == 0 {
            return Err(IngestError::config("Fallback page count must be greater than 0"));
        }

        if let (Some(start), Some(end)) = (self.source.start_date, self.source.end_date) {
            if start > end {
                return Err(IngestError::config(format!(
                    "Start date {} is after end date {}",
                    start, end
                )));
            }
        }

        if self.capacities.all().contains(&0) {
            return Err(IngestError::config("Stream capacities must be greater than 0"));
        }

        Ok(())
    }
}

/// Where the relational store lives
#[derive(Clone)]
pub enum DbTarget {
    Url(String),
    Parts {
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
        ssl_mode: PgSslMode,
    },
}

impl fmt::Debug for DbTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbTarget::Url(_) => f.write_str("Url(***)"),
            DbTarget::Parts {
                host,
                port,
                user,
                database,
                ssl_mode,
                ..
            } => f
                .debug_struct("Parts")
                .field("host", host)
                .field("port", port)
                .field("user", user)
                .field("database", database)
                .field("ssl_mode", ssl_mode)
                .finish_non_exhaustive(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub target: DbTarget,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

impl DbConfig {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            target: DbTarget::Url(url.into()),
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
        }
    }

    /// Load from `DATABASE_URL`, or from the `POSTGRES_*` variables when it
    /// is not set.
    pub fn from_env() -> Result<Self> {
        let target = match env::var("DATABASE_URL") {
            Some(url) => DbTarget::Url(url),
            None => DbTarget::Parts {
                host: env::require("POSTGRES_HOST")?,
                port: env::parse_or("POSTGRES_PORT", DEFAULT_POSTGRES_PORT)?,
                user: env::require("POSTGRES_USER")?,
                password: env::require("POSTGRES_PASSWORD")?,
                database: env::require("POSTGRES_DATABASE")?,
                ssl_mode: env::parse_or("POSTGRES_SSLMODE", PgSslMode::Require)?,
            },
        };

        let config = Self {
            target,
            max_connections: env::parse_or(
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_DATABASE_MAX_CONNECTIONS,
            )?,
            min_connections: env::parse_or(
                "DATABASE_MIN_CONNECTIONS",
                DEFAULT_DATABASE_MIN_CONNECTIONS,
            )?,
            connect_timeout_secs: env::parse_or(
                "DATABASE_CONNECT_TIMEOUT",
                DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(IngestError::config("Database max_connections must be greater than 0"));
        }

        if self.min_connections > self.max_connections {
            return Err(IngestError::config(format!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.min_connections, self.max_connections
            )));
        }

        Ok(())
    }

    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        match &self.target {
            DbTarget::Url(url) => url
                .parse()
                .map_err(|e| IngestError::config(format!("Invalid DATABASE_URL: {}", e))),
            DbTarget::Parts {
                host,
                port,
                user,
                password,
                database,
                ssl_mode,
            } => Ok(PgConnectOptions::new()
                .host(host)
                .port(*port)
                .username(user)
                .password(password)
                .database(database)
                .ssl_mode(*ssl_mode)),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
