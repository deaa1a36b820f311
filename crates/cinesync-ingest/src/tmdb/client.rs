//! HTTP client for the TMDB API

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::models::{ChangesPage, MovieDocument};
use crate::config::SourceConfig;
use crate::error::{IngestError, Result};
use crate::rate_limit::RateLimiter;

/// Sub-documents embedded into every movie detail response
pub const APPEND_TO_RESPONSE: &str = "release_dates,credits";

/// Rate-limited, bearer-authenticated TMDB client.
///
/// Cheap to clone; clones share the connection pool and the limiter.
#[derive(Clone)]
pub struct TmdbClient {
    http: Client,
    config: Arc<SourceConfig>,
    limiter: Arc<RateLimiter>,
}

impl TmdbClient {
    pub fn new(config: SourceConfig, limiter: Arc<RateLimiter>) -> Result<Self> {
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", config.access_token.expose()))
            .map_err(|_| IngestError::config("API access token contains invalid header characters"))?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, bearer);

        let http = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("cinesync-ingest/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            config: Arc::new(config),
            limiter,
        })
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Fetch one page (1-based) of recently changed movies
    pub async fn fetch_changes_page(&self, page: u32) -> Result<ChangesPage> {
        let url = format!("{}/movie/changes", self.base_url());
        let mut query = vec![("page", page.to_string())];
        if let Some(start) = self.config.start_date {
            query.push(("start_date", start.to_string()));
        }
        if let Some(end) = self.config.end_date {
            query.push(("end_date", end.to_string()));
        }

        self.get_json(&url, &query).await
    }

    /// Fetch a movie with its credits and release dates embedded
    pub async fn fetch_movie(&self, movie_id: i32) -> Result<MovieDocument> {
        let url = format!("{}/movie/{}", self.base_url(), movie_id);
        let query = [
            ("append_to_response", APPEND_TO_RESPONSE.to_string()),
            ("language", self.config.language.clone()),
        ];

        self.get_json(&url, &query).await
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        self.limiter.acquire().await;

        debug!(url, "GET");
        let response = self.http.get(url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
