//! Shared helpers for the ingestion integration tests
//!
//! - [`TestPostgres`]: PostgreSQL container with catalog migrations applied
//! - [`TmdbFixture`]: mock TMDB server serving change pages and movie documents

#![allow(dead_code)]

use std::time::Duration;

use anyhow::{Context, Result};
use cinesync_ingest::config::{ApiToken, SourceConfig, StreamCapacities};
use cinesync_ingest::IngestConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::info;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
    connection_string: String,
}

impl TestPostgres {
    /// Start a PostgreSQL container and apply the catalog migrations
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let connection_string = format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            _container: container,
            pool,
            connection_string,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    pub async fn count(&self, relation: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", relation))
            .fetch_one(&self.pool)
            .await
            .unwrap_or(-1)
    }
}

// ============================================================================
// Mock TMDB
// ============================================================================

pub struct TmdbFixture {
    pub server: MockServer,
}

impl TmdbFixture {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Serve change page `page` listing `ids` (all non-adult)
    pub async fn changes_page(&self, page: u32, total_pages: u32, ids: &[i32]) {
        let results: Vec<_> = ids
            .iter()
            .map(|id| serde_json::json!({"id": id, "adult": false}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/movie/changes"))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": results,
                "page": page,
                "total_pages": total_pages,
                "total_results": ids.len()
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn movie(&self, document: serde_json::Value) {
        let id = document["id"].as_i64().unwrap_or_default();
        Mock::given(method("GET"))
            .and(path(format!("/movie/{}", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(document))
            .mount(&self.server)
            .await;
    }

    pub async fn failing_movie(&self, id: i32, status: u16) {
        Mock::given(method("GET"))
            .and(path(format!("/movie/{}", id)))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Pipeline configuration pointed at this server
    pub fn config(&self) -> IngestConfig {
        let mut source = SourceConfig::new(ApiToken::new("test-token"));
        source.base_url = self.server.uri();
        source.requests_per_second = 1000;
        IngestConfig::new(source)
            .with_batch_size(2)
            .with_fallback_total_pages(3)
            .with_capacities(StreamCapacities::uniform(1024))
    }
}

/// A movie with `cast` actors, one director and one release country with a
/// single local release
pub fn movie_document(id: i32, title: &str, cast: &[(i32, &str)]) -> serde_json::Value {
    let cast: Vec<_> = cast
        .iter()
        .map(|(person, name)| serde_json::json!({"id": person, "name": name}))
        .collect();
    serde_json::json!({
        "id": id,
        "title": title,
        "original_title": title,
        "original_language": "en",
        "popularity": 3.5,
        "runtime": 101,
        "budget": 2500000,
        "release_date": "2020-01-01",
        "genres": [{"id": 18, "name": "Drama"}],
        "production_countries": [{"iso_3166_1": "US", "name": "United States of America"}],
        "credits": {
            "cast": cast,
            "crew": [{"id": 900 + id, "name": "Director", "job": "Director"}]
        },
        "release_dates": {"results": [{
            "iso_3166_1": "US",
            "release_dates": [{
                "certification": "PG",
                "note": "",
                "release_date": "2020-01-01T00:00:00.000Z",
                "type": 3
            }]
        }]}
    })
}

pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cinesync_ingest=debug,sqlx=warn")),
        )
        .with_test_writer()
        .try_init();
}
