//! End-to-end ingestion run.
//!
//! Discovery and detail fetching run as background tasks feeding bounded
//! streams. Writers drain those streams in four stages so that rows a later
//! relation refers to are committed first:
//!
//! 1. `movie`, `cinema_person`
//! 2. `movie_actor`, `movie_director`
//! 3. `movie_genre`, `movie_country`, `release_country`
//! 4. `local_release`
//!
//! Writers inside a stage run concurrently; a stage starts once every writer
//! of the previous stage has drained its stream. Streams of later stages must
//! therefore be large enough to hold what detail fetching produces while the
//! earlier stages are still draining.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::IngestConfig;
use crate::details::DetailFetcher;
use crate::discovery::Discovery;
use crate::error::Result;
use crate::rate_limit::RateLimiter;
use crate::report::{RunReport, RunStats};
use crate::store::CatalogStore;
use crate::streams::{record_channels, typed_channel};
use crate::tmdb::TmdbClient;
use crate::writer::BatchWriter;

pub struct Pipeline<S> {
    config: IngestConfig,
    store: Arc<S>,
}

impl<S: CatalogStore> Pipeline<S> {
    pub fn new(config: IngestConfig, store: Arc<S>) -> Self {
        Self { config, store }
    }

    /// Run one full ingestion.
    ///
    /// Fails only when the run cannot be set up; everything dropped along the
    /// way is accounted for in the returned report.
    pub async fn run(&self) -> Result<RunReport> {
        self.config.validate()?;
        let started = Instant::now();

        let limiter = Arc::new(RateLimiter::per_second(
            self.config.source.requests_per_second,
            self.config.source.rate_limit_max_wait(),
        )?);
        let client = TmdbClient::new(self.config.source.clone(), Arc::clone(&limiter))?;
        let stats = Arc::new(RunStats::default());

        let capacities = &self.config.capacities;
        let (ids_tx, ids_rx) = typed_channel("movie_id", capacities.ids);
        let (senders, receivers) = record_channels(capacities);

        info!(
            requests_per_second = self.config.source.requests_per_second,
            batch_size = self.config.batch_size,
            page_limit = ?self.config.page_limit,
            start_date = ?self.config.source.start_date,
            end_date = ?self.config.source.end_date,
            "Starting ingestion run"
        );

        let discovery = Discovery::new(
            client.clone(),
            ids_tx,
            Arc::clone(&stats),
            self.config.page_concurrency,
            self.config.page_limit,
        )
        .with_fallback_total_pages(self.config.fallback_total_pages);
        let discovery_task = tokio::spawn(discovery.run());

        let details = DetailFetcher::new(
            client,
            senders,
            Arc::clone(&stats),
            self.config.detail_concurrency,
        );
        let details_task = tokio::spawn(details.run(ids_rx));

        let writer = BatchWriter::new(Arc::clone(&self.store), self.config.batch_size);

        info!(stage = 1, "Writing movies and people");
        let (movies, people) = tokio::join!(
            writer.run(receivers.movies),
            writer.run(receivers.people)
        );

        info!(stage = 2, "Writing cast and director links");
        let (actors, directors) = tokio::join!(
            writer.run(receivers.actors),
            writer.run(receivers.directors)
        );

        info!(stage = 3, "Writing genres, countries and release countries");
        let (genres, countries, release_countries) = tokio::join!(
            writer.run(receivers.genres),
            writer.run(receivers.countries),
            writer.run(receivers.release_countries)
        );

        info!(stage = 4, "Writing local releases");
        let local_releases = writer.run(receivers.local_releases).await;

        // Both have finished by now: every record stream is closed.
        join_background("discovery", discovery_task).await;
        join_background("details", details_task).await;

        let report = RunReport::new(
            &stats,
            limiter.timeouts(),
            vec![
                movies,
                people,
                actors,
                directors,
                genres,
                countries,
                release_countries,
                local_releases,
            ],
            started.elapsed(),
        );
        Ok(report)
    }
}

async fn join_background(task: &'static str, handle: JoinHandle<()>) {
    if let Err(e) = handle.await {
        error!(task, error = %e, "Background task aborted");
    }
}
