//! Movie detail fetching.
//!
//! Consumes the id stream, fetches each movie with its embedded credits and
//! release dates, decomposes it and pushes the records onto the typed streams.
//! A movie that fails anywhere along the way is logged and dropped whole.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc::Receiver;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};

use crate::decompose::decompose;
use crate::error::Result;
use crate::report::RunStats;
use crate::streams::RecordSenders;
use crate::tmdb::TmdbClient;

#[derive(Clone)]
pub struct DetailFetcher {
    client: TmdbClient,
    senders: RecordSenders,
    stats: Arc<RunStats>,
    concurrency: usize,
}

impl DetailFetcher {
    /// `concurrency` of 0 leaves in-flight fetches bounded only by the limiter
    pub fn new(client: TmdbClient, senders: RecordSenders, stats: Arc<RunStats>, concurrency: usize) -> Self {
        Self {
            client,
            senders,
            stats,
            concurrency,
        }
    }

    /// Fetch, decompose and emit one movie
    pub async fn process(&self, movie_id: i32) -> Result<()> {
        let document = self.client.fetch_movie(movie_id).await?;
        let decomposed = decompose(&document)?;
        let records = decomposed.record_count();
        self.senders.emit(decomposed).await?;

        debug!(movie_id, records, "Emitted movie");
        Ok(())
    }

    /// Process every id until the id stream closes, then close the record
    /// streams.
    pub async fn run(self, ids: Receiver<i32>) {
        let limit = if self.concurrency == 0 {
            usize::MAX
        } else {
            self.concurrency
        };
        info!(concurrency = self.concurrency, "Fetching movie details");

        let mut movies = ReceiverStream::new(ids)
            .map(|movie_id| {
                let fetcher = self.clone();
                tokio::spawn(async move { (movie_id, fetcher.process(movie_id).await) })
            })
            .buffer_unordered(limit);

        while let Some(joined) = movies.next().await {
            match joined {
                Ok((_, Ok(()))) => {
                    self.stats.movie_decomposed();
                    continue;
                },
                Ok((movie_id, Err(e))) => {
                    error!(movie_id, error = %e, "Failed to ingest movie, dropping it");
                },
                Err(e) => error!(error = %e, "Movie task aborted"),
            }
            self.stats.movie_dropped();
        }

        info!(
            decomposed = self.stats.movies_decomposed(),
            dropped = self.stats.movies_dropped(),
            "Detail fetching complete"
        );
    }
}
