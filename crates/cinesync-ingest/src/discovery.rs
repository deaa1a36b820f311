//! Change-list discovery.
//!
//! Page 1 is fetched alone to learn how many pages the change window has; the
//! remaining pages are then fetched concurrently. When page 1 fails the walk
//! assumes a fallback page count instead. Every non-adult id lands on the id
//! stream, which closes when discovery finishes.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::config::DEFAULT_FALLBACK_TOTAL_PAGES;
use crate::error::Result;
use crate::report::RunStats;
use crate::streams::TypedSender;
use crate::tmdb::TmdbClient;

#[derive(Clone)]
pub struct Discovery {
    client: TmdbClient,
    ids: TypedSender<i32>,
    stats: Arc<RunStats>,
    page_concurrency: usize,
    page_limit: Option<u32>,
    fallback_total_pages: u32,
}

impl Discovery {
    pub fn new(
        client: TmdbClient,
        ids: TypedSender<i32>,
        stats: Arc<RunStats>,
        page_concurrency: usize,
        page_limit: Option<u32>,
    ) -> Self {
        Self {
            client,
            ids,
            stats,
            page_concurrency: page_concurrency.max(1),
            page_limit,
            fallback_total_pages: DEFAULT_FALLBACK_TOTAL_PAGES,
        }
    }

    /// Page count to walk when page 1 cannot be fetched
    pub fn with_fallback_total_pages(mut self, pages: u32) -> Self {
        self.fallback_total_pages = pages.max(1);
        self
    }

    /// Fetch one change-list page and forward its non-adult ids.
    ///
    /// Returns the total page count the source reported.
    pub async fn fetch_page(&self, page: u32) -> Result<u32> {
        let changes = self.client.fetch_changes_page(page).await?;

        let mut forwarded = 0u64;
        for id in changes.non_adult_ids() {
            self.ids.send(id).await?;
            forwarded += 1;
        }
        let adult = changes.results.len() as u64 - forwarded;
        self.stats.page_fetched(forwarded, adult);

        debug!(page, ids = forwarded, adult, "Fetched change page");
        Ok(changes.total_pages)
    }

    /// Walk every page of the change window, then close the id stream.
    pub async fn run(self) {
        let total_pages = match self.fetch_page(1).await {
            Ok(total) => {
                self.stats.set_total_pages(total);
                total
            },
            Err(e) => {
                warn!(
                    page = 1,
                    error = %e,
                    fallback_pages = self.fallback_total_pages,
                    "Failed to fetch first change page, assuming the fallback page count"
                );
                self.stats.page_dropped();
                self.fallback_total_pages
            },
        };

        let last_page = match self.page_limit {
            Some(limit) => total_pages.min(limit),
            None => total_pages,
        };
        info!(
            total_pages,
            last_page,
            concurrency = self.page_concurrency,
            "Discovering changed movies"
        );

        let mut pages = stream::iter(2..=last_page)
            .map(|page| {
                let discovery = self.clone();
                tokio::spawn(async move { (page, discovery.fetch_page(page).await) })
            })
            .buffer_unordered(self.page_concurrency);

        let mut failed = 0usize;
        while let Some(joined) = pages.next().await {
            match joined {
                Ok((_, Ok(_))) => continue,
                Ok((page, Err(e))) => {
                    error!(page, error = %e, "Failed to fetch change page, dropping it");
                },
                Err(e) => error!(error = %e, "Change page task aborted"),
            }
            self.stats.page_dropped();
            failed += 1;
        }

        info!(
            pages = last_page,
            failed,
            ids = self.stats.ids_discovered(),
            "Discovery complete"
        );
        // Dropping self releases the id sender
    }
}
