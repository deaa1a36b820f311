//! End-to-end pipeline runs against a mock TMDB and the in-memory store

mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cinesync_ingest::decompose::release_country_id;
use cinesync_ingest::records::{
    CatalogRecord, LocalReleaseRow, MovieActorRow, MovieCountryRow, MovieDirectorRow,
    MovieGenreRow, MovieRow, PersonRow, ReleaseCountryRow,
};
use cinesync_ingest::{CatalogStore, MemoryStore, Pipeline};
use common::{init_test_tracing, movie_document, TmdbFixture};

#[tokio::test]
async fn test_full_run_populates_every_relation() {
    init_test_tracing();
    let tmdb = TmdbFixture::start().await;
    tmdb.changes_page(1, 2, &[100, 200]).await;
    tmdb.changes_page(2, 2, &[300]).await;
    tmdb.movie(movie_document(100, "First", &[(1, "Ann"), (2, "Bo")])).await;
    tmdb.movie(movie_document(200, "Second", &[(2, "Bo")])).await;
    tmdb.movie(movie_document(300, "Third", &[])).await;

    let store = Arc::new(MemoryStore::new());
    let report = Pipeline::new(tmdb.config(), Arc::clone(&store))
        .run()
        .await
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.ids_discovered, 3);
    assert_eq!(report.movies_decomposed, 3);

    assert_eq!(store.count::<MovieRow>().await, 3);
    // Ann, Bo and one director per movie
    assert_eq!(store.count::<PersonRow>().await, 5);
    assert_eq!(store.count::<MovieActorRow>().await, 3);
    assert_eq!(store.count::<MovieDirectorRow>().await, 3);
    assert_eq!(store.count::<MovieGenreRow>().await, 3);
    assert_eq!(store.count::<MovieCountryRow>().await, 3);
    assert_eq!(store.count::<ReleaseCountryRow>().await, 3);
    assert_eq!(store.count::<LocalReleaseRow>().await, 3);

    let country = store
        .get::<ReleaseCountryRow>(&release_country_id(200, 0).unwrap())
        .await
        .unwrap();
    assert_eq!(country.movie_id, 200);
    let local = store.get::<LocalReleaseRow>(&country.id).await.unwrap();
    assert_eq!(local.release_country_id, country.id);
    assert_eq!(local.certification.as_deref(), Some("PG"));
}

#[tokio::test]
async fn test_failed_movie_is_dropped_without_failing_the_run() {
    init_test_tracing();
    let tmdb = TmdbFixture::start().await;
    tmdb.changes_page(1, 1, &[10, 11]).await;
    tmdb.movie(movie_document(10, "Kept", &[(5, "Cy")])).await;
    tmdb.failing_movie(11, 500).await;

    let store = Arc::new(MemoryStore::new());
    let report = Pipeline::new(tmdb.config(), Arc::clone(&store))
        .run()
        .await
        .unwrap();

    assert_eq!(report.movies_decomposed, 1);
    assert_eq!(report.movies_dropped, 1);
    assert!(!report.is_clean());
    assert_eq!(store.count::<MovieRow>().await, 1);
    assert!(store.get::<MovieRow>(&11).await.is_none());
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let tmdb = TmdbFixture::start().await;
    tmdb.changes_page(1, 1, &[42]).await;
    tmdb.movie(movie_document(42, "Again", &[(7, "Dee"), (8, "Eli")])).await;

    let store = Arc::new(MemoryStore::new());
    let pipeline = Pipeline::new(tmdb.config(), Arc::clone(&store));
    let first = pipeline.run().await.unwrap();
    let second = pipeline.run().await.unwrap();

    assert!(first.is_clean() && second.is_clean());
    assert_eq!(store.count::<MovieRow>().await, 1);
    assert_eq!(store.count::<PersonRow>().await, 3);
    assert_eq!(store.count::<MovieActorRow>().await, 2);
    assert_eq!(store.count::<LocalReleaseRow>().await, 1);

    // Only the upserted movie row is touched the second time
    assert_eq!(second.writer("movie").unwrap().rows_affected, 1);
    assert_eq!(second.writer("cinema_person").unwrap().rows_affected, 0);
}

#[tokio::test]
async fn test_page_limit_bounds_the_run() {
    let tmdb = TmdbFixture::start().await;
    tmdb.changes_page(1, 5, &[1]).await;
    tmdb.changes_page(2, 5, &[2]).await;
    tmdb.movie(movie_document(1, "One", &[])).await;
    tmdb.movie(movie_document(2, "Two", &[])).await;

    let store = Arc::new(MemoryStore::new());
    let report = Pipeline::new(tmdb.config().with_page_limit(1), Arc::clone(&store))
        .run()
        .await
        .unwrap();

    assert_eq!(report.total_pages, 5);
    assert_eq!(report.pages_fetched, 1);
    assert_eq!(store.count::<MovieRow>().await, 1);
}

#[tokio::test]
async fn test_unreachable_first_page_still_walks_fallback_pages() {
    init_test_tracing();
    let tmdb = TmdbFixture::start().await;
    // Page 1 is not served; the fixture config falls back to 3 pages
    tmdb.changes_page(2, 3, &[21]).await;
    tmdb.changes_page(3, 3, &[31, 32]).await;
    tmdb.movie(movie_document(21, "Twenty One", &[])).await;
    tmdb.movie(movie_document(31, "Thirty One", &[])).await;
    tmdb.movie(movie_document(32, "Thirty Two", &[])).await;

    let store = Arc::new(MemoryStore::new());
    let report = Pipeline::new(tmdb.config(), Arc::clone(&store))
        .run()
        .await
        .unwrap();

    assert_eq!(report.pages_dropped, 1);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.total_pages, 0);
    assert_eq!(report.ids_discovered, 3);
    assert_eq!(report.movies_decomposed, 3);
    assert!(!report.is_clean());
    assert_eq!(store.count::<MovieRow>().await, 3);
}

#[tokio::test]
async fn test_invalid_config_fails_before_fetching() {
    let tmdb = TmdbFixture::start().await;
    let config = tmdb.config().with_batch_size(0);

    let result = Pipeline::new(config, Arc::new(MemoryStore::new())).run().await;

    assert!(result.is_err());
}

/// Memory store that records which relation each committed batch went to
#[derive(Default)]
struct RecordingStore {
    inner: MemoryStore,
    commits: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl CatalogStore for RecordingStore {
    async fn write_batch<R: CatalogRecord>(&self, batch: &[R]) -> cinesync_ingest::Result<u64> {
        let affected = self.inner.write_batch(batch).await?;
        self.commits.lock().unwrap().push(R::RELATION);
        Ok(affected)
    }
}

fn writer_stage(relation: &str) -> u8 {
    match relation {
        "movie" | "cinema_person" => 1,
        "movie_actor" | "movie_director" => 2,
        "movie_genre" | "movie_country" | "release_country" => 3,
        "local_release" => 4,
        other => panic!("unexpected relation {}", other),
    }
}

#[tokio::test]
async fn test_writer_stages_commit_in_order() {
    let tmdb = TmdbFixture::start().await;
    let ids = [501, 502, 503, 504, 505];
    tmdb.changes_page(1, 1, &ids).await;
    for id in ids {
        tmdb.movie(movie_document(id, "Staged", &[(id * 2, "Lead"), (id * 2 + 1, "Support")]))
            .await;
    }

    let store = Arc::new(RecordingStore::default());
    let report = Pipeline::new(tmdb.config(), Arc::clone(&store))
        .run()
        .await
        .unwrap();
    assert!(report.is_clean());

    let stages: Vec<u8> = store
        .commits
        .lock()
        .unwrap()
        .iter()
        .map(|relation| writer_stage(relation))
        .collect();

    assert!(stages.windows(2).all(|pair| pair[0] <= pair[1]), "stages out of order: {:?}", stages);
    for stage in 1..=4 {
        assert!(stages.contains(&stage), "stage {} never committed", stage);
    }
    assert_eq!(store.inner.count::<LocalReleaseRow>().await, 5);
}
