//! Cinesync Ingest Library
//!
//! Synchronizes recently changed movies from TMDB into a relational catalog.
//!
//! # Flow
//!
//! - **Discovery** walks the `/movie/changes` pages and streams movie ids
//! - **Details** fetch each movie with credits and release dates embedded and
//!   decompose it into eight typed record streams
//! - **Writers** drain the streams in batches, stage by stage
//!
//! Every outbound request passes one shared rate limiter. Failures are
//! isolated to the page, movie or batch they hit and summarized in a
//! [`RunReport`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cinesync_ingest::{IngestConfig, MemoryStore, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?.with_page_limit(1);
//!     let report = Pipeline::new(config, Arc::new(MemoryStore::new())).run().await?;
//!     report.log();
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod decompose;
pub mod details;
pub mod discovery;
pub mod error;
pub mod pipeline;
pub mod rate_limit;
pub mod records;
pub mod report;
pub mod store;
pub mod streams;
pub mod tmdb;
pub mod writer;

pub use config::{DbConfig, IngestConfig, SourceConfig, StreamCapacities};
pub use error::{IngestError, Result};
pub use pipeline::Pipeline;
pub use report::RunReport;
pub use store::{CatalogStore, MemoryStore, PgCatalogStore};
