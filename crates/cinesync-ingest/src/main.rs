//! Cinesync Ingest - TMDB catalog synchronization job

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use cinesync_common::logging::{init_logging, LogConfig, LogLevel};
use cinesync_ingest::{DbConfig, IngestConfig, MemoryStore, PgCatalogStore, Pipeline, RunReport};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "cinesync-ingest")]
#[command(author, version, about = "Sync recently changed TMDB movies into the catalog")]
struct Cli {
    /// Stop after this many change-list pages
    #[arg(long)]
    page_limit: Option<u32>,

    /// Records per committed batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// First day of the change window (YYYY-MM-DD)
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// Last day of the change window (YYYY-MM-DD)
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// Apply catalog migrations before ingesting
    #[arg(long)]
    migrate: bool,

    /// Fetch and decompose without touching the database
    #[arg(long, conflicts_with = "migrate")]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // LOG_* variables take precedence over flags
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("cinesync-ingest")
        .filter_directives("sqlx=warn,hyper=info")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    let mut config = IngestConfig::from_env()
        .context("Failed to load ingestion configuration")?
        .with_date_window(cli.start_date, cli.end_date);
    if let Some(limit) = cli.page_limit {
        config = config.with_page_limit(limit);
    }
    if let Some(batch_size) = cli.batch_size {
        config = config.with_batch_size(batch_size);
    }

    info!(started_at = %Utc::now(), dry_run = cli.dry_run, "Ingestion starting");

    let report = if cli.dry_run {
        Pipeline::new(config, Arc::new(MemoryStore::new())).run().await?
    } else {
        run_against_database(config, cli.migrate).await?
    };

    report.log();
    info!(finished_at = %Utc::now(), "Ingestion complete");
    Ok(())
}

async fn run_against_database(config: IngestConfig, migrate: bool) -> Result<RunReport> {
    let db_config = DbConfig::from_env().context("Failed to load database configuration")?;
    let store = PgCatalogStore::connect(&db_config)
        .await
        .context("Failed to connect to the catalog database")?;

    if migrate {
        store.migrate().await.context("Failed to apply catalog migrations")?;
    }

    Ok(Pipeline::new(config, Arc::new(store)).run().await?)
}
