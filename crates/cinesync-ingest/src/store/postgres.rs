//! PostgreSQL catalog store

use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use tracing::{debug, info};

use super::CatalogStore;
use crate::config::DbConfig;
use crate::error::Result;
use crate::records::{CatalogRecord, ConflictPolicy};

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Create a connection pool for the catalog database
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    config.validate()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout())
        .connect_with(config.connect_options()?)
        .await?;

    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database connection pool created"
    );

    Ok(pool)
}

#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DbConfig) -> Result<Self> {
        Ok(Self::new(create_pool(config).await?))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending catalog migrations
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        info!("Catalog migrations applied");
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn write_batch<R: CatalogRecord>(&self, batch: &[R]) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut query = batch_statement(batch);
        let result = query.build().execute(&mut *tx).await?;
        tx.commit().await?;

        debug!(
            relation = R::RELATION,
            records = batch.len(),
            rows = result.rows_affected(),
            "Committed batch"
        );
        Ok(result.rows_affected())
    }
}

/// Multi-row insert for `batch` with the relation's conflict handling
fn batch_statement<R: CatalogRecord>(batch: &[R]) -> QueryBuilder<'_, Postgres> {
    let mut query = QueryBuilder::new(insert_prefix::<R>());
    query.push_values(batch, |row, record| record.bind_row(row));
    query.push(conflict_clause::<R>());
    query
}

fn insert_prefix<R: CatalogRecord>() -> String {
    format!("INSERT INTO {} ({}) ", R::RELATION, R::COLUMNS.join(", "))
}

fn conflict_clause<R: CatalogRecord>() -> String {
    match R::POLICY {
        ConflictPolicy::InsertIfAbsent => " ON CONFLICT DO NOTHING".to_string(),
        ConflictPolicy::Upsert => {
            let updates: Vec<String> = R::COLUMNS
                .iter()
                .filter(|column| !R::KEY_COLUMNS.contains(column))
                .map(|column| format!("{column} = EXCLUDED.{column}"))
                .collect();
            if updates.is_empty() {
                format!(" ON CONFLICT ({}) DO NOTHING", R::KEY_COLUMNS.join(", "))
            } else {
                format!(
                    " ON CONFLICT ({}) DO UPDATE SET {}",
                    R::KEY_COLUMNS.join(", "),
                    updates.join(", ")
                )
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{MovieGenreRow, MovieRow, PersonRow};

    #[test]
    fn test_insert_prefix_lists_columns() {
        assert_eq!(insert_prefix::<PersonRow>(), "INSERT INTO cinema_person (id, name) ");
    }

    #[test]
    fn test_insert_if_absent_ignores_conflicts() {
        assert_eq!(conflict_clause::<MovieGenreRow>(), " ON CONFLICT DO NOTHING");
    }

    #[test]
    fn test_upsert_updates_every_non_key_column() {
        let clause = conflict_clause::<MovieRow>();
        assert!(clause.starts_with(" ON CONFLICT (id) DO UPDATE SET "));
        assert!(clause.contains("title = EXCLUDED.title"));
        assert!(clause.contains("primary_release_date = EXCLUDED.primary_release_date"));
        assert!(!clause.contains("id = EXCLUDED.id"));
    }

    #[test]
    fn test_batch_statement_binds_every_value() {
        let batch = vec![
            PersonRow { id: 1, name: "A".to_string() },
            PersonRow { id: 2, name: "B".to_string() },
        ];
        let query = batch_statement(&batch);
        assert_eq!(
            query.sql(),
            "INSERT INTO cinema_person (id, name) VALUES ($1, $2), ($3, $4) ON CONFLICT DO NOTHING"
        );
    }
}
