//! Catalog stores.
//!
//! A store applies one batch of records of a single relation atomically,
//! honoring the record type's conflict policy. Batches are deduplicated by key
//! before they reach the store.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::Result;
use crate::records::CatalogRecord;

pub use memory::MemoryStore;
pub use postgres::PgCatalogStore;

#[async_trait]
pub trait CatalogStore: Send + Sync + 'static {
    /// Apply a batch in one transaction, returning the rows inserted or
    /// updated. Nothing is applied when this fails.
    async fn write_batch<R: CatalogRecord>(&self, batch: &[R]) -> Result<u64>;
}
