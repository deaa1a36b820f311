//! In-process catalog store.
//!
//! Backs `--dry-run` and the pipeline tests. Conflict policies behave as they
//! do in PostgreSQL: an upsert replaces the stored row, an insert-if-absent
//! leaves it alone.

use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::CatalogStore;
use crate::error::{IngestError, Result};
use crate::records::{CatalogRecord, ConflictPolicy};

type Relation<R> = HashMap<<R as CatalogRecord>::Key, R>;

#[derive(Default)]
pub struct MemoryStore {
    relations: Mutex<HashMap<&'static str, Box<dyn Any + Send + Sync>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored rows of one relation, in no particular order
    pub async fn rows<R: CatalogRecord>(&self) -> Vec<R> {
        let relations = self.relations.lock().await;
        relations
            .get(R::RELATION)
            .and_then(|rows| rows.downcast_ref::<Relation<R>>())
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn get<R: CatalogRecord>(&self, key: &R::Key) -> Option<R> {
        let relations = self.relations.lock().await;
        relations
            .get(R::RELATION)
            .and_then(|rows| rows.downcast_ref::<Relation<R>>())
            .and_then(|rows| rows.get(key).cloned())
    }

    pub async fn count<R: CatalogRecord>(&self) -> usize {
        let relations = self.relations.lock().await;
        relations
            .get(R::RELATION)
            .and_then(|rows| rows.downcast_ref::<Relation<R>>())
            .map_or(0, HashMap::len)
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn write_batch<R: CatalogRecord>(&self, batch: &[R]) -> Result<u64> {
        let mut relations = self.relations.lock().await;
        let rows = relations
            .entry(R::RELATION)
            .or_insert_with(|| Box::new(Relation::<R>::new()) as Box<dyn Any + Send + Sync>)
            .downcast_mut::<Relation<R>>()
            .ok_or_else(|| {
                IngestError::config(format!("Relation {} holds a different record type", R::RELATION))
            })?;

        let mut affected = 0;
        for record in batch {
            match R::POLICY {
                ConflictPolicy::Upsert => {
                    rows.insert(record.key(), record.clone());
                    affected += 1;
                },
                ConflictPolicy::InsertIfAbsent => {
                    if let Entry::Vacant(slot) = rows.entry(record.key()) {
                        slot.insert(record.clone());
                        affected += 1;
                    }
                },
            }
        }
        Ok(affected)
    }
}
