//! Batch writers.
//!
//! One writer drains one record stream, committing a batch every `batch_size`
//! records and a final partial batch when the stream closes. A failed batch is
//! logged and counted and the writer moves on to the next one.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::Receiver;
use tracing::{error, info};

use crate::records::{CatalogRecord, ConflictPolicy};
use crate::report::WriterReport;
use crate::store::CatalogStore;

pub struct BatchWriter<S> {
    store: Arc<S>,
    batch_size: usize,
}

impl<S> Clone for BatchWriter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            batch_size: self.batch_size,
        }
    }
}

impl<S: CatalogStore> BatchWriter<S> {
    pub fn new(store: Arc<S>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Drain `records` until every sender is gone.
    pub async fn run<R: CatalogRecord>(&self, mut records: Receiver<R>) -> WriterReport {
        let mut report = WriterReport::new(R::RELATION);
        let mut batch = Vec::with_capacity(self.batch_size);

        while let Some(record) = records.recv().await {
            report.records_received += 1;
            batch.push(record);
            if batch.len() >= self.batch_size {
                self.flush(&mut batch, &mut report).await;
            }
        }
        if !batch.is_empty() {
            self.flush(&mut batch, &mut report).await;
        }

        info!(
            relation = R::RELATION,
            records = report.records_received,
            batches = report.batches_committed,
            failed = report.batches_failed,
            "Writer drained"
        );
        report
    }

    async fn flush<R: CatalogRecord>(&self, batch: &mut Vec<R>, report: &mut WriterReport) {
        let records = batch.len() as u64;
        let rows = dedupe_batch(std::mem::take(batch));

        match self.store.write_batch(&rows).await {
            Ok(affected) => {
                report.batches_committed += 1;
                report.rows_affected += affected;
            },
            Err(e) => {
                error!(
                    relation = R::RELATION,
                    records,
                    error = %e,
                    "Failed to write batch, dropping it"
                );
                report.batches_failed += 1;
                report.records_dropped += records;
            },
        }
        batch.reserve(self.batch_size);
    }
}

/// Collapse records sharing a key so a single statement never touches a row
/// twice. Upserts keep the last record for a key, inserts keep the first;
/// positions follow first appearance.
pub fn dedupe_batch<R: CatalogRecord>(batch: Vec<R>) -> Vec<R> {
    let mut positions: HashMap<R::Key, usize> = HashMap::with_capacity(batch.len());
    let mut unique: Vec<R> = Vec::with_capacity(batch.len());

    for record in batch {
        match positions.get(&record.key()) {
            Some(&at) => {
                if R::POLICY == ConflictPolicy::Upsert {
                    unique[at] = record;
                }
            },
            None => {
                positions.insert(record.key(), unique.len());
                unique.push(record);
            },
        }
    }
    unique
}
