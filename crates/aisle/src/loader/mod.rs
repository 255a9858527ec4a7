//! Chunked, duplicate-safe bulk loading.
//!
//! A batch is deduplicated on its primary key, aligned to the table's
//! columns and written in chunks of at most `chunk_size` rows. Each chunk is
//! its own unit-of-work: a chunk whose rows collide with persisted keys is
//! skipped, any other failure is recorded, and later chunks still run.

mod summary;

pub use summary::LoadSummary;

use std::time::Instant;

use aisle_core::emit;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::batch::{RecordBatch, Row, dedupe};
use crate::config::LoaderConfig;
use crate::error::{BatchError, ChunkInsertError};
use crate::metrics::events::{
    ChunkCompleted, ChunkStatus, DuplicatesDropped, LoadDuration, RowsInserted,
};
use crate::provision::TableHandle;
use crate::schema::TableDefinition;
use crate::store::{Session, StoreRef};

type ChunkOutcome = (usize, Result<u64, ChunkInsertError>);

/// Writes record batches into provisioned tables.
pub struct BatchLoader {
    store: StoreRef,
    chunk_size: usize,
    chunk_concurrency: usize,
}

impl BatchLoader {
    pub fn new(store: StoreRef, config: &LoaderConfig) -> Self {
        Self {
            store,
            chunk_size: config.chunk_size.max(1),
            chunk_concurrency: config.chunk_concurrency.max(1),
        }
    }

    /// Load `batch` into the table behind `handle`.
    ///
    /// Only malformed batches fail the call, and they fail before the store
    /// is touched. Store errors are reported per chunk in the summary.
    pub async fn load(
        &self,
        batch: &RecordBatch,
        handle: &TableHandle,
    ) -> Result<LoadSummary, BatchError> {
        let start = Instant::now();
        let definition = handle.definition();
        let table = handle.qualified_name();

        let rows_received = batch.num_rows()?;
        let deduped = dedupe(batch, &definition.primary_key().name)?;
        let rows = deduped.to_rows(definition)?;

        let unknown = deduped.unknown_columns(definition);
        if !unknown.is_empty() {
            warn!(
                dataset = %handle.dataset(),
                table = %table,
                columns = ?unknown,
                "Ignoring batch columns missing from the table definition"
            );
        }

        let mut summary = LoadSummary::new(table.clone(), rows_received, rows.len());
        if summary.duplicates_dropped > 0 {
            debug!(
                table = %table,
                dropped = summary.duplicates_dropped,
                "Dropped in-batch duplicates"
            );
            emit!(DuplicatesDropped {
                table: table.clone(),
                count: summary.duplicates_dropped as u64,
            });
        }

        if rows.is_empty() {
            debug!(table = %table, "Empty batch, nothing to load");
            return Ok(summary);
        }

        let chunks: Vec<&[Row]> = rows.chunks(self.chunk_size).collect();
        let mut outcomes = if self.chunk_concurrency > 1 && chunks.len() > 1 {
            self.load_concurrent(definition, &table, &chunks).await
        } else {
            self.load_sequential(definition, &table, &chunks).await
        };
        outcomes.sort_by_key(|(index, _)| *index);

        for (index, outcome) in outcomes {
            log_outcome(&table, index, &outcome);
            summary.record(outcome);
        }

        emit!(RowsInserted {
            table: table.clone(),
            count: summary.rows_inserted,
        });
        emit!(LoadDuration {
            table: table.clone(),
            duration: start.elapsed(),
        });

        info!(
            dataset = %handle.dataset(),
            table = %table,
            rows_received = summary.rows_received,
            rows_inserted = summary.rows_inserted,
            chunks = summary.chunks_attempted,
            committed = summary.chunks_committed,
            duplicate_chunks = summary.duplicate_chunks,
            failed_chunks = summary.failed_chunks(),
            elapsed_ms = start.elapsed().as_millis(),
            "Batch loaded"
        );
        Ok(summary)
    }

    /// One session for the whole load. A session that saw a non-duplicate
    /// failure is dropped and a fresh one acquired for the next chunk.
    async fn load_sequential(
        &self,
        definition: &TableDefinition,
        table: &str,
        chunks: &[&[Row]],
    ) -> Vec<ChunkOutcome> {
        let mut session: Option<Box<dyn Session>> = None;
        let mut outcomes = Vec::with_capacity(chunks.len());

        for (index, rows) in chunks.iter().enumerate() {
            if session.is_none() {
                match self.store.session().await {
                    Ok(acquired) => session = Some(acquired),
                    Err(e) => {
                        let err = ChunkInsertError::classify(table, index, rows.len(), e);
                        outcomes.push((index, Err(err)));
                        continue;
                    }
                }
            }
            let Some(active) = session.as_mut() else {
                continue;
            };

            let outcome = active
                .insert_rows(definition, rows)
                .await
                .map_err(|e| ChunkInsertError::classify(table, index, rows.len(), e));
            if outcome.as_ref().is_err_and(|e| !e.is_duplicate_key()) {
                session = None;
            }
            outcomes.push((index, outcome));
        }
        outcomes
    }

    /// Up to `chunk_concurrency` chunks in flight, each with its own session.
    async fn load_concurrent(
        &self,
        definition: &TableDefinition,
        table: &str,
        chunks: &[&[Row]],
    ) -> Vec<ChunkOutcome> {
        stream::iter(chunks.iter().copied().enumerate())
            .map(|(index, rows)| async move {
                let outcome = match self.store.session().await {
                    Ok(mut session) => session.insert_rows(definition, rows).await,
                    Err(e) => Err(e),
                }
                .map_err(|e| ChunkInsertError::classify(table, index, rows.len(), e));
                (index, outcome)
            })
            .buffer_unordered(self.chunk_concurrency)
            .collect()
            .await
    }
}

fn log_outcome(table: &str, chunk: usize, outcome: &Result<u64, ChunkInsertError>) {
    let status = match outcome {
        Ok(rows) => {
            debug!(table, chunk, rows, "Chunk committed");
            ChunkStatus::Committed
        }
        Err(e) if e.is_duplicate_key() => {
            warn!(table, chunk, rows = e.rows(), error = %e, "Chunk skipped, key already stored");
            ChunkStatus::Duplicate
        }
        Err(e) => {
            error!(table, chunk, rows = e.rows(), error = %e, "Chunk failed");
            ChunkStatus::Failed
        }
    };
    emit!(ChunkCompleted {
        table: table.to_string(),
        status,
    });
}
