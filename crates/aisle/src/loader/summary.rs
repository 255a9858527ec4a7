//! Outcome of one `load` call.

use crate::error::ChunkInsertError;

/// Counters and failures for one loaded batch.
///
/// Duplicate-key chunks are counted but not kept: their rows are already
/// persisted. Every other failed chunk is kept for resubmission.
#[derive(Debug)]
pub struct LoadSummary {
    /// Qualified `namespace.table` name.
    pub table: String,
    pub rows_received: usize,
    pub rows_after_dedupe: usize,
    pub duplicates_dropped: usize,
    pub chunks_attempted: usize,
    pub chunks_committed: usize,
    pub rows_inserted: u64,
    pub duplicate_chunks: usize,
    pub failures: Vec<ChunkInsertError>,
}

impl LoadSummary {
    pub(crate) fn new(table: String, rows_received: usize, rows_after_dedupe: usize) -> Self {
        Self {
            table,
            rows_received,
            rows_after_dedupe,
            duplicates_dropped: rows_received - rows_after_dedupe,
            chunks_attempted: 0,
            chunks_committed: 0,
            rows_inserted: 0,
            duplicate_chunks: 0,
            failures: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, outcome: Result<u64, ChunkInsertError>) {
        self.chunks_attempted += 1;
        match outcome {
            Ok(rows) => {
                self.chunks_committed += 1;
                self.rows_inserted += rows;
            }
            Err(e) if e.is_duplicate_key() => self.duplicate_chunks += 1,
            Err(e) => self.failures.push(e),
        }
    }

    /// Chunks that failed for a reason other than a duplicate key.
    pub fn failed_chunks(&self) -> usize {
        self.failures.len()
    }

    /// No chunk failed except for duplicate keys.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Rows of failed chunks, to be resubmitted.
    pub fn rows_failed(&self) -> usize {
        self.failures.iter().map(ChunkInsertError::rows).sum()
    }
}
