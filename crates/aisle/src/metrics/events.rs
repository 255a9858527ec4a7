//! Internal events for aisle metrics emission.
//!
//! Each event struct represents a measurable occurrence in an ingest run.
//! Table labels carry the qualified `namespace.table` name.

use std::time::Duration;

use aisle_core::metrics::InternalEvent;
use metrics::{counter, histogram};
use tracing::trace;

// ============================================================================
// Load events
// ============================================================================

/// Rows committed to a table.
pub struct RowsInserted {
    pub table: String,
    pub count: u64,
}

impl InternalEvent for RowsInserted {
    fn emit(self) {
        trace!(table = %self.table, count = self.count, "Rows inserted");
        counter!("aisle_rows_inserted_total", "table" => self.table).increment(self.count);
    }
}

/// Rows dropped by in-batch deduplication.
pub struct DuplicatesDropped {
    pub table: String,
    pub count: u64,
}

impl InternalEvent for DuplicatesDropped {
    fn emit(self) {
        trace!(table = %self.table, count = self.count, "In-batch duplicates dropped");
        counter!("aisle_batch_duplicates_dropped_total", "table" => self.table)
            .increment(self.count);
    }
}

/// Outcome of one chunk insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    Committed,
    Duplicate,
    Failed,
}

impl ChunkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStatus::Committed => "committed",
            ChunkStatus::Duplicate => "duplicate",
            ChunkStatus::Failed => "failed",
        }
    }
}

/// A chunk finished, successfully or not.
pub struct ChunkCompleted {
    pub table: String,
    pub status: ChunkStatus,
}

impl InternalEvent for ChunkCompleted {
    fn emit(self) {
        trace!(table = %self.table, status = self.status.as_str(), "Chunk completed");
        counter!(
            "aisle_chunks_total",
            "table" => self.table,
            "status" => self.status.as_str()
        )
        .increment(1);
    }
}

/// Wall time of a whole `load` call.
pub struct LoadDuration {
    pub table: String,
    pub duration: Duration,
}

impl InternalEvent for LoadDuration {
    fn emit(self) {
        trace!(
            table = %self.table,
            duration_ms = self.duration.as_millis(),
            "Load completed"
        );
        histogram!("aisle_load_duration_seconds", "table" => self.table)
            .record(self.duration.as_secs_f64());
    }
}

// ============================================================================
// Provisioning and snapshot events
// ============================================================================

/// A table was created by the provisioner.
pub struct TableCreated {
    pub table: String,
}

impl InternalEvent for TableCreated {
    fn emit(self) {
        trace!(table = %self.table, "Table created");
        counter!("aisle_tables_created_total", "table" => self.table).increment(1);
    }
}

/// A snapshot export finished.
pub struct SnapshotCompleted {
    pub success: bool,
    pub duration: Duration,
}

impl InternalEvent for SnapshotCompleted {
    fn emit(self) {
        let status = if self.success { "success" } else { "failure" };
        trace!(status, duration_ms = self.duration.as_millis(), "Snapshot completed");
        counter!("aisle_snapshots_total", "status" => status).increment(1);
        histogram!("aisle_snapshot_duration_seconds").record(self.duration.as_secs_f64());
    }
}
