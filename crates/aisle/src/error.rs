//! Error types for the aisle ingestion pipeline.

use std::path::PathBuf;
use std::process::ExitStatus;

use snafu::prelude::*;

pub use aisle_core::error::{ConfigError, MetricsError};

/// Errors raised by the schema registry.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RegistryError {
    /// The dataset was never registered.
    #[snafu(display("Dataset '{dataset}' is not registered"))]
    NotFound { dataset: String },

    /// A different definition already owns the identifier or the table.
    #[snafu(display("Dataset '{dataset}' conflicts with an existing registration: {reason}"))]
    Conflict { dataset: String, reason: String },

    /// The definition violates a structural invariant.
    #[snafu(display("Invalid definition for dataset '{dataset}': {message}"))]
    InvalidDefinition { dataset: String, message: String },
}

/// Errors raised while validating or reshaping a record batch.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum BatchError {
    /// Columns of the batch do not all have the same length.
    #[snafu(display("Batch columns have different lengths: {}", format_lengths(lengths)))]
    ShapeMismatch { lengths: Vec<(String, usize)> },

    /// The key column is absent from the batch.
    #[snafu(display("Batch is missing key column '{column}'"))]
    MissingKeyColumn { column: String },
}

fn format_lengths(lengths: &[(String, usize)]) -> String {
    lengths
        .iter()
        .map(|(name, len)| format!("{name}={len}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors reported by a store implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    /// A row violated the table's primary-key or another uniqueness constraint.
    #[snafu(display("Unique constraint violated on {table}: {detail}"))]
    UniqueViolation { table: String, detail: String },

    /// The object being created already exists.
    #[snafu(display("{object} already exists"))]
    AlreadyExists { object: String },

    /// No connection could be obtained from the pool.
    #[snafu(display("Failed to acquire store connection: {message}"))]
    Pool { message: String },

    /// PostgreSQL returned an error.
    #[snafu(display("PostgreSQL error: {source}"))]
    Postgres { source: tokio_postgres::Error },

    /// The store refused the data (type or null constraint).
    #[snafu(display("Store rejected data for {table}: {message}"))]
    Rejected { table: String, message: String },

    /// The store is unreachable.
    #[snafu(display("Store unavailable: {message}"))]
    Unavailable { message: String },
}

impl StoreError {
    /// Check if this error is a primary-key / uniqueness violation.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { .. })
    }

    /// Check if this error reports an object that already exists.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }
}

/// Errors raised while making sure a table exists.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProvisionError {
    /// The catalog lookup failed.
    #[snafu(display("Failed to look up table {table}: {source}"))]
    Lookup { table: String, source: StoreError },

    /// The create statement failed.
    #[snafu(display("Failed to create table {table}: {source}"))]
    Create { table: String, source: StoreError },

    /// The table is still missing after creation.
    #[snafu(display("Table {table} is not visible after creation"))]
    NotVisible { table: String },
}

/// A chunk whose unit-of-work was rolled back.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ChunkInsertError {
    /// At least one row's key is already persisted; the chunk was skipped.
    #[snafu(display("Chunk {chunk} of {table} ({rows} rows) skipped, duplicate key: {source}"))]
    DuplicateKey {
        table: String,
        chunk: usize,
        rows: usize,
        source: StoreError,
    },

    /// Any other store failure.
    #[snafu(display("Chunk {chunk} of {table} ({rows} rows) failed: {source}"))]
    StoreFailure {
        table: String,
        chunk: usize,
        rows: usize,
        source: StoreError,
    },
}

impl ChunkInsertError {
    /// Wrap a store error, classifying duplicate keys.
    pub fn classify(table: &str, chunk: usize, rows: usize, source: StoreError) -> Self {
        let table = table.to_string();
        if source.is_unique_violation() {
            ChunkInsertError::DuplicateKey {
                table,
                chunk,
                rows,
                source,
            }
        } else {
            ChunkInsertError::StoreFailure {
                table,
                chunk,
                rows,
                source,
            }
        }
    }

    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, ChunkInsertError::DuplicateKey { .. })
    }

    /// Zero-based index of the chunk within its load call.
    pub fn chunk(&self) -> usize {
        match self {
            ChunkInsertError::DuplicateKey { chunk, .. }
            | ChunkInsertError::StoreFailure { chunk, .. } => *chunk,
        }
    }

    /// Number of rows that were not inserted.
    pub fn rows(&self) -> usize {
        match self {
            ChunkInsertError::DuplicateKey { rows, .. }
            | ChunkInsertError::StoreFailure { rows, .. } => *rows,
        }
    }
}

/// Errors raised by the snapshot exporter.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ExportError {
    /// The dump utility could not be started.
    #[snafu(display("Failed to start {program}: {source}"))]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// The dump utility exited unsuccessfully.
    #[snafu(display("{program} exited with {status}: {stderr}"))]
    Exit {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Errors raised by a record producer.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProduceError {
    /// The dataset has no source configured.
    #[snafu(display("Dataset '{dataset}' has no source configured"))]
    NoSource { dataset: String },

    /// The source file could not be read.
    #[snafu(display("Failed to read {}: {source}", path.display()))]
    ReadSource {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The source file is not a column-oriented JSON batch.
    #[snafu(display("Failed to decode {}: {source}", path.display()))]
    DecodeSource {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Errors raised by a completion sink.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum NotifyError {
    /// Failed to encode the event.
    #[snafu(display("Failed to encode completion event: {source}"))]
    EncodeEvent { source: serde_json::Error },

    /// Failed to append to the event file.
    #[snafu(display("Failed to write {}: {source}", path.display()))]
    WriteEvent {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors that abort a single dataset. Other datasets still run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DatasetError {
    #[snafu(display("{source}"))]
    Provision { source: ProvisionError },

    #[snafu(display("{source}"))]
    Produce { source: ProduceError },

    #[snafu(display("Rejected batch: {source}"))]
    Batch { source: BatchError },
}

/// Top-level errors that stop an ingest run before any dataset is loaded.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// A dataset definition could not be registered.
    #[snafu(display("Schema registry error: {source}"))]
    Registry { source: RegistryError },

    /// The store could not be set up.
    #[snafu(display("Store error: {source}"))]
    Store { source: StoreError },

    /// Metrics error.
    #[snafu(display("Metrics error: {source}"))]
    Metrics { source: MetricsError },
}

impl From<ConfigError> for PipelineError {
    fn from(source: ConfigError) -> Self {
        PipelineError::Config { source }
    }
}

impl From<RegistryError> for PipelineError {
    fn from(source: RegistryError) -> Self {
        PipelineError::Registry { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_lists_lengths() {
        let err = BatchError::ShapeMismatch {
            lengths: vec![("id".into(), 3), ("name".into(), 2)],
        };
        assert_eq!(
            err.to_string(),
            "Batch columns have different lengths: id=3, name=2"
        );
    }

    #[test]
    fn test_chunk_error_classification() {
        let dup = ChunkInsertError::classify(
            "supermarkets.mercadona",
            2,
            10,
            StoreError::UniqueViolation {
                table: "supermarkets.mercadona".into(),
                detail: "id=7".into(),
            },
        );
        assert!(dup.is_duplicate_key());
        assert_eq!(dup.chunk(), 2);
        assert_eq!(dup.rows(), 10);

        let other = ChunkInsertError::classify(
            "supermarkets.mercadona",
            0,
            5,
            StoreError::Unavailable {
                message: "connection reset".into(),
            },
        );
        assert!(!other.is_duplicate_key());
    }
}
