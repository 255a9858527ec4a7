//! aisle: loads retailer catalog batches into PostgreSQL.
//!
//! This crate handles:
//! - Registering one table definition per dataset, from explicit columns or a shared template
//! - Creating missing tables exactly once, tolerating concurrent creators
//! - Deduplicating batches on their primary key and loading them in isolated chunks
//! - Whole-database snapshots through `pg_dump`

pub mod batch;
pub mod config;
pub mod error;
pub mod export;
pub mod loader;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod producer;
pub mod provision;
pub mod schema;
pub mod store;

// Re-export commonly used items
pub use batch::{RecordBatch, dedupe};
pub use config::{Config, DatasetId};
pub use error::{PipelineError, StoreError};
pub use loader::{BatchLoader, LoadSummary};
pub use pipeline::{IngestRunner, RunOptions, RunReport, run_pipeline};
pub use provision::{TableHandle, TableProvisioner};
pub use schema::{SchemaRegistry, TableDefinition};
pub use store::{MemoryStore, PostgresStore, Store, StoreRef};

pub use aisle_core::{ConfigArgs, init_tracing};
