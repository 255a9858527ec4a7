//! Store abstraction.
//!
//! The core issues only catalog lookups, DDL and bulk inserts, so the
//! boundary is small. `PostgresStore` is the production implementation;
//! `MemoryStore` backs tests and dry runs.

pub mod memory;
pub mod postgres;
pub mod sql;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use std::sync::Arc;

use async_trait::async_trait;

use crate::batch::Row;
use crate::error::StoreError;
use crate::schema::TableDefinition;

/// A relational store that can host dataset tables.
#[async_trait]
pub trait Store: Send + Sync {
    /// Whether `namespace.table` exists. Always asks the store.
    async fn table_exists(&self, namespace: &str, table: &str) -> Result<bool, StoreError>;

    /// Create the namespace if needed, then the table.
    ///
    /// Fails with `StoreError::AlreadyExists` when the table is present.
    async fn create_table(&self, definition: &TableDefinition) -> Result<(), StoreError>;

    /// Acquire a session. The underlying connection is released when the
    /// session is dropped.
    async fn session(&self) -> Result<Box<dyn Session>, StoreError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// A connection-scoped handle used for inserts.
#[async_trait]
pub trait Session: Send {
    /// Insert `rows` in one unit-of-work: all rows are committed, or none.
    ///
    /// Returns the number of inserted rows.
    async fn insert_rows(
        &mut self,
        definition: &TableDefinition,
        rows: &[Row],
    ) -> Result<u64, StoreError>;
}

/// Shared reference to a store.
pub type StoreRef = Arc<dyn Store>;
