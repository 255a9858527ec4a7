//! Integration tests for provisioning and chunked loading against the
//! in-memory store.
//!
//! Run with: cargo test -p aisle --test load_tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use aisle::batch::Row;
use aisle::config::LoaderConfig;
use aisle::error::{BatchError, ChunkInsertError, StoreError};
use aisle::schema::{ColumnSpec, ColumnType, TableDefinition, Value};
use aisle::store::Session;
use aisle::{BatchLoader, MemoryStore, RecordBatch, Store, TableHandle, TableProvisioner};

fn products() -> Arc<TableDefinition> {
    Arc::new(
        TableDefinition::new(
            "aceites-y-vinagres".into(),
            "elCorteIngles",
            "aceites_y_vinagres",
            vec![
                ColumnSpec::primary_key("id", ColumnType::BigInt),
                ColumnSpec::new("name", ColumnType::Text),
            ],
        )
        .unwrap(),
    )
}

async fn provision(store: &MemoryStore) -> TableHandle {
    TableProvisioner::new(Arc::new(store.clone()))
        .ensure(products())
        .await
        .unwrap()
}

fn loader(store: &MemoryStore, chunk_size: usize) -> BatchLoader {
    BatchLoader::new(
        Arc::new(store.clone()),
        &LoaderConfig {
            chunk_size,
            chunk_concurrency: 1,
        },
    )
}

fn row(id: i64, name: &str) -> Row {
    vec![Value::Int(id), Value::from(name)]
}

/// Test: provisioning the same definition twice yields one table and no error.
#[tokio::test]
async fn test_provisioning_is_idempotent() {
    let store = MemoryStore::new();
    let provisioner = TableProvisioner::new(Arc::new(store.clone()));

    provisioner.ensure(products()).await.unwrap();
    provisioner.ensure(products()).await.unwrap();

    assert!(
        store
            .table_exists("elCorteIngles", "aceites_y_vinagres")
            .await
            .unwrap()
    );
    assert_eq!(store.create_calls().await, 1);
}

/// A store whose first catalog lookup misses a table that another process
/// creates in the meantime.
struct LaggingCatalog {
    inner: MemoryStore,
    lookups: AtomicUsize,
}

#[async_trait]
impl Store for LaggingCatalog {
    async fn table_exists(&self, namespace: &str, table: &str) -> Result<bool, StoreError> {
        if self.lookups.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(false);
        }
        self.inner.table_exists(namespace, table).await
    }

    async fn create_table(&self, definition: &TableDefinition) -> Result<(), StoreError> {
        self.inner.create_table(definition).await
    }

    async fn session(&self) -> Result<Box<dyn Session>, StoreError> {
        self.inner.session().await
    }

    fn name(&self) -> &'static str {
        "lagging"
    }
}

/// Test: losing the creation race to a concurrent caller is a success.
#[tokio::test]
async fn test_concurrent_creator_treated_as_success() {
    let inner = MemoryStore::new();
    inner.create_table(&products()).await.unwrap();

    let racing = LaggingCatalog {
        inner: inner.clone(),
        lookups: AtomicUsize::new(0),
    };
    let handle = TableProvisioner::new(Arc::new(racing))
        .ensure(products())
        .await
        .unwrap();

    assert_eq!(handle.qualified_name(), "elCorteIngles.aceites_y_vinagres");
    // The losing create hit "already exists" and was not retried.
    assert_eq!(inner.create_calls().await, 2);
    assert!(
        inner
            .table_exists("elCorteIngles", "aceites_y_vinagres")
            .await
            .unwrap()
    );
}

/// Test: the `{id, name}` example with chunk size 2.
///
/// Input ids {1, 2, 2, 3} with names {a, b, c, d} dedupe to {1, 2, 3} /
/// {a, b, d}, load as chunks [{1,a},{2,b}] and [{3,d}], leaving 3 rows.
#[tokio::test]
async fn test_dedupe_then_chunked_load() {
    let store = MemoryStore::new();
    let handle = provision(&store).await;
    let batch = RecordBatch::new()
        .with_column("id", [1i64, 2, 2, 3])
        .with_column("name", ["a", "b", "c", "d"]);

    let summary = loader(&store, 2).load(&batch, &handle).await.unwrap();

    assert_eq!(summary.rows_received, 4);
    assert_eq!(summary.rows_after_dedupe, 3);
    assert_eq!(summary.duplicates_dropped, 1);
    assert_eq!(summary.chunks_attempted, 2);
    assert_eq!(summary.chunks_committed, 2);
    assert_eq!(summary.rows_inserted, 3);
    assert_eq!(
        store.rows("elCorteIngles", "aceites_y_vinagres").await,
        vec![row(1, "a"), row(2, "b"), row(3, "d")]
    );
}

/// Test: loading the same batch twice inserts nothing the second time and
/// raises nothing fatal.
#[tokio::test]
async fn test_reload_inserts_nothing() {
    let store = MemoryStore::new();
    let handle = provision(&store).await;
    let batch = RecordBatch::new()
        .with_column("id", [1i64, 2, 3])
        .with_column("name", ["a", "b", "d"]);
    let loader = loader(&store, 2);

    let first = loader.load(&batch, &handle).await.unwrap();
    let second = loader.load(&batch, &handle).await.unwrap();

    assert_eq!(first.rows_inserted, 3);
    assert_eq!(second.rows_inserted, 0);
    assert_eq!(second.duplicate_chunks, 2);
    assert!(second.is_complete());
    assert_eq!(store.row_count("elCorteIngles", "aceites_y_vinagres").await, 3);
}

/// Test: a chunk colliding with persisted rows is skipped without stopping
/// the chunks after it.
#[tokio::test]
async fn test_colliding_chunk_isolated() {
    let store = MemoryStore::new();
    let handle = provision(&store).await;
    let mut session = store.session().await.unwrap();
    session
        .insert_rows(handle.definition(), &[row(2, "persisted")])
        .await
        .unwrap();
    drop(session);

    let batch = RecordBatch::new()
        .with_column("id", [1i64, 2, 3, 4, 5])
        .with_column("name", ["a", "b", "c", "d", "e"]);
    let summary = loader(&store, 2).load(&batch, &handle).await.unwrap();

    // Chunks: [1,2] collides, [3,4] and [5] commit.
    assert_eq!(summary.chunks_attempted, 3);
    assert_eq!(summary.duplicate_chunks, 1);
    assert_eq!(summary.chunks_committed, 2);
    assert_eq!(summary.rows_inserted, 3);
    assert!(summary.is_complete());

    let ids: Vec<Value> = store
        .rows("elCorteIngles", "aceites_y_vinagres")
        .await
        .into_iter()
        .map(|r| r[0].clone())
        .collect();
    assert_eq!(ids, [2i64, 3, 4, 5].map(Value::Int));
}

/// Test: unequal column lengths fail before any store access.
#[tokio::test]
async fn test_shape_mismatch_touches_nothing() {
    let store = MemoryStore::new();
    let handle = provision(&store).await;
    let batch = RecordBatch::new()
        .with_column("id", [1i64, 2, 3])
        .with_column("name", ["a", "b"]);

    let err = loader(&store, 2).load(&batch, &handle).await.unwrap_err();

    assert!(matches!(err, BatchError::ShapeMismatch { .. }));
    assert_eq!(store.open_sessions(), 0);
    assert_eq!(store.row_count("elCorteIngles", "aceites_y_vinagres").await, 0);
}

/// Test: a batch without the key column is rejected.
#[tokio::test]
async fn test_missing_key_column_rejected() {
    let store = MemoryStore::new();
    let handle = provision(&store).await;
    let batch = RecordBatch::new().with_column("name", ["a", "b"]);

    let err = loader(&store, 2).load(&batch, &handle).await.unwrap_err();
    assert!(matches!(err, BatchError::MissingKeyColumn { .. }));
}

/// Test: when the store goes away mid-batch, the remaining chunks are
/// reported for resubmission and the session is released.
#[tokio::test]
async fn test_store_unavailable_mid_batch() {
    let store = MemoryStore::new();
    let handle = provision(&store).await;
    store.fail_inserts_after(1).await;

    let batch = RecordBatch::new()
        .with_column("id", [1i64, 2, 3, 4, 5])
        .with_column("name", ["a", "b", "c", "d", "e"]);
    let summary = loader(&store, 2).load(&batch, &handle).await.unwrap();

    assert_eq!(summary.chunks_committed, 1);
    assert_eq!(summary.rows_inserted, 2);
    assert_eq!(summary.failed_chunks(), 2);
    assert_eq!(summary.rows_failed(), 3);
    assert!(
        summary
            .failures
            .iter()
            .all(|e| matches!(e, ChunkInsertError::StoreFailure { .. }))
    );
    let failed: Vec<usize> = summary.failures.iter().map(ChunkInsertError::chunk).collect();
    assert_eq!(failed, [1, 2]);
    assert_eq!(store.open_sessions(), 0);
}

/// Test: rows the store rejects for their values fail only their chunk.
#[tokio::test]
async fn test_rejected_values_fail_their_chunk() {
    let store = MemoryStore::new();
    let handle = provision(&store).await;
    let batch = RecordBatch::new()
        .with_column("id", [1i64, 2, 3])
        .with_column("name", [Value::from("a"), Value::Int(42), Value::from("c")]);

    let summary = loader(&store, 1).load(&batch, &handle).await.unwrap();

    assert_eq!(summary.rows_inserted, 2);
    assert_eq!(summary.failed_chunks(), 1);
    assert_eq!(summary.failures[0].chunk(), 1);
}
