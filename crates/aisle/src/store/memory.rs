//! In-process store used by tests.
//!
//! Mirrors the PostgreSQL behaviour the loader depends on: DDL that fails
//! on existing tables, typed columns with NOT NULL, a unique primary key,
//! and all-or-nothing inserts.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::Mutex;

use crate::batch::Row;
use crate::error::StoreError;
use crate::schema::types::describe_mismatch;
use crate::schema::{TableDefinition, Value};
use crate::store::{Session, Store};

type TableKey = (String, String);

struct MemoryTable {
    definition: TableDefinition,
    rows: IndexMap<Value, Row>,
}

#[derive(Default)]
struct State {
    tables: IndexMap<TableKey, MemoryTable>,
    namespaces: Vec<String>,
    create_calls: usize,
    insert_calls: usize,
    unavailable: bool,
    fail_inserts_after: Option<usize>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    open_sessions: AtomicUsize,
}

/// Cloning yields another handle to the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `StoreError::Unavailable`.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.inner.state.lock().await.unavailable = unavailable;
    }

    /// Let `calls` more insert calls through, then fail the rest as
    /// unavailable.
    pub async fn fail_inserts_after(&self, calls: usize) {
        let mut state = self.inner.state.lock().await;
        state.fail_inserts_after = Some(state.insert_calls + calls);
    }

    /// Rows currently stored in `namespace.table`, in insertion order.
    pub async fn rows(&self, namespace: &str, table: &str) -> Vec<Row> {
        let state = self.inner.state.lock().await;
        state
            .tables
            .get(&key(namespace, table))
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn row_count(&self, namespace: &str, table: &str) -> usize {
        let state = self.inner.state.lock().await;
        state
            .tables
            .get(&key(namespace, table))
            .map_or(0, |t| t.rows.len())
    }

    /// Number of `create_table` calls, successful or not.
    pub async fn create_calls(&self) -> usize {
        self.inner.state.lock().await.create_calls
    }

    /// Sessions acquired and not yet dropped.
    pub fn open_sessions(&self) -> usize {
        self.inner.open_sessions.load(Ordering::SeqCst)
    }
}

fn key(namespace: &str, table: &str) -> TableKey {
    (namespace.to_string(), table.to_string())
}

fn unavailable() -> StoreError {
    StoreError::Unavailable {
        message: "memory store marked unavailable".into(),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn table_exists(&self, namespace: &str, table: &str) -> Result<bool, StoreError> {
        let state = self.inner.state.lock().await;
        if state.unavailable {
            return Err(unavailable());
        }
        Ok(state.tables.contains_key(&key(namespace, table)))
    }

    async fn create_table(&self, definition: &TableDefinition) -> Result<(), StoreError> {
        let mut state = self.inner.state.lock().await;
        state.create_calls += 1;
        if state.unavailable {
            return Err(unavailable());
        }

        let table_key = key(definition.namespace(), definition.table());
        if state.tables.contains_key(&table_key) {
            return Err(StoreError::AlreadyExists {
                object: definition.qualified_name(),
            });
        }
        if !state.namespaces.iter().any(|ns| ns == definition.namespace()) {
            state.namespaces.push(definition.namespace().to_string());
        }
        state.tables.insert(
            table_key,
            MemoryTable {
                definition: definition.clone(),
                rows: IndexMap::new(),
            },
        );
        Ok(())
    }

    async fn session(&self) -> Result<Box<dyn Session>, StoreError> {
        if self.inner.state.lock().await.unavailable {
            return Err(unavailable());
        }
        self.inner.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            inner: Arc::clone(&self.inner),
        }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct MemorySession {
    inner: Arc<Inner>,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.inner.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn insert_rows(
        &mut self,
        definition: &TableDefinition,
        rows: &[Row],
    ) -> Result<u64, StoreError> {
        let mut state = self.inner.state.lock().await;
        state.insert_calls += 1;
        if state.unavailable
            || state
                .fail_inserts_after
                .is_some_and(|limit| state.insert_calls > limit)
        {
            return Err(unavailable());
        }

        let name = definition.qualified_name();
        let Some(table) = state
            .tables
            .get_mut(&key(definition.namespace(), definition.table()))
        else {
            return Err(StoreError::Rejected {
                table: name,
                message: "relation does not exist".into(),
            });
        };

        let columns = table.definition.columns();
        let pk = table.definition.primary_key_index();
        let mut staged: IndexMap<Value, Row> = IndexMap::with_capacity(rows.len());

        for row in rows {
            if row.len() != columns.len() {
                return Err(StoreError::Rejected {
                    table: name,
                    message: format!("expected {} values, got {}", columns.len(), row.len()),
                });
            }
            for (column, value) in columns.iter().zip(row) {
                if value.is_null() && !column.is_nullable() {
                    return Err(StoreError::Rejected {
                        table: name,
                        message: format!("null value in column '{}'", column.name),
                    });
                }
                if !column.column_type.accepts(value) {
                    return Err(StoreError::Rejected {
                        table: name,
                        message: describe_mismatch(&column.name, column.column_type, value),
                    });
                }
            }

            let key_value = row[pk].clone();
            if table.rows.contains_key(&key_value) || staged.contains_key(&key_value) {
                return Err(StoreError::UniqueViolation {
                    detail: format!(
                        "Key ({})=({key_value}) already exists.",
                        columns[pk].name
                    ),
                    table: name,
                });
            }
            staged.insert(key_value, row.clone());
        }

        let inserted = staged.len() as u64;
        table.rows.extend(staged);
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSpec, ColumnType};

    fn definition() -> TableDefinition {
        TableDefinition::new(
            "dia".into(),
            "supermarkets",
            "dia",
            vec![
                ColumnSpec::primary_key("id", ColumnType::BigInt),
                ColumnSpec::new("name", ColumnType::Text).not_null(),
            ],
        )
        .unwrap()
    }

    fn row(id: i64, name: &str) -> Row {
        vec![Value::Int(id), Value::from(name)]
    }

    #[tokio::test]
    async fn test_create_twice_reports_already_exists() {
        let store = MemoryStore::new();
        store.create_table(&definition()).await.unwrap();
        let err = store.create_table(&definition()).await.unwrap_err();
        assert!(err.is_already_exists());
        assert!(store.table_exists("supermarkets", "dia").await.unwrap());
        assert_eq!(store.create_calls().await, 2);
    }

    #[tokio::test]
    async fn test_insert_is_all_or_nothing() {
        let store = MemoryStore::new();
        let def = definition();
        store.create_table(&def).await.unwrap();
        let mut session = store.session().await.unwrap();

        session.insert_rows(&def, &[row(1, "a")]).await.unwrap();
        let err = session
            .insert_rows(&def, &[row(2, "b"), row(1, "again")])
            .await
            .unwrap_err();

        assert!(err.is_unique_violation());
        assert_eq!(store.rows("supermarkets", "dia").await, vec![row(1, "a")]);
    }

    #[tokio::test]
    async fn test_rejects_null_and_mistyped_values() {
        let store = MemoryStore::new();
        let def = definition();
        store.create_table(&def).await.unwrap();
        let mut session = store.session().await.unwrap();

        let null_name = vec![Value::Int(1), Value::Null];
        assert!(matches!(
            session.insert_rows(&def, &[null_name]).await,
            Err(StoreError::Rejected { .. })
        ));
        let text_id = vec![Value::from("x"), Value::from("a")];
        assert!(matches!(
            session.insert_rows(&def, &[text_id]).await,
            Err(StoreError::Rejected { .. })
        ));
        assert_eq!(store.row_count("supermarkets", "dia").await, 0);
    }

    #[tokio::test]
    async fn test_insert_into_missing_table_rejected() {
        let store = MemoryStore::new();
        let mut session = store.session().await.unwrap();
        let err = session
            .insert_rows(&definition(), &[row(1, "a")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_session_count_tracks_drops() {
        let store = MemoryStore::new();
        let first = store.session().await.unwrap();
        let second = store.session().await.unwrap();
        assert_eq!(store.open_sessions(), 2);
        drop(first);
        drop(second);
        assert_eq!(store.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_fail_inserts_after() {
        let store = MemoryStore::new();
        let def = definition();
        store.create_table(&def).await.unwrap();
        store.fail_inserts_after(1).await;
        let mut session = store.session().await.unwrap();

        assert!(session.insert_rows(&def, &[row(1, "a")]).await.is_ok());
        let err = session.insert_rows(&def, &[row(2, "b")]).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { .. }));
    }
}
