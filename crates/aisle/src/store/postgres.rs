//! PostgreSQL store backed by a `deadpool-postgres` connection pool.

use std::error::Error;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::NoTls;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use tracing::{debug, info};

use crate::batch::Row;
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::schema::{TableDefinition, Value};
use crate::store::{Session, Store, sql};

/// PostgreSQL implementation of [`Store`].
///
/// Connections are opened lazily on first use; building the store does not
/// validate connectivity.
pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    /// Build a connection pool from the store configuration.
    pub fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(&config.host)
            .port(config.port)
            .user(&config.user)
            .password(&config.password)
            .dbname(&config.database)
            .application_name("aisle")
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs));

        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(manager)
            .max_size(config.pool_size)
            .build()
            .map_err(|e| StoreError::Pool {
                message: format!("pool creation failed: {e}"),
            })?;

        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            pool_size = config.pool_size,
            "PostgreSQL pool configured"
        );
        Ok(Self { pool })
    }

    async fn client(&self) -> Result<deadpool_postgres::Object, StoreError> {
        self.pool.get().await.map_err(|e| StoreError::Pool {
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn table_exists(&self, namespace: &str, table: &str) -> Result<bool, StoreError> {
        let client = self.client().await?;
        let row = client
            .query_one(sql::TABLE_EXISTS, &[&namespace, &table])
            .await
            .map_err(|e| classify(e, table))?;
        row.try_get(0).map_err(|e| classify(e, table))
    }

    async fn create_table(&self, definition: &TableDefinition) -> Result<(), StoreError> {
        let client = self.client().await?;
        let table = definition.qualified_name();

        // Concurrent CREATE SCHEMA IF NOT EXISTS can still collide in the catalog.
        if let Err(e) = client
            .execute(sql::create_schema(definition.namespace()).as_str(), &[])
            .await
        {
            match classify(e, definition.namespace()) {
                StoreError::AlreadyExists { .. } | StoreError::UniqueViolation { .. } => {
                    debug!(namespace = %definition.namespace(), "Namespace created concurrently");
                }
                other => return Err(other),
            }
        }

        client
            .execute(sql::create_table(definition).as_str(), &[])
            .await
            .map_err(|e| created_concurrently(classify(e, &table)))?;
        Ok(())
    }

    async fn session(&self) -> Result<Box<dyn Session>, StoreError> {
        let client = self.client().await?;
        Ok(Box::new(PostgresSession { client }))
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

/// One pooled connection; returned to the pool on drop.
struct PostgresSession {
    client: deadpool_postgres::Object,
}

#[async_trait]
impl Session for PostgresSession {
    async fn insert_rows(
        &mut self,
        definition: &TableDefinition,
        rows: &[Row],
    ) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let table = definition.qualified_name();
        let client: &mut tokio_postgres::Client = &mut self.client;

        // Dropping the transaction without commit rolls it back.
        let transaction = client.transaction().await.map_err(|e| classify(e, &table))?;

        let mut inserted = 0;
        let per_statement = sql::max_rows_per_statement(definition.columns().len());
        for statement_rows in rows.chunks(per_statement) {
            let statement = sql::insert(definition, statement_rows.len());
            let params: Vec<&(dyn ToSql + Sync)> = statement_rows
                .iter()
                .flatten()
                .map(|value| value as &(dyn ToSql + Sync))
                .collect();
            inserted += transaction
                .execute(statement.as_str(), &params)
                .await
                .map_err(|e| classify(e, &table))?;
        }

        transaction.commit().await.map_err(|e| classify(e, &table))?;
        Ok(inserted)
    }
}

/// Map a driver error onto the store taxonomy.
fn classify(source: tokio_postgres::Error, object: &str) -> StoreError {
    let Some(code) = source.code() else {
        return StoreError::Postgres { source };
    };

    if *code == SqlState::UNIQUE_VIOLATION {
        let detail = source
            .as_db_error()
            .map(|db| db.detail().unwrap_or(db.message()).to_string())
            .unwrap_or_else(|| source.to_string());
        StoreError::UniqueViolation {
            table: object.to_string(),
            detail,
        }
    } else if *code == SqlState::DUPLICATE_TABLE || *code == SqlState::DUPLICATE_SCHEMA {
        StoreError::AlreadyExists {
            object: object.to_string(),
        }
    } else {
        StoreError::Postgres { source }
    }
}

/// Racing `CREATE TABLE` statements for one name can fail the loser on the
/// `pg_type` catalog index instead of with `duplicate_table`.
fn created_concurrently(error: StoreError) -> StoreError {
    match error {
        StoreError::UniqueViolation { table, .. } => StoreError::AlreadyExists { object: table },
        other => other,
    }
}

/// Values are encoded according to the parameter type the server inferred
/// from the target column.
impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) if *ty == Type::BOOL => v.to_sql(ty, out),
            Value::Int(v) if *ty == Type::INT8 => v.to_sql(ty, out),
            Value::Int(v) if *ty == Type::INT4 => i32::try_from(*v)?.to_sql(ty, out),
            Value::Int(v) if *ty == Type::INT2 => i16::try_from(*v)?.to_sql(ty, out),
            Value::Int(v) if *ty == Type::FLOAT8 => (*v as f64).to_sql(ty, out),
            Value::Float(v) if *ty == Type::FLOAT8 => v.to_sql(ty, out),
            Value::Float(v) if *ty == Type::FLOAT4 => (*v as f32).to_sql(ty, out),
            Value::Text(v) if *ty == Type::TIMESTAMPTZ => DateTime::parse_from_rfc3339(v)?
                .with_timezone(&Utc)
                .to_sql(ty, out),
            Value::Text(v) if <&str as ToSql>::accepts(ty) => v.as_str().to_sql(ty, out),
            other => Err(format!("cannot encode {other} as {ty}").into()),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}
