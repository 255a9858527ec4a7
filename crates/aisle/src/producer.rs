//! Record producers.
//!
//! The extraction layer writes one column-oriented JSON document per
//! dataset; producers turn those into [`RecordBatch`]es.

use std::path::PathBuf;

use async_trait::async_trait;
use indexmap::IndexMap;
use snafu::{OptionExt, ResultExt};
use tracing::debug;

use crate::batch::RecordBatch;
use crate::config::{Config, DatasetId};
use crate::error::{DecodeSourceSnafu, NoSourceSnafu, ProduceError, ReadSourceSnafu};

/// Source of record batches, one per dataset.
#[async_trait]
pub trait RecordProducer: Send + Sync {
    async fn produce(&self, dataset: &DatasetId) -> Result<RecordBatch, ProduceError>;
}

/// Reads `{"column": [values...], ...}` files from disk.
#[derive(Debug, Clone, Default)]
pub struct JsonFileProducer {
    sources: IndexMap<DatasetId, PathBuf>,
}

impl JsonFileProducer {
    pub fn new(sources: IndexMap<DatasetId, PathBuf>) -> Self {
        Self { sources }
    }

    /// Collect the `source` path of every configured dataset.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config
                .datasets()
                .filter_map(|(id, dataset)| {
                    dataset.source.as_ref().map(|path| (id.clone(), path.clone()))
                })
                .collect(),
        )
    }
}

#[async_trait]
impl RecordProducer for JsonFileProducer {
    async fn produce(&self, dataset: &DatasetId) -> Result<RecordBatch, ProduceError> {
        let path = self.sources.get(dataset).context(NoSourceSnafu {
            dataset: dataset.to_string(),
        })?;

        let contents = tokio::fs::read(path)
            .await
            .context(ReadSourceSnafu { path })?;
        let batch: RecordBatch =
            serde_json::from_slice(&contents).context(DecodeSourceSnafu { path })?;

        debug!(
            dataset = %dataset,
            path = %path.display(),
            columns = batch.num_columns(),
            "Read record batch"
        );
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Value;

    fn producer_for(dataset: &str, path: PathBuf) -> JsonFileProducer {
        JsonFileProducer::new(IndexMap::from([(DatasetId::new(dataset), path)]))
    }

    #[tokio::test]
    async fn test_reads_column_oriented_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frutas.json");
        std::fs::write(
            &path,
            r#"{"id": ["p1", "p2"], "name": ["Manzana", "Pera"], "price": [1.5, null]}"#,
        )
        .unwrap();

        let batch = producer_for("frutas", path)
            .produce(&"frutas".into())
            .await
            .unwrap();

        assert_eq!(batch.num_rows().unwrap(), 2);
        assert_eq!(batch.column("price").unwrap(), [Value::Float(1.5), Value::Null]);
    }

    #[tokio::test]
    async fn test_unconfigured_dataset() {
        let err = JsonFileProducer::default()
            .produce(&"frutas".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ProduceError::NoSource { .. }));
    }

    #[tokio::test]
    async fn test_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = producer_for("frutas", dir.path().join("absent.json"));
        assert!(matches!(
            missing.produce(&"frutas".into()).await,
            Err(ProduceError::ReadSource { .. })
        ));

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        let broken = producer_for("frutas", path);
        assert!(matches!(
            broken.produce(&"frutas".into()).await,
            Err(ProduceError::DecodeSource { .. })
        ));
    }
}
