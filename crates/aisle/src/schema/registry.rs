//! Schema registry: dataset identifier → table definition.
//!
//! Pure in-memory state. The registry never talks to the store; the
//! provisioner consumes its definitions.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DatasetId;
use crate::error::RegistryError;
use crate::schema::definition::{ColumnSpec, TableDefinition};

/// A column layout shared by many datasets in one namespace.
///
/// Catalog categories of the same retailer all land in tables with the
/// same columns, one table per category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableTemplate {
    pub namespace: String,
    pub columns: Vec<ColumnSpec>,
}

/// Registered table definitions, in registration order.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    definitions: IndexMap<DatasetId, Arc<TableDefinition>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition.
    ///
    /// Registering a structurally identical definition again returns the
    /// existing entry. A different structure under the same id, or a second
    /// dataset claiming the same `namespace.table`, is a conflict.
    pub fn register(
        &mut self,
        definition: TableDefinition,
    ) -> Result<Arc<TableDefinition>, RegistryError> {
        let dataset = definition.dataset().clone();

        if let Some(existing) = self.definitions.get(&dataset) {
            if existing.same_structure(&definition) {
                return Ok(Arc::clone(existing));
            }
            return Err(RegistryError::Conflict {
                dataset: dataset.to_string(),
                reason: "already registered with a different structure".into(),
            });
        }

        if let Some(owner) = self.definitions.values().find(|existing| {
            existing.namespace() == definition.namespace() && existing.table() == definition.table()
        }) {
            return Err(RegistryError::Conflict {
                dataset: dataset.to_string(),
                reason: format!(
                    "table {} already belongs to dataset '{}'",
                    owner.qualified_name(),
                    owner.dataset()
                ),
            });
        }

        debug!(dataset = %dataset, table = %definition.qualified_name(), "Registered dataset");
        let definition = Arc::new(definition);
        self.definitions.insert(dataset, Arc::clone(&definition));
        Ok(definition)
    }

    /// Register a dataset whose columns come from a shared template.
    ///
    /// The table name defaults to the dataset id with `-` replaced by `_`.
    pub fn register_from_template(
        &mut self,
        dataset: DatasetId,
        template: &TableTemplate,
        table: Option<String>,
    ) -> Result<Arc<TableDefinition>, RegistryError> {
        let table = table.unwrap_or_else(|| dataset.default_table_name());
        let definition = TableDefinition::new(
            dataset,
            template.namespace.clone(),
            table,
            template.columns.clone(),
        )?;
        self.register(definition)
    }

    /// Look up the definition registered for `dataset`.
    pub fn resolve(&self, dataset: &DatasetId) -> Result<Arc<TableDefinition>, RegistryError> {
        self.definitions
            .get(dataset)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                dataset: dataset.to_string(),
            })
    }

    /// All definitions, in registration order.
    pub fn definitions(&self) -> impl Iterator<Item = &Arc<TableDefinition>> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
