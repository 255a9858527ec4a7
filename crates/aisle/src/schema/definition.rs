//! Table definitions: the data-only description of a dataset's table.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::DatasetId;
use crate::error::RegistryError;
use crate::schema::types::ColumnType;

/// One column of a table definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Defaults to nullable, except for the primary key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(default)]
    pub primary_key: bool,
}

impl ColumnSpec {
    /// A nullable, non-key column.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: None,
            primary_key: false,
        }
    }

    /// A primary-key column.
    pub fn primary_key(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            primary_key: true,
            ..Self::new(name, column_type)
        }
    }

    /// Mark the column NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = Some(false);
        self
    }

    /// Effective nullability.
    pub fn is_nullable(&self) -> bool {
        self.nullable.unwrap_or(!self.primary_key)
    }
}

/// Immutable description of one dataset's table.
///
/// Construction validates the structural invariants, so every
/// `TableDefinition` has exactly one primary-key column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    dataset: DatasetId,
    namespace: String,
    table: String,
    columns: Vec<ColumnSpec>,
    primary_key: usize,
}

impl TableDefinition {
    /// Build and validate a definition.
    pub fn new(
        dataset: DatasetId,
        namespace: impl Into<String>,
        table: impl Into<String>,
        columns: Vec<ColumnSpec>,
    ) -> Result<Self, RegistryError> {
        let namespace = namespace.into();
        let table = table.into();
        let invalid = |message: String| RegistryError::InvalidDefinition {
            dataset: dataset.id().to_string(),
            message,
        };

        if namespace.is_empty() {
            return Err(invalid("namespace is empty".into()));
        }
        if table.is_empty() {
            return Err(invalid("table name is empty".into()));
        }
        if columns.is_empty() {
            return Err(invalid("no columns defined".into()));
        }

        let mut names = HashSet::with_capacity(columns.len());
        for column in &columns {
            if column.name.is_empty() {
                return Err(invalid("column with empty name".into()));
            }
            if !names.insert(column.name.as_str()) {
                return Err(invalid(format!("column '{}' defined twice", column.name)));
            }
        }

        let keys: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key)
            .map(|(i, _)| i)
            .collect();
        let primary_key = match keys.as_slice() {
            [single] => *single,
            [] => return Err(invalid("no primary-key column".into())),
            _ => {
                return Err(invalid(format!(
                    "{} primary-key columns, exactly one is required",
                    keys.len()
                )));
            }
        };
        if columns[primary_key].is_nullable() {
            return Err(invalid(format!(
                "primary-key column '{}' cannot be nullable",
                columns[primary_key].name
            )));
        }

        Ok(Self {
            dataset,
            namespace,
            table,
            columns,
            primary_key,
        })
    }

    pub fn dataset(&self) -> &DatasetId {
        &self.dataset
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// The single primary-key column.
    pub fn primary_key(&self) -> &ColumnSpec {
        &self.columns[self.primary_key]
    }

    /// Position of the primary-key column in `columns()`.
    pub fn primary_key_index(&self) -> usize {
        self.primary_key
    }

    /// `namespace.table`, used in logs and metric labels.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.table)
    }

    /// Same columns, types, key and location; the dataset id is not compared.
    pub fn same_structure(&self, other: &Self) -> bool {
        self.namespace == other.namespace
            && self.table == other.table
            && self.columns == other.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::primary_key("id", ColumnType::Text),
            ColumnSpec::new("name", ColumnType::Text),
            ColumnSpec::new("price", ColumnType::Double),
        ]
    }

    #[test]
    fn test_valid_definition() {
        let def =
            TableDefinition::new("mercadona".into(), "supermarkets", "mercadona", columns())
                .unwrap();
        assert_eq!(def.primary_key().name, "id");
        assert_eq!(def.primary_key_index(), 0);
        assert!(!def.primary_key().is_nullable());
        assert!(def.columns()[1].is_nullable());
        assert_eq!(def.qualified_name(), "supermarkets.mercadona");
    }

    #[test]
    fn test_no_primary_key_rejected() {
        let err = TableDefinition::new(
            "x".into(),
            "ns",
            "x",
            vec![ColumnSpec::new("id", ColumnType::Text)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("no primary-key column"));
    }

    #[test]
    fn test_two_primary_keys_rejected() {
        let err = TableDefinition::new(
            "x".into(),
            "ns",
            "x",
            vec![
                ColumnSpec::primary_key("id", ColumnType::Text),
                ColumnSpec::primary_key("sku", ColumnType::Text),
            ],
        )
        .unwrap_err();
        assert!(err.to_string().contains("exactly one"));
    }

    #[test]
    fn test_nullable_primary_key_rejected() {
        let mut key = ColumnSpec::primary_key("id", ColumnType::Text);
        key.nullable = Some(true);
        let err = TableDefinition::new("x".into(), "ns", "x", vec![key]).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidDefinition { .. }));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let mut cols = columns();
        cols.push(ColumnSpec::new("name", ColumnType::Text));
        let err = TableDefinition::new("x".into(), "ns", "x", cols).unwrap_err();
        assert!(err.to_string().contains("'name' defined twice"));
    }

    #[test]
    fn test_same_structure_ignores_dataset() {
        let a = TableDefinition::new("a".into(), "ns", "t", columns()).unwrap();
        let b = TableDefinition::new("b".into(), "ns", "t", columns()).unwrap();
        assert!(a.same_structure(&b));
    }

    #[test]
    fn test_column_spec_from_yaml() {
        let spec: ColumnSpec =
            serde_yaml::from_str("{ name: id, type: bigint, primary_key: true }").unwrap();
        assert_eq!(spec, ColumnSpec::primary_key("id", ColumnType::BigInt));
        assert!(!spec.is_nullable());
    }
}
