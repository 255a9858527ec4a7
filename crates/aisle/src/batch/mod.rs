//! Column-oriented record batches as delivered by producers.

mod dedupe;

pub use dedupe::dedupe;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::BatchError;
use crate::schema::{TableDefinition, Value};

/// One record, aligned to a table definition's column order.
pub type Row = Vec<Value>;

/// Ordered mapping from column name to that column's values.
///
/// Row `i` is the `i`-th element of every column. The shape is validated
/// when the batch is used, not when it is built, since producers may hand
/// over malformed data.
///
/// Serialized as a JSON object of arrays:
///
/// ```
/// use aisle::batch::RecordBatch;
///
/// let batch: RecordBatch =
///     serde_json::from_str(r#"{"id": [1, 2], "name": ["a", "b"]}"#).unwrap();
/// assert_eq!(batch.num_rows().unwrap(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordBatch {
    columns: IndexMap<String, Vec<Value>>,
}

impl RecordBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns(columns: IndexMap<String, Vec<Value>>) -> Self {
        Self { columns }
    }

    /// Builder-style column append. A column with the same name is replaced.
    pub fn with_column<V: Into<Value>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.columns
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&String, &Vec<Value>)> {
        self.columns.iter()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows, or `ShapeMismatch` if the columns disagree.
    pub fn num_rows(&self) -> Result<usize, BatchError> {
        let mut lengths = self.columns.values().map(Vec::len);
        let Some(first) = lengths.next() else {
            return Ok(0);
        };
        if lengths.all(|len| len == first) {
            Ok(first)
        } else {
            Err(BatchError::ShapeMismatch {
                lengths: self
                    .columns
                    .iter()
                    .map(|(name, values)| (name.clone(), values.len()))
                    .collect(),
            })
        }
    }

    /// Batch columns that the definition does not know about.
    pub fn unknown_columns<'a>(&'a self, definition: &TableDefinition) -> Vec<&'a str> {
        self.columns
            .keys()
            .filter(|name| !definition.columns().iter().any(|c| &c.name == *name))
            .map(String::as_str)
            .collect()
    }

    /// Convert to rows aligned with `definition`'s columns.
    ///
    /// Columns the batch lacks are filled with nulls; unknown batch columns
    /// are dropped. The primary-key column must be present.
    pub fn to_rows(&self, definition: &TableDefinition) -> Result<Vec<Row>, BatchError> {
        let num_rows = self.num_rows()?;
        let key = &definition.primary_key().name;
        if !self.columns.contains_key(key) {
            return Err(BatchError::MissingKeyColumn {
                column: key.clone(),
            });
        }

        let sources: Vec<Option<&Vec<Value>>> = definition
            .columns()
            .iter()
            .map(|c| self.columns.get(&c.name))
            .collect();

        Ok((0..num_rows)
            .map(|i| {
                sources
                    .iter()
                    .map(|source| source.map_or(Value::Null, |values| values[i].clone()))
                    .collect()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSpec, ColumnType};

    fn definition() -> TableDefinition {
        TableDefinition::new(
            "mercadona".into(),
            "supermarkets",
            "mercadona",
            vec![
                ColumnSpec::primary_key("id", ColumnType::BigInt),
                ColumnSpec::new("name", ColumnType::Text),
                ColumnSpec::new("price", ColumnType::Double),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_empty_batch_has_zero_rows() {
        assert_eq!(RecordBatch::new().num_rows().unwrap(), 0);
    }

    #[test]
    fn test_shape_mismatch_detected() {
        let batch = RecordBatch::new()
            .with_column("id", [1i64, 2, 3])
            .with_column("name", ["a", "b"]);
        let err = batch.num_rows().unwrap_err();
        assert!(matches!(err, BatchError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_to_rows_aligns_and_fills_missing() {
        let batch = RecordBatch::new()
            .with_column("name", ["a", "b"])
            .with_column("id", [1i64, 2])
            .with_column("brand", ["x", "y"]);

        let rows = batch.to_rows(&definition()).unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::Int(1), Value::from("a"), Value::Null],
                vec![Value::Int(2), Value::from("b"), Value::Null],
            ]
        );
        assert_eq!(batch.unknown_columns(&definition()), vec!["brand"]);
    }

    #[test]
    fn test_to_rows_requires_key_column() {
        let batch = RecordBatch::new().with_column("name", ["a"]);
        let err = batch.to_rows(&definition()).unwrap_err();
        assert!(matches!(err, BatchError::MissingKeyColumn { column } if column == "id"));
    }

    #[test]
    fn test_json_roundtrip_preserves_column_order() {
        let json = r#"{"name":["a"],"id":[1]}"#;
        let batch: RecordBatch = serde_json::from_str(json).unwrap();
        let names: Vec<_> = batch.columns().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["name", "id"]);
        assert_eq!(serde_json::to_string(&batch).unwrap(), json);
    }
}
