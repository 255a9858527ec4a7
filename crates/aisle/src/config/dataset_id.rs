//! Dataset identifier.
//!
//! A dataset is one logical source of records (one retailer, or one category
//! of a retailer's catalog) destined for exactly one table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a dataset in aisle configuration.
///
/// # Examples
///
/// ```
/// use aisle::config::DatasetId;
///
/// let id = DatasetId::new("aceites-y-vinagres");
/// assert_eq!(id.default_table_name(), "aceites_y_vinagres");
/// assert_eq!(id.display_name(), "Aceites y vinagres");
/// ```
#[derive(Debug, Clone, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(String);

impl DatasetId {
    /// Create a new dataset id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the underlying identifier string.
    pub fn id(&self) -> &str {
        &self.0
    }

    /// Table name used when a definition does not name one: `-` becomes `_`.
    pub fn default_table_name(&self) -> String {
        self.0.replace('-', "_")
    }

    /// Human-readable name: first letter upper-cased, `-` becomes a space.
    pub fn display_name(&self) -> String {
        let spaced = self.0.replace('-', " ");
        let mut chars = spaced.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DatasetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DatasetId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_name() {
        assert_eq!(DatasetId::new("mercadona").default_table_name(), "mercadona");
        assert_eq!(
            DatasetId::new("frutas-y-verduras").default_table_name(),
            "frutas_y_verduras"
        );
    }

    #[test]
    fn test_display_name() {
        assert_eq!(DatasetId::new("frutas-y-verduras").display_name(), "Frutas y verduras");
        assert_eq!(DatasetId::new("").display_name(), "");
    }

    #[test]
    fn test_serde_transparent() {
        let id = DatasetId::new("supermercado");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"supermercado\"");
        let parsed: DatasetId = serde_json::from_str("\"supermercado\"").unwrap();
        assert_eq!(parsed, id);
    }
}
