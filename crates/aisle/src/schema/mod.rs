//! Dataset schemas: column types, table definitions and the registry.

pub mod definition;
pub mod registry;
pub mod types;

pub use definition::{ColumnSpec, TableDefinition};
pub use registry::{SchemaRegistry, TableTemplate};
pub use types::{ColumnType, Value};
