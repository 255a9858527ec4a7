//! Configuration for aisle ingestion runs.

mod dataset_id;

use std::fmt;
use std::path::PathBuf;

use chrono::Weekday;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use aisle_core::config::{
    ConfigArgs, ConfigPath, Mergeable, MetricsConfig, interpolate, load_from_paths,
};
pub use dataset_id::DatasetId;

use crate::error::{ConfigError, RegistryError};
use crate::schema::{ColumnSpec, SchemaRegistry, TableDefinition, TableTemplate};

/// Rows per chunk when the configuration does not say otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_database() -> String {
    "postgres".to_string()
}

fn default_pool_size() -> usize {
    4
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_chunk_concurrency() -> usize {
    1
}

fn default_pg_dump() -> String {
    "pg_dump".to_string()
}

/// Connection settings for the PostgreSQL store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_database")]
    pub database: String,
    /// Maximum pooled connections. Concurrent chunks each hold one.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: String::new(),
            database: default_database(),
            pool_size: default_pool_size(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("pool_size", &self.pool_size)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Batch loader settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderConfig {
    /// Maximum rows per chunk (one transaction each).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Chunks written at the same time. 1 keeps a single session per load.
    #[serde(default = "default_chunk_concurrency")]
    pub chunk_concurrency: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_concurrency: default_chunk_concurrency(),
        }
    }
}

/// One dataset: where its rows come from and which table they land in.
///
/// Either `columns` (with `namespace`) or `template` must be given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    /// Target namespace. Overrides the template's namespace when both are set.
    pub namespace: Option<String>,
    /// Table name; defaults to the dataset id with `-` replaced by `_`.
    pub table: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    /// Name of an entry under `templates`.
    pub template: Option<String>,
    /// JSON file produced by the extraction layer.
    pub source: Option<PathBuf>,
}

/// Database snapshot settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotConfig {
    /// Destination file for the dump.
    pub path: PathBuf,
    /// Dump executable.
    #[serde(default = "default_pg_dump")]
    pub pg_dump: String,
    /// Only run automatically on this day (local time). Every run when unset.
    pub weekday: Option<Weekday>,
}

/// Where completion events go.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NotifyConfig {
    #[default]
    Log,
    /// Append one JSON event per line.
    File { path: PathBuf },
}

/// Main configuration for aisle.
///
/// # Example
///
/// ```yaml
/// store:
///   host: ${PGHOST:-localhost}
///   user: scraper
///   password: ${PGPASSWORD}
///   database: supermarkets
///
/// templates:
///   el-corte-ingles:
///     namespace: elCorteIngles
///     columns:
///       - { name: id, type: text, primary_key: true }
///       - { name: name, type: text }
///       - { name: price, type: double }
///
/// datasets:
///   frutas:
///     template: el-corte-ingles
///     source: /var/lib/scraper/frutas.json
///   mercadona:
///     namespace: supermarkets
///     columns:
///       - { name: id, type: bigint, primary_key: true }
///       - { name: name, type: text }
///
/// snapshot:
///   path: /backups/supermarkets.sql
///   weekday: sun
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    /// Shared column layouts, by name.
    #[serde(default)]
    pub templates: IndexMap<String, TableTemplate>,
    /// Datasets, processed in this order.
    #[serde(default)]
    pub datasets: IndexMap<DatasetId, DatasetConfig>,
    #[serde(default)]
    pub snapshot: Option<SnapshotConfig>,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Mergeable for Config {
    type Key = DatasetId;
    type Component = DatasetConfig;

    fn components_mut(&mut self) -> &mut IndexMap<Self::Key, Self::Component> {
        &mut self.datasets
    }

    fn merge_settings(&mut self, other: Self) {
        if other.store != StoreConfig::default() {
            self.store = other.store;
        }
        if other.loader != LoaderConfig::default() {
            self.loader = other.loader;
        }
        self.templates.extend(other.templates);
        if other.snapshot.is_some() {
            self.snapshot = other.snapshot;
        }
        if other.notify != NotifyConfig::default() {
            self.notify = other.notify;
        }
        self.metrics.merge_from(other.metrics);
    }
}

impl Config {
    /// Load configuration from multiple paths (files or directories).
    pub fn from_paths(paths: &[ConfigPath]) -> Result<Self, ConfigError> {
        let config: Self = load_from_paths(paths)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let text = interpolate(contents).map_err(|errors| ConfigError::EnvInterpolation {
            message: errors.join("\n"),
        })?;
        let config = Self::parse_yaml(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the merged configuration.
    ///
    /// Checks:
    /// - chunk size and chunk concurrency are positive
    /// - every dataset has either columns (with a namespace) or a known template
    /// - snapshot path is not empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.loader.chunk_size == 0 {
            return Err(invalid("loader", "chunk_size must be greater than 0"));
        }
        if self.loader.chunk_concurrency == 0 {
            return Err(invalid("loader", "chunk_concurrency must be greater than 0"));
        }
        if self.store.pool_size == 0 {
            return Err(invalid("store", "pool_size must be greater than 0"));
        }

        for (id, dataset) in &self.datasets {
            match (&dataset.template, dataset.columns.is_empty()) {
                (Some(_), false) => {
                    return Err(invalid(id, "set either columns or template, not both"));
                }
                (None, true) => {
                    return Err(invalid(id, "no columns or template defined"));
                }
                (Some(template), true) => {
                    if !self.templates.contains_key(template) {
                        return Err(invalid(id, format!("unknown template '{template}'")));
                    }
                }
                (None, false) => {
                    if dataset.namespace.is_none() {
                        return Err(invalid(id, "namespace is required with columns"));
                    }
                }
            }
        }

        if let Some(snapshot) = &self.snapshot
            && snapshot.path.as_os_str().is_empty()
        {
            return Err(invalid("snapshot", "path is empty"));
        }

        Ok(())
    }

    /// Register every configured dataset, in configuration order.
    pub fn build_registry(&self) -> Result<SchemaRegistry, RegistryError> {
        let mut registry = SchemaRegistry::new();
        for (id, dataset) in &self.datasets {
            if let Some(name) = &dataset.template {
                let Some(template) = self.templates.get(name) else {
                    return Err(RegistryError::InvalidDefinition {
                        dataset: id.to_string(),
                        message: format!("unknown template '{name}'"),
                    });
                };
                let template = match &dataset.namespace {
                    Some(namespace) => TableTemplate {
                        namespace: namespace.clone(),
                        columns: template.columns.clone(),
                    },
                    None => template.clone(),
                };
                registry.register_from_template(id.clone(), &template, dataset.table.clone())?;
            } else {
                let definition = TableDefinition::new(
                    id.clone(),
                    dataset.namespace.clone().unwrap_or_default(),
                    dataset
                        .table
                        .clone()
                        .unwrap_or_else(|| id.default_table_name()),
                    dataset.columns.clone(),
                )?;
                registry.register(definition)?;
            }
        }
        Ok(registry)
    }

    /// Iterate over all datasets with their ids.
    pub fn datasets(&self) -> impl Iterator<Item = (&DatasetId, &DatasetConfig)> {
        self.datasets.iter()
    }

    pub fn dataset_count(&self) -> usize {
        self.datasets.len()
    }
}

fn invalid(component: impl ToString, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        component: component.to_string(),
        message: message.into(),
    }
}
