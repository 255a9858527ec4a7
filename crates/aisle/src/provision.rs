//! Table provisioning.
//!
//! Makes sure a registered table exists in the store before rows are
//! loaded into it. Every check asks the store catalog; nothing is cached,
//! so a table dropped externally is recreated on the next call.

use std::fmt;
use std::sync::Arc;

use aisle_core::emit;
use snafu::ResultExt;
use tracing::{debug, error, info};

use crate::config::DatasetId;
use crate::error::{CreateSnafu, LookupSnafu, ProvisionError};
use crate::metrics::events::TableCreated;
use crate::schema::TableDefinition;
use crate::store::StoreRef;

/// A table confirmed present in the store.
///
/// Only the provisioner hands these out.
#[derive(Debug, Clone)]
pub struct TableHandle {
    definition: Arc<TableDefinition>,
}

impl TableHandle {
    pub fn definition(&self) -> &TableDefinition {
        &self.definition
    }

    pub fn dataset(&self) -> &DatasetId {
        self.definition.dataset()
    }

    pub fn qualified_name(&self) -> String {
        self.definition.qualified_name()
    }
}

/// What `ensure` had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    AlreadyPresent,
}

impl fmt::Display for ProvisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionOutcome::Created => f.write_str("created"),
            ProvisionOutcome::AlreadyPresent => f.write_str("already present"),
        }
    }
}

/// Per-dataset result of [`TableProvisioner::ensure_all`].
#[derive(Debug, Default)]
pub struct ProvisionReport {
    pub entries: Vec<(DatasetId, Result<ProvisionOutcome, ProvisionError>)>,
}

impl ProvisionReport {
    pub fn created(&self) -> usize {
        self.count(|r| matches!(r, Ok(ProvisionOutcome::Created)))
    }

    pub fn already_present(&self) -> usize {
        self.count(|r| matches!(r, Ok(ProvisionOutcome::AlreadyPresent)))
    }

    pub fn failed(&self) -> usize {
        self.count(Result::is_err)
    }

    /// Datasets whose table could not be provisioned.
    pub fn failures(&self) -> impl Iterator<Item = (&DatasetId, &ProvisionError)> {
        self.entries
            .iter()
            .filter_map(|(dataset, result)| result.as_ref().err().map(|e| (dataset, e)))
    }

    fn count(&self, pred: impl Fn(&Result<ProvisionOutcome, ProvisionError>) -> bool) -> usize {
        self.entries.iter().filter(|(_, r)| pred(r)).count()
    }
}

/// Creates missing tables, exactly once.
pub struct TableProvisioner {
    store: StoreRef,
}

impl TableProvisioner {
    pub fn new(store: StoreRef) -> Self {
        Self { store }
    }

    /// Ensure the table for `definition` exists and return its handle.
    pub async fn ensure(
        &self,
        definition: Arc<TableDefinition>,
    ) -> Result<TableHandle, ProvisionError> {
        self.ensure_with_outcome(definition)
            .await
            .map(|(handle, _)| handle)
    }

    /// Provision every definition, continuing past failures.
    pub async fn ensure_all<'a, I>(&self, definitions: I) -> ProvisionReport
    where
        I: IntoIterator<Item = &'a Arc<TableDefinition>>,
    {
        let mut report = ProvisionReport::default();
        for definition in definitions {
            let dataset = definition.dataset().clone();
            let result = self
                .ensure_with_outcome(Arc::clone(definition))
                .await
                .map(|(_, outcome)| outcome);
            if let Err(e) = &result {
                error!(dataset = %dataset, error = %e, "Failed to provision table");
            }
            report.entries.push((dataset, result));
        }

        info!(
            created = report.created(),
            already_present = report.already_present(),
            failed = report.failed(),
            "Provisioning complete"
        );
        report
    }

    async fn ensure_with_outcome(
        &self,
        definition: Arc<TableDefinition>,
    ) -> Result<(TableHandle, ProvisionOutcome), ProvisionError> {
        let table = definition.qualified_name();

        if self.exists(&definition).await? {
            debug!(dataset = %definition.dataset(), table = %table, "Table already present");
            return Ok((TableHandle { definition }, ProvisionOutcome::AlreadyPresent));
        }

        match self.store.create_table(&definition).await {
            Ok(()) => {
                info!(dataset = %definition.dataset(), table = %table, "Created table");
                emit!(TableCreated {
                    table: table.clone()
                });
            }
            Err(e) if e.is_already_exists() || e.is_unique_violation() => {
                debug!(
                    dataset = %definition.dataset(),
                    table = %table,
                    "Table created concurrently"
                );
            }
            Err(e) => return Err(e).context(CreateSnafu { table }),
        }

        if !self.exists(&definition).await? {
            return Err(ProvisionError::NotVisible { table });
        }
        Ok((TableHandle { definition }, ProvisionOutcome::Created))
    }

    async fn exists(&self, definition: &TableDefinition) -> Result<bool, ProvisionError> {
        self.store
            .table_exists(definition.namespace(), definition.table())
            .await
            .context(LookupSnafu {
                table: definition.qualified_name(),
            })
    }
}
