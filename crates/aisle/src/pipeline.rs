//! Ingest runner: provision, produce, load and notify for each dataset.
//!
//! Datasets are processed one after another in configuration order. A
//! failure aborts only the dataset it belongs to. A shutdown signal stops
//! the run between datasets.

use std::sync::Arc;

use snafu::ResultExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::batch::RecordBatch;
use crate::config::{Config, DatasetId, SnapshotConfig};
use crate::error::{
    BatchSnafu, DatasetError, ExportError, MetricsSnafu, PipelineError, ProduceSnafu,
    ProvisionSnafu, StoreSnafu,
};
use crate::export::{SnapshotExporter, snapshot_due};
use crate::loader::{BatchLoader, LoadSummary};
use crate::notify::{CompletionEvent, CompletionSinkRef, sink_from_config};
use crate::producer::{JsonFileProducer, RecordProducer};
use crate::provision::{ProvisionReport, TableProvisioner};
use crate::schema::{SchemaRegistry, TableDefinition};
use crate::store::{PostgresStore, Store, StoreRef};

/// Per-run switches from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Only these datasets; every configured dataset when empty.
    pub datasets: Vec<DatasetId>,
    /// Provision tables and stop.
    pub provision_only: bool,
    /// Snapshot regardless of `snapshot.weekday`.
    pub force_snapshot: bool,
}

/// What happened to one dataset.
#[derive(Debug)]
pub enum DatasetOutcome {
    Loaded(LoadSummary),
    Failed(DatasetError),
    /// Shutdown was requested before the dataset started.
    Skipped,
}

impl DatasetOutcome {
    /// Loaded without non-duplicate chunk failures. A skipped dataset still
    /// needs a run.
    pub fn is_success(&self) -> bool {
        match self {
            DatasetOutcome::Loaded(summary) => summary.is_complete(),
            DatasetOutcome::Failed(_) | DatasetOutcome::Skipped => false,
        }
    }
}

/// Result of a whole run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub provision: ProvisionReport,
    pub datasets: Vec<(DatasetId, DatasetOutcome)>,
    /// `None` when no snapshot was due.
    pub snapshot: Option<Result<(), ExportError>>,
}

impl RunReport {
    /// Every dataset loaded completely. Snapshot failures do not count.
    pub fn is_success(&self) -> bool {
        self.provision.failed() == 0 && self.datasets.iter().all(|(_, o)| o.is_success())
    }

    pub fn rows_inserted(&self) -> u64 {
        self.datasets
            .iter()
            .filter_map(|(_, outcome)| match outcome {
                DatasetOutcome::Loaded(summary) => Some(summary.rows_inserted),
                _ => None,
            })
            .sum()
    }

    pub fn outcome(&self, dataset: &DatasetId) -> Option<&DatasetOutcome> {
        self.datasets
            .iter()
            .find(|(id, _)| id == dataset)
            .map(|(_, outcome)| outcome)
    }
}

/// Wires the registry, provisioner, loader, producer and sink together.
pub struct IngestRunner {
    registry: SchemaRegistry,
    provisioner: TableProvisioner,
    loader: BatchLoader,
    producer: Arc<dyn RecordProducer>,
    sink: CompletionSinkRef,
    snapshot: Option<(SnapshotExporter, SnapshotConfig)>,
    store_name: &'static str,
}

impl IngestRunner {
    pub fn new(
        config: &Config,
        store: StoreRef,
        producer: Arc<dyn RecordProducer>,
        sink: CompletionSinkRef,
    ) -> Result<Self, PipelineError> {
        let registry = config.build_registry()?;
        let snapshot = config.snapshot.as_ref().map(|snapshot| {
            (
                SnapshotExporter::from_config(&config.store, snapshot),
                snapshot.clone(),
            )
        });

        Ok(Self {
            store_name: store.name(),
            registry,
            provisioner: TableProvisioner::new(Arc::clone(&store)),
            loader: BatchLoader::new(store, &config.loader),
            producer,
            sink,
            snapshot,
        })
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Run the selected datasets, then the snapshot if it is due.
    pub async fn run(
        &self,
        options: &RunOptions,
        shutdown: &CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        let selected = self.select(&options.datasets)?;
        info!(
            store = self.store_name,
            datasets = selected.len(),
            provision_only = options.provision_only,
            "Starting ingest run"
        );

        let mut report = RunReport {
            provision: self.provisioner.ensure_all(&selected).await,
            ..RunReport::default()
        };
        if options.provision_only {
            return Ok(report);
        }

        for definition in &selected {
            let dataset = definition.dataset().clone();
            if shutdown.is_cancelled() {
                info!(dataset = %dataset, "Shutdown requested, skipping dataset");
                report.datasets.push((dataset, DatasetOutcome::Skipped));
                continue;
            }

            let outcome = match self.run_dataset(definition).await {
                Ok(summary) => {
                    if summary.is_complete() {
                        self.notify(&dataset, &summary).await;
                    }
                    DatasetOutcome::Loaded(summary)
                }
                Err(e) => {
                    error!(dataset = %dataset, error = %e, "Dataset failed");
                    DatasetOutcome::Failed(e)
                }
            };
            report.datasets.push((dataset, outcome));
        }

        if !shutdown.is_cancelled() {
            report.snapshot = self.snapshot(options.force_snapshot).await;
        }

        info!(
            datasets = report.datasets.len(),
            failed = report.datasets.iter().filter(|(_, o)| !o.is_success()).count(),
            rows_inserted = report.rows_inserted(),
            "Ingest run complete"
        );
        Ok(report)
    }

    fn select(&self, datasets: &[DatasetId]) -> Result<Vec<Arc<TableDefinition>>, PipelineError> {
        if datasets.is_empty() {
            return Ok(self.registry.definitions().cloned().collect());
        }
        datasets
            .iter()
            .map(|id| self.registry.resolve(id).map_err(PipelineError::from))
            .collect()
    }

    async fn run_dataset(
        &self,
        definition: &Arc<TableDefinition>,
    ) -> Result<LoadSummary, DatasetError> {
        let handle = self
            .provisioner
            .ensure(Arc::clone(definition))
            .await
            .context(ProvisionSnafu)?;
        let batch: RecordBatch = self
            .producer
            .produce(definition.dataset())
            .await
            .context(ProduceSnafu)?;
        self.loader.load(&batch, &handle).await.context(BatchSnafu)
    }

    async fn notify(&self, dataset: &DatasetId, summary: &LoadSummary) {
        let event = CompletionEvent::from_summary(dataset.clone(), summary);
        if let Err(e) = self.sink.notify(&event).await {
            warn!(dataset = %dataset, error = %e, "Failed to deliver completion event");
        }
    }

    async fn snapshot(&self, forced: bool) -> Option<Result<(), ExportError>> {
        let (exporter, config) = self.snapshot.as_ref()?;
        if !snapshot_due(config, forced) {
            info!(weekday = ?config.weekday, "Snapshot not due today");
            return None;
        }
        Some(exporter.export(&config.path).await)
    }
}

/// Run one ingest pass against PostgreSQL with the configured producer and
/// sink.
pub async fn run_pipeline(
    config: Config,
    options: RunOptions,
) -> Result<RunReport, PipelineError> {
    if let Some(address) = &config.metrics.address {
        aisle_core::init_metrics(address).context(MetricsSnafu)?;
    }
    let shutdown = aisle_core::shutdown_token();

    let store: StoreRef = Arc::new(PostgresStore::connect(&config.store).context(StoreSnafu)?);
    let producer = Arc::new(JsonFileProducer::from_config(&config));
    let sink = sink_from_config(&config.notify);

    let runner = IngestRunner::new(&config, store, producer, sink)?;
    runner.run(&options, &shutdown).await
}
