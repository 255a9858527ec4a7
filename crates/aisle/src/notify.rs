//! Completion notifications.
//!
//! After a dataset loads without non-duplicate chunk failures the runner
//! hands a [`CompletionEvent`] to a [`CompletionSink`]. Delivery failures are
//! logged by the caller and never change the load outcome.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::config::{DatasetId, NotifyConfig};
use crate::error::{EncodeEventSnafu, NotifyError, WriteEventSnafu};
use crate::loader::LoadSummary;

/// A dataset finished loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub dataset: DatasetId,
    /// Qualified `namespace.table` name.
    pub table: String,
    /// Distinct rows in the batch after duplicate keys were dropped.
    pub row_count: usize,
    pub inserted_rows: u64,
    pub completed_at: DateTime<Utc>,
}

impl CompletionEvent {
    pub fn from_summary(dataset: DatasetId, summary: &LoadSummary) -> Self {
        Self {
            dataset,
            table: summary.table.clone(),
            row_count: summary.rows_after_dedupe,
            inserted_rows: summary.rows_inserted,
            completed_at: Utc::now(),
        }
    }

    /// Human subject line, e.g. `"Aceites y vinagres" stored successfully`.
    pub fn subject(&self) -> String {
        format!("\"{}\" stored successfully", self.dataset.display_name())
    }
}

/// Destination for completion events.
#[async_trait]
pub trait CompletionSink: Send + Sync {
    async fn notify(&self, event: &CompletionEvent) -> Result<(), NotifyError>;
}

pub type CompletionSinkRef = Arc<dyn CompletionSink>;

/// Build the sink selected in configuration.
pub fn sink_from_config(config: &NotifyConfig) -> CompletionSinkRef {
    match config {
        NotifyConfig::Log => Arc::new(LogSink),
        NotifyConfig::File { path } => Arc::new(FileSink::new(path.clone())),
    }
}

/// Writes each event as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl CompletionSink for LogSink {
    async fn notify(&self, event: &CompletionEvent) -> Result<(), NotifyError> {
        info!(
            dataset = %event.dataset,
            table = %event.table,
            row_count = event.row_count,
            inserted_rows = event.inserted_rows,
            subject = %event.subject(),
            "Dataset stored"
        );
        Ok(())
    }
}

/// Appends events to a file, one JSON object per line.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CompletionSink for FileSink {
    async fn notify(&self, event: &CompletionEvent) -> Result<(), NotifyError> {
        let mut line = serde_json::to_vec(event).context(EncodeEventSnafu)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .context(WriteEventSnafu { path: &self.path })?;
        file.write_all(&line)
            .await
            .context(WriteEventSnafu { path: &self.path })?;
        file.flush()
            .await
            .context(WriteEventSnafu { path: &self.path })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(dataset: &str) -> CompletionEvent {
        CompletionEvent {
            dataset: dataset.into(),
            table: format!("elCorteIngles.{}", dataset.replace('-', "_")),
            row_count: 120,
            inserted_rows: 118,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_subject_uses_display_name() {
        assert_eq!(
            event("aceites-y-vinagres").subject(),
            "\"Aceites y vinagres\" stored successfully"
        );
    }

    #[test]
    fn test_row_count_excludes_dropped_duplicates() {
        let mut summary = LoadSummary::new("elCorteIngles.frutas".into(), 5, 3);
        summary.record(Ok(3));

        let event = CompletionEvent::from_summary("frutas".into(), &summary);
        assert_eq!(event.row_count, 3);
        assert_eq!(event.inserted_rows, 3);
    }

    #[tokio::test]
    async fn test_log_sink_always_succeeds() {
        assert!(LogSink.notify(&event("frutas")).await.is_ok());
    }

    #[tokio::test]
    async fn test_file_sink_appends_ndjson() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.ndjson");
        let sink = FileSink::new(&path);

        sink.notify(&event("frutas")).await.unwrap();
        sink.notify(&event("verduras")).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let events: Vec<CompletionEvent> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].dataset.id(), "frutas");
        assert_eq!(events[1].inserted_rows, 118);
    }

    #[tokio::test]
    async fn test_file_sink_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("missing").join("events.ndjson"));
        let err = sink.notify(&event("frutas")).await.unwrap_err();
        assert!(matches!(err, NotifyError::WriteEvent { .. }));
    }
}
