//! Whole-database snapshots through the store's dump utility.

use std::path::Path;
use std::time::Instant;

use aisle_core::emit;
use chrono::{Datelike, Local, Weekday};
use snafu::ResultExt;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::{SnapshotConfig, StoreConfig};
use crate::error::{ExportError, SpawnSnafu};
use crate::metrics::events::SnapshotCompleted;

/// Runs `pg_dump` against the configured database.
///
/// The password travels in `PGPASSWORD`, never on the command line.
#[derive(Clone)]
pub struct SnapshotExporter {
    program: String,
    host: String,
    port: u16,
    user: String,
    password: String,
    database: String,
}

impl SnapshotExporter {
    pub fn new(store: &StoreConfig, program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            host: store.host.clone(),
            port: store.port,
            user: store.user.clone(),
            password: store.password.clone(),
            database: store.database.clone(),
        }
    }

    pub fn from_config(store: &StoreConfig, snapshot: &SnapshotConfig) -> Self {
        Self::new(store, snapshot.pg_dump.clone())
    }

    /// Dump the whole database to `destination`.
    ///
    /// Nothing is promised about the destination file after a failure.
    pub async fn export(&self, destination: &Path) -> Result<(), ExportError> {
        let start = Instant::now();
        let result = self.run(destination).await;
        emit!(SnapshotCompleted {
            success: result.is_ok(),
            duration: start.elapsed(),
        });

        match &result {
            Ok(()) => info!(
                database = %self.database,
                path = %destination.display(),
                elapsed_ms = start.elapsed().as_millis(),
                "Snapshot written"
            ),
            Err(e) => warn!(database = %self.database, error = %e, "Snapshot failed"),
        }
        result
    }

    async fn run(&self, destination: &Path) -> Result<(), ExportError> {
        let output = self
            .command(destination)
            .output()
            .await
            .context(SpawnSnafu {
                program: self.program.clone(),
            })?;

        if !output.status.success() {
            return Err(ExportError::Exit {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn command(&self, destination: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("-h")
            .arg(&self.host)
            .arg("-p")
            .arg(self.port.to_string())
            .arg("-U")
            .arg(&self.user)
            .arg("-f")
            .arg(destination)
            .arg(&self.database)
            .env("PGPASSWORD", &self.password)
            .kill_on_drop(true);
        command
    }
}

/// Whether an automatic snapshot is due today.
pub fn snapshot_due(config: &SnapshotConfig, forced: bool) -> bool {
    forced || is_due_on(config.weekday, Local::now().weekday())
}

fn is_due_on(configured: Option<Weekday>, today: Weekday) -> bool {
    configured.is_none_or(|day| day == today)
}
