//! In-batch deduplication by key column.

use std::collections::HashSet;

use snafu::OptionExt;

use crate::batch::RecordBatch;
use crate::error::{BatchError, MissingKeyColumnSnafu};

/// Drop every row whose key already appeared earlier in the same batch.
///
/// Single pass with a seen-set; the first occurrence wins and relative order
/// is preserved. Every column is filtered with the same mask. Only the batch
/// itself is consulted: keys persisted by earlier runs are the store's
/// constraint to enforce.
///
/// A batch with unequal column lengths fails with `ShapeMismatch` before any
/// filtering happens.
pub fn dedupe(batch: &RecordBatch, key_column: &str) -> Result<RecordBatch, BatchError> {
    let num_rows = batch.num_rows()?;
    let keys = batch
        .column(key_column)
        .context(MissingKeyColumnSnafu { column: key_column })?;

    let mut seen = HashSet::with_capacity(num_rows);
    let keep: Vec<bool> = keys.iter().map(|key| seen.insert(key)).collect();

    if keep.iter().all(|k| *k) {
        return Ok(batch.clone());
    }

    let columns = batch
        .columns()
        .map(|(name, values)| {
            let filtered = values
                .iter()
                .zip(&keep)
                .filter(|(_, keep)| **keep)
                .map(|(value, _)| value.clone())
                .collect();
            (name.clone(), filtered)
        })
        .collect();

    Ok(RecordBatch::from_columns(columns))
}
