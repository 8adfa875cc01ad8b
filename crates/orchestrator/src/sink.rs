//! CSV persistence for generated narrations, failures, and the run cache.
//!
//! Every table is UTF-8 with a byte-order mark so spreadsheet tools pick the
//! right encoding for the Chinese text.

use std::path::{Path, PathBuf};

use innervoice_core::{FailureRecord, GenerationRecord};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tracing::{info, warn};

use crate::error::Result;

const BOM: &[u8] = b"\xef\xbb\xbf";

/// Read serde records from a CSV file, tolerating a leading BOM.
pub async fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let bytes = fs::read(path).await?;
    let bytes = bytes.strip_prefix(BOM).unwrap_or(&bytes);

    let mut reader = csv::Reader::from_reader(bytes);
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Write serde records as a BOM-prefixed CSV file, replacing any previous
/// content.
pub async fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut bytes = BOM.to_vec();
    {
        let mut writer = csv::Writer::from_writer(&mut bytes);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
    }
    fs::write(path, bytes).await?;
    Ok(())
}

/// Persists batch outcomes: the cumulative output table and the
/// current-run-only failure table.
#[derive(Debug, Clone)]
pub struct ResultSink {
    output_path: PathBuf,
    failure_path: PathBuf,
}

impl ResultSink {
    pub fn new(output_path: impl Into<PathBuf>, failure_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            failure_path: failure_path.into(),
        }
    }

    pub fn failure_path(&self) -> &Path {
        &self.failure_path
    }

    /// Append new records after whatever the output table already holds.
    pub async fn append_records(&self, records: &[GenerationRecord]) -> Result<()> {
        if records.is_empty() {
            info!("No new records to persist");
            return Ok(());
        }

        let mut rows: Vec<GenerationRecord> =
            if fs::try_exists(&self.output_path).await.unwrap_or(false) {
                read_rows(&self.output_path).await?
            } else {
                Vec::new()
            };
        rows.extend_from_slice(records);

        write_rows(&self.output_path, &rows).await?;
        info!(
            new = records.len(),
            total = rows.len(),
            path = %self.output_path.display(),
            "Output table updated"
        );
        Ok(())
    }

    /// Replace the failure table with this run's unresolved inputs; with none,
    /// remove the file so its absence reads as "last run was clean".
    pub async fn replace_failures(&self, failures: &[FailureRecord]) -> Result<()> {
        if failures.is_empty() {
            if fs::try_exists(&self.failure_path).await.unwrap_or(false) {
                fs::remove_file(&self.failure_path).await?;
            }
            info!("No failures this run");
            return Ok(());
        }

        write_rows(&self.failure_path, failures).await?;
        warn!(
            count = failures.len(),
            path = %self.failure_path.display(),
            "Failure table written"
        );
        Ok(())
    }
}
