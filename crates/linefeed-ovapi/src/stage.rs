//! Batch → Parquet artifact → run-scoped staging table

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use linefeed_core::ParquetSink;
use linefeed_warehouse::{TableRef, Warehouse};
use rustc_hash::FxHashSet;

use crate::config::Config;
use crate::error::PipelineError;
use crate::schema::{self, LINES};
use crate::transform::{Batch, LineAccumulator, LineRecord};

/// What one run staged: the table to merge from and the artifact it was loaded from.
#[derive(Debug, Clone)]
pub struct StagingHandle {
    pub run_date: NaiveDate,
    pub table: TableRef,
    pub artifact: PathBuf,
    pub rows: u64,
}

/// Name of the first required column that is null in `rec`, if any.
fn missing_required(rec: &LineRecord) -> Option<&'static str> {
    if rec.data_owner_code.is_none() {
        Some("data_owner_code")
    } else if rec.line_planning_number.is_none() {
        Some("line_planning_number")
    } else if rec.line_direction.is_none() {
        Some("line_direction")
    } else {
        None
    }
}

/// Reject a batch that the destination schema cannot hold.
///
/// Checks every REQUIRED column for nulls and `pk_line_id` for repeats.
/// The error names the first offending line and how many others share the problem.
pub fn validate_batch(batch: &[LineRecord]) -> Result<(), PipelineError> {
    let mut first_null: Option<(&str, &str)> = None;
    let mut nulls = 0usize;
    let mut seen = FxHashSet::with_capacity_and_hasher(batch.len(), Default::default());
    let mut first_dup: Option<&str> = None;
    let mut dups = 0usize;

    for rec in batch {
        if let Some(col) = missing_required(rec) {
            nulls += 1;
            first_null.get_or_insert((rec.pk_line_id.as_str(), col));
        }
        if !seen.insert(rec.pk_line_id.as_str()) {
            dups += 1;
            first_dup.get_or_insert(rec.pk_line_id.as_str());
        }
    }

    if let Some((id, col)) = first_null {
        return Err(PipelineError::SchemaLoad(format!(
            "line {id:?}: required column `{col}` is null ({nulls} lines affected)"
        )));
    }
    if let Some(id) = first_dup {
        return Err(PipelineError::SchemaLoad(format!(
            "pk_line_id {id:?} appears more than once ({dups} repeated keys)"
        )));
    }
    Ok(())
}

/// Write `batch` to `path` through a temp file, replacing any previous artifact.
pub fn write_artifact(path: &Path, batch: Batch, zstd_level: i32) -> anyhow::Result<usize> {
    let mut acc = LineAccumulator::with_capacity(batch.len());
    for rec in batch {
        acc.push(rec);
    }
    let rb = acc
        .take_batch()
        .context("Failed to build artifact record batch")?;

    let mut sink = ParquetSink::create(path, schema::artifact(), zstd_level)
        .with_context(|| format!("Failed to create artifact {}", path.display()))?;
    sink.write_batch(&rb)
        .with_context(|| format!("Failed to write artifact {}", path.display()))?;
    let rows = sink
        .finalize()
        .with_context(|| format!("Failed to finalize artifact {}", path.display()))?;
    Ok(rows)
}

pub struct Stager<'a> {
    config: &'a Config,
}

impl<'a> Stager<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Validate, write the date-named artifact, and load it into the
    /// date-named staging table (overwriting a previous run for the same date).
    pub fn stage(
        &self,
        warehouse: &mut Warehouse,
        batch: Batch,
        run_date: NaiveDate,
    ) -> Result<StagingHandle, PipelineError> {
        validate_batch(&batch)?;

        let target = &self.config.target;
        let table = target
            .staging_table(run_date)
            .map_err(|e| PipelineError::schema_load(&e))?;
        let artifact = target.artifact_path(&self.config.artifact_dir, run_date);

        let written = write_artifact(&artifact, batch, self.config.zstd_level)
            .map_err(|e| PipelineError::schema_load(&e))?;
        log::info!("Artifact written: {} ({written} rows)", artifact.display());

        let rows = warehouse
            .load_staging(&LINES, &table, &artifact)
            .map_err(|e| PipelineError::schema_load(&e))?;
        if rows != written as u64 {
            return Err(PipelineError::SchemaLoad(format!(
                "{table} received {rows} rows, artifact holds {written}"
            )));
        }
        log::info!("Data loaded to staging table {table}");

        Ok(StagingHandle {
            run_date,
            table,
            artifact,
            rows,
        })
    }
}
