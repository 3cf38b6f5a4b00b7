//! Staging table → permanent table upsert

use chrono::{DateTime, Utc};
use linefeed_warehouse::{MergeResult, Warehouse};

use crate::config::Config;
use crate::error::PipelineError;
use crate::schema::LINES;
use crate::stage::StagingHandle;

pub struct Merger<'a> {
    config: &'a Config,
}

impl<'a> Merger<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Upsert the staged rows on `pk_line_id`, stamping `load_timestamp` with now.
    pub fn merge(
        &self,
        warehouse: &mut Warehouse,
        staging: &StagingHandle,
    ) -> Result<MergeResult, PipelineError> {
        self.merge_at(warehouse, staging, Utc::now())
    }

    /// As [`Merger::merge`] with an explicit merge time.
    ///
    /// Creates the destination (with descriptions and labels) if it does not
    /// exist yet. Any warehouse rejection is a [`PipelineError::Merge`].
    pub fn merge_at(
        &self,
        warehouse: &mut Warehouse,
        staging: &StagingHandle,
        merged_at: DateTime<Utc>,
    ) -> Result<MergeResult, PipelineError> {
        let destination = self
            .config
            .target
            .destination()
            .map_err(|e| PipelineError::merge(&e))?;

        if warehouse
            .ensure_table(&LINES, &destination)
            .map_err(|e| PipelineError::merge(&e))?
        {
            log::info!("Destination table {destination} created");
        } else {
            log::debug!("Destination table {destination} already exists");
        }

        let result = warehouse
            .merge(&LINES, &staging.table, &destination, merged_at)
            .map_err(|e| PipelineError::merge(&e))?;
        log::info!(
            "Data merged to {destination}: {} inserted, {} updated",
            result.inserted,
            result.updated
        );
        Ok(result)
    }
}
