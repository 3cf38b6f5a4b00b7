//! Pipeline orchestration: one run for one logical date
//!
//! `EXTRACTING → TRANSFORMING → STAGING → MERGING → CLEANING → DONE`.
//! Any error moves the run to `FAILED`. A merge failure skips cleaning so the
//! staging table and artifact stay available for inspection.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use linefeed_core::{ProgressContext, fmt_num};
use linefeed_warehouse::{MergeResult, Warehouse};

use crate::cleanup::{CleanupReport, Cleaner};
use crate::config::Config;
use crate::error::PipelineError;
use crate::feed::fetch_feed;
use crate::merge::Merger;
use crate::stage::{StagingHandle, Stager};
use crate::transform::transform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extracting,
    Transforming,
    Staging,
    Merging,
    Cleaning,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Extracting => "EXTRACTING",
            Self::Transforming => "TRANSFORMING",
            Self::Staging => "STAGING",
            Self::Merging => "MERGING",
            Self::Cleaning => "CLEANING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        })
    }
}

/// Outcome of a successful run
#[derive(Debug)]
pub struct RunSummary {
    pub run_date: NaiveDate,
    pub rows_extracted: usize,
    pub rows_transformed: usize,
    pub staging: StagingHandle,
    pub merge: MergeResult,
    /// `None` when cleanup was skipped on request
    pub cleanup: Option<CleanupReport>,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Status text of the transformation step
    pub fn task_status(&self) -> &'static str {
        "Transformation step: success"
    }

    /// Number of records produced by the transformer
    pub fn result_length(&self) -> usize {
        self.rows_transformed
    }

    /// Warnings raised by cleanup, zero when it was skipped
    pub fn cleanup_warnings(&self) -> usize {
        self.cleanup.as_ref().map_or(0, |c| c.warnings.len())
    }

    pub fn log(&self) {
        log::info!("=== Run Summary ({}) ===", self.run_date);
        log::info!(
            "Lines: {} extracted, {} transformed, {} staged",
            fmt_num(self.rows_extracted),
            fmt_num(self.rows_transformed),
            fmt_num(self.staging.rows as usize)
        );
        log::info!(
            "Merge: {} inserted, {} updated at {}",
            fmt_num(self.merge.inserted as usize),
            fmt_num(self.merge.updated as usize),
            self.merge.merged_at
        );
        match &self.cleanup {
            Some(c) => log::info!(
                "Cleanup: table {}, {} files removed, {} warnings",
                if c.table_dropped { "dropped" } else { "not dropped" },
                c.files_removed.len(),
                self.cleanup_warnings()
            ),
            None => log::info!("Cleanup: skipped, {} kept", self.staging.table),
        }
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
    }
}

/// Tracks the current stage and mirrors it on the progress line and in the log.
struct Tracker {
    stage: Stage,
    pb: indicatif::ProgressBar,
}

impl Tracker {
    fn enter(&mut self, stage: Stage, detail: impl fmt::Display) {
        self.stage = stage;
        log::info!("{stage}: {detail}");
        self.pb.set_message(format!("{stage} {detail}"));
    }

    fn fail(&mut self, err: &PipelineError) {
        log::error!("{} during {}: {err}", Stage::Failed, self.stage);
        if matches!(err, PipelineError::Merge(_)) {
            log::error!("Cleanup skipped; staging table and artifact left in place");
        }
        self.stage = Stage::Failed;
        self.pb.finish_and_clear();
    }
}

/// Run the pipeline for `run_date` against `warehouse`.
pub fn run(
    config: &Config,
    warehouse: &mut Warehouse,
    run_date: NaiveDate,
    progress: &ProgressContext,
) -> Result<RunSummary, PipelineError> {
    let start = Instant::now();
    let mut tracker = Tracker {
        stage: Stage::Extracting,
        pb: progress.stage_line(&run_date.to_string()),
    };

    let result = run_stages(config, warehouse, run_date, &mut tracker, start);
    match &result {
        Ok(summary) => {
            tracker.enter(Stage::Done, format!("{:.1}s", summary.elapsed.as_secs_f64()));
            tracker.pb.finish_and_clear();
        }
        Err(e) => tracker.fail(e),
    }
    result
}

fn run_stages(
    config: &Config,
    warehouse: &mut Warehouse,
    run_date: NaiveDate,
    tracker: &mut Tracker,
    start: Instant,
) -> Result<RunSummary, PipelineError> {
    tracker.enter(Stage::Extracting, config.feed_url());
    let feed = fetch_feed(config)?;
    let rows_extracted = feed.len();

    tracker.enter(Stage::Transforming, format!("{} lines", fmt_num(rows_extracted)));
    let batch = transform(feed);
    let rows_transformed = batch.len();

    tracker.enter(Stage::Staging, format!("{} lines", fmt_num(rows_transformed)));
    let staging = Stager::new(config).stage(warehouse, batch, run_date)?;

    tracker.enter(
        Stage::Merging,
        format!(
            "{} into {}.{}",
            staging.table, config.target.dataset, config.target.table
        ),
    );
    let merge = Merger::new(config).merge(warehouse, &staging)?;

    let cleanup = if config.keep_staging {
        log::info!("Keeping {} and {}", staging.table, staging.artifact.display());
        None
    } else {
        tracker.enter(Stage::Cleaning, &staging.table);
        Some(Cleaner::new(config).cleanup(warehouse, &staging))
    };

    Ok(RunSummary {
        run_date,
        rows_extracted,
        rows_transformed,
        staging,
        merge,
        cleanup,
        elapsed: start.elapsed(),
    })
}
