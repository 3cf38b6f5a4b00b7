//! `linefeed run` - extract, transform, stage, merge and clean up for one date

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Args;

use linefeed_core::{SharedProgress, fmt_num};
use linefeed_warehouse::Warehouse;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Logical date of the run, YYYY-MM-DD (default: today, UTC)
    #[arg(short, long, value_parser = super::parse_date)]
    pub date: Option<NaiveDate>,

    /// Keep the staging table and artifact after a successful merge
    #[arg(long)]
    pub keep_staging: bool,
}

pub fn run(args: RunArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let run_date = args.date.unwrap_or_else(|| Utc::now().date_naive());
    let mut pipeline = config.pipeline_config();
    pipeline.keep_staging = args.keep_staging;

    let wh_config = config.warehouse_config();
    let mut warehouse = Warehouse::open(&wh_config).context("Failed to open warehouse")?;

    log::info!("Running line feed for {run_date}");
    let summary = linefeed_ovapi::run(&pipeline, &mut warehouse, run_date, progress)
        .with_context(|| format!("Run for {run_date} failed"))?;
    summary.log();

    let cleanup = match &summary.cleanup {
        Some(c) => format!(
            "{} files removed, {} warnings",
            c.files_removed.len(),
            summary.cleanup_warnings()
        ),
        None => format!("skipped ({} kept)", summary.staging.table),
    };
    super::print_summary(
        "Line feed",
        &[
            ("Run date", run_date.to_string()),
            ("Status", summary.task_status().to_string()),
            ("Lines extracted", fmt_num(summary.rows_extracted)),
            ("Result length", fmt_num(summary.result_length())),
            ("Inserted", fmt_num(summary.merge.inserted as usize)),
            ("Updated", fmt_num(summary.merge.updated as usize)),
            (
                "Destination",
                format!("{}.{}", pipeline.target.dataset, pipeline.target.table),
            ),
            ("Cleanup", cleanup),
            ("Elapsed", format!("{:.1}s", summary.elapsed.as_secs_f64())),
        ],
    );
    Ok(())
}
