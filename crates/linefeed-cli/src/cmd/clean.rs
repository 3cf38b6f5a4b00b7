//! `linefeed clean` - remove what a run left behind for one date

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;

use linefeed_ovapi::Cleaner;
use linefeed_warehouse::Warehouse;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Logical date whose staging table and artifacts are removed, YYYY-MM-DD
    #[arg(short, long, value_parser = super::parse_date)]
    pub date: NaiveDate,

    /// Artifact name marker (repeatable; default from config)
    #[arg(short, long)]
    pub marker: Vec<String>,
}

pub fn run(args: CleanArgs, config: &Config) -> Result<()> {
    let mut pipeline = config.pipeline_config();
    if !args.marker.is_empty() {
        pipeline.cleanup_markers = args.marker;
    }

    let mut warehouse =
        Warehouse::open(&config.warehouse_config()).context("Failed to open warehouse")?;
    let report = Cleaner::new(&pipeline).clean_date(&mut warehouse, args.date);

    let mut rows = vec![
        ("Date", args.date.to_string()),
        (
            "Staging table",
            if report.table_dropped { "dropped" } else { "not found" }.to_string(),
        ),
        ("Files removed", report.files_removed.len().to_string()),
        ("Warnings", report.warnings.len().to_string()),
    ];
    for path in &report.files_removed {
        rows.push(("Removed", path.display().to_string()));
    }
    super::print_summary("Cleanup", &rows);
    Ok(())
}
