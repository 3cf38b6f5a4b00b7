//! Line feed pipeline configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use linefeed_warehouse::TableRef;

/// Origin recorded in `source_system` for every line
pub const SOURCE_SYSTEM: &str = "http://v0.ovapi.nl/line/";

/// Marker between table name and run date in artifact file names
pub const TRANSFORMED_MARKER: &str = "_transformed_";

/// Where a run lands in the warehouse.
#[derive(Debug, Clone)]
pub struct Target {
    /// Schema of the permanent table
    pub dataset: String,
    /// Permanent table name, also the stem of staging tables and artifacts
    pub table: String,
    /// Schema holding run-scoped staging tables
    pub staging_dataset: String,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            dataset: "dw_test".to_string(),
            table: "lines".to_string(),
            staging_dataset: "dw_temporary".to_string(),
        }
    }
}

impl Target {
    pub fn destination(&self) -> anyhow::Result<TableRef> {
        TableRef::new(&self.dataset, &self.table)
    }

    /// `{staging_dataset}.{table}_{YYYYMMDD}`
    pub fn staging_table(&self, run_date: NaiveDate) -> anyhow::Result<TableRef> {
        TableRef::new(
            &self.staging_dataset,
            format!("{}_{}", self.table, run_date.format("%Y%m%d")),
        )
    }

    /// `{dataset}.{table}{marker}{YYYY-MM-DD}` without extension
    pub fn artifact_stem(&self, marker: &str, run_date: NaiveDate) -> String {
        format!(
            "{}.{}{marker}{}",
            self.dataset,
            self.table,
            run_date.format("%Y-%m-%d")
        )
    }

    pub fn artifact_path(&self, artifact_dir: &Path, run_date: NaiveDate) -> PathBuf {
        artifact_dir.join(format!(
            "{}.parquet",
            self.artifact_stem(TRANSFORMED_MARKER, run_date)
        ))
    }
}

/// Runtime configuration for the line feed pipeline
#[derive(Debug, Clone)]
pub struct Config {
    /// API base URL, e.g. `http://v0.ovapi.nl`
    pub base_url: String,
    /// Endpoint path appended to the base URL
    pub endpoint: String,
    /// Deadline for the whole feed request
    pub timeout: Duration,
    /// Directory for intermediate Parquet artifacts
    pub artifact_dir: PathBuf,
    /// Zstd compression level for the artifact
    pub zstd_level: i32,
    /// Artifact name markers removed by the cleaner
    pub cleanup_markers: Vec<String>,
    /// Leave the staging table and artifact in place after a successful merge
    pub keep_staging: bool,
    pub target: Target,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://v0.ovapi.nl".to_string(),
            endpoint: "/line/".to_string(),
            timeout: Duration::from_secs(60),
            artifact_dir: PathBuf::from("./data"),
            zstd_level: 3,
            cleanup_markers: vec![TRANSFORMED_MARKER.to_string()],
            keep_staging: false,
            target: Target::default(),
        }
    }
}

impl Config {
    /// `{base_url}{endpoint}`, joined verbatim
    pub fn feed_url(&self) -> String {
        format!("{}{}", self.base_url, self.endpoint)
    }
}
