//! Post-merge cleanup: drop the staging table and remove run artifacts
//!
//! Nothing here is fatal. Anything already gone, or that cannot be removed,
//! becomes a [`CleanupWarning`] logged at warn level.

use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use glob::Pattern;
use linefeed_warehouse::{TableRef, Warehouse};

use crate::config::Config;
use crate::error::CleanupWarning;
use crate::stage::StagingHandle;

/// What a cleanup pass removed and what it could not.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub table_dropped: bool,
    pub files_removed: Vec<PathBuf>,
    pub warnings: Vec<CleanupWarning>,
}

impl CleanupReport {
    fn warn(&mut self, message: String) {
        log::warn!("{message}");
        self.warnings.push(CleanupWarning(message));
    }
}

pub struct Cleaner<'a> {
    config: &'a Config,
}

impl<'a> Cleaner<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Glob matching every artifact of `run_date` carrying `marker`:
    /// `{artifact_dir}/{dataset}.{table}{marker}{YYYY-MM-DD}.*`
    pub fn artifact_pattern(&self, marker: &str, run_date: NaiveDate) -> String {
        let dir = self.config.artifact_dir.to_string_lossy();
        let stem = self.config.target.artifact_stem(marker, run_date);
        format!("{}/{}.*", Pattern::escape(&dir), Pattern::escape(&stem))
    }

    /// Clean up after a successful merge.
    pub fn cleanup(&self, warehouse: &mut Warehouse, staging: &StagingHandle) -> CleanupReport {
        self.clean(warehouse, &staging.table, staging.run_date)
    }

    /// Clean up whatever a run for `run_date` left behind.
    pub fn clean_date(&self, warehouse: &mut Warehouse, run_date: NaiveDate) -> CleanupReport {
        match self.config.target.staging_table(run_date) {
            Ok(table) => self.clean(warehouse, &table, run_date),
            Err(e) => {
                let mut report = CleanupReport::default();
                report.warn(format!("Staging table name invalid: {e:#}"));
                self.remove_artifacts(&mut report, run_date);
                report
            }
        }
    }

    fn clean(
        &self,
        warehouse: &mut Warehouse,
        table: &TableRef,
        run_date: NaiveDate,
    ) -> CleanupReport {
        let mut report = CleanupReport::default();

        match warehouse.drop_table(table) {
            Ok(true) => {
                log::info!("Staging table deleted: {table}");
                report.table_dropped = true;
            }
            Ok(false) => report.warn(format!("Staging table {table} does not exist")),
            Err(e) => report.warn(format!("Failed to drop staging table {table}: {e:#}")),
        }

        self.remove_artifacts(&mut report, run_date);
        report
    }

    fn remove_artifacts(&self, report: &mut CleanupReport, run_date: NaiveDate) {
        for marker in &self.config.cleanup_markers {
            let pattern = self.artifact_pattern(marker, run_date);
            let paths = match glob::glob(&pattern) {
                Ok(paths) => paths,
                Err(e) => {
                    report.warn(format!("Invalid cleanup pattern {pattern}: {e}"));
                    continue;
                }
            };

            let mut matched = 0usize;
            for entry in paths {
                matched += 1;
                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        report.warn(format!("Cannot read {}: {}", e.path().display(), e.error()));
                        continue;
                    }
                };
                match fs::remove_file(&path) {
                    Ok(()) => {
                        log::info!("File cleaned: {}", path.display());
                        report.files_removed.push(path);
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        report.warn(format!("The file does not exist: {}", path.display()));
                    }
                    Err(e) => {
                        report.warn(format!("Failed to remove {}: {e}", path.display()));
                    }
                }
            }
            if matched == 0 {
                report.warn(format!("No files match {pattern}"));
            }
        }
    }
}
