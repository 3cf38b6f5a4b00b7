//! linefeed-warehouse: embedded analytical store for the line feed
//!
//! Wraps a DuckDB connection with the operations the pipeline needs:
//! loading a Parquet artifact into a run-scoped staging table, upserting
//! staging into the permanent table, and dropping staging afterwards.

mod config;
pub mod sql;
pub mod table;

pub use config::WarehouseConfig;
pub use table::{ColumnRole, ColumnSpec, SqlType, TableRef, TableSpec};

use std::path::Path;

use anyhow::{Context, Result, ensure};
use chrono::{DateTime, Utc};
use duckdb::{Connection, params};

use sql::MergeStatement;

/// Outcome of one upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeResult {
    pub inserted: u64,
    pub updated: u64,
    /// Value written to the merge timestamp column of every touched row
    pub merged_at: DateTime<Utc>,
}

/// Format accepted by `CAST(? AS TIMESTAMP)`.
fn timestamp_param(at: &DateTime<Utc>) -> String {
    at.naive_utc().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

pub struct Warehouse {
    conn: Connection,
}

impl Warehouse {
    /// Open (or create) the warehouse described by `config`.
    pub fn open(config: &WarehouseConfig) -> Result<Self> {
        let conn = match &config.database_path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create warehouse dir: {}", parent.display())
                    })?;
                }
                log::debug!("Opening warehouse {}", path.display());
                Connection::open(path)
                    .with_context(|| format!("Failed to open warehouse: {}", path.display()))?
            }
            None => Connection::open_in_memory()
                .context("Failed to open DuckDB in-memory connection")?,
        };

        if let Some(creds) = &config.credentials_path {
            log::debug!(
                "Credentials file {} configured; embedded warehouse does not authenticate",
                creds.display()
            );
        }

        conn.execute_batch(&format!(
            "SET memory_limit = '{}';",
            config.memory_limit.replace('\'', "")
        ))
        .context("Failed to configure DuckDB")?;

        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(&WarehouseConfig::default())
    }

    /// Underlying connection, for ad-hoc inspection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn table_exists(&self, table: &TableRef) -> Result<bool> {
        let n: i64 = self
            .conn
            .query_row(sql::table_exists(), params![table.schema(), table.name()], |row| {
                row.get(0)
            })
            .with_context(|| format!("Failed to look up table {table}"))?;
        Ok(n > 0)
    }

    pub fn row_count(&self, table: &TableRef) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row(&sql::count_rows(table), [], |row| row.get(0))
            .with_context(|| format!("Failed to count rows of {table}"))?;
        Ok(n as u64)
    }

    /// Replace `table` with the contents of a Parquet artifact.
    ///
    /// The table is recreated from `spec` (overwrite disposition), then the
    /// artifact's columns are inserted; a missing column, a type mismatch or
    /// a null in a required column aborts the load and leaves no partial
    /// staging table. Returns the number of rows loaded.
    pub fn load_staging(
        &mut self,
        spec: &TableSpec,
        table: &TableRef,
        artifact: &Path,
    ) -> Result<u64> {
        spec.validate()?;
        ensure!(
            artifact.exists(),
            "staging artifact not found: {}",
            artifact.display()
        );

        let tx = self
            .conn
            .transaction()
            .context("Failed to begin staging transaction")?;
        tx.execute_batch(&sql::create_schema(table.schema()))
            .with_context(|| format!("Failed to create schema {}", table.schema()))?;
        tx.execute_batch(&sql::create_or_replace_table(spec, table))
            .with_context(|| format!("Failed to create staging table {table}"))?;
        let loaded = tx
            .execute(&sql::load_parquet(spec, table, artifact), [])
            .with_context(|| format!("Failed to load {} into {table}", artifact.display()))?;
        tx.commit().context("Failed to commit staging load")?;

        log::debug!("Loaded {loaded} rows into {table}");
        Ok(loaded as u64)
    }

    /// Create the destination table if missing, with descriptions as comments.
    ///
    /// Returns `true` when the table was created by this call.
    pub fn ensure_table(&mut self, spec: &TableSpec, table: &TableRef) -> Result<bool> {
        spec.validate()?;
        if self.table_exists(table)? {
            return Ok(false);
        }

        let tx = self.conn.transaction().context("Failed to begin DDL transaction")?;
        tx.execute_batch(&sql::create_schema(table.schema()))
            .with_context(|| format!("Failed to create schema {}", table.schema()))?;
        tx.execute_batch(&sql::create_table(spec, table)?)
            .with_context(|| format!("Failed to create table {table}"))?;
        for stmt in sql::comments(spec, table) {
            tx.execute_batch(&stmt)
                .with_context(|| format!("Failed to comment table {table}"))?;
        }
        tx.commit().context("Failed to commit table creation")?;

        log::info!("Table created: {table}");
        Ok(true)
    }

    /// Upsert `staging` into `destination` on the spec's key.
    ///
    /// Matched keys get every non-key column overwritten, unmatched keys are
    /// inserted, and both carry `merged_at` in the merge timestamp column.
    /// Staging with repeated keys is rejected before anything is written.
    /// All statements commit together or not at all.
    pub fn merge(
        &mut self,
        spec: &TableSpec,
        staging: &TableRef,
        destination: &TableRef,
        merged_at: DateTime<Utc>,
    ) -> Result<MergeResult> {
        let stmt = MergeStatement::new(spec, staging, destination)?;
        let ts = timestamp_param(&merged_at);

        let tx = self.conn.transaction().context("Failed to begin merge transaction")?;

        let duplicates: i64 = tx
            .query_row(&stmt.duplicate_keys(), [], |row| row.get(0))
            .with_context(|| format!("Failed to check keys of {staging}"))?;
        ensure!(
            duplicates == 0,
            "{staging} holds {duplicates} rows with a repeated `{}`; upsert would be ambiguous",
            spec.key()?.name
        );

        let matched: i64 = tx
            .query_row(&stmt.matched_keys(), [], |row| row.get(0))
            .with_context(|| format!("Failed to match {staging} against {destination}"))?;

        let updated = if stmt.binds_timestamp() {
            tx.execute(&stmt.update(), params![ts])
        } else {
            tx.execute(&stmt.update(), [])
        }
        .with_context(|| format!("Failed to update {destination} from {staging}"))?;

        let inserted = if stmt.binds_timestamp() {
            tx.execute(&stmt.insert(), params![ts])
        } else {
            tx.execute(&stmt.insert(), [])
        }
        .with_context(|| format!("Failed to insert into {destination} from {staging}"))?;

        ensure!(
            updated as i64 == matched,
            "update touched {updated} rows of {destination}, expected {matched}"
        );
        tx.commit().context("Failed to commit merge")?;

        Ok(MergeResult {
            inserted: inserted as u64,
            updated: updated as u64,
            merged_at,
        })
    }

    /// Drop `table`. Returns `false` when there was nothing to drop.
    pub fn drop_table(&mut self, table: &TableRef) -> Result<bool> {
        let existed = self.table_exists(table)?;
        self.conn
            .execute_batch(&sql::drop_table(table))
            .with_context(|| format!("Failed to drop table {table}"))?;
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_param_is_utc_with_micros() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        assert_eq!(timestamp_param(&at), "2024-03-01 12:30:05.000000");
    }

    #[test]
    fn in_memory_table_lookup() {
        let wh = Warehouse::open_in_memory().unwrap();
        wh.connection()
            .execute_batch("CREATE SCHEMA s; CREATE TABLE s.t (x INTEGER)")
            .unwrap();
        assert!(wh.table_exists(&TableRef::new("s", "t").unwrap()).unwrap());
        assert!(!wh.table_exists(&TableRef::new("s", "u").unwrap()).unwrap());
    }

    #[test]
    fn drop_missing_table_reports_false() {
        let mut wh = Warehouse::open_in_memory().unwrap();
        assert!(!wh.drop_table(&TableRef::new("main", "ghost").unwrap()).unwrap());
    }
}
