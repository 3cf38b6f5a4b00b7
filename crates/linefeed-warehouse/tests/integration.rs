use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use duckdb::Connection;
use linefeed_warehouse::{ColumnRole, ColumnSpec, SqlType, TableRef, TableSpec, Warehouse};
use tempfile::TempDir;

const ITEM_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        name: "item_id",
        sql_type: SqlType::Varchar,
        required: true,
        role: ColumnRole::Key,
        description: "Natural key.",
    },
    ColumnSpec {
        name: "label",
        sql_type: SqlType::Varchar,
        required: false,
        role: ColumnRole::Value,
        description: "Display label.",
    },
    ColumnSpec {
        name: "qty",
        sql_type: SqlType::BigInt,
        required: true,
        role: ColumnRole::Value,
        description: "Quantity.",
    },
    ColumnSpec {
        name: "loaded_at",
        sql_type: SqlType::Timestamp,
        required: false,
        role: ColumnRole::MergeTimestamp,
        description: "Latest load time.",
    },
];

const ITEMS: TableSpec = TableSpec {
    columns: ITEM_COLUMNS,
    description: "Test items",
    labels: &[("org_unit", "tests")],
    partition_by: Some("DATE(loaded_at)"),
    cluster_by: Some("label"),
};

/// Write a parquet artifact from VALUES SQL using DuckDB.
fn write_parquet(dir: &Path, filename: &str, cols: &str, values: &str) -> PathBuf {
    let conn = Connection::open_in_memory().unwrap();
    let path = dir.join(filename);
    conn.execute_batch(&format!(
        "COPY (SELECT * FROM (VALUES {values}) AS t({cols})) \
         TO '{}' (FORMAT PARQUET)",
        path.display()
    ))
    .unwrap();
    path
}

fn items_artifact(dir: &Path, filename: &str, values: &str) -> PathBuf {
    write_parquet(dir, filename, "item_id, label, qty", values)
}

fn staging(date: &str) -> TableRef {
    TableRef::new("dw_temporary", format!("items_{date}")).unwrap()
}

fn destination() -> TableRef {
    TableRef::new("dw_test", "items").unwrap()
}

/// (item_id, label, qty, loaded_at as text) ordered by key
fn dump(wh: &Warehouse, table: &TableRef) -> Vec<(String, Option<String>, i64, Option<String>)> {
    let mut stmt = wh
        .connection()
        .prepare(&format!(
            "SELECT item_id, label, qty, CAST(loaded_at AS VARCHAR) FROM {} ORDER BY item_id",
            table.quoted()
        ))
        .unwrap();
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })
        .unwrap();
    rows.map(|r| r.unwrap()).collect()
}

#[test]
fn load_staging_overwrites_on_rerun() {
    let _ = env_logger::builder().is_test(true).try_init();
    let tmp = TempDir::new().unwrap();
    let mut wh = Warehouse::open_in_memory().unwrap();
    let table = staging("20240101");

    let first = items_artifact(tmp.path(), "a.parquet", "('A', 'x', 1), ('B', 'y', 2)");
    assert_eq!(wh.load_staging(&ITEMS, &table, &first).unwrap(), 2);

    let second = items_artifact(tmp.path(), "b.parquet", "('C', 'z', 3)");
    assert_eq!(wh.load_staging(&ITEMS, &table, &second).unwrap(), 1);

    assert_eq!(wh.row_count(&table).unwrap(), 1);
}

#[test]
fn load_staging_rejects_missing_column() {
    let tmp = TempDir::new().unwrap();
    let mut wh = Warehouse::open_in_memory().unwrap();
    let artifact = write_parquet(tmp.path(), "bad.parquet", "item_id, label", "('A', 'x')");

    let err = wh
        .load_staging(&ITEMS, &staging("20240101"), &artifact)
        .unwrap_err();
    assert!(format!("{err:#}").contains("Failed to load"));
}

#[test]
fn load_staging_rejects_null_in_required_column() {
    let tmp = TempDir::new().unwrap();
    let mut wh = Warehouse::open_in_memory().unwrap();
    let artifact = items_artifact(tmp.path(), "nulls.parquet", "('A', 'x', NULL::BIGINT)");

    assert!(wh
        .load_staging(&ITEMS, &staging("20240101"), &artifact)
        .is_err());
    // The failed load rolled back: no half-built staging table
    assert!(!wh.table_exists(&staging("20240101")).unwrap());
}

#[test]
fn load_staging_missing_artifact() {
    let tmp = TempDir::new().unwrap();
    let mut wh = Warehouse::open_in_memory().unwrap();
    assert!(wh
        .load_staging(&ITEMS, &staging("20240101"), &tmp.path().join("none.parquet"))
        .is_err());
}

#[test]
fn ensure_table_creates_once_with_comments() {
    let mut wh = Warehouse::open_in_memory().unwrap();
    assert!(wh.ensure_table(&ITEMS, &destination()).unwrap());
    assert!(!wh.ensure_table(&ITEMS, &destination()).unwrap());

    let comment: String = wh
        .connection()
        .query_row(
            "SELECT comment FROM duckdb_tables() WHERE schema_name = 'dw_test' AND table_name = 'items'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(comment.contains("Test items"));
    assert!(comment.contains("org_unit=tests"));

    let key_comment: String = wh
        .connection()
        .query_row(
            "SELECT comment FROM duckdb_columns() \
             WHERE schema_name = 'dw_test' AND table_name = 'items' AND column_name = 'item_id'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(key_comment, "Natural key.");
}

#[test]
fn destination_rejects_repeated_key_from_any_writer() {
    let tmp = TempDir::new().unwrap();
    let mut wh = Warehouse::open_in_memory().unwrap();
    wh.ensure_table(&ITEMS, &destination()).unwrap();
    let artifact = items_artifact(tmp.path(), "a.parquet", "('A', 'x', 1)");
    wh.load_staging(&ITEMS, &staging("20240101"), &artifact).unwrap();
    wh.merge(&ITEMS, &staging("20240101"), &destination(), Utc::now())
        .unwrap();

    // A writer bypassing the merge
    let err = wh
        .connection()
        .execute_batch("INSERT INTO dw_test.items SELECT * FROM dw_test.items")
        .unwrap_err();
    assert!(err.to_string().to_lowercase().contains("constraint"));
    assert_eq!(wh.row_count(&destination()).unwrap(), 1);

    // The key survives a later upsert of the same row
    wh.load_staging(&ITEMS, &staging("20240102"), &artifact).unwrap();
    let result = wh
        .merge(&ITEMS, &staging("20240102"), &destination(), Utc::now())
        .unwrap();
    assert_eq!((result.updated, result.inserted), (1, 0));
    assert_eq!(wh.row_count(&destination()).unwrap(), 1);
}

#[test]
fn merge_into_empty_destination_inserts_all() {
    let tmp = TempDir::new().unwrap();
    let mut wh = Warehouse::open_in_memory().unwrap();
    let artifact = items_artifact(tmp.path(), "a.parquet", "('A', 'x', 1), ('B', NULL, 2)");
    wh.load_staging(&ITEMS, &staging("20240101"), &artifact).unwrap();
    wh.ensure_table(&ITEMS, &destination()).unwrap();

    let at = Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap();
    let result = wh
        .merge(&ITEMS, &staging("20240101"), &destination(), at)
        .unwrap();
    assert_eq!(result.inserted, 2);
    assert_eq!(result.updated, 0);
    assert_eq!(result.merged_at, at);

    let rows = dump(&wh, &destination());
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].1, None);
    assert!(rows.iter().all(|r| r.3.as_deref() == Some("2024-01-01 06:00:00")));
}

/// Destination {A, C}; staging {A', B} → A updated, B inserted, C untouched.
#[test]
fn merge_updates_matches_inserts_new_and_keeps_others() {
    let tmp = TempDir::new().unwrap();
    let mut wh = Warehouse::open_in_memory().unwrap();
    wh.ensure_table(&ITEMS, &destination()).unwrap();

    let day1 = items_artifact(tmp.path(), "d1.parquet", "('A', 'old', 1), ('C', 'keep', 3)");
    wh.load_staging(&ITEMS, &staging("20240101"), &day1).unwrap();
    let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap();
    wh.merge(&ITEMS, &staging("20240101"), &destination(), t1)
        .unwrap();

    let day2 = items_artifact(tmp.path(), "d2.parquet", "('A', 'new', 10), ('B', 'fresh', 2)");
    wh.load_staging(&ITEMS, &staging("20240102"), &day2).unwrap();
    let t2 = Utc.with_ymd_and_hms(2024, 1, 2, 6, 0, 0).unwrap();
    let result = wh
        .merge(&ITEMS, &staging("20240102"), &destination(), t2)
        .unwrap();
    assert_eq!(result.updated, 1);
    assert_eq!(result.inserted, 1);

    let rows = dump(&wh, &destination());
    assert_eq!(
        rows,
        vec![
            (
                "A".to_string(),
                Some("new".to_string()),
                10,
                Some("2024-01-02 06:00:00".to_string())
            ),
            (
                "B".to_string(),
                Some("fresh".to_string()),
                2,
                Some("2024-01-02 06:00:00".to_string())
            ),
            (
                "C".to_string(),
                Some("keep".to_string()),
                3,
                Some("2024-01-01 06:00:00".to_string())
            ),
        ]
    );
}

#[test]
fn merge_twice_is_idempotent_on_values() {
    let tmp = TempDir::new().unwrap();
    let mut wh = Warehouse::open_in_memory().unwrap();
    wh.ensure_table(&ITEMS, &destination()).unwrap();
    let artifact = items_artifact(tmp.path(), "a.parquet", "('A', 'x', 1), ('B', 'y', 2)");

    for hour in [6, 7] {
        wh.load_staging(&ITEMS, &staging("20240101"), &artifact).unwrap();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap();
        wh.merge(&ITEMS, &staging("20240101"), &destination(), at)
            .unwrap();
    }

    let rows = dump(&wh, &destination());
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].3.as_deref(), Some("2024-01-01 07:00:00"));
}

#[test]
fn merge_rejects_duplicate_staging_keys() {
    let tmp = TempDir::new().unwrap();
    let mut wh = Warehouse::open_in_memory().unwrap();
    wh.ensure_table(&ITEMS, &destination()).unwrap();
    let artifact = items_artifact(tmp.path(), "dup.parquet", "('A', 'x', 1), ('A', 'y', 2)");
    wh.load_staging(&ITEMS, &staging("20240101"), &artifact).unwrap();

    let err = wh
        .merge(&ITEMS, &staging("20240101"), &destination(), Utc::now())
        .unwrap_err();
    assert!(format!("{err:#}").contains("repeated `item_id`"));
    assert_eq!(wh.row_count(&destination()).unwrap(), 0);
}

#[test]
fn merge_into_incompatible_destination_fails_without_writes() {
    let tmp = TempDir::new().unwrap();
    let mut wh = Warehouse::open_in_memory().unwrap();
    wh.connection()
        .execute_batch(
            "CREATE SCHEMA dw_test; CREATE TABLE dw_test.items (item_id VARCHAR, label VARCHAR)",
        )
        .unwrap();
    let artifact = items_artifact(tmp.path(), "a.parquet", "('A', 'x', 1)");
    wh.load_staging(&ITEMS, &staging("20240101"), &artifact).unwrap();

    assert!(wh
        .merge(&ITEMS, &staging("20240101"), &destination(), Utc::now())
        .is_err());
    assert_eq!(wh.row_count(&destination()).unwrap(), 0);
    assert!(wh.table_exists(&staging("20240101")).unwrap());
}

#[test]
fn drop_table_after_merge() {
    let tmp = TempDir::new().unwrap();
    let mut wh = Warehouse::open_in_memory().unwrap();
    let artifact = items_artifact(tmp.path(), "a.parquet", "('A', 'x', 1)");
    wh.load_staging(&ITEMS, &staging("20240101"), &artifact).unwrap();

    assert!(wh.drop_table(&staging("20240101")).unwrap());
    assert!(!wh.drop_table(&staging("20240101")).unwrap());
}

#[test]
fn file_backed_warehouse_persists() {
    let tmp = TempDir::new().unwrap();
    let config = linefeed_warehouse::WarehouseConfig {
        database_path: Some(tmp.path().join("wh").join("linefeed.duckdb")),
        ..Default::default()
    };
    let artifact = items_artifact(tmp.path(), "a.parquet", "('A', 'x', 1)");

    {
        let mut wh = Warehouse::open(&config).unwrap();
        wh.ensure_table(&ITEMS, &destination()).unwrap();
        wh.load_staging(&ITEMS, &staging("20240101"), &artifact).unwrap();
        wh.merge(&ITEMS, &staging("20240101"), &destination(), Utc::now())
            .unwrap();
    }

    let wh = Warehouse::open(&config).unwrap();
    assert_eq!(wh.row_count(&destination()).unwrap(), 1);
}
