//! Schema of the `lines` table and its Parquet artifact
//!
//! One column list drives the warehouse DDL, the merge statement and the
//! Arrow schema of the staging artifact.

use std::sync::{Arc, LazyLock};

use arrow::datatypes::{DataType, Field, Schema};
use linefeed_warehouse::{ColumnRole, ColumnSpec, SqlType, TableSpec};

use ColumnRole::{Key, MergeTimestamp, Value};
use SqlType::{BigInt, Timestamp, Varchar};

const fn column(
    name: &'static str,
    sql_type: SqlType,
    required: bool,
    role: ColumnRole,
    description: &'static str,
) -> ColumnSpec {
    ColumnSpec {
        name,
        sql_type,
        required,
        role,
        description,
    }
}

#[rustfmt::skip]
pub const LINE_COLUMNS: &[ColumnSpec] = &[
    column("uuid_line", Varchar, true, Value, "A unique identifier generated through the ETL process."),
    column("pk_line_id", Varchar, true, Key, "Primary key of the table. A line is a predetermined route along several timingpoints."),
    column("line_name", Varchar, false, Value, "Name of the line."),
    column("transport_type", Varchar, false, Value, "Type of transport, it has to be one of: BUS, TRAIN, METRO, BOAT, TRAM."),
    column("line_public_number", Varchar, false, Value, "Line number used when communicated with travellers. Communicated as STRING from source of truth."),
    column("data_owner_code", Varchar, true, Value, "Data owner code."),
    column("destination_name_50", Varchar, false, Value, "Destination name."),
    column("line_planning_number", Varchar, true, Value, "Line planning number. Communicated as STRING from source of truth."),
    column("line_direction", BigInt, true, Value, "Direction of the line."),
    column("load_timestamp", Timestamp, false, MergeTimestamp, "Technical data corresponding to latest load date and time."),
    column("source_system", Varchar, true, Value, "Source system from which the data has been extracted."),
];

/// Destination and staging table layout
pub const LINES: TableSpec = TableSpec {
    columns: LINE_COLUMNS,
    description: "Public transport lines for the Netherlands from OVAPI, country-wide public transport",
    labels: &[
        ("org_unit", "transport_for_netherlands"),
        ("information_type", "ovapi"),
    ],
    partition_by: Some("DATE(load_timestamp)"),
    cluster_by: Some("line_public_number"),
};

fn arrow_type(sql_type: SqlType) -> DataType {
    match sql_type {
        SqlType::Varchar => DataType::Utf8,
        SqlType::BigInt => DataType::Int64,
        SqlType::Timestamp => {
            DataType::Timestamp(arrow::datatypes::TimeUnit::Microsecond, None)
        }
    }
}

/// Artifact schema: every loaded column, in table order
static ARTIFACT: LazyLock<Arc<Schema>> = LazyLock::new(|| {
    Arc::new(Schema::new(
        LINES
            .loaded_columns()
            .map(|c| Field::new(c.name, arrow_type(c.sql_type), !c.required))
            .collect::<Vec<_>>(),
    ))
});

pub fn artifact() -> &'static Arc<Schema> {
    &ARTIFACT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_spec_is_valid() {
        LINES.validate().unwrap();
        assert_eq!(LINES.key().unwrap().name, "pk_line_id");
        assert_eq!(LINE_COLUMNS.len(), 11);
    }

    #[test]
    fn required_columns() {
        let required: Vec<_> = LINE_COLUMNS
            .iter()
            .filter(|c| c.required)
            .map(|c| c.name)
            .collect();
        assert_eq!(
            required,
            vec![
                "uuid_line",
                "pk_line_id",
                "data_owner_code",
                "line_planning_number",
                "line_direction",
                "source_system"
            ]
        );
    }

    #[test]
    fn artifact_omits_load_timestamp() {
        let schema = artifact();
        assert_eq!(schema.fields().len(), 10);
        assert!(schema.field_with_name("load_timestamp").is_err());
        let dir = schema.field_with_name("line_direction").unwrap();
        assert_eq!(dir.data_type(), &DataType::Int64);
        assert!(!dir.is_nullable());
        assert!(schema.field_with_name("line_name").unwrap().is_nullable());
    }
}
