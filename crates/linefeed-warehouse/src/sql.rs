//! SQL generation for staging, merging and cleanup.
//!
//! Every statement is derived from one [`TableSpec`] so the key column and
//! column list live in a single place. Identifiers come from validated
//! [`TableRef`]s and are quoted; the merge timestamp is a bound parameter.

use std::path::Path;

use crate::table::{ColumnRole, TableRef, TableSpec, quote_ident};

/// Escape a value for a single-quoted SQL string literal.
fn string_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn column_list<'a>(cols: impl Iterator<Item = &'a str>, prefix: &str) -> String {
    cols.map(|c| format!("{prefix}{}", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn create_schema(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema))
}

/// Column definitions shared by the staging and destination DDL.
fn column_defs(spec: &TableSpec) -> Vec<String> {
    spec.columns
        .iter()
        .map(|c| {
            let null = if c.required { " NOT NULL" } else { "" };
            format!("  {} {}{null}", quote_ident(c.name), c.sql_type.ddl())
        })
        .collect()
}

/// Staging table DDL with overwrite semantics.
pub fn create_or_replace_table(spec: &TableSpec, table: &TableRef) -> String {
    format!(
        "CREATE OR REPLACE TABLE {} (\n{}\n)",
        table.quoted(),
        column_defs(spec).join(",\n")
    )
}

/// Destination table DDL. The key column becomes the primary key, so the
/// table refuses a second row for any key whoever writes it.
pub fn create_table(spec: &TableSpec, table: &TableRef) -> anyhow::Result<String> {
    let mut defs = column_defs(spec);
    defs.push(format!("  PRIMARY KEY ({})", quote_ident(spec.key()?.name)));
    Ok(format!(
        "CREATE TABLE {} (\n{}\n)",
        table.quoted(),
        defs.join(",\n")
    ))
}

/// Table and column descriptions, plus labels and layout hints.
pub fn comments(spec: &TableSpec, table: &TableRef) -> Vec<String> {
    let mut table_comment = spec.description.to_string();
    if let Some(p) = spec.partition_by {
        table_comment.push_str(&format!(" | partition by {p}"));
    }
    if let Some(c) = spec.cluster_by {
        table_comment.push_str(&format!(" | cluster by {c}"));
    }
    if !spec.labels.is_empty() {
        let labels = spec
            .labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ");
        table_comment.push_str(&format!(" | labels: {labels}"));
    }

    let mut stmts = vec![format!(
        "COMMENT ON TABLE {} IS {}",
        table.quoted(),
        string_literal(&table_comment)
    )];
    for col in spec.columns.iter().filter(|c| !c.description.is_empty()) {
        stmts.push(format!(
            "COMMENT ON COLUMN {}.{} IS {}",
            table.quoted(),
            quote_ident(col.name),
            string_literal(col.description)
        ));
    }
    stmts
}

/// Copy the artifact's columns into the (freshly replaced) staging table.
pub fn load_parquet(spec: &TableSpec, table: &TableRef, artifact: &Path) -> String {
    let cols = column_list(spec.loaded_columns().map(|c| c.name), "");
    format!(
        "INSERT INTO {} ({cols})\nSELECT {cols}\nFROM read_parquet({})",
        table.quoted(),
        string_literal(&artifact.to_string_lossy())
    )
}

pub fn table_exists() -> &'static str {
    "SELECT COUNT(*) FROM information_schema.tables \
     WHERE table_schema = ? AND table_name = ?"
}

pub fn drop_table(table: &TableRef) -> String {
    format!("DROP TABLE IF EXISTS {}", table.quoted())
}

pub fn count_rows(table: &TableRef) -> String {
    format!("SELECT COUNT(*) FROM {}", table.quoted())
}

/// Key-based upsert of a staging table into a destination table.
///
/// Runs as two statements inside one transaction: an `UPDATE ... FROM` for
/// keys already present, then an `INSERT ... WHERE NOT EXISTS` for the rest.
/// Destination rows without a staging counterpart are not touched. Both
/// statements bind the merge timestamp as their only parameter.
#[derive(Debug, Clone, Copy)]
pub struct MergeStatement<'a> {
    spec: &'a TableSpec,
    source: &'a TableRef,
    target: &'a TableRef,
    key: &'a str,
}

impl<'a> MergeStatement<'a> {
    pub fn new(
        spec: &'a TableSpec,
        source: &'a TableRef,
        target: &'a TableRef,
    ) -> anyhow::Result<Self> {
        spec.validate()?;
        let key = spec.key()?.name;
        Ok(Self {
            spec,
            source,
            target,
            key,
        })
    }

    /// `COUNT(*) - COUNT(DISTINCT key)` over the staging table.
    pub fn duplicate_keys(&self) -> String {
        let key = quote_ident(self.key);
        format!(
            "SELECT COUNT(*) - COUNT(DISTINCT {key}) FROM {}",
            self.source.quoted()
        )
    }

    /// Keys present in both tables, i.e. rows the update will touch.
    pub fn matched_keys(&self) -> String {
        let key = quote_ident(self.key);
        format!(
            "SELECT COUNT(*) FROM {} AS s WHERE EXISTS \
             (SELECT 1 FROM {} AS t WHERE t.{key} = s.{key})",
            self.source.quoted(),
            self.target.quoted()
        )
    }

    pub fn update(&self) -> String {
        let key = quote_ident(self.key);
        let assignments = self
            .spec
            .columns
            .iter()
            .filter_map(|c| {
                let col = quote_ident(c.name);
                match c.role {
                    ColumnRole::Key => None,
                    ColumnRole::Value => Some(format!("{col} = s.{col}")),
                    ColumnRole::MergeTimestamp => Some(format!("{col} = CAST(? AS TIMESTAMP)")),
                }
            })
            .collect::<Vec<_>>()
            .join(",\n  ");
        let target_name = quote_ident(self.target.name());
        format!(
            "UPDATE {}\nSET\n  {assignments}\nFROM {} AS s\nWHERE {target_name}.{key} = s.{key}",
            self.target.quoted(),
            self.source.quoted()
        )
    }

    pub fn insert(&self) -> String {
        let key = quote_ident(self.key);
        let cols = column_list(self.spec.columns.iter().map(|c| c.name), "");
        let values = self
            .spec
            .columns
            .iter()
            .map(|c| match c.role {
                ColumnRole::MergeTimestamp => "CAST(? AS TIMESTAMP)".to_string(),
                _ => format!("s.{}", quote_ident(c.name)),
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {target} ({cols})\nSELECT {values}\nFROM {} AS s\n\
             WHERE NOT EXISTS (SELECT 1 FROM {target} AS t WHERE t.{key} = s.{key})",
            self.source.quoted(),
            target = self.target.quoted()
        )
    }

    /// Whether the statements bind the merge timestamp.
    pub fn binds_timestamp(&self) -> bool {
        self.spec
            .columns
            .iter()
            .any(|c| c.role == ColumnRole::MergeTimestamp)
    }
}
