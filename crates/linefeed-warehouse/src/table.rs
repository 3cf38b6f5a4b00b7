//! Table identities and fixed column schemas.

use std::fmt;

use anyhow::{Result, bail, ensure};

/// Column types understood by the warehouse DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Varchar,
    BigInt,
    Timestamp,
}

impl SqlType {
    pub fn ddl(self) -> &'static str {
        match self {
            Self::Varchar => "VARCHAR",
            Self::BigInt => "BIGINT",
            Self::Timestamp => "TIMESTAMP",
        }
    }
}

/// How a column takes part in staging and merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// Merge key, never updated
    Key,
    /// Carried from the staging artifact, overwritten on match
    Value,
    /// Absent from the artifact, stamped with the merge execution time
    MergeTimestamp,
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub sql_type: SqlType,
    /// REQUIRED (NOT NULL) vs NULLABLE
    pub required: bool,
    pub role: ColumnRole,
    pub description: &'static str,
}

/// Fixed schema shared by the staging and destination tables.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub columns: &'static [ColumnSpec],
    pub description: &'static str,
    pub labels: &'static [(&'static str, &'static str)],
    /// Physical layout hints, recorded in the table comment
    pub partition_by: Option<&'static str>,
    pub cluster_by: Option<&'static str>,
}

impl TableSpec {
    /// The single merge key column.
    pub fn key(&self) -> Result<&ColumnSpec> {
        let mut keys = self.columns.iter().filter(|c| c.role == ColumnRole::Key);
        match (keys.next(), keys.next()) {
            (Some(key), None) => Ok(key),
            (None, _) => bail!("table spec has no key column"),
            (Some(_), Some(_)) => bail!("table spec has more than one key column"),
        }
    }

    /// Columns present in the staging artifact (everything but the merge timestamp).
    pub fn loaded_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns
            .iter()
            .filter(|c| c.role != ColumnRole::MergeTimestamp)
    }

    /// Check identifiers and the key before any SQL is built from the spec.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.columns.is_empty(), "table spec has no columns");
        for col in self.columns {
            check_identifier(col.name)?;
        }
        let key = self.key()?;
        ensure!(key.required, "key column `{}` must be required", key.name);
        let stamps = self
            .columns
            .iter()
            .filter(|c| c.role == ColumnRole::MergeTimestamp)
            .count();
        ensure!(stamps <= 1, "table spec has more than one merge timestamp");
        Ok(())
    }
}

/// Schema-qualified table name, validated as plain identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    schema: String,
    name: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let schema = schema.into();
        let name = name.into();
        check_identifier(&schema)?;
        check_identifier(&name)?;
        Ok(Self { schema, name })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `"schema"."name"` for use in SQL text
    pub fn quoted(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Reject anything that is not `[A-Za-z_][A-Za-z0-9_]*`.
pub fn check_identifier(ident: &str) -> Result<()> {
    let mut chars = ident.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    ensure!(valid, "invalid identifier: {ident:?}");
    Ok(())
}

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
