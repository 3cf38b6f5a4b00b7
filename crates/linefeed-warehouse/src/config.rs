use std::path::PathBuf;

/// Connection settings for the embedded warehouse.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// DuckDB database file; `None` opens an in-memory warehouse
    pub database_path: Option<PathBuf>,
    /// DuckDB memory limit (e.g. "1GB")
    pub memory_limit: String,
    /// Service credentials file, recorded for remote warehouses.
    /// The embedded engine does not authenticate.
    pub credentials_path: Option<PathBuf>,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            memory_limit: "1GB".to_string(),
            credentials_path: None,
        }
    }
}
