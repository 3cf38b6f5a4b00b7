//! Configuration loading: TOML file, then environment, then CLI flags

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use linefeed_ovapi::Target;
use linefeed_warehouse::WarehouseConfig;

/// Global configuration for linefeed
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub warehouse: WarehouseSection,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub endpoint: String,
    /// Whole-request deadline in seconds
    pub timeout: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://v0.ovapi.nl".to_string(),
            endpoint: "/line/".to_string(),
            timeout: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WarehouseSection {
    /// Database name; the file is `{dir}/{project}.duckdb`
    pub project: String,
    pub dataset: String,
    pub table: String,
    pub staging_dataset: String,
    pub dir: PathBuf,
    pub memory_limit: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub credentials_path: Option<String>,
}

impl Default for WarehouseSection {
    fn default() -> Self {
        let target = Target::default();
        Self {
            project: "linefeed".to_string(),
            dataset: target.dataset,
            table: target.table,
            staging_dataset: target.staging_dataset,
            dir: PathBuf::from("./warehouse"),
            memory_limit: "1GB".to_string(),
            credentials_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub artifact_dir: PathBuf,
    pub compression_level: i32,
    /// Artifact name markers removed after a successful merge
    pub cleanup_markers: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("./data"),
            compression_level: 3,
            cleanup_markers: vec![linefeed_ovapi::config::TRANSFORMED_MARKER.to_string()],
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

type Setter = fn(&mut Config, String);

/// Recognized environment keys, in the order they are applied
pub const ENV_KEYS: &[(&str, Setter)] = &[
    ("WAREHOUSE_PROJECT", |c, v| c.warehouse.project = v),
    ("WAREHOUSE_DATASET", |c, v| c.warehouse.dataset = v),
    ("WAREHOUSE_TABLE", |c, v| c.warehouse.table = v),
    ("WAREHOUSE_STAGING_DATASET", |c, v| c.warehouse.staging_dataset = v),
    ("WAREHOUSE_CREDENTIALS_PATH", |c, v| c.warehouse.credentials_path = Some(v)),
    ("WAREHOUSE_DIR", |c, v| c.warehouse.dir = PathBuf::from(v)),
    ("SOURCE_API_BASE_URL", |c, v| c.source.base_url = v),
    ("SOURCE_API_ENDPOINT", |c, v| c.source.endpoint = v),
    ("ARTIFACT_DIR", |c, v| c.output.artifact_dir = PathBuf::from(v)),
];

impl Config {
    /// Load configuration from default locations, then apply the environment
    ///
    /// Search order:
    /// 1. ./linefeed.toml (current directory)
    /// 2. ~/.config/linefeed/config.toml
    ///
    /// If no config file found, starts from defaults.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        let local_config = PathBuf::from("linefeed.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "linefeed") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file, then apply the environment
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Override file values with whatever `lookup` returns for [`ENV_KEYS`].
    /// Empty values count as unset.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for &(key, set) in ENV_KEYS {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                log::debug!("{key} set from environment");
                set(self, value);
            }
        }
    }

    /// Warehouse database file
    pub fn database_path(&self) -> PathBuf {
        self.warehouse
            .dir
            .join(format!("{}.duckdb", self.warehouse.project))
    }

    pub fn warehouse_config(&self) -> WarehouseConfig {
        WarehouseConfig {
            database_path: Some(self.database_path()),
            memory_limit: self.warehouse.memory_limit.clone(),
            credentials_path: self.warehouse.credentials_path.as_ref().map(PathBuf::from),
        }
    }

    pub fn pipeline_config(&self) -> linefeed_ovapi::Config {
        linefeed_ovapi::Config {
            base_url: self.source.base_url.clone(),
            endpoint: self.source.endpoint.clone(),
            timeout: Duration::from_secs(self.source.timeout),
            artifact_dir: self.output.artifact_dir.clone(),
            zstd_level: self.output.compression_level,
            cleanup_markers: self.output.cleanup_markers.clone(),
            keep_staging: false,
            target: Target {
                dataset: self.warehouse.dataset.clone(),
                table: self.warehouse.table.clone(),
                staging_dataset: self.warehouse.staging_dataset.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.source.base_url, "http://v0.ovapi.nl");
        assert_eq!(config.source.endpoint, "/line/");
        assert_eq!(config.warehouse.dataset, "dw_test");
        assert_eq!(config.warehouse.staging_dataset, "dw_temporary");
        assert_eq!(
            config.database_path(),
            PathBuf::from("./warehouse/linefeed.duckdb")
        );
        assert_eq!(config.output.artifact_dir, PathBuf::from("./data"));
        assert!(config.warehouse.credentials_path.is_none());
    }

    #[test]
    fn expand_env_var_simple() {
        std::env::set_var("LINEFEED_TEST_VAR", "test_value");
        assert_eq!(
            expand_env_var("${LINEFEED_TEST_VAR}"),
            Some("test_value".to_string())
        );
        std::env::remove_var("LINEFEED_TEST_VAR");
    }

    #[test]
    fn expand_env_var_literal() {
        assert_eq!(expand_env_var("literal"), Some("literal".to_string()));
    }

    #[test]
    fn expand_env_var_missing() {
        assert_eq!(expand_env_var("${NONEXISTENT_VAR_12345}"), None);
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[source]
base_url = "http://localhost:8080"
timeout = 5

[warehouse]
project = "transit"
dataset = "dw_prod"
dir = "/var/lib/linefeed"

[output]
artifact_dir = "/tmp/data"
compression_level = 5
cleanup_markers = ["_transformed_", "_raw_"]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.source.base_url, "http://localhost:8080");
        assert_eq!(config.source.endpoint, "/line/");
        assert_eq!(config.source.timeout, 5);
        assert_eq!(config.warehouse.table, "lines");
        assert_eq!(
            config.database_path(),
            PathBuf::from("/var/lib/linefeed/transit.duckdb")
        );
        assert_eq!(config.output.cleanup_markers.len(), 2);

        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.feed_url(), "http://localhost:8080/line/");
        assert_eq!(pipeline.target.dataset, "dw_prod");
        assert_eq!(pipeline.zstd_level, 5);
    }

    #[test]
    fn env_overrides_file() {
        let mut config: Config = toml::from_str("[warehouse]\ndataset = \"from_file\"").unwrap();
        config.apply_env(|key| match key {
            "WAREHOUSE_DATASET" => Some("from_env".to_string()),
            "WAREHOUSE_CREDENTIALS_PATH" => Some("/etc/creds.json".to_string()),
            "SOURCE_API_ENDPOINT" => Some("/line/GVB".to_string()),
            "ARTIFACT_DIR" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.warehouse.dataset, "from_env");
        assert_eq!(config.source.endpoint, "/line/GVB");
        assert_eq!(config.output.artifact_dir, PathBuf::from("./data"));
        assert_eq!(
            config.warehouse_config().credentials_path,
            Some(PathBuf::from("/etc/creds.json"))
        );
    }
}
