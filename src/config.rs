//! Job parameters and pipeline configuration
//!
//! Job parameters are the six required values every run is invoked with.
//! `PipelineConfig` covers everything else (where the catalog lives, how to
//! reach the warehouse, load policy) and defaults every field.

use crate::error::{Error, Result};
use crate::types::{FailurePolicy, WriteMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ============================================================================
// Job Parameters
// ============================================================================

/// Parameter holding the job name
pub const PARAM_JOB_NAME: &str = "JOB_NAME";
/// Parameter holding the warehouse secret id
pub const PARAM_SECRET_NAME: &str = "SecretName";
/// Parameter holding the staging location
pub const PARAM_TEMP_DIR: &str = "TempDir";
/// Parameter holding the warehouse schema
pub const PARAM_SCHEMA: &str = "RedshiftSchema";
/// Parameter holding the warehouse cluster identifier
pub const PARAM_CLUSTER: &str = "RedshiftCluster";
/// Parameter holding the warehouse database
pub const PARAM_DATABASE: &str = "RedshiftDatabase";

/// Every parameter a run must be given
pub const REQUIRED_PARAMETERS: [&str; 6] = [
    PARAM_JOB_NAME,
    PARAM_SECRET_NAME,
    PARAM_TEMP_DIR,
    PARAM_SCHEMA,
    PARAM_CLUSTER,
    PARAM_DATABASE,
];

/// Required invocation parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobParameters {
    pub job_name: String,
    pub secret_name: String,
    pub temp_dir: String,
    pub warehouse_schema: String,
    pub warehouse_cluster: String,
    pub warehouse_database: String,
}

impl JobParameters {
    /// Resolve parameters by name. A missing or blank parameter is an error.
    pub fn from_map(params: &HashMap<String, String>) -> Result<Self> {
        let get = |name: &str| -> Result<String> {
            params
                .get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(String::from)
                .ok_or_else(|| Error::missing_field(name))
        };

        Ok(Self {
            job_name: get(PARAM_JOB_NAME)?,
            secret_name: get(PARAM_SECRET_NAME)?,
            temp_dir: get(PARAM_TEMP_DIR)?,
            warehouse_schema: get(PARAM_SCHEMA)?,
            warehouse_cluster: get(PARAM_CLUSTER)?,
            warehouse_database: get(PARAM_DATABASE)?,
        })
    }

    /// Resolve from optional values, as collected from the command line
    pub fn from_options<'a>(
        values: impl IntoIterator<Item = (&'a str, Option<String>)>,
    ) -> Result<Self> {
        let params: HashMap<String, String> = values
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name.to_string(), v)))
            .collect();
        Self::from_map(&params)
    }
}

// ============================================================================
// Pipeline Configuration
// ============================================================================

/// Where the raw CSV files live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Root holding one directory per catalog database
    #[serde(default = "default_catalog_root")]
    pub root: String,

    /// Catalog database the five source tables are registered in
    #[serde(default = "default_catalog_database")]
    pub database: String,

    /// Explicit `database.table` → file URL overrides
    #[serde(default)]
    pub locations: HashMap<String, String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            root: default_catalog_root(),
            database: default_catalog_database(),
            locations: HashMap::new(),
        }
    }
}

fn default_catalog_root() -> String {
    "./data".to_string()
}

fn default_catalog_database() -> String {
    "ecommerce-shop".to_string()
}

/// Warehouse engine behind the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarehouseKind {
    /// Redshift (Postgres wire protocol) attached through DuckDB
    #[default]
    Redshift,
    /// A local DuckDB database file or `:memory:`
    Duckdb,
}

/// How to reach the warehouse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseConfig {
    #[serde(default)]
    pub kind: WarehouseKind,

    /// Appended to the cluster parameter to form the host name
    #[serde(default)]
    pub host_suffix: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_user")]
    pub user: String,

    /// Database file for `kind: duckdb`
    #[serde(default = "default_duckdb_path")]
    pub duckdb_path: String,

    /// Role Redshift assumes to read staged files; access keys from the
    /// environment are used when unset
    #[serde(default)]
    pub iam_role: Option<String>,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            kind: WarehouseKind::default(),
            host_suffix: String::new(),
            port: default_port(),
            user: default_user(),
            duckdb_path: default_duckdb_path(),
            iam_role: None,
        }
    }
}

fn default_port() -> u16 {
    5439
}

fn default_user() -> String {
    "ecommerce".to_string()
}

fn default_duckdb_path() -> String {
    ":memory:".to_string()
}

/// Load behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoadConfig {
    #[serde(default)]
    pub write_mode: WriteMode,

    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

/// Where secrets are read from
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SecretsConfig {
    /// `SHOP_ETL_SECRET_*` environment variables
    #[default]
    Env,
    /// `{dir}/{secret}.json` files
    File { dir: PathBuf },
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub warehouse: WarehouseConfig,

    #[serde(default)]
    pub load: LoadConfig,

    #[serde(default)]
    pub secrets: SecretsConfig,

    /// Write each run's summary here
    #[serde(default)]
    pub run_log: Option<PathBuf>,
}

impl PipelineConfig {
    /// Parse YAML configuration
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a configuration file; `.yaml`/`.yml` are YAML, anything else JSON
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }

    /// Inline JSON takes precedence over a file; with neither, defaults
    pub fn load(path: Option<&Path>, inline: Option<&str>) -> Result<Self> {
        if let Some(json) = inline {
            return Self::from_json(json);
        }
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn all_params() -> HashMap<String, String> {
        [
            ("JOB_NAME", "nightly-load"),
            ("SecretName", "prod/redshift"),
            ("TempDir", "s3://tmp-bucket/glue"),
            ("RedshiftSchema", "public"),
            ("RedshiftCluster", "shop-cluster"),
            ("RedshiftDatabase", "shop"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_job_parameters_resolved() {
        let params = JobParameters::from_map(&all_params()).unwrap();
        assert_eq!(params.job_name, "nightly-load");
        assert_eq!(params.temp_dir, "s3://tmp-bucket/glue");
        assert_eq!(params.warehouse_cluster, "shop-cluster");
    }

    #[test]
    fn test_each_parameter_is_required() {
        for name in REQUIRED_PARAMETERS {
            let mut params = all_params();
            params.remove(name);
            let err = JobParameters::from_map(&params).unwrap_err();
            assert!(
                matches!(err, Error::MissingConfigField { ref field } if field == name),
                "expected missing {name}, got {err}"
            );
        }
    }

    #[test]
    fn test_blank_parameter_is_missing() {
        let mut params = all_params();
        params.insert("TempDir".to_string(), "  ".to_string());
        assert!(JobParameters::from_map(&params).is_err());
    }

    #[test]
    fn test_from_options() {
        let err = JobParameters::from_options([("JOB_NAME", Some("x".to_string())), ("SecretName", None)])
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing required job parameter: SecretName");
    }

    #[test]
    fn test_pipeline_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.catalog.database, "ecommerce-shop");
        assert_eq!(config.warehouse.port, 5439);
        assert_eq!(config.warehouse.user, "ecommerce");
        assert_eq!(config.warehouse.kind, WarehouseKind::Redshift);
        assert_eq!(config.load.failure_policy, FailurePolicy::Isolate);
        assert_eq!(config.secrets, SecretsConfig::Env);
    }

    #[test]
    fn test_pipeline_config_yaml() {
        let yaml = r"
catalog:
  root: s3://raw-bucket
  locations:
    ecommerce-shop.product_csv: s3://other/products.csv
warehouse:
  kind: duckdb
  duckdb_path: /tmp/shop.duckdb
load:
  write_mode: append
  failure_policy: fail_fast
secrets:
  kind: file
  dir: /etc/shop-etl/secrets
";
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.catalog.root, "s3://raw-bucket");
        assert_eq!(config.catalog.database, "ecommerce-shop");
        assert_eq!(config.warehouse.kind, WarehouseKind::Duckdb);
        assert_eq!(config.warehouse.port, 5439);
        assert_eq!(config.load.write_mode, WriteMode::Append);
        assert_eq!(config.load.failure_policy, FailurePolicy::FailFast);
        assert_eq!(
            config.secrets,
            SecretsConfig::File {
                dir: PathBuf::from("/etc/shop-etl/secrets")
            }
        );
    }

    #[test]
    fn test_pipeline_config_load_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"warehouse": {"port": 5440}}"#).unwrap();

        let from_file = PipelineConfig::load(Some(&path), None).unwrap();
        assert_eq!(from_file.warehouse.port, 5440);

        let inline = PipelineConfig::load(Some(&path), Some(r#"{"warehouse": {"port": 6000}}"#))
            .unwrap();
        assert_eq!(inline.warehouse.port, 6000);

        assert_eq!(PipelineConfig::load(None, None).unwrap(), PipelineConfig::default());
    }
}
