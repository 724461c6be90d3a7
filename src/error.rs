//! Error types for shop-etl
//!
//! This module defines the error hierarchy for the whole pipeline.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Transformation-stage problems (bad dates, missing values) never show up
//! here: they are folded into null sentinels by the normalizers. What remains
//! are the failures with no safe default.

use thiserror::Error;

/// The main error type for shop-etl
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required job parameter: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Secret '{secret}' unavailable: {message}")]
    Secret { secret: String, message: String },

    // ============================================================================
    // Input Errors
    // ============================================================================
    #[error("Catalog read failed for {database}.{table}: {message}")]
    Catalog {
        database: String,
        table: String,
        message: String,
    },

    #[error("CSV parsing error: {message}")]
    CsvParse { message: String },

    #[error("Dataset '{dataset}' is missing required column '{column}'")]
    SchemaMismatch { dataset: String, column: String },

    // ============================================================================
    // Arrow/Parquet Errors
    // ============================================================================
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Output error: {message}")]
    Output { message: String },

    // ============================================================================
    // Load Errors
    // ============================================================================
    #[error("Warehouse error on table '{table}': {message}")]
    Warehouse { table: String, message: String },

    #[error("Load failed for {}", format_failures(.failures))]
    Load { failures: Vec<(String, String)> },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Pipeline stage an error belongs to, used for the run-level report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuration,
    Extract,
    Transform,
    Load,
    /// Errors not tied to one stage (I/O, wrapped errors)
    Run,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Configuration => "configuration",
            Stage::Extract => "extract",
            Stage::Transform => "transform",
            Stage::Load => "load",
            Stage::Run => "run",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a secret retrieval error
    pub fn secret(secret: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Secret {
            secret: secret.into(),
            message: message.into(),
        }
    }

    /// Create a catalog read error
    pub fn catalog(
        database: impl Into<String>,
        table: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Catalog {
            database: database.into(),
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a missing column error
    pub fn schema_mismatch(dataset: impl Into<String>, column: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            dataset: dataset.into(),
            column: column.into(),
        }
    }

    /// Create an output error
    pub fn output(message: impl Into<String>) -> Self {
        Self::Output {
            message: message.into(),
        }
    }

    /// Create an IO error from a message
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(std::io::Error::other(message.into()))
    }

    /// Create a warehouse error for a table
    pub fn warehouse(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Warehouse {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Stage of the run this error aborts
    pub fn stage(&self) -> Stage {
        match self {
            Error::Config { .. }
            | Error::MissingConfigField { .. }
            | Error::InvalidConfigValue { .. }
            | Error::YamlParse(_)
            | Error::JsonParse(_)
            | Error::Secret { .. } => Stage::Configuration,
            Error::Catalog { .. } | Error::CsvParse { .. } => Stage::Extract,
            Error::SchemaMismatch { .. } | Error::Arrow(_) => Stage::Transform,
            Error::Warehouse { .. } | Error::Load { .. } | Error::Parquet(_) | Error::Output { .. } => {
                Stage::Load
            }
            Error::Io(_) | Error::Other(_) | Error::Anyhow(_) => Stage::Run,
        }
    }

    /// One-line report naming the failing stage, e.g. `load stage: Load failed for ...`
    pub fn report(&self) -> String {
        format!("{} stage: {self}", self.stage())
    }

    /// Tables named by a load error
    pub fn failed_tables(&self) -> Vec<&str> {
        match self {
            Error::Load { failures } => failures.iter().map(|(t, _)| t.as_str()).collect(),
            Error::Warehouse { table, .. } => vec![table.as_str()],
            _ => Vec::new(),
        }
    }
}

fn format_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(table, message)| format!("table '{table}' ({message})"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for shop-etl
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::missing_field("SecretName");
        assert_eq!(err.to_string(), "Missing required job parameter: SecretName");

        let err = Error::schema_mismatch("order", "order_id");
        assert_eq!(
            err.to_string(),
            "Dataset 'order' is missing required column 'order_id'"
        );
    }

    #[test]
    fn test_report_names_stage_and_table() {
        let err = Error::Load {
            failures: vec![("public.inventory".to_string(), "relation is locked".to_string())],
        };
        assert_eq!(
            err.report(),
            "load stage: Load failed for table 'public.inventory' (relation is locked)"
        );
        assert!(Error::missing_field("TempDir")
            .report()
            .starts_with("configuration stage: "));
    }

    #[test]
    fn test_load_error_names_tables() {
        let err = Error::Load {
            failures: vec![
                ("inventory".to_string(), "connection reset".to_string()),
                ("product".to_string(), "schema mismatch".to_string()),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Load failed for table 'inventory' (connection reset), table 'product' (schema mismatch)"
        );
        assert_eq!(err.failed_tables(), vec!["inventory", "product"]);
        assert_eq!(err.stage(), Stage::Load);
    }

    #[test]
    fn test_stage() {
        assert_eq!(Error::missing_field("TempDir").stage(), Stage::Configuration);
        assert_eq!(Error::secret("s", "gone").stage(), Stage::Configuration);
        assert_eq!(
            Error::catalog("ecommerce-shop", "order_csv", "missing").stage(),
            Stage::Extract
        );
        assert_eq!(Error::schema_mismatch("order", "x").stage(), Stage::Transform);
        assert_eq!(Stage::Load.to_string(), "load");
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
