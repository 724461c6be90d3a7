//! Warehouse credential retrieval
//!
//! A secret is a JSON blob holding at least a `password` field. Where the blob
//! comes from is behind the `SecretStore` trait.

use crate::config::SecretsConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Source of secret strings
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the raw secret string for `secret_id`
    async fn secret_string(&self, secret_id: &str) -> Result<String>;
}

#[derive(Deserialize)]
struct WarehouseSecret {
    password: Option<String>,
}

/// Extract the `password` field from a JSON credential blob
pub fn parse_password(secret_id: &str, blob: &str) -> Result<String> {
    let secret: WarehouseSecret = serde_json::from_str(blob)
        .map_err(|e| Error::secret(secret_id, format!("not valid JSON: {e}")))?;
    secret
        .password
        .ok_or_else(|| Error::secret(secret_id, "no 'password' field"))
}

/// Fetch a secret and pull out the warehouse password
pub async fn fetch_password(store: &dyn SecretStore, secret_id: &str) -> Result<String> {
    let blob = store.secret_string(secret_id).await?;
    parse_password(secret_id, &blob)
}

/// The store named by the pipeline configuration
pub fn store_from_config(config: &SecretsConfig) -> Arc<dyn SecretStore> {
    match config {
        SecretsConfig::Env => Arc::new(EnvSecretStore),
        SecretsConfig::File { dir } => Arc::new(FileSecretStore::new(dir)),
    }
}

/// Reads secrets from environment variables
///
/// `prod/redshift-creds` is looked up as `SHOP_ETL_SECRET_PROD_REDSHIFT_CREDS`.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretStore;

impl EnvSecretStore {
    /// Environment variable holding `secret_id`
    pub fn variable_name(secret_id: &str) -> String {
        let suffix: String = secret_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("SHOP_ETL_SECRET_{suffix}")
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn secret_string(&self, secret_id: &str) -> Result<String> {
        let name = Self::variable_name(secret_id);
        std::env::var(&name).map_err(|_| Error::secret(secret_id, format!("{name} is not set")))
    }
}

/// Reads secrets from `{dir}/{secret_id}.json`
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    /// Store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn secret_string(&self, secret_id: &str) -> Result<String> {
        let path = self.dir.join(format!("{secret_id}.json"));
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Error::secret(secret_id, format!("{}: {e}", path.display())))
    }
}

/// In-memory secrets
#[derive(Debug, Clone, Default)]
pub struct StaticSecretStore {
    secrets: HashMap<String, String>,
}

impl StaticSecretStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a secret
    #[must_use]
    pub fn with_secret(mut self, secret_id: impl Into<String>, blob: impl Into<String>) -> Self {
        self.secrets.insert(secret_id.into(), blob.into());
        self
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn secret_string(&self, secret_id: &str) -> Result<String> {
        self.secrets
            .get(secret_id)
            .cloned()
            .ok_or_else(|| Error::secret(secret_id, "not found"))
    }
}
