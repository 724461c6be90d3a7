//! Catalog module
//!
//! Resolves `(database, table)` pairs to CSV objects and reads them into
//! Arrow batches.
//!
//! # Overview
//!
//! - `CatalogReader` - the seam the job reads its inputs through
//! - `ObjectStoreCatalog` - reads `{root}/{database}/{table}.csv` from a local
//!   directory or an object store, with optional per-table overrides
//! - `CsvOptions` - the parse configuration every source table is read with

mod csv;

pub use csv::{read_csv, CsvOptions};

use crate::config::CatalogConfig;
use crate::error::{Error, Result};
use crate::storage::{split_file_url, StorageLocation};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use std::collections::HashMap;

/// Source of raw datasets
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Read one registered table
    async fn read_table(
        &self,
        database: &str,
        table: &str,
        options: &CsvOptions,
    ) -> Result<RecordBatch>;
}

/// Catalog backed by a directory layout on local disk or object storage
#[derive(Debug, Clone)]
pub struct ObjectStoreCatalog {
    /// Root URL or path holding one directory per database
    root: String,
    /// Explicit `database.table` → file URL overrides
    locations: HashMap<String, String>,
}

impl ObjectStoreCatalog {
    /// Create a catalog rooted at `root`
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            locations: HashMap::new(),
        }
    }

    /// Catalog described by the pipeline configuration
    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(&config.root).with_locations(config.locations.clone())
    }

    /// Register an explicit location for one table
    #[must_use]
    pub fn with_location(
        mut self,
        database: &str,
        table: &str,
        location: impl Into<String>,
    ) -> Self {
        self.locations
            .insert(format!("{database}.{table}"), location.into());
        self
    }

    /// Register explicit locations keyed by `database.table`
    #[must_use]
    pub fn with_locations(mut self, locations: HashMap<String, String>) -> Self {
        self.locations.extend(locations);
        self
    }

    /// File URL a table resolves to
    pub fn resolve(&self, database: &str, table: &str) -> String {
        self.locations
            .get(&format!("{database}.{table}"))
            .cloned()
            .unwrap_or_else(|| {
                format!("{}/{database}/{table}.csv", self.root.trim_end_matches('/'))
            })
    }
}

#[async_trait]
impl CatalogReader for ObjectStoreCatalog {
    async fn read_table(
        &self,
        database: &str,
        table: &str,
        options: &CsvOptions,
    ) -> Result<RecordBatch> {
        let url = self.resolve(database, table);
        tracing::debug!("Reading {database}.{table} from {url}");

        let batch = fetch_csv(&url, options)
            .await
            .map_err(|e| Error::catalog(database, table, e.to_string()))?;

        tracing::info!(
            "Read {database}.{table}: {} rows, {} columns",
            batch.num_rows(),
            batch.num_columns()
        );
        Ok(batch)
    }
}

async fn fetch_csv(url: &str, options: &CsvOptions) -> Result<RecordBatch> {
    let (dir, file) = split_file_url(url)?;
    let location = StorageLocation::open(dir)?;
    let body = location.read(file).await?;
    read_csv(&body, options)
}
