//! Warehouse module
//!
//! Writes cleaned datasets into destination tables.
//!
//! # Overview
//!
//! - `WarehouseSink` - the seam the loader writes through
//! - `WarehouseConnection` - cluster address and credentials
//! - `DuckDbWarehouse` - stages Parquet under the temp dir and loads it with
//!   DuckDB, into an attached Redshift cluster or a local database
//! - `copy_script` - the Redshift `COPY` used for attached clusters

mod connection;
mod engine;
mod redshift;

pub use connection::WarehouseConnection;
pub use engine::DuckDbWarehouse;
pub use redshift::{copy_script, CopyCredentials};

use crate::error::Result;
use crate::types::{TableRef, WriteMode};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;

/// Destination for cleaned datasets
#[async_trait]
pub trait WarehouseSink: Send + Sync {
    /// Write a batch to `table`, returning the number of rows written
    async fn write(&self, table: &TableRef, batch: &RecordBatch, mode: WriteMode) -> Result<usize>;
}

#[cfg(test)]
mod tests;
