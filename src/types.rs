//! Common types used throughout shop-etl
//!
//! This module contains the dataset identities, the fixed dataset to table
//! mapping and the write/failure policies shared by the pipeline stages.

use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Dataset Names
// ============================================================================

/// The five datasets a job run moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetName {
    Customer,
    Inventory,
    Order,
    OrderItem,
    Product,
}

impl DatasetName {
    /// All datasets in load order
    pub const ALL: [DatasetName; 5] = [
        DatasetName::Customer,
        DatasetName::Inventory,
        DatasetName::Order,
        DatasetName::OrderItem,
        DatasetName::Product,
    ];

    /// Logical dataset name
    pub fn as_str(self) -> &'static str {
        match self {
            DatasetName::Customer => "customer",
            DatasetName::Inventory => "inventory",
            DatasetName::Order => "order",
            DatasetName::OrderItem => "order_item",
            DatasetName::Product => "product",
        }
    }

    /// In-memory frame name, as reported in load logs
    pub fn frame_name(self) -> &'static str {
        match self {
            DatasetName::Customer => "customer_df",
            DatasetName::Inventory => "inventory_df",
            DatasetName::Order => "order_df",
            DatasetName::OrderItem => "order_item_df",
            DatasetName::Product => "product_df",
        }
    }

    /// Catalog table the raw CSV is registered under
    pub fn source_table(self) -> &'static str {
        match self {
            DatasetName::Customer => "customer_csv",
            DatasetName::Inventory => "inventory_csv",
            DatasetName::Order => "order_csv",
            DatasetName::OrderItem => "order_item_csv",
            DatasetName::Product => "product_csv",
        }
    }

    /// Warehouse table the cleaned dataset is loaded into
    pub fn destination_table(self) -> &'static str {
        match self {
            DatasetName::Customer => "customer",
            DatasetName::Inventory => "inventory",
            DatasetName::Order => "order",
            DatasetName::OrderItem => "order_item",
            DatasetName::Product => "product",
        }
    }

    /// Parse a logical dataset name
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == name)
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Datasets
// ============================================================================

/// One named dataset held in memory for the duration of a run
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Which dataset this is
    pub name: DatasetName,
    /// Rows, one Arrow batch per dataset
    pub batch: RecordBatch,
}

impl Dataset {
    /// Wrap a batch
    pub fn new(name: DatasetName, batch: RecordBatch) -> Self {
        Self { name, batch }
    }

    /// Number of rows
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }
}

/// Cleaned datasets keyed by name, ready for the loader
pub type CleanedDatasets = BTreeMap<DatasetName, Dataset>;

// ============================================================================
// Destination Tables
// ============================================================================

/// A table inside the warehouse schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    /// Warehouse schema
    pub schema: String,
    /// Table name
    pub table: String,
}

impl TableRef {
    /// Create a table reference
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Destination of a dataset inside `schema`
    pub fn for_dataset(schema: impl Into<String>, dataset: DatasetName) -> Self {
        Self::new(schema, dataset.destination_table())
    }

    /// `"schema"."table"` with identifiers quoted (`order` is reserved)
    pub fn quoted(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Quote a SQL identifier
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

// ============================================================================
// Write and Failure Policies
// ============================================================================

/// How data should be written to the destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Replace the table contents
    #[default]
    Overwrite,
    /// Append to existing rows
    Append,
}

/// What a table load failure does to the remaining loads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep loading the other tables and report every failure
    #[default]
    Isolate,
    /// Stop at the first failed table
    FailFast,
}
