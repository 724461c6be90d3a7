//! Loader module
//!
//! Writes every cleaned dataset to its destination table and reports the
//! outcome per table.
//!
//! # Overview
//!
//! - `MultiSinkLoader` - one write per dataset through a `WarehouseSink`
//! - `LoadReport` / `TableOutcome` - what happened to each table

use crate::error::{Error, Result};
use crate::types::{CleanedDatasets, DatasetName, FailurePolicy, TableRef, WriteMode};
use crate::warehouse::WarehouseSink;
use serde::Serialize;
use std::sync::Arc;

/// Result of loading one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableOutcome {
    Loaded { rows: usize },
    Failed { error: String },
    /// Not attempted because an earlier table failed under fail-fast
    Skipped,
}

/// One dataset's load
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableLoad {
    pub dataset: DatasetName,
    /// `schema.table`
    pub table: String,
    #[serde(flatten)]
    pub outcome: TableOutcome,
}

/// Per-table outcomes of a load, in load order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub tables: Vec<TableLoad>,
}

impl LoadReport {
    /// Outcome for one dataset
    pub fn outcome(&self, dataset: DatasetName) -> Option<&TableOutcome> {
        self.tables
            .iter()
            .find(|t| t.dataset == dataset)
            .map(|t| &t.outcome)
    }

    /// Rows written across all loaded tables
    pub fn loaded_rows(&self) -> usize {
        self.tables
            .iter()
            .map(|t| match t.outcome {
                TableOutcome::Loaded { rows } => rows,
                _ => 0,
            })
            .sum()
    }

    /// Tables that failed, with their causes
    pub fn failures(&self) -> Vec<(String, String)> {
        self.tables
            .iter()
            .filter_map(|t| match &t.outcome {
                TableOutcome::Failed { error } => Some((t.table.clone(), error.clone())),
                _ => None,
            })
            .collect()
    }

    /// True when every table loaded
    pub fn is_success(&self) -> bool {
        self.tables
            .iter()
            .all(|t| matches!(t.outcome, TableOutcome::Loaded { .. }))
    }

    /// The report itself, or `Error::Load` naming every failed table
    pub fn into_result(self) -> Result<Self> {
        let failures = self.failures();
        if failures.is_empty() {
            Ok(self)
        } else {
            Err(Error::Load { failures })
        }
    }
}

/// Loads cleaned datasets into one warehouse schema
pub struct MultiSinkLoader {
    sink: Arc<dyn WarehouseSink>,
    schema: String,
    mode: WriteMode,
    policy: FailurePolicy,
}

impl MultiSinkLoader {
    /// Loader writing into `schema` with default mode and policy
    pub fn new(sink: Arc<dyn WarehouseSink>, schema: impl Into<String>) -> Self {
        Self {
            sink,
            schema: schema.into(),
            mode: WriteMode::default(),
            policy: FailurePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_write_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Write every dataset to its destination table
    pub async fn load_all(&self, datasets: &CleanedDatasets) -> LoadReport {
        let mut report = LoadReport::default();
        let mut stopped = false;

        for (name, dataset) in datasets {
            let table = TableRef::for_dataset(&self.schema, *name);

            let outcome = if stopped {
                TableOutcome::Skipped
            } else {
                match self.sink.write(&table, &dataset.batch, self.mode).await {
                    Ok(rows) => {
                        tracing::info!("Loaded {rows} rows into {table}");
                        TableOutcome::Loaded { rows }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load {name} into {table}: {e}");
                        stopped = self.policy == FailurePolicy::FailFast;
                        TableOutcome::Failed {
                            error: e.to_string(),
                        }
                    }
                }
            };

            report.tables.push(TableLoad {
                dataset: *name,
                table: table.to_string(),
                outcome,
            });
        }

        report
    }
}
