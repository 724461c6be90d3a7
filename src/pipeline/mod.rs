//! Dataset pipeline module
//!
//! Applies the declared cleaning rules to each loaded dataset.
//!
//! # Overview
//!
//! For `order` the steps always run in this order:
//! address folding (with comma cleanup), null coalescing over every column,
//! then date reparsing. `customer` gets phone cleanup. The other datasets pass
//! through unchanged. Datasets never influence each other.

mod rules;

pub use rules::{
    AddressRule, ColumnRule, DatasetSpec, CUSTOMER_PHONE_COLUMN, ORDER_ADDRESS_COLUMNS,
    ORDER_DATE_COLUMNS, ORDER_KEY_COLUMN,
};

use crate::error::{Error, Result};
use crate::normalize::{coalesce_column, date_column, phone_column, AddressReducer};
use crate::types::{CleanedDatasets, Dataset, DatasetName};
use arrow::array::{Array, ArrayRef};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-dataset transformation driver
#[derive(Debug, Clone)]
pub struct DatasetPipeline {
    specs: BTreeMap<DatasetName, DatasetSpec>,
}

impl Default for DatasetPipeline {
    fn default() -> Self {
        Self {
            specs: DatasetName::ALL
                .into_iter()
                .map(|name| (name, DatasetSpec::for_dataset(name)))
                .collect(),
        }
    }
}

impl DatasetPipeline {
    /// Pipeline with the built-in rules
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the rules for one dataset
    #[must_use]
    pub fn with_spec(mut self, spec: DatasetSpec) -> Self {
        self.specs.insert(spec.dataset, spec);
        self
    }

    /// Rules for a dataset
    pub fn spec(&self, dataset: DatasetName) -> Option<&DatasetSpec> {
        self.specs.get(&dataset)
    }

    /// Clean one dataset
    pub fn transform(&self, dataset: Dataset) -> Result<Dataset> {
        let Some(spec) = self.specs.get(&dataset.name) else {
            return Ok(dataset);
        };

        validate_columns(spec, &dataset.batch)?;

        if spec.is_passthrough() {
            tracing::debug!("{}: no cleaning rules, passing through", dataset.name);
            return Ok(dataset);
        }

        let mut batch = dataset.batch;

        if let Some(address) = &spec.address {
            let reducer = AddressReducer::new(address.key_column, address.columns);
            batch = reducer.reduce(&batch)?;
        }

        if spec.coalesce_nulls {
            batch = coalesce_all(&batch)?;
        }

        for rule in &spec.column_rules {
            batch = apply_rule(&batch, rule)?;
        }

        tracing::info!(
            "Cleaned {} ({} rows, {} columns)",
            dataset.name,
            batch.num_rows(),
            batch.num_columns()
        );

        Ok(Dataset::new(dataset.name, batch))
    }

    /// Clean every dataset, keyed by name
    pub fn transform_all(
        &self,
        datasets: impl IntoIterator<Item = Dataset>,
    ) -> Result<CleanedDatasets> {
        let mut cleaned = CleanedDatasets::new();
        for dataset in datasets {
            let dataset = self.transform(dataset)?;
            cleaned.insert(dataset.name, dataset);
        }
        Ok(cleaned)
    }
}

fn validate_columns(spec: &DatasetSpec, batch: &RecordBatch) -> Result<()> {
    let schema = batch.schema();
    for column in &spec.required_columns {
        if schema.index_of(column).is_err() {
            return Err(Error::schema_mismatch(spec.dataset.as_str(), *column));
        }
    }
    Ok(())
}

/// Replace the null sentinel with `""` in every column
fn coalesce_all(batch: &RecordBatch) -> Result<RecordBatch> {
    let mut result = batch.clone();
    for idx in 0..batch.num_columns() {
        let cleaned = coalesce_column(batch.column(idx))?;
        result = replace_column(&result, idx, cleaned, false)?;
    }
    Ok(result)
}

fn apply_rule(batch: &RecordBatch, rule: &ColumnRule) -> Result<RecordBatch> {
    let idx = batch.schema().index_of(rule.column())?;
    let column = batch.column(idx);

    let cleaned = match rule {
        ColumnRule::Phone { .. } => phone_column(column)?,
        ColumnRule::Date { column: name, format } => {
            let before = non_empty_count(column);
            let dates = date_column(column, *format)?;
            let unparsed = before.saturating_sub(dates.len() - dates.null_count());
            if unparsed > 0 {
                tracing::debug!("{name}: {unparsed} values did not parse as dates, set to null");
            }
            dates
        }
    };

    replace_column(batch, idx, cleaned, true)
}

/// Cells that are neither null nor empty text
fn non_empty_count(column: &ArrayRef) -> usize {
    match column.as_any().downcast_ref::<arrow::array::StringArray>() {
        Some(values) => values.iter().flatten().filter(|v| !v.is_empty()).count(),
        None => column.len() - column.null_count(),
    }
}

/// Swap column `idx` for `column`, retyping the field to match
fn replace_column(
    batch: &RecordBatch,
    idx: usize,
    column: ArrayRef,
    nullable: bool,
) -> Result<RecordBatch> {
    let schema = batch.schema();
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, field)| {
            if i == idx {
                Field::new(field.name(), column.data_type().clone(), nullable)
            } else {
                field.as_ref().clone()
            }
        })
        .collect();

    let mut columns = batch.columns().to_vec();
    columns[idx] = column;

    Ok(RecordBatch::try_new(
        Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone())),
        columns,
    )?)
}
