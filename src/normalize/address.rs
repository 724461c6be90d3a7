//! Multi-row address reconstruction
//!
//! The order export splits one multi-line address over several rows that
//! share an `order_id`. The reducer partitions the rows by that key, folds
//! every partition's fragments into one string and writes it back onto each
//! row of the partition.

use super::fields::{as_utf8, downcast_utf8};
use crate::error::Result;
use arrow::array::{Array, ArrayRef, StringArray, UInt32Array};
use arrow::compute::take;
use arrow::record_batch::RecordBatch;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::LazyLock;

/// Whitespace on either side of a comma
static COMMA_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*,\s*").unwrap());

/// Separator placed between fragments of one partition
const FRAGMENT_SEPARATOR: &str = " ";

/// Collapse the whitespace around every comma to exactly `", "`
pub fn normalize_commas(address: &str) -> String {
    COMMA_REGEX.replace_all(address, ", ").into_owned()
}

/// Join fragments with a single space. Nulls are dropped, empty strings are
/// kept as empty segments.
pub fn join_fragments<'a>(fragments: impl IntoIterator<Item = Option<&'a str>>) -> String {
    fragments
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(FRAGMENT_SEPARATOR)
}

/// Partition key. Integer keys sort numerically ahead of free-text keys, the
/// null key sorts last.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum GroupKey {
    Number(i64, String),
    Text(String),
    Null,
}

impl GroupKey {
    fn from_cell(cell: Option<&str>) -> Self {
        match cell {
            None => GroupKey::Null,
            Some(text) => match text.trim().parse::<i64>() {
                Ok(n) => GroupKey::Number(n, text.to_string()),
                Err(_) => GroupKey::Text(text.to_string()),
            },
        }
    }
}

/// Folds address fragments per order
#[derive(Debug, Clone)]
pub struct AddressReducer {
    key_column: String,
    address_columns: Vec<String>,
}

impl AddressReducer {
    /// Reducer over `address_columns`, partitioned by `key_column`
    pub fn new(key_column: impl Into<String>, address_columns: &[&str]) -> Self {
        Self {
            key_column: key_column.into(),
            address_columns: address_columns.iter().map(ToString::to_string).collect(),
        }
    }

    /// Key column name
    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    /// Address column names
    pub fn address_columns(&self) -> &[String] {
        &self.address_columns
    }

    /// Group row indices by key. Each partition is fully materialized before
    /// any address is folded.
    fn partitions(&self, batch: &RecordBatch) -> Result<Vec<Vec<u32>>> {
        let key_idx = batch.schema().index_of(&self.key_column)?;
        let keys = as_utf8(batch.column(key_idx))?;
        let keys = downcast_utf8(&keys)?;

        let mut groups: BTreeMap<GroupKey, Vec<u32>> = BTreeMap::new();
        for (row, key) in keys.iter().enumerate() {
            groups
                .entry(GroupKey::from_cell(key))
                .or_default()
                .push(row as u32);
        }

        Ok(groups.into_values().collect())
    }

    /// Rewrite the address columns of `batch`
    ///
    /// Rows come back grouped by key (ascending, stable inside a group). The
    /// row count never changes; every row of a partition carries the same
    /// folded address.
    pub fn reduce(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let partitions = self.partitions(batch)?;
        let order: UInt32Array = partitions.iter().flatten().copied().collect();

        let mut columns: Vec<ArrayRef> = batch
            .columns()
            .iter()
            .map(|column| take(column.as_ref(), &order, None))
            .collect::<std::result::Result<_, _>>()?;

        for name in &self.address_columns {
            let idx = batch.schema().index_of(name)?;
            let fragments = as_utf8(&columns[idx])?;
            let fragments = downcast_utf8(&fragments)?;

            let mut folded: Vec<String> = Vec::with_capacity(fragments.len());
            let mut offset = 0usize;
            for partition in &partitions {
                let rows = offset..offset + partition.len();
                let joined = join_fragments(rows.clone().map(|row| fragments_value(fragments, row)));
                let cleaned = normalize_commas(&joined);
                folded.extend(rows.map(|_| cleaned.clone()));
                offset += partition.len();
            }

            columns[idx] = Arc::new(StringArray::from(folded));
        }

        tracing::debug!(
            "Folded addresses of {} rows into {} partitions",
            batch.num_rows(),
            partitions.len()
        );

        Ok(RecordBatch::try_new(
            rebuild_schema(batch, &self.address_columns),
            columns,
        )?)
    }
}

fn fragments_value(fragments: &StringArray, row: usize) -> Option<&str> {
    if fragments.is_null(row) {
        None
    } else {
        Some(fragments.value(row))
    }
}

/// Schema of `batch` with `columns` retyped to Utf8
fn rebuild_schema(batch: &RecordBatch, columns: &[String]) -> arrow::datatypes::SchemaRef {
    use arrow::datatypes::{DataType, Field, Schema};

    let fields: Vec<Field> = batch
        .schema()
        .fields()
        .iter()
        .map(|field| {
            if columns.iter().any(|c| c == field.name()) {
                Field::new(field.name(), DataType::Utf8, field.is_nullable())
            } else {
                field.as_ref().clone()
            }
        })
        .collect();
    Arc::new(Schema::new_with_metadata(
        fields,
        batch.schema().metadata().clone(),
    ))
}
