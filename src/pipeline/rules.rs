//! Per-dataset cleaning rules
//!
//! Every dataset's schema expectations and column rules are declared here as
//! data. Nothing is looked up by name at run time beyond the columns listed.

use crate::normalize::DateFormat;
use crate::types::DatasetName;

/// Order key the address fragments are grouped by
pub const ORDER_KEY_COLUMN: &str = "order_id";

/// Order columns holding multi-row address fragments
pub const ORDER_ADDRESS_COLUMNS: &[&str] = &["order_shipping_address", "order_billing_address"];

/// Order columns reparsed from `M/d/yyyy` into dates
pub const ORDER_DATE_COLUMNS: &[&str] = &["order_date", "order_payment_date", "order_shipping_date"];

/// Customer phone column
pub const CUSTOMER_PHONE_COLUMN: &str = "customer_phone";

/// A normalizer bound to one column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRule {
    /// Keep decimal digits only
    Phone { column: &'static str },
    /// Reparse text into a calendar date, null on failure
    Date {
        column: &'static str,
        format: DateFormat,
    },
}

impl ColumnRule {
    /// Column the rule rewrites
    pub fn column(&self) -> &'static str {
        match self {
            ColumnRule::Phone { column } | ColumnRule::Date { column, .. } => *column,
        }
    }
}

/// Multi-row address folding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRule {
    /// Partition key
    pub key_column: &'static str,
    /// Columns folded per partition
    pub columns: &'static [&'static str],
}

/// Everything the pipeline does to one dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSpec {
    /// Dataset the spec applies to
    pub dataset: DatasetName,
    /// Columns that must be present in the loaded data
    pub required_columns: Vec<&'static str>,
    /// Address folding, applied first
    pub address: Option<AddressRule>,
    /// Replace nulls with empty strings in every column, after address folding
    pub coalesce_nulls: bool,
    /// Column rules, applied last and in order
    pub column_rules: Vec<ColumnRule>,
}

const ORDER_DATE_RULES: [ColumnRule; 3] = [
    ColumnRule::Date {
        column: "order_date",
        format: DateFormat::MonthDayYear,
    },
    ColumnRule::Date {
        column: "order_payment_date",
        format: DateFormat::MonthDayYear,
    },
    ColumnRule::Date {
        column: "order_shipping_date",
        format: DateFormat::MonthDayYear,
    },
];

impl DatasetSpec {
    /// A spec that leaves the dataset untouched
    pub fn passthrough(dataset: DatasetName) -> Self {
        Self {
            dataset,
            required_columns: Vec::new(),
            address: None,
            coalesce_nulls: false,
            column_rules: Vec::new(),
        }
    }

    /// The built-in rules for `dataset`
    pub fn for_dataset(dataset: DatasetName) -> Self {
        match dataset {
            DatasetName::Customer => Self {
                required_columns: vec![CUSTOMER_PHONE_COLUMN],
                column_rules: vec![ColumnRule::Phone {
                    column: CUSTOMER_PHONE_COLUMN,
                }],
                ..Self::passthrough(dataset)
            },
            DatasetName::Order => {
                let mut required_columns = vec![ORDER_KEY_COLUMN];
                required_columns.extend_from_slice(ORDER_ADDRESS_COLUMNS);
                required_columns.extend_from_slice(ORDER_DATE_COLUMNS);
                Self {
                    dataset,
                    required_columns,
                    address: Some(AddressRule {
                        key_column: ORDER_KEY_COLUMN,
                        columns: ORDER_ADDRESS_COLUMNS,
                    }),
                    coalesce_nulls: true,
                    column_rules: ORDER_DATE_RULES.to_vec(),
                }
            }
            DatasetName::Inventory | DatasetName::OrderItem | DatasetName::Product => {
                Self::passthrough(dataset)
            }
        }
    }

    /// Whether the spec changes anything
    pub fn is_passthrough(&self) -> bool {
        self.address.is_none() && !self.coalesce_nulls && self.column_rules.is_empty()
    }
}
