//! Normalization module
//!
//! Field-level cleaning rules and the order address reducer.
//!
//! # Overview
//!
//! - `normalize_phone`, `coalesce_null`, `normalize_date` - per-value rules
//! - `phone_column`, `coalesce_column`, `date_column` - the same rules over Arrow columns
//! - `AddressReducer` - folds multi-row addresses into one value per order

mod address;
mod fields;

pub use address::{join_fragments, normalize_commas, AddressReducer};
pub use fields::{
    coalesce_column, coalesce_null, date_column, date_to_days, days_to_date, normalize_date,
    normalize_phone, phone_column, DateFormat,
};
