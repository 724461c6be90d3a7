//! Output module
//!
//! Encodes cleaned datasets for staging and inspection.
//!
//! # Overview
//!
//! - `encode_parquet` - a batch as an in-memory Parquet file
//! - `arrow_to_json` - a batch as JSON records

mod json;
mod writer;

pub use json::arrow_to_json;
pub use writer::{encode_parquet, ParquetWriterConfig};
