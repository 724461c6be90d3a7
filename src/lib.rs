// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]

//! # Shop ETL
//!
//! Batch job moving the e-commerce shop datasets from the raw CSV catalog
//! into the warehouse.
//!
//! ## Stages
//!
//! - **Extract**: five CSV tables (`customer_csv`, `inventory_csv`,
//!   `order_csv`, `order_item_csv`, `product_csv`) read as all-text Arrow batches
//! - **Transform**: order addresses folded per order, nulls coalesced, dates
//!   reparsed; customer phones reduced to digits
//! - **Load**: one destination table per dataset, failures reported per table
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shop_etl::{Job, JobParameters, PipelineConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let params = JobParameters::from_map(&std::env::vars().collect())?;
//!     let config = PipelineConfig::from_file("pipeline.yaml")?;
//!
//!     let summary = Job::new(params, config).execute().await?;
//!     println!("{} rows loaded", summary.rows_loaded);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────────┐
//! │ CatalogReader│──▶│ DatasetPipeline  │──▶│ MultiSinkLoader  │
//! │ (CSV, Arrow) │   │ normalize rules  │   │ WarehouseSink    │
//! └──────────────┘   └──────────────────┘   └──────────────────┘
//!        ▲                                           │
//!        │            JobRun begin ... commit        ▼
//!   object_store                              DuckDB (Redshift
//!                                             attach or local)
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Dataset names, destination tables and load policies
pub mod types;

/// Job parameters and pipeline configuration
pub mod config;

/// Local and object storage locations
pub mod storage;

/// CSV catalog reader
pub mod catalog;

/// Warehouse credentials
pub mod secrets;

/// Field normalizers and the address reducer
pub mod normalize;

/// Per-dataset cleaning rules
pub mod pipeline;

/// Parquet encoding and JSON conversion
pub mod output;

/// DuckDB-backed warehouse sink
pub mod warehouse;

/// Multi-table loader
pub mod loader;

/// Job orchestration and run context
pub mod job;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{JobParameters, PipelineConfig};
pub use error::{Error, Result};
pub use job::{Job, JobRun, RunSummary};
pub use loader::{LoadReport, MultiSinkLoader, TableOutcome};
pub use pipeline::DatasetPipeline;
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
