//! CLI module
//!
//! Command-line interface for running the job.
//!
//! # Commands
//!
//! - `run` - Read, clean and load every dataset
//! - `transform` - Read and clean without loading
//! - `tables` - Show the dataset to table mapping
//! - `check` - Test the warehouse connection

mod commands;
mod runner;

pub use commands::{Cli, Commands, JobArgs, OutputFormat};
pub use runner::Runner;
