//! CLI commands and argument parsing

use crate::config::{
    JobParameters, PARAM_CLUSTER, PARAM_DATABASE, PARAM_JOB_NAME, PARAM_SCHEMA,
    PARAM_SECRET_NAME, PARAM_TEMP_DIR,
};
use crate::error::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Shop ETL: load the e-commerce shop datasets into the warehouse
#[derive(Parser, Debug)]
#[command(name = "shop-etl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Pipeline configuration file (YAML or JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Inline pipeline configuration JSON
    #[arg(long, global = true)]
    pub config_json: Option<String>,

    #[command(flatten)]
    pub params: JobArgs,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Job parameters, each also read from the environment variable of the same name
#[derive(Args, Debug, Default, Clone)]
pub struct JobArgs {
    /// Job name
    #[arg(long = "JOB_NAME", env = "JOB_NAME", global = true)]
    pub job_name: Option<String>,

    /// Secret holding the warehouse password
    #[arg(long = "SecretName", env = "SecretName", global = true)]
    pub secret_name: Option<String>,

    /// Staging location (local path or cloud URL)
    #[arg(long = "TempDir", env = "TempDir", global = true)]
    pub temp_dir: Option<String>,

    /// Warehouse schema
    #[arg(long = "RedshiftSchema", env = "RedshiftSchema", global = true)]
    pub schema: Option<String>,

    /// Warehouse cluster identifier
    #[arg(long = "RedshiftCluster", env = "RedshiftCluster", global = true)]
    pub cluster: Option<String>,

    /// Warehouse database
    #[arg(long = "RedshiftDatabase", env = "RedshiftDatabase", global = true)]
    pub database: Option<String>,
}

impl JobArgs {
    /// Validate that every parameter was supplied
    pub fn resolve(&self) -> Result<JobParameters> {
        JobParameters::from_options([
            (PARAM_JOB_NAME, self.job_name.clone()),
            (PARAM_SECRET_NAME, self.secret_name.clone()),
            (PARAM_TEMP_DIR, self.temp_dir.clone()),
            (PARAM_SCHEMA, self.schema.clone()),
            (PARAM_CLUSTER, self.cluster.clone()),
            (PARAM_DATABASE, self.database.clone()),
        ])
    }
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full job: read, clean and load every dataset
    Run,

    /// Read and clean the datasets without loading them
    Transform {
        /// Write one Parquet file per dataset here (local path or cloud URL)
        /// Supports: /path, s3://bucket/path, r2://bucket/path, gs://bucket/path, az://container/path
        #[arg(short, long)]
        output: Option<String>,

        /// Print the first N cleaned rows of each dataset
        #[arg(long, default_value = "0")]
        preview: usize,

        /// Only this dataset (customer, inventory, order, order_item, product)
        #[arg(long)]
        dataset: Option<String>,
    },

    /// Show the dataset to table mapping
    Tables,

    /// Test the warehouse connection
    Check,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_job_parameters() {
        let cli = Cli::try_parse_from([
            "shop-etl",
            "run",
            "--JOB_NAME",
            "nightly-load",
            "--SecretName",
            "prod/redshift",
            "--TempDir",
            "s3://tmp/glue",
            "--RedshiftSchema",
            "public",
            "--RedshiftCluster",
            "shop-cluster",
            "--RedshiftDatabase",
            "shop",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Run));
        let params = cli.params.resolve().unwrap();
        assert_eq!(params.secret_name, "prod/redshift");
        assert_eq!(params.warehouse_database, "shop");
    }

    #[test]
    fn test_parse_transform() {
        let cli = Cli::try_parse_from([
            "shop-etl",
            "-C",
            "pipeline.yaml",
            "transform",
            "--preview",
            "5",
            "--dataset",
            "order",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("pipeline.yaml")));
        match cli.command {
            Commands::Transform {
                output,
                preview,
                dataset,
            } => {
                assert_eq!(output, None);
                assert_eq!(preview, 5);
                assert_eq!(dataset.as_deref(), Some("order"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
