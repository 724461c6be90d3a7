//! CLI runner - executes commands

use crate::catalog::ObjectStoreCatalog;
use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::PipelineConfig;
use crate::error::{Error, Result, ResultExt};
use crate::job::{read_datasets, Job};
use crate::output::{arrow_to_json, encode_parquet};
use crate::pipeline::DatasetPipeline;
use crate::secrets::{fetch_password, store_from_config};
use crate::storage::StorageLocation;
use crate::types::{DatasetName, TableRef};
use crate::warehouse::DuckDbWarehouse;
use serde_json::{json, Value};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Run => self.run_job().await,
            Commands::Transform {
                output,
                preview,
                dataset,
            } => {
                self.transform(output.as_deref(), *preview, dataset.as_deref())
                    .await
            }
            Commands::Tables => self.tables(),
            Commands::Check => self.check().await,
        }
    }

    /// Load configuration
    fn load_config(&self) -> Result<PipelineConfig> {
        PipelineConfig::load(self.cli.config.as_deref(), self.cli.config_json.as_deref())
    }

    /// Run the full job
    async fn run_job(&self) -> Result<()> {
        let params = self.cli.params.resolve()?;
        let config = self.load_config()?;

        let summary = Job::new(params, config).execute().await?;
        self.output_message(&json!({
            "type": "RUN_SUMMARY",
            "summary": summary,
        }));
        Ok(())
    }

    /// Read and clean datasets, optionally writing them out as Parquet
    async fn transform(
        &self,
        output: Option<&str>,
        preview: usize,
        dataset: Option<&str>,
    ) -> Result<()> {
        let config = self.load_config()?;

        let names = match dataset {
            Some(name) => vec![DatasetName::parse(name).ok_or_else(|| {
                Error::invalid_value("dataset", format!("unknown dataset '{name}'"))
            })?],
            None => DatasetName::ALL.to_vec(),
        };

        let catalog = ObjectStoreCatalog::from_config(&config.catalog);
        let datasets = read_datasets(&catalog, &config.catalog.database, &names).await?;
        let cleaned = DatasetPipeline::default().transform_all(datasets)?;

        let destination = output.map(StorageLocation::create).transpose()?;

        for (name, dataset) in &cleaned {
            let mut message = json!({
                "type": "DATASET",
                "dataset": name.as_str(),
                "rows": dataset.num_rows(),
            });

            if let Some(location) = &destination {
                let bytes = encode_parquet(&dataset.batch, None)?;
                let path = location
                    .write(&format!("{}.parquet", name.as_str()), bytes)
                    .await
                    .with_context(|| format!("Writing cleaned {name}"))?;
                tracing::info!("Wrote {} rows to {path}", dataset.num_rows());
                message["path"] = Value::String(path);
            }

            if preview > 0 {
                let rows = arrow_to_json(&dataset.batch.slice(0, preview.min(dataset.num_rows())))?;
                message["preview"] = Value::Array(rows);
            }

            self.output_message(&message);
        }

        Ok(())
    }

    /// Print the fixed dataset to table mapping
    fn tables(&self) -> Result<()> {
        let config = self.load_config()?;
        let schema = self.cli.params.schema.as_deref().unwrap_or("public");

        for name in DatasetName::ALL {
            self.output_message(&json!({
                "type": "TABLE",
                "dataset": name.as_str(),
                "frame": name.frame_name(),
                "source": format!("{}.{}", config.catalog.database, name.source_table()),
                "destination": TableRef::for_dataset(schema, name).to_string(),
            }));
        }
        Ok(())
    }

    /// Check the warehouse connection
    async fn check(&self) -> Result<()> {
        let params = self.cli.params.resolve()?;
        let config = self.load_config()?;

        let secrets = store_from_config(&config.secrets);
        let password = fetch_password(secrets.as_ref(), &params.secret_name).await?;

        let status = DuckDbWarehouse::connect(&params, &config.warehouse, password, "check")
            .and_then(|warehouse| {
                warehouse.check_connection()?;
                Ok(warehouse.connection_info().to_string())
            });

        match status {
            Ok(target) => self.output_message(&json!({
                "type": "CONNECTION_STATUS",
                "connectionStatus": {
                    "status": "SUCCEEDED",
                    "message": format!("Connected to {target}")
                }
            })),
            Err(e) => self.output_message(&json!({
                "type": "CONNECTION_STATUS",
                "connectionStatus": {
                    "status": "FAILED",
                    "message": format!("Connection failed: {e}")
                }
            })),
        }

        Ok(())
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}
