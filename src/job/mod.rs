//! Job module
//!
//! One batch run: fetch the warehouse secret, read the five source tables,
//! clean them, load them, and record the outcome.
//!
//! # Overview
//!
//! - `Job` - wires the collaborators together and runs the stages in order
//! - `JobRun` - explicit begin/commit boundaries around a run
//! - `RunSummary` - what a run did, optionally written to a run log

mod run;

pub use run::{write_summary, JobRun, RunStatus, RunSummary};

use crate::catalog::{CatalogReader, CsvOptions, ObjectStoreCatalog};
use crate::config::{JobParameters, PipelineConfig};
use crate::error::Result;
use crate::loader::MultiSinkLoader;
use crate::pipeline::DatasetPipeline;
use crate::secrets::{fetch_password, store_from_config, SecretStore};
use crate::types::{CleanedDatasets, Dataset, DatasetName};
use crate::warehouse::{DuckDbWarehouse, WarehouseSink};
use std::sync::Arc;

/// A configured job
pub struct Job {
    params: JobParameters,
    config: PipelineConfig,
    catalog: Arc<dyn CatalogReader>,
    secrets: Arc<dyn SecretStore>,
    pipeline: DatasetPipeline,
    /// Overrides the sink built from the warehouse config
    sink: Option<Arc<dyn WarehouseSink>>,
}

impl Job {
    /// Job with the catalog and secret store named by `config`
    pub fn new(params: JobParameters, config: PipelineConfig) -> Self {
        let catalog = ObjectStoreCatalog::from_config(&config.catalog);

        let secrets = store_from_config(&config.secrets);

        Self {
            params,
            config,
            catalog: Arc::new(catalog),
            secrets,
            pipeline: DatasetPipeline::default(),
            sink: None,
        }
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogReader>) -> Self {
        self.catalog = catalog;
        self
    }

    #[must_use]
    pub fn with_secrets(mut self, secrets: Arc<dyn SecretStore>) -> Self {
        self.secrets = secrets;
        self
    }

    #[must_use]
    pub fn with_pipeline(mut self, pipeline: DatasetPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Load through `sink` instead of connecting to the configured warehouse
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn WarehouseSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn params(&self) -> &JobParameters {
        &self.params
    }

    /// Read and clean every dataset without loading
    pub async fn clean(&self) -> Result<CleanedDatasets> {
        let datasets = read_datasets(
            self.catalog.as_ref(),
            &self.config.catalog.database,
            &DatasetName::ALL,
        )
        .await?;
        self.pipeline.transform_all(datasets)
    }

    /// Run the job end to end
    ///
    /// The secret is fetched before the run begins; a run that fails to read
    /// or clean its inputs loads nothing.
    pub async fn execute(&self) -> Result<RunSummary> {
        let password = fetch_password(self.secrets.as_ref(), &self.params.secret_name).await?;

        let run = JobRun::begin(&self.params).with_run_log(self.config.run_log.clone());

        let cleaned = match self.clean().await {
            Ok(cleaned) => cleaned,
            Err(e) => return Err(run.abort(e).await),
        };

        let sink = match self.sink(password, run.run_id()) {
            Ok(sink) => sink,
            Err(e) => return Err(run.abort(e).await),
        };

        let loader = MultiSinkLoader::new(sink, &self.params.warehouse_schema)
            .with_write_mode(self.config.load.write_mode)
            .with_failure_policy(self.config.load.failure_policy);
        let report = loader.load_all(&cleaned).await;

        run.commit(report).await
    }

    fn sink(&self, password: String, run_id: &str) -> Result<Arc<dyn WarehouseSink>> {
        if let Some(sink) = &self.sink {
            return Ok(Arc::clone(sink));
        }

        let warehouse =
            DuckDbWarehouse::connect(&self.params, &self.config.warehouse, password, run_id)?;
        tracing::info!("Connected to {}", warehouse.connection_info());
        Ok(Arc::new(warehouse))
    }
}

/// Read the source tables of `names` registered in `database`
pub async fn read_datasets(
    catalog: &dyn CatalogReader,
    database: &str,
    names: &[DatasetName],
) -> Result<Vec<Dataset>> {
    let options = CsvOptions::catalog();

    let mut datasets = Vec::with_capacity(names.len());
    for &name in names {
        let batch = catalog
            .read_table(database, name.source_table(), &options)
            .await?;
        datasets.push(Dataset::new(name, batch));
    }
    Ok(datasets)
}
