//! DuckDB-based warehouse sink
//!
//! Batches are staged as Parquet under the temp dir. A local DuckDB database
//! loads them with `read_parquet`; an attached Redshift cluster loads them
//! with its own `COPY`, issued through DuckDB's postgres extension.

use super::redshift::{copy_script, CopyCredentials};
use super::{WarehouseConnection, WarehouseSink};
use crate::config::{JobParameters, WarehouseConfig, WarehouseKind};
use crate::error::{Error, Result};
use crate::output::{encode_parquet, ParquetWriterConfig};
use crate::storage::StorageLocation;
use crate::types::{quote_ident, TableRef, WriteMode};
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use duckdb::Connection;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};

/// Catalog name the Redshift cluster is attached under
const ATTACHED_CATALOG: &str = "warehouse";

/// Warehouse sink using DuckDB
pub struct DuckDbWarehouse {
    /// DuckDB connection
    conn: Mutex<Connection>,
    /// Target type
    kind: WarehouseKind,
    /// Catalog the destination schema lives in
    catalog: String,
    /// Where Parquet files are staged before loading
    staging: StorageLocation,
    /// Run id used to separate staged files
    run_id: String,
    /// Target description (for logging - password masked)
    target: String,
    parquet: ParquetWriterConfig,
    /// Set for Redshift targets
    copy_credentials: Option<CopyCredentials>,
}

impl DuckDbWarehouse {
    /// Connect to the warehouse named by the job parameters and config
    pub fn connect(
        params: &JobParameters,
        config: &WarehouseConfig,
        password: String,
        run_id: &str,
    ) -> Result<Self> {
        match config.kind {
            WarehouseKind::Redshift => {
                let connection = WarehouseConnection::new(params, config, password);
                let credentials = CopyCredentials::resolve(config)?;
                Self::attach_redshift(&connection, credentials, run_id)
            }
            WarehouseKind::Duckdb => Self::open_local(&config.duckdb_path, &params.temp_dir, run_id),
        }
    }

    /// Attach a Redshift cluster over the Postgres wire protocol
    ///
    /// The temp dir must be an `s3://` location Redshift can `COPY` from.
    pub fn attach_redshift(
        connection: &WarehouseConnection,
        credentials: CopyCredentials,
        run_id: &str,
    ) -> Result<Self> {
        if !connection.temp_dir.starts_with("s3://") {
            return Err(Error::config(format!(
                "Redshift loads need an s3:// TempDir, got {}",
                connection.temp_dir
            )));
        }

        let conn = Connection::open_in_memory()
            .map_err(|e| Error::config(format!("Failed to create DuckDB connection: {e}")))?;

        conn.execute_batch("INSTALL postgres; LOAD postgres;")
            .map_err(|e| Error::config(format!("Failed to load postgres extension: {e}")))?;

        let attach_sql = format!(
            "ATTACH {} AS {ATTACHED_CATALOG} (TYPE POSTGRES);",
            sql_literal(&connection.dsn())
        );
        conn.execute_batch(&attach_sql).map_err(|e| {
            Error::config(format!(
                "Failed to attach {}: {e}",
                connection.connection_info()
            ))
        })?;

        let mut warehouse = Self::with_connection(
            conn,
            WarehouseKind::Redshift,
            ATTACHED_CATALOG.to_string(),
            &connection.temp_dir,
            run_id,
            connection.connection_info(),
        )?;
        warehouse.copy_credentials = Some(credentials);
        Ok(warehouse)
    }

    /// Open a local DuckDB database file, or `:memory:`
    pub fn open_local(path: &str, temp_dir: &str, run_id: &str) -> Result<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(|e| Error::config(format!("Failed to open DuckDB database {path}: {e}")))?;

        let catalog: String = conn
            .query_row("SELECT current_database()", [], |row| row.get(0))
            .map_err(|e| Error::config(format!("Failed to query DuckDB catalog: {e}")))?;

        Self::with_connection(
            conn,
            WarehouseKind::Duckdb,
            catalog,
            temp_dir,
            run_id,
            format!("duckdb:{path}"),
        )
    }

    fn with_connection(
        conn: Connection,
        kind: WarehouseKind,
        catalog: String,
        temp_dir: &str,
        run_id: &str,
        target: String,
    ) -> Result<Self> {
        let staging = StorageLocation::create(temp_dir)?;

        let warehouse = Self {
            conn: Mutex::new(conn),
            kind,
            catalog,
            staging,
            run_id: run_id.to_string(),
            target,
            parquet: ParquetWriterConfig::default(),
            copy_credentials: None,
        };

        // Redshift reads staged objects itself
        if kind == WarehouseKind::Duckdb && warehouse.staging.is_cloud() {
            warehouse.configure_cloud_storage()?;
        }

        Ok(warehouse)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::config("DuckDB connection lock poisoned"))
    }

    /// Configure cloud storage credentials (S3, R2, GCS) for staged reads
    pub fn configure_cloud_storage(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch("INSTALL httpfs; LOAD httpfs;")
            .map_err(|e| Error::config(format!("Failed to load httpfs extension: {e}")))?;

        if let (Ok(key_id), Ok(secret)) = (
            std::env::var("AWS_ACCESS_KEY_ID"),
            std::env::var("AWS_SECRET_ACCESS_KEY"),
        ) {
            let region =
                std::env::var("AWS_DEFAULT_REGION").unwrap_or_else(|_| "us-east-1".to_string());
            conn.execute_batch(&format!(
                "SET s3_access_key_id = {}; SET s3_secret_access_key = {}; SET s3_region = {};",
                sql_literal(&key_id),
                sql_literal(&secret),
                sql_literal(&region)
            ))
            .map_err(|e| Error::config(format!("Failed to configure S3: {e}")))?;

            // Custom endpoint (R2, MinIO, etc.)
            if let Ok(endpoint) = std::env::var("AWS_ENDPOINT") {
                let endpoint = endpoint
                    .trim_start_matches("https://")
                    .trim_start_matches("http://");
                conn.execute_batch(&format!(
                    "SET s3_endpoint = {}; SET s3_url_style = 'path';",
                    sql_literal(endpoint)
                ))
                .map_err(|e| Error::config(format!("Failed to configure S3 endpoint: {e}")))?;
            }
        }

        if let Ok(service_account) = std::env::var("GOOGLE_SERVICE_ACCOUNT") {
            conn.execute_batch(&format!(
                "SET gcs_credentials_file = {};",
                sql_literal(&service_account)
            ))
            .map_err(|e| Error::config(format!("Failed to configure GCS: {e}")))?;
        }

        Ok(())
    }

    /// Test the warehouse connection
    pub fn check_connection(&self) -> Result<()> {
        let query = match self.kind {
            WarehouseKind::Redshift => remote_call(&self.catalog, "SELECT 1"),
            WarehouseKind::Duckdb => "SELECT 1;".to_string(),
        };

        self.lock()?
            .execute_batch(&query)
            .map_err(|e| Error::config(format!("Connection check failed: {e}")))?;

        Ok(())
    }

    /// Tables in a warehouse schema
    pub fn list_tables(&self, schema: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT table_name FROM information_schema.tables
                 WHERE table_catalog = ? AND table_schema = ?
                 ORDER BY table_name",
            )
            .map_err(|e| Error::config(format!("Failed to prepare query: {e}")))?;

        let tables = stmt
            .query_map([self.catalog.as_str(), schema], |row| row.get(0))
            .map_err(|e| Error::config(format!("Failed to query tables: {e}")))?
            .collect::<std::result::Result<Vec<String>, _>>()
            .map_err(|e| Error::config(format!("Failed to read table names: {e}")))?;

        Ok(tables)
    }

    /// Read a table back as JSON rows
    pub fn read_rows(&self, table: &TableRef) -> Result<Vec<Value>> {
        let columns = self.table_columns(table)?;
        let conn = self.lock()?;

        let query = format!("SELECT * FROM {}", self.qualified(table));
        let mut stmt = conn
            .prepare(&query)
            .map_err(|e| Error::warehouse(table.to_string(), e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                let mut record = serde_json::Map::new();
                for (idx, column) in columns.iter().enumerate() {
                    let value: duckdb::types::Value = row.get(idx)?;
                    record.insert(column.clone(), duckdb_value_to_json(value));
                }
                Ok(Value::Object(record))
            })
            .map_err(|e| Error::warehouse(table.to_string(), e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::warehouse(table.to_string(), e.to_string()))?;

        Ok(rows)
    }

    fn table_columns(&self, table: &TableRef) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT column_name FROM information_schema.columns
                 WHERE table_catalog = ? AND table_schema = ? AND table_name = ?
                 ORDER BY ordinal_position",
            )
            .map_err(|e| Error::warehouse(table.to_string(), e.to_string()))?;

        let columns = stmt
            .query_map(
                [
                    self.catalog.as_str(),
                    table.schema.as_str(),
                    table.table.as_str(),
                ],
                |row| row.get(0),
            )
            .map_err(|e| Error::warehouse(table.to_string(), e.to_string()))?
            .collect::<std::result::Result<Vec<String>, _>>()
            .map_err(|e| Error::warehouse(table.to_string(), e.to_string()))?;

        if columns.is_empty() {
            return Err(Error::warehouse(table.to_string(), "table does not exist"));
        }
        Ok(columns)
    }

    /// `"catalog"."schema"."table"`
    fn qualified(&self, table: &TableRef) -> String {
        format!("{}.{}", quote_ident(&self.catalog), table.quoted())
    }

    /// Staged file for a table in this run
    fn staging_path(&self, table: &TableRef) -> String {
        format!("{}/run={}/data.parquet", table.table, self.run_id)
    }

    /// Load a staged Parquet file into the destination table
    fn load_staged(
        &self,
        table: &TableRef,
        schema: &Schema,
        staged: &str,
        mode: WriteMode,
    ) -> Result<()> {
        match &self.copy_credentials {
            Some(credentials) => self.copy_into_redshift(table, schema, staged, credentials, mode),
            None => self.insert_local(table, staged, mode),
        }
    }

    fn insert_local(&self, table: &TableRef, staged: &str, mode: WriteMode) -> Result<()> {
        let target = self.qualified(table);
        // Staged paths carry a `run=<id>` segment that must not become a column
        let source = format!(
            "read_parquet({}, hive_partitioning = false)",
            sql_literal(staged)
        );
        let schema = format!("{}.{}", quote_ident(&self.catalog), quote_ident(&table.schema));

        let statements = match mode {
            WriteMode::Overwrite => format!(
                "CREATE SCHEMA IF NOT EXISTS {schema};
                 BEGIN TRANSACTION;
                 DROP TABLE IF EXISTS {target};
                 CREATE TABLE {target} AS SELECT * FROM {source};
                 COMMIT;"
            ),
            WriteMode::Append => format!(
                "CREATE SCHEMA IF NOT EXISTS {schema};
                 BEGIN TRANSACTION;
                 CREATE TABLE IF NOT EXISTS {target} AS SELECT * FROM {source} LIMIT 0;
                 INSERT INTO {target} BY NAME SELECT * FROM {source};
                 COMMIT;"
            ),
        };

        tracing::debug!("Loading {table} on {}: {statements}", self.target);

        let conn = self.lock()?;
        if let Err(e) = conn.execute_batch(&statements) {
            // Leave no open transaction behind for the next table
            let _ = conn.execute_batch("ROLLBACK;");
            return Err(Error::warehouse(table.to_string(), e.to_string()));
        }
        Ok(())
    }

    fn copy_into_redshift(
        &self,
        table: &TableRef,
        schema: &Schema,
        staged: &str,
        credentials: &CopyCredentials,
        mode: WriteMode,
    ) -> Result<()> {
        let script = copy_script(table, schema, staged, credentials, mode)?;
        tracing::debug!("Copying {staged} into {table} on {}", self.target);

        let conn = self.lock()?;
        if let Err(e) = conn.execute_batch(&remote_call(&self.catalog, &script)) {
            let _ = conn.execute_batch(&remote_call(&self.catalog, "ROLLBACK"));
            return Err(Error::warehouse(table.to_string(), e.to_string()));
        }
        // The attached catalog caches table metadata
        if let Err(e) = conn.execute_batch("CALL pg_clear_cache();") {
            tracing::warn!("Failed to clear postgres catalog cache: {e}");
        }
        Ok(())
    }

    /// Target description, password masked
    pub fn connection_info(&self) -> &str {
        &self.target
    }
}

#[async_trait]
impl WarehouseSink for DuckDbWarehouse {
    async fn write(&self, table: &TableRef, batch: &RecordBatch, mode: WriteMode) -> Result<usize> {
        let path = self.staging_path(table);
        let bytes = encode_parquet(batch, Some(&self.parquet))
            .map_err(|e| Error::warehouse(table.to_string(), e.to_string()))?;

        let staged = self
            .staging
            .write(&path, bytes)
            .await
            .map_err(|e| Error::warehouse(table.to_string(), e.to_string()))?;
        tracing::debug!("Staged {} rows for {table} at {staged}", batch.num_rows());

        let loaded = self.load_staged(table, &batch.schema(), &staged, mode);

        if let Err(e) = self.staging.delete(&path).await {
            tracing::warn!("Failed to remove staged file {staged}: {e}");
        }

        loaded.map(|()| batch.num_rows())
    }
}

/// Quote a SQL string literal
fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Run `sql` verbatim on the attached database
fn remote_call(catalog: &str, sql: &str) -> String {
    format!(
        "CALL postgres_execute({}, {});",
        sql_literal(catalog),
        sql_literal(sql)
    )
}

/// Convert DuckDB Value to JSON Value
pub(crate) fn duckdb_value_to_json(value: duckdb::types::Value) -> Value {
    use duckdb::types::Value as DuckValue;

    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Bool(b),
        DuckValue::TinyInt(i) => Value::Number(i.into()),
        DuckValue::SmallInt(i) => Value::Number(i.into()),
        DuckValue::Int(i) => Value::Number(i.into()),
        DuckValue::BigInt(i) => Value::Number(i.into()),
        DuckValue::HugeInt(i) => Value::String(i.to_string()),
        DuckValue::UTinyInt(i) => Value::Number(i.into()),
        DuckValue::USmallInt(i) => Value::Number(i.into()),
        DuckValue::UInt(i) => Value::Number(i.into()),
        DuckValue::UBigInt(i) => Value::Number(i.into()),
        DuckValue::Float(f) => {
            serde_json::Number::from_f64(f64::from(f)).map_or(Value::Null, Value::Number)
        }
        DuckValue::Double(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        DuckValue::Text(s) => Value::String(s),
        DuckValue::Blob(b) => Value::String(base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            b,
        )),
        DuckValue::Timestamp(_, i) => {
            let secs = i.div_euclid(1_000_000);
            let nsecs = (i.rem_euclid(1_000_000) * 1000) as u32;
            chrono::DateTime::from_timestamp(secs, nsecs)
                .map(|dt| Value::String(dt.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()))
                .unwrap_or(Value::Number(i.into()))
        }
        DuckValue::Date32(d) => crate::normalize::days_to_date(d)
            .map(|date| Value::String(date.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Number(d.into())),
        other => Value::String(format!("{other:?}")),
    }
}
