//! Warehouse connection details

use crate::config::{JobParameters, WarehouseConfig};
use std::fmt;

/// Everything needed to reach the warehouse and stage data for it
#[derive(Clone, PartialEq, Eq)]
pub struct WarehouseConnection {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    password: String,
    /// Staging location for intermediate files
    pub temp_dir: String,
    /// Schema the destination tables live in
    pub schema: String,
}

impl WarehouseConnection {
    /// Build from job parameters, warehouse config and the fetched password
    pub fn new(params: &JobParameters, config: &WarehouseConfig, password: String) -> Self {
        Self {
            host: format!("{}{}", params.warehouse_cluster, config.host_suffix),
            port: config.port,
            database: params.warehouse_database.clone(),
            user: config.user.clone(),
            password,
            temp_dir: params.temp_dir.clone(),
            schema: params.warehouse_schema.clone(),
        }
    }

    /// JDBC URL of the cluster
    pub fn jdbc_url(&self) -> String {
        format!("jdbc:redshift://{}:{}/{}", self.host, self.port, self.database)
    }

    /// libpq keyword/value connection string
    pub(crate) fn dsn(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password={}",
            dsn_value(&self.host),
            self.port,
            dsn_value(&self.database),
            dsn_value(&self.user),
            dsn_value(&self.password)
        )
    }

    /// Connection string for logging, password masked
    pub fn connection_info(&self) -> String {
        format!("{} (user {}, password ****)", self.jdbc_url(), self.user)
    }
}

impl fmt::Debug for WarehouseConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseConnection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"****")
            .field("temp_dir", &self.temp_dir)
            .field("schema", &self.schema)
            .finish()
    }
}

/// Quote a libpq connection value
fn dsn_value(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}
