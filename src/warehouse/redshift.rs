//! Redshift bulk loading
//!
//! Redshift does not accept `COPY ... FROM STDIN`, so rows cannot be pushed
//! through the postgres scanner. Instead the staged Parquet object is loaded
//! server side with `COPY ... FORMAT AS PARQUET`, sent as one script through
//! `postgres_execute`.

use crate::config::WarehouseConfig;
use crate::error::{Error, Result};
use crate::types::{quote_ident, TableRef, WriteMode};
use arrow::datatypes::{DataType, Schema};
use std::fmt;

/// How Redshift authenticates against the staging bucket
#[derive(Clone, PartialEq, Eq)]
pub enum CopyCredentials {
    /// IAM role attached to the cluster
    IamRole(String),
    /// Static access keys
    AccessKey {
        key_id: String,
        secret: String,
        session_token: Option<String>,
    },
}

impl CopyCredentials {
    /// The configured IAM role, else the `AWS_*` access keys of this process
    pub fn resolve(config: &WarehouseConfig) -> Result<Self> {
        if let Some(role) = config.iam_role.as_deref().filter(|r| !r.trim().is_empty()) {
            return Ok(Self::IamRole(role.trim().to_string()));
        }

        match (
            std::env::var("AWS_ACCESS_KEY_ID"),
            std::env::var("AWS_SECRET_ACCESS_KEY"),
        ) {
            (Ok(key_id), Ok(secret)) => Ok(Self::AccessKey {
                key_id,
                secret,
                session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
            }),
            _ => Err(Error::config(
                "Redshift COPY needs warehouse.iam_role or AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY",
            )),
        }
    }

    fn clause(&self) -> String {
        match self {
            Self::IamRole(role) => format!("IAM_ROLE {}", literal(role)),
            Self::AccessKey {
                key_id,
                secret,
                session_token,
            } => {
                let mut clause = format!(
                    "ACCESS_KEY_ID {} SECRET_ACCESS_KEY {}",
                    literal(key_id),
                    literal(secret)
                );
                if let Some(token) = session_token {
                    clause.push_str(&format!(" SESSION_TOKEN {}", literal(token)));
                }
                clause
            }
        }
    }
}

impl fmt::Debug for CopyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IamRole(role) => f.debug_tuple("IamRole").field(role).finish(),
            Self::AccessKey { key_id, .. } => f
                .debug_struct("AccessKey")
                .field("key_id", key_id)
                .field("secret", &"****")
                .finish_non_exhaustive(),
        }
    }
}

/// Redshift column type for an Arrow type
fn column_type(data_type: &DataType) -> Option<&'static str> {
    let name = match data_type {
        DataType::Utf8 | DataType::LargeUtf8 => "VARCHAR(65535)",
        DataType::Boolean => "BOOLEAN",
        DataType::Int8 | DataType::Int16 => "SMALLINT",
        DataType::Int32 => "INTEGER",
        DataType::Int64 => "BIGINT",
        DataType::Float32 => "REAL",
        DataType::Float64 => "DOUBLE PRECISION",
        DataType::Date32 => "DATE",
        DataType::Timestamp(_, _) => "TIMESTAMP",
        _ => return None,
    };
    Some(name)
}

/// `CREATE TABLE` column list for a batch schema
fn column_definitions(table: &TableRef, schema: &Schema) -> Result<String> {
    let columns = schema
        .fields()
        .iter()
        .map(|field| {
            column_type(field.data_type())
                .map(|ty| format!("{} {ty}", quote_ident(field.name())))
                .ok_or_else(|| {
                    Error::warehouse(
                        table.to_string(),
                        format!(
                            "column {} has type {} with no Redshift equivalent",
                            field.name(),
                            field.data_type()
                        ),
                    )
                })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(columns.join(", "))
}

/// Script loading the staged Parquet object at `staged_url` into `table`
///
/// Parquet columns are matched by position, so the table is created from the
/// same schema the file was written with.
pub fn copy_script(
    table: &TableRef,
    schema: &Schema,
    staged_url: &str,
    credentials: &CopyCredentials,
    mode: WriteMode,
) -> Result<String> {
    let target = table.quoted();
    let columns = column_definitions(table, schema)?;

    let mut statements = vec![
        "BEGIN".to_string(),
        format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(&table.schema)),
    ];
    match mode {
        WriteMode::Overwrite => {
            statements.push(format!("DROP TABLE IF EXISTS {target}"));
            statements.push(format!("CREATE TABLE {target} ({columns})"));
        }
        WriteMode::Append => {
            statements.push(format!("CREATE TABLE IF NOT EXISTS {target} ({columns})"));
        }
    }
    statements.push(format!(
        "COPY {target} FROM {} {} FORMAT AS PARQUET",
        literal(staged_url),
        credentials.clause()
    ));
    statements.push("COMMIT".to_string());

    Ok(statements.join(";\n") + ";")
}

fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
