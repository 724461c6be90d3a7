//! Tests for warehouse module

use super::engine::duckdb_value_to_json;
use super::*;
use crate::config::{JobParameters, WarehouseConfig};
use crate::error::Error;
use arrow::array::{ArrayRef, Date32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

fn job_parameters(temp_dir: &str) -> JobParameters {
    let params: HashMap<String, String> = [
        ("JOB_NAME", "nightly-load"),
        ("SecretName", "prod/redshift"),
        ("TempDir", temp_dir),
        ("RedshiftSchema", "public"),
        ("RedshiftCluster", "shop-cluster"),
        ("RedshiftDatabase", "shop"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    JobParameters::from_map(&params).unwrap()
}

fn order_batch(ids: &[&str]) -> RecordBatch {
    let schema = Schema::new(vec![
        Field::new("order_id", DataType::Utf8, true),
        Field::new("order_date", DataType::Date32, true),
    ]);
    let dates: Vec<Option<i32>> = ids.iter().map(|_| Some(19787)).collect();
    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(StringArray::from(ids.to_vec())) as ArrayRef,
            Arc::new(Date32Array::from(dates)) as ArrayRef,
        ],
    )
    .unwrap()
}

fn order_ids(rows: &[Value]) -> Vec<String> {
    let mut ids: Vec<String> = rows
        .iter()
        .map(|r| r["order_id"].as_str().unwrap().to_string())
        .collect();
    ids.sort();
    ids
}

// ============================================================================
// Connection Tests
// ============================================================================

#[test]
fn test_connection_from_parameters() {
    let config = WarehouseConfig {
        host_suffix: ".abc123.us-west-2.redshift.amazonaws.com".to_string(),
        ..WarehouseConfig::default()
    };
    let connection =
        WarehouseConnection::new(&job_parameters("s3://tmp/glue"), &config, "pw".to_string());

    assert_eq!(
        connection.host,
        "shop-cluster.abc123.us-west-2.redshift.amazonaws.com"
    );
    assert_eq!(connection.port, 5439);
    assert_eq!(connection.user, "ecommerce");
    assert_eq!(
        connection.jdbc_url(),
        "jdbc:redshift://shop-cluster.abc123.us-west-2.redshift.amazonaws.com:5439/shop"
    );
}

#[test]
fn test_connection_password_never_shown() {
    let connection = WarehouseConnection::new(
        &job_parameters("/tmp"),
        &WarehouseConfig::default(),
        "hunter2".to_string(),
    );
    assert!(!connection.connection_info().contains("hunter2"));
    assert!(!format!("{connection:?}").contains("hunter2"));
    assert!(connection.dsn().contains("password='hunter2'"));
}

#[test]
fn test_dsn_quotes_values() {
    let connection = WarehouseConnection::new(
        &job_parameters("/tmp"),
        &WarehouseConfig::default(),
        "it's".to_string(),
    );
    assert!(connection.dsn().ends_with(r"password='it\'s'"));
}

#[test]
fn test_duckdb_value_to_json() {
    assert_eq!(duckdb_value_to_json(duckdb::types::Value::Null), Value::Null);
    assert_eq!(
        duckdb_value_to_json(duckdb::types::Value::Boolean(true)),
        Value::Bool(true)
    );
    assert_eq!(
        duckdb_value_to_json(duckdb::types::Value::Int(42)),
        Value::Number(42.into())
    );
    assert_eq!(
        duckdb_value_to_json(duckdb::types::Value::Text("hello".to_string())),
        Value::String("hello".to_string())
    );
    assert_eq!(
        duckdb_value_to_json(duckdb::types::Value::Date32(19787)),
        Value::String("2024-03-05".to_string())
    );
}

#[test]
fn test_timestamp_before_epoch() {
    use duckdb::types::{TimeUnit, Value as DuckValue};

    assert_eq!(
        duckdb_value_to_json(DuckValue::Timestamp(TimeUnit::Microsecond, -1)),
        Value::String("1969-12-31T23:59:59.999999Z".to_string())
    );
    assert_eq!(
        duckdb_value_to_json(DuckValue::Timestamp(TimeUnit::Microsecond, 1_500_000)),
        Value::String("1970-01-01T00:00:01.500000Z".to_string())
    );
}

// ============================================================================
// Redshift COPY Tests
// ============================================================================

fn copy_schema() -> Schema {
    Schema::new(vec![
        Field::new("order_id", DataType::Utf8, true),
        Field::new("order_date", DataType::Date32, true),
    ])
}

#[test]
fn test_copy_script_overwrite() {
    let script = copy_script(
        &TableRef::new("public", "order"),
        &copy_schema(),
        "s3://tmp/glue/order/run=r1/data.parquet",
        &CopyCredentials::IamRole("arn:aws:iam::123:role/load".to_string()),
        WriteMode::Overwrite,
    )
    .unwrap();

    assert_eq!(
        script,
        "BEGIN;\n\
         CREATE SCHEMA IF NOT EXISTS \"public\";\n\
         DROP TABLE IF EXISTS \"public\".\"order\";\n\
         CREATE TABLE \"public\".\"order\" (\"order_id\" VARCHAR(65535), \"order_date\" DATE);\n\
         COPY \"public\".\"order\" FROM 's3://tmp/glue/order/run=r1/data.parquet' \
         IAM_ROLE 'arn:aws:iam::123:role/load' FORMAT AS PARQUET;\n\
         COMMIT;"
    );
}

#[test]
fn test_copy_script_append_with_access_keys() {
    let credentials = CopyCredentials::AccessKey {
        key_id: "AKIA".to_string(),
        secret: "it's-secret".to_string(),
        session_token: Some("tok".to_string()),
    };
    let script = copy_script(
        &TableRef::new("sales", "order_item"),
        &copy_schema(),
        "s3://tmp/order_item/run=r1/data.parquet",
        &credentials,
        WriteMode::Append,
    )
    .unwrap();

    assert!(script.contains("CREATE TABLE IF NOT EXISTS \"sales\".\"order_item\""));
    assert!(!script.contains("DROP TABLE"));
    assert!(script.contains(
        "ACCESS_KEY_ID 'AKIA' SECRET_ACCESS_KEY 'it''s-secret' SESSION_TOKEN 'tok' FORMAT AS PARQUET"
    ));
    assert!(!format!("{credentials:?}").contains("it's-secret"));
}

#[test]
fn test_copy_script_rejects_unmapped_type() {
    let schema = Schema::new(vec![Field::new(
        "tags",
        DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
        true,
    )]);
    let err = copy_script(
        &TableRef::new("public", "product"),
        &schema,
        "s3://tmp/product.parquet",
        &CopyCredentials::IamRole("role".to_string()),
        WriteMode::Overwrite,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Warehouse { ref table, .. } if table == "public.product"));
}

#[test]
fn test_copy_credentials_prefer_iam_role() {
    let config = WarehouseConfig {
        iam_role: Some(" arn:aws:iam::123:role/load ".to_string()),
        ..WarehouseConfig::default()
    };
    assert_eq!(
        CopyCredentials::resolve(&config).unwrap(),
        CopyCredentials::IamRole("arn:aws:iam::123:role/load".to_string())
    );
}

#[test]
fn test_redshift_needs_s3_staging() {
    let connection = WarehouseConnection::new(
        &job_parameters("/tmp/staging"),
        &WarehouseConfig::default(),
        "pw".to_string(),
    );
    let err = DuckDbWarehouse::attach_redshift(
        &connection,
        CopyCredentials::IamRole("role".to_string()),
        "r1",
    )
    .err()
    .unwrap();
    assert!(matches!(err, Error::Config { .. }));
    assert!(err.to_string().contains("s3://"));
}

// ============================================================================
// DuckDB Sink Tests
// ============================================================================

fn local_warehouse(staging: &tempfile::TempDir) -> DuckDbWarehouse {
    DuckDbWarehouse::open_local(":memory:", staging.path().to_str().unwrap(), "run-1").unwrap()
}

#[tokio::test]
async fn test_overwrite_round_trip() {
    let staging = tempfile::tempdir().unwrap();
    let warehouse = local_warehouse(&staging);
    warehouse.check_connection().unwrap();

    let table = TableRef::new("public", "order");
    let written = warehouse
        .write(&table, &order_batch(&["100", "101"]), WriteMode::Overwrite)
        .await
        .unwrap();
    assert_eq!(written, 2);

    let rows = warehouse.read_rows(&table).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.contains(&json!({"order_id": "100", "order_date": "2024-03-05"})));

    // Overwrite replaces the previous contents
    warehouse
        .write(&table, &order_batch(&["200"]), WriteMode::Overwrite)
        .await
        .unwrap();
    assert_eq!(order_ids(&warehouse.read_rows(&table).unwrap()), vec!["200"]);
}

#[tokio::test]
async fn test_loaded_columns_match_batch() {
    let staging = tempfile::tempdir().unwrap();
    let warehouse = local_warehouse(&staging);
    let batch = order_batch(&["100"]);
    let expected: Vec<String> = batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();

    for (name, mode) in [("order", WriteMode::Overwrite), ("order_item", WriteMode::Append)] {
        let table = TableRef::new("public", name);
        warehouse.write(&table, &batch, mode).await.unwrap();

        let rows = warehouse.read_rows(&table).unwrap();
        let mut columns: Vec<String> = rows[0].as_object().unwrap().keys().cloned().collect();
        columns.sort();
        let mut expected = expected.clone();
        expected.sort();
        assert_eq!(columns, expected, "table {table}");
    }
}

#[tokio::test]
async fn test_append_keeps_rows() {
    let staging = tempfile::tempdir().unwrap();
    let warehouse = local_warehouse(&staging);
    let table = TableRef::new("sales", "order");

    warehouse
        .write(&table, &order_batch(&["100"]), WriteMode::Append)
        .await
        .unwrap();
    warehouse
        .write(&table, &order_batch(&["101"]), WriteMode::Append)
        .await
        .unwrap();

    assert_eq!(
        order_ids(&warehouse.read_rows(&table).unwrap()),
        vec!["100", "101"]
    );
    assert_eq!(warehouse.list_tables("sales").unwrap(), vec!["order"]);
}

#[tokio::test]
async fn test_staged_files_removed() {
    let staging = tempfile::tempdir().unwrap();
    let warehouse = local_warehouse(&staging);

    warehouse
        .write(
            &TableRef::new("public", "order"),
            &order_batch(&["1"]),
            WriteMode::Overwrite,
        )
        .await
        .unwrap();

    assert!(!staging
        .path()
        .join("order/run=run-1/data.parquet")
        .exists());
}

#[test]
fn test_read_missing_table() {
    let staging = tempfile::tempdir().unwrap();
    let warehouse = local_warehouse(&staging);

    let err = warehouse
        .read_rows(&TableRef::new("public", "product"))
        .unwrap_err();
    assert!(matches!(err, Error::Warehouse { ref table, .. } if table == "public.product"));
}
