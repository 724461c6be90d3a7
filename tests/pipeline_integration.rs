//! End-to-end job tests against local CSV files and a DuckDB warehouse

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::Value;
use shop_etl::config::{PipelineConfig, WarehouseKind};
use shop_etl::output::arrow_to_json;
use shop_etl::secrets::StaticSecretStore;
use shop_etl::warehouse::{DuckDbWarehouse, WarehouseSink};
use shop_etl::{DatasetName, Error, Job, JobParameters, Result, TableRef, WriteMode};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

const CUSTOMER_CSV: &str = "\
customer_id,customer_name,customer_phone
1,Ada Lovelace,(555) 123-4567
2,Alan Turing,+1 555.000.1111
3,Grace Hopper,
";

const INVENTORY_CSV: &str = "\
product_id,quantity
p1,4
p2,0
";

const ORDER_CSV: &str = "\
order_id,customer_id,order_status,order_date,order_payment_date,order_shipping_date,order_billing_address,order_shipping_address
100,1,shipped,3/5/2024,3/5/2024,3/7/2024,1 Elm St,\"123 Main St,\"
101,2,,12/31/2023,2/30/2021,,9 Oak Ave ,\"9 Oak Ave , Dover\"
100,1,shipped,3/5/2024,3/5/2024,3/7/2024,Suite 2,\"Apt 4,\"
100,1,shipped,3/5/2024,3/5/2024,3/7/2024,,Springfield
";

const ORDER_ITEM_CSV: &str = "\
order_id,product_id,quantity
100,p1,2
101,p2,1
";

const PRODUCT_CSV: &str = "\
product_id,product_name,description
p1,Widget,\"Small, blue
with a handle\"
p2,Gadget,\"The \"\"best\"\" gadget\"
";

struct Fixture {
    root: TempDir,
    staging: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let db_dir = root.path().join("ecommerce-shop");
        std::fs::create_dir_all(&db_dir).unwrap();

        for (table, body) in [
            ("customer_csv", CUSTOMER_CSV),
            ("inventory_csv", INVENTORY_CSV),
            ("order_csv", ORDER_CSV),
            ("order_item_csv", ORDER_ITEM_CSV),
            ("product_csv", PRODUCT_CSV),
        ] {
            std::fs::write(db_dir.join(format!("{table}.csv")), body).unwrap();
        }

        Self {
            root,
            staging: tempfile::tempdir().unwrap(),
        }
    }

    fn params(&self) -> JobParameters {
        let params: HashMap<String, String> = [
            ("JOB_NAME", "shop-nightly"),
            ("SecretName", "shop/warehouse"),
            ("TempDir", self.staging.path().to_str().unwrap()),
            ("RedshiftSchema", "public"),
            ("RedshiftCluster", "shop-cluster"),
            ("RedshiftDatabase", "shop"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        JobParameters::from_map(&params).unwrap()
    }

    fn config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.catalog.root = self.root.path().to_str().unwrap().to_string();
        config.warehouse.kind = WarehouseKind::Duckdb;
        config
    }

    fn job(&self, config: PipelineConfig) -> Job {
        Job::new(self.params(), config).with_secrets(Arc::new(
            StaticSecretStore::new().with_secret("shop/warehouse", r#"{"password": "pw"}"#),
        ))
    }

    fn warehouse(&self) -> Arc<DuckDbWarehouse> {
        Arc::new(
            DuckDbWarehouse::open_local(":memory:", self.staging.path().to_str().unwrap(), "test")
                .unwrap(),
        )
    }
}

/// Rows in a stable order for comparison
fn sorted(mut rows: Vec<Value>) -> Vec<Value> {
    rows.sort_by_key(std::string::ToString::to_string);
    rows
}

/// Sink that fails on chosen tables and forwards the rest
struct FaultySink {
    inner: Arc<DuckDbWarehouse>,
    failing: Vec<&'static str>,
}

#[async_trait]
impl WarehouseSink for FaultySink {
    async fn write(&self, table: &TableRef, batch: &RecordBatch, mode: WriteMode) -> Result<usize> {
        if self.failing.contains(&table.table.as_str()) {
            return Err(Error::warehouse(table.to_string(), "relation is locked"));
        }
        self.inner.write(table, batch, mode).await
    }
}

// ============================================================================
// Round Trip
// ============================================================================

#[tokio::test]
async fn test_round_trip_matches_cleaned_data() {
    let fixture = Fixture::new();
    let warehouse = fixture.warehouse();
    let job = fixture.job(fixture.config()).with_sink(warehouse.clone());

    let cleaned = job.clean().await.unwrap();
    let summary = job.execute().await.unwrap();
    assert_eq!(summary.rows_loaded, 3 + 2 + 4 + 2 + 2);

    for name in DatasetName::ALL {
        let table = TableRef::for_dataset("public", name);
        let loaded = warehouse.read_rows(&table).unwrap();
        let expected = arrow_to_json(&cleaned[&name].batch).unwrap();
        assert_eq!(sorted(loaded), sorted(expected), "table {table}");
    }
}

#[tokio::test]
async fn test_cleaned_orders_in_warehouse() {
    let fixture = Fixture::new();
    let warehouse = fixture.warehouse();
    fixture
        .job(fixture.config())
        .with_sink(warehouse.clone())
        .execute()
        .await
        .unwrap();

    let orders = warehouse
        .read_rows(&TableRef::new("public", "order"))
        .unwrap();
    assert_eq!(orders.len(), 4);

    let by_id = |id: &str| -> Vec<&Value> {
        orders.iter().filter(|r| r["order_id"] == id).collect()
    };

    for row in by_id("100") {
        assert_eq!(row["order_shipping_address"], "123 Main St, Apt 4, Springfield");
        assert_eq!(row["order_billing_address"], "1 Elm St Suite 2");
        assert_eq!(row["order_date"], "2024-03-05");
        assert_eq!(row["order_shipping_date"], "2024-03-07");
    }

    let other = by_id("101");
    assert_eq!(other.len(), 1);
    assert_eq!(other[0]["order_shipping_address"], "9 Oak Ave, Dover");
    assert_eq!(other[0]["order_status"], "");
    assert_eq!(other[0]["order_date"], "2023-12-31");
    // Impossible calendar date and empty date both load as null
    assert_eq!(other[0]["order_payment_date"], Value::Null);
    assert_eq!(other[0]["order_shipping_date"], Value::Null);
}

#[tokio::test]
async fn test_customer_phones_and_passthrough() {
    let fixture = Fixture::new();
    let warehouse = fixture.warehouse();
    fixture
        .job(fixture.config())
        .with_sink(warehouse.clone())
        .execute()
        .await
        .unwrap();

    let customers = sorted(
        warehouse
            .read_rows(&TableRef::new("public", "customer"))
            .unwrap(),
    );
    let phones: Vec<&Value> = customers.iter().map(|r| &r["customer_phone"]).collect();
    assert!(phones.contains(&&Value::from("5551234567")));
    assert!(phones.contains(&&Value::from("15550001111")));
    assert!(phones.contains(&&Value::Null));

    let products = warehouse
        .read_rows(&TableRef::new("public", "product"))
        .unwrap();
    let descriptions: Vec<&str> = products
        .iter()
        .map(|r| r["description"].as_str().unwrap())
        .collect();
    assert!(descriptions.contains(&"Small, blue\nwith a handle"));
    assert!(descriptions.contains(&"The \"best\" gadget"));
}

// ============================================================================
// Failure Isolation
// ============================================================================

#[tokio::test]
async fn test_inventory_failure_does_not_block_customer() {
    let fixture = Fixture::new();
    let warehouse = fixture.warehouse();
    let sink = Arc::new(FaultySink {
        inner: warehouse.clone(),
        failing: vec!["inventory"],
    });

    let err = fixture
        .job(fixture.config())
        .with_sink(sink)
        .execute()
        .await
        .unwrap_err();

    assert_eq!(err.failed_tables(), vec!["public.inventory"]);
    assert!(err.to_string().contains("relation is locked"));

    let customers = warehouse
        .read_rows(&TableRef::new("public", "customer"))
        .unwrap();
    assert_eq!(customers.len(), 3);
    assert!(warehouse
        .read_rows(&TableRef::new("public", "inventory"))
        .is_err());
    assert_eq!(warehouse.list_tables("public").unwrap().len(), 4);
}

#[tokio::test]
async fn test_missing_parameter_fails_before_io() {
    let mut params = HashMap::new();
    params.insert("JOB_NAME".to_string(), "shop-nightly".to_string());

    let err = JobParameters::from_map(&params).unwrap_err();
    assert!(matches!(err, Error::MissingConfigField { .. }));
}

// ============================================================================
// Configured Warehouse
// ============================================================================

#[tokio::test]
async fn test_configured_duckdb_file_and_run_log() {
    let fixture = Fixture::new();
    let out = tempfile::tempdir().unwrap();
    let db_path = out.path().join("shop.duckdb");
    let run_log = out.path().join("logs/run.json");

    let mut config = fixture.config();
    config.warehouse.duckdb_path = db_path.to_str().unwrap().to_string();
    config.run_log = Some(run_log.clone());

    let summary = fixture.job(config).execute().await.unwrap();

    let log: Value = serde_json::from_str(&std::fs::read_to_string(&run_log).unwrap()).unwrap();
    assert_eq!(log["run_id"], summary.run_id.as_str());
    assert_eq!(log["status"], "succeeded");
    assert_eq!(log["report"]["tables"].as_array().unwrap().len(), 5);

    let reopened =
        DuckDbWarehouse::open_local(db_path.to_str().unwrap(), fixture.staging.path().to_str().unwrap(), "verify")
            .unwrap();
    assert_eq!(
        reopened.list_tables("public").unwrap(),
        vec!["customer", "inventory", "order", "order_item", "product"]
    );
}

#[tokio::test]
async fn test_append_mode_accumulates() {
    let fixture = Fixture::new();
    let warehouse = fixture.warehouse();

    let mut config = fixture.config();
    config.load.write_mode = WriteMode::Append;

    for _ in 0..2 {
        fixture
            .job(config.clone())
            .with_sink(warehouse.clone())
            .execute()
            .await
            .unwrap();
    }

    let items = warehouse
        .read_rows(&TableRef::new("public", "order_item"))
        .unwrap();
    assert_eq!(items.len(), 4);
}
