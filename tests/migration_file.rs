//! Migration files driven end to end through the in-memory store and the
//! recording relational session.

use bson::doc;
use sql_sink::RecordingConnector;
use squeal_sync::{
    run_migration, ErrorPolicy, MigrationConfig, MigrationSession, RuntimeOpts, SourceOpts,
    TargetOpts,
};
use squeal_sync_mongodb_source::MemoryConnector;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const TOML_FILE: &str = r#"
[source]
host = "mongo"
database = "shop"

[target]
adapter = "mysql"
host = "sql"
user = "root"
password = "root"
database = "shop"

[runtime]
error_policy = "skip"
progress_every = 1

[[collections]]
collection = "orders"

[collections.mapping]
relation = "orders"
fields = ["total", { column = "customer", from = "customer.name" }]

[[collections.mapping.nested]]
accessor = "lines"
relation = "order_lines"
foreign_key = "order_id"
fields = ["sku", "qty"]
"#;

const YAML_FILE: &str = r#"
source:
  host: mongo
  database: shop
target:
  adapter: postgres
  user: postgres
  database: shop
collections:
  - collection: orders
    mapping:
      relation: orders
      fields: [total]
"#;

fn write_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn seeded_store() -> Arc<MemoryConnector> {
    let store = Arc::new(MemoryConnector::new());
    store.database("mongo", 27017, "shop").insert_many(
        "orders",
        [
            doc! {
                "_id": "o1",
                "total": 30,
                "customer": { "name": "Ann" },
                "lines": [{ "sku": "A", "qty": 1 }, { "sku": "B", "qty": 2 }],
            },
            doc! { "total": 5, "lines": [] },
            doc! { "_id": "o3", "total": 12, "lines": { "sku": "C", "qty": 4 } },
        ],
    );
    store
}

#[tokio::test]
async fn test_toml_migration_with_nested_rows() {
    let file = write_config(".toml", TOML_FILE);
    let config = MigrationConfig::load(file.path()).unwrap();
    assert_eq!(config.runtime.error_policy, ErrorPolicy::Skip);

    let rows = RecordingConnector::new();
    let mut session = config.runtime.configure(
        MigrationSession::with_drivers(seeded_store(), Arc::new(rows.clone())),
        CancellationToken::new(),
    );
    let report = run_migration(&mut session, &config).await.unwrap();

    let orders = &report.collections[0];
    assert_eq!(orders.counts.total, 3);
    assert_eq!(orders.counts.imported, 3);
    assert_eq!(orders.counts.exported, 2);
    assert_eq!(orders.skipped, 1);
    assert_eq!(orders.embedded_rows, 3);
    assert_eq!(report.exported(), 2);

    let lines = rows.statements_for("order_lines");
    assert_eq!(lines.len(), 3);
    assert!(lines[0].sql.starts_with("INSERT INTO `order_lines` (`order_id`, `sku`, `qty`)"));
    assert_eq!(rows.close_count(), 1);

    // session is closed after the run
    assert!(session.import().is_err());
}

#[tokio::test]
async fn test_yaml_migration_to_postgres() {
    let file = write_config(".yaml", YAML_FILE);
    let config = MigrationConfig::load(file.path()).unwrap();

    let rows = RecordingConnector::new();
    let mut session = MigrationSession::with_drivers(seeded_store(), Arc::new(rows.clone()));
    let err = run_migration(&mut session, &config).await.unwrap_err();

    // default policy aborts on the document without an _id
    assert!(format!("{err:#}").contains("Failed to migrate collection 'orders'"));
    assert_eq!(rows.statements().len(), 1);
    assert!(rows.statements()[0].sql.starts_with("INSERT INTO \"orders\""));
}

#[test]
fn test_load_reports_bad_files() {
    let file = write_config(".toml", "[target]\nadapter = \"oracle\"\nuser = \"u\"\ndatabase = \"d\"\n");
    let err = MigrationConfig::load(file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("oracle"));

    let err = MigrationConfig::load("/nonexistent/migration.toml").unwrap_err();
    assert!(err.to_string().contains("Failed to read migration file"));
}

#[test]
fn test_cli_flags_override_file() {
    let file = write_config(".toml", TOML_FILE);
    let mut config = MigrationConfig::load(file.path()).unwrap();

    let source = SourceOpts {
        source_host: "replica".to_string(),
        source_port: 27018,
        source_database: Some("shop_copy".to_string()),
        source_username: None,
        source_password: None,
        source_auth_source: None,
    };
    let target = TargetOpts {
        adapter: Some("pg".to_string()),
        target_host: "warehouse".to_string(),
        target_port: None,
        target_user: "etl".to_string(),
        target_password: String::new(),
        target_database: Some("dw".to_string()),
    };
    let runtime = RuntimeOpts {
        write_timeout: Some(Duration::from_secs(5)),
        error_policy: Some(ErrorPolicy::Abort),
        dry_run: true,
        ..RuntimeOpts::default()
    };
    config.merge_opts(&source, &target, &runtime).unwrap();

    let merged_source = config.source.as_ref().unwrap();
    assert_eq!(merged_source.host, "replica");
    assert_eq!(merged_source.port, 27018);
    assert_eq!(config.target.as_ref().unwrap().database, "dw");
    assert_eq!(config.runtime.write_timeout, Some(Duration::from_secs(5)));
    assert_eq!(config.runtime.error_policy, ErrorPolicy::Abort);
    assert!(config.runtime.dry_run);
    assert_eq!(config.runtime.progress_every, 1);
}

#[test]
fn test_adapter_flag_needs_database() {
    let mut config = MigrationConfig::default();
    let source = SourceOpts {
        source_host: "localhost".to_string(),
        source_port: 27017,
        source_database: None,
        source_username: None,
        source_password: None,
        source_auth_source: None,
    };
    let target = TargetOpts {
        adapter: Some("mysql".to_string()),
        target_host: "localhost".to_string(),
        target_port: None,
        target_user: "root".to_string(),
        target_password: String::new(),
        target_database: None,
    };
    assert!(config
        .merge_opts(&source, &target, &RuntimeOpts::default())
        .is_err());
}
