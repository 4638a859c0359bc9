//! Live MongoDB → MySQL migration.
//!
//! Needs running servers:
//!
//! ```bash
//! SQUEAL_TEST_MONGODB_HOST=localhost SQUEAL_TEST_MYSQL_HOST=localhost \
//!   cargo test --test e2e_mongodb_mysql -- --ignored
//! ```
//!
//! The MySQL database must contain `e2e_users (id VARCHAR(64) PRIMARY KEY,
//! name TEXT)` and `e2e_tags (id VARCHAR(64), e2e_users_id VARCHAR(64), label TEXT)`.

use bson::doc;
use squeal_sync::{migrate_collection, ErrorPolicy, MappingBlock, MigrationSession};

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[tokio::test]
#[ignore = "requires MongoDB and MySQL servers"]
async fn test_mongodb_to_mysql_e2e() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("squeal_sync=debug,sql_sink=debug")
        .try_init()
        .ok();

    let mongo_host = env_or("SQUEAL_TEST_MONGODB_HOST", "mongodb");
    let mysql_host = env_or("SQUEAL_TEST_MYSQL_HOST", "mysql");
    let database = env_or("SQUEAL_TEST_DATABASE", "squeal_e2e");

    let mut session = MigrationSession::new();
    session.import_from(&mongo_host, 27017, &database).await?;

    let store = session.import()?.store().clone();
    for (id, name) in [("u1", "Ann"), ("u2", "Bob")] {
        store
            .save(
                "e2e_users",
                doc! { "_id": id, "name": name, "tags": [{ "label": "x" }] },
            )
            .await?;
    }

    session
        .export_to("mysql", &mysql_host, "root", "root", &database)
        .await?;
    assert!(session.upsertable()?);

    let block = MappingBlock::new("e2e_users")
        .field("name")
        .nest("tags", MappingBlock::new("e2e_tags").field("label"));

    // Upserts make the run repeatable.
    for _ in 0..2 {
        let report =
            migrate_collection(&session, "e2e_users", &block, ErrorPolicy::Abort, 100).await?;
        assert_eq!(report.counts.imported, report.counts.total);
        assert_eq!(report.counts.exported, report.counts.total);
        assert_eq!(report.skipped, 0);
    }

    session.close().await;
    Ok(())
}
