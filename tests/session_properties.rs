//! Session, source and mapper behaviour against the in-memory store and the
//! recording relational session.

use bson::{doc, Bson};
use sql_sink::RecordingConnector;
use squeal_sync::{MappingBlock, MigrationError, MigrationSession, RecordMapper};
use squeal_sync_mongodb_source::{Counts, DocumentStore, MemoryConnector, SourceError};
use std::sync::Arc;
use sync_core::{ForeignKey, Value};

struct Harness {
    documents: Arc<MemoryConnector>,
    rows: RecordingConnector,
    session: MigrationSession,
}

impl Harness {
    fn new(documents: MemoryConnector) -> Self {
        let documents = Arc::new(documents);
        let rows = RecordingConnector::new();
        let session = MigrationSession::with_drivers(documents.clone(), Arc::new(rows.clone()));
        Self {
            documents,
            rows,
            session,
        }
    }

    async fn connected(adapter: &str) -> Self {
        let mut harness = Self::new(MemoryConnector::new());
        harness
            .session
            .import_from("localhost", 27017, "app")
            .await
            .unwrap();
        harness
            .session
            .export_to(adapter, "localhost", "root", "root", "app")
            .await
            .unwrap();
        harness
    }

    fn seed(&self, collection: &str, documents: Vec<bson::Document>) {
        self.documents
            .database("localhost", 27017, "app")
            .insert_many(collection, documents);
    }
}

#[tokio::test]
async fn test_new_source_has_only_a_total() {
    let harness = Harness::connected("mysql").await;
    harness.seed("users", vec![doc! {"_id": 1}, doc! {"_id": 2}, doc! {"_id": 3}]);

    let source = harness.session.import().unwrap().source("users").await.unwrap();
    assert_eq!(
        source.counts(),
        Counts {
            total: 3,
            imported: 0,
            exported: 0
        }
    );
}

#[tokio::test]
async fn test_empty_collection_stays_zero() {
    let harness = Harness::connected("mysql").await;
    let mut source = harness.session.import().unwrap().source("empty").await.unwrap();

    let delivered = source
        .each(|_| async { Ok::<_, SourceError>(()) })
        .await
        .unwrap();
    assert_eq!(delivered, 0);
    assert_eq!(source.counts(), Counts::default());
    assert!(source.cursor().is_exhausted());
}

#[tokio::test]
async fn test_noop_iteration_imports_without_exporting() {
    let harness = Harness::connected("mysql").await;
    harness.seed("users", vec![doc! {"_id": 1}, doc! {"_id": 2}]);

    let mut source = harness.session.import().unwrap().source("users").await.unwrap();
    source
        .each(|_| async { Ok::<_, SourceError>(()) })
        .await
        .unwrap();
    assert_eq!(
        source.counts(),
        Counts {
            total: 2,
            imported: 2,
            exported: 0
        }
    );
}

#[tokio::test]
async fn test_mapped_writes_are_exported() {
    let harness = Harness::connected("mysql").await;
    harness.seed(
        "users",
        vec![doc! {"_id": 1, "name": "Ann"}, doc! {"_id": 2, "name": "Bob"}],
    );

    let block = MappingBlock::new("user").field("name");
    let mut source = harness.session.import().unwrap().source("users").await.unwrap();
    let mapper = harness.session.mapper().unwrap().with_tracker(source.tracker());

    while let Some(document) = source.next_document().await.unwrap() {
        mapper.map(&document, &block).await.unwrap();
    }
    assert_eq!(
        source.counts(),
        Counts {
            total: 2,
            imported: 2,
            exported: 2
        }
    );

    let statements = harness.rows.statements_for("user");
    assert_eq!(statements.len(), 2);
    assert_eq!(
        statements[0].sql,
        "INSERT INTO `user` (`id`, `name`) VALUES (?, ?) ON DUPLICATE KEY UPDATE `name` = VALUES(`name`)"
    );
}

#[tokio::test]
async fn test_upsertable_follows_adapter() {
    let mut harness = Harness::connected("mysql").await;
    assert!(harness.session.upsertable().unwrap());

    harness
        .session
        .export_to("postgres", "localhost", "postgres", "postgres", "app")
        .await
        .unwrap();
    assert!(!harness.session.upsertable().unwrap());
}

#[tokio::test]
async fn test_embedded_array_becomes_child_rows_in_order() {
    let harness = Harness::connected("postgres").await;
    let document = doc! {
        "_id": "u1",
        "name": "Ann",
        "activities": [
            { "_id": "a1", "name": "Run" },
            { "_id": "a2", "name": "Swim" },
            { "_id": "a3", "name": "Ride" },
        ],
    };
    let block = MappingBlock::new("user")
        .field("name")
        .nest("activities", MappingBlock::new("activity").field("name"));

    let outcome = harness
        .session
        .mapper()
        .unwrap()
        .map(&document, &block)
        .await
        .unwrap();
    assert_eq!(outcome.row_id.as_deref(), Some("u1"));
    assert_eq!(outcome.embedded_rows, 3);
    assert_eq!(outcome.upserts, 0);

    let relations: Vec<String> = harness
        .rows
        .statements()
        .into_iter()
        .map(|s| s.relation)
        .collect();
    assert_eq!(relations, vec!["user", "activity", "activity", "activity"]);

    let planned = RecordMapper::plan(&document, &block).unwrap();
    for (row, id) in planned[1..].iter().zip(["a1", "a2", "a3"]) {
        assert_eq!(row.row_id.as_deref(), Some(id));
        assert_eq!(row.foreign_key, Some(ForeignKey::new("user_id", "user", "u1")));
    }
    assert_eq!(
        harness.rows.statements_for("activity")[0].sql,
        "INSERT INTO \"activity\" (\"id\", \"user_id\", \"name\") VALUES ('a1', 'u1', 'Run')"
    );
}

#[tokio::test]
async fn test_schema_mismatch_writes_nothing() {
    let harness = Harness::connected("mysql").await;
    let block = MappingBlock::new("user").nest("activities", MappingBlock::new("activity"));

    let err = harness
        .session
        .mapper()
        .unwrap()
        .map(&doc! {"_id": "u1", "activities": "none"}, &block)
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::Mapping(_)));
    assert!(harness.rows.statements().is_empty());
}

#[tokio::test]
async fn test_eval_is_passthrough() {
    let harness = Harness::connected("mysql").await;
    harness.seed("users", vec![doc! {"_id": 1}]);

    let connection = harness.session.import().unwrap();
    let reply = connection.eval(r#"{"dbStats": 1}"#).await.unwrap();
    let direct = harness
        .documents
        .database("localhost", 27017, "app")
        .eval(r#"{"dbStats": 1}"#)
        .await
        .unwrap();
    assert_eq!(reply, direct);
    assert_eq!(
        reply.as_document().and_then(|d| d.get("db")),
        Some(&Bson::String("app".into()))
    );

    assert!(matches!(
        connection.eval("not json").await,
        Err(SourceError::Eval(_))
    ));
}

#[tokio::test]
async fn test_reimport_switches_sources() {
    let mut harness = Harness::connected("mysql").await;
    harness.seed("users", vec![doc! {"_id": 1}]);
    harness
        .documents
        .database("localhost", 27017, "other")
        .insert_many("users", [doc! {"_id": 1}, doc! {"_id": 2}]);

    harness
        .session
        .import_from("localhost", 27017, "other")
        .await
        .unwrap();
    let connection = harness.session.import().unwrap();
    assert_eq!(connection.database_name(), "other");
    assert_eq!(connection.source("users").await.unwrap().counts().total, 2);
}

#[tokio::test]
async fn test_strict_store_reports_missing_collections() {
    let mut harness = Harness::new(MemoryConnector::new().strict());
    harness
        .session
        .import_from("localhost", 27017, "app")
        .await
        .unwrap();
    harness
        .documents
        .database("localhost", 27017, "app")
        .create_collection("empty");

    let connection = harness.session.import().unwrap();
    assert_eq!(connection.source("empty").await.unwrap().counts().total, 0);
    assert!(matches!(
        connection.source("missing").await,
        Err(SourceError::CollectionNotFound(name)) if name == "missing"
    ));
}

#[tokio::test]
async fn test_constant_and_dotted_fields() {
    let harness = Harness::connected("mysql").await;
    let block = MappingBlock::new("user")
        .rename("city", "address.city")
        .constant("imported", true);
    harness
        .session
        .mapper()
        .unwrap()
        .map(&doc! {"_id": 9, "address": {"city": "Oslo"}}, &block)
        .await
        .unwrap();

    let statement = &harness.rows.statements()[0];
    assert_eq!(
        statement.params,
        vec![
            Value::Text("9".into()),
            Value::Text("Oslo".into()),
            Value::Bool(true)
        ]
    );
}
