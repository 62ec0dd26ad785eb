//! Runner behavior against the in-memory store.
//!
//! Each test drives the public API the way the CLI does and checks what the
//! store received and what the runner reported.

use bson::{doc, Bson};
use curator_mongodb::{
    CallKind, CollationSpec, Command, CommandOutcome, CommandRunner, CuratorError, IndexSpec,
    MemoryStore, RecordedCall,
};

fn runner() -> CommandRunner<MemoryStore> {
    CommandRunner::new(MemoryStore::new("brunan"))
}

#[tokio::test]
async fn test_index_options_pass_through_unchanged() {
    let runner = runner();
    let spec = IndexSpec::new(doc! { "email": 1 })
        .unique(true)
        .collation(CollationSpec::new("en", 2))
        .partial_filter(doc! { "email": { "$exists": true } });

    let report = runner
        .run_one(&Command::create_index("users", spec.clone()))
        .await;

    assert_eq!(
        report.result.unwrap(),
        CommandOutcome::IndexCreated {
            name: "email_1".to_string(),
            unique: true
        }
    );

    let calls = runner.store().calls();
    assert_eq!(
        calls,
        vec![RecordedCall::CreateIndex {
            collection: "users".to_string(),
            spec: spec.clone(),
        }]
    );

    let RecordedCall::CreateIndex { spec: sent, .. } = &calls[0] else {
        unreachable!();
    };
    assert_eq!(sent.fields(), vec!["email"]);
    assert!(sent.unique);
    assert_eq!(sent.collation, Some(CollationSpec::new("en", 2)));
    assert_eq!(
        sent.partial_filter,
        Some(doc! { "email": { "$exists": true } })
    );
}

#[tokio::test]
async fn test_insert_two_documents_records_both() {
    let runner = runner();
    let documents = vec![
        doc! { "_id": "68e67788956f936302a2a778", "name": "Renan" },
        doc! { "_id": "68e67788956f936302a2a779", "name": "Bruna" },
    ];

    let report = runner
        .run_one(&Command::insert_many("users", documents.clone()))
        .await;

    assert_eq!(
        report.result.unwrap(),
        CommandOutcome::Inserted {
            ids: vec![
                Bson::String("68e67788956f936302a2a778".to_string()),
                Bson::String("68e67788956f936302a2a779".to_string()),
            ]
        }
    );

    let inserts = runner.store().calls_of(CallKind::InsertMany);
    assert_eq!(inserts.len(), 1);
    assert_eq!(
        inserts[0],
        RecordedCall::InsertMany {
            collection: "users".to_string(),
            documents: documents.clone(),
        }
    );
    assert_eq!(runner.store().documents("users"), documents);
}

#[tokio::test]
async fn test_simulated_duplicate_key_on_index_creation_is_logged_not_raised() {
    let runner = runner();
    runner.store().fail_next(
        CallKind::CreateIndex,
        CuratorError::DuplicateKey("E11000 duplicate key error".to_string()),
    );

    let report = runner
        .run_one(&Command::create_index(
            "ratings",
            IndexSpec::new(doc! { "userId": 1, "titleId": 1 }).unique(true),
        ))
        .await;

    let failure = report.result.unwrap_err();
    assert!(failure.is_duplicate_key());
    assert_eq!(failure.label, "creating unique index");
    assert!(failure.to_string().contains("E11000"));
}

#[tokio::test]
async fn test_existing_duplicates_fail_unique_index_creation() {
    let runner = runner();
    runner.store().seed(
        "ratings",
        [
            doc! { "userId": "u1", "titleId": "tt1", "score": 7 },
            doc! { "userId": "u1", "titleId": "tt1", "score": 9 },
        ],
    );

    let summary = runner
        .run_all(&[
            Command::create_index(
                "ratings",
                IndexSpec::new(doc! { "userId": 1, "titleId": 1 }).unique(true),
            ),
            Command::create_index(
                "comments",
                IndexSpec::new(doc! { "userId": 1, "titleId": 1 }).unique(true),
            ),
        ])
        .await;

    // The failing command does not stop the other one
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.succeeded(), 1);
    assert!(summary.reports[0].result.as_ref().unwrap_err().is_duplicate_key());
    assert!(runner.store().index("comments", "userId_1_titleId_1").is_some());
    assert!(runner.store().index("ratings", "userId_1_titleId_1").is_none());
}

#[tokio::test]
async fn test_update_many_reports_every_matched_document_modified() {
    let runner = runner();
    runner.store().seed(
        "titles",
        [
            doc! { "_id": "tt0111161" },
            doc! { "_id": "tt0068646" },
            doc! { "_id": "tt0117060" },
        ],
    );

    let report = runner
        .run_one(&Command::update_many(
            "titles",
            doc! {},
            doc! { "$set": { "watched": false } },
        ))
        .await;

    assert_eq!(
        report.result.unwrap(),
        CommandOutcome::Updated {
            matched: 3,
            modified: 3
        }
    );
    assert!(runner
        .store()
        .documents("titles")
        .iter()
        .all(|title| matches!(title.get_bool("watched"), Ok(false))));
}

#[tokio::test]
async fn test_delete_one_present_and_absent() {
    let runner = runner();
    runner
        .store()
        .seed("titles", [doc! { "_id": "tt0117060" }, doc! { "_id": "tt0111161" }]);

    let command = Command::delete_one("titles", doc! { "_id": "tt0117060" });

    let first = runner.run_one(&command).await;
    assert_eq!(first.result.unwrap(), CommandOutcome::Deleted { count: 1 });

    let second = runner.run_one(&command).await;
    assert_eq!(second.result.unwrap(), CommandOutcome::Deleted { count: 0 });

    assert_eq!(runner.store().documents("titles").len(), 1);
}

#[tokio::test]
async fn test_commands_do_not_affect_each_other() {
    let runner = runner();
    runner.store().fail_next(
        CallKind::InsertMany,
        CuratorError::Connection("connection reset by peer".to_string()),
    );

    let summary = runner
        .run_all(&[
            Command::insert_many("users", vec![doc! { "name": "Renan" }]),
            Command::update_many("titles", doc! {}, doc! { "$set": { "watched": false } }),
            Command::delete_by_id("titles", "tt0117060"),
        ])
        .await;

    assert_eq!(summary.reports.len(), 3);
    assert!(!summary.reports[0].is_success());
    assert!(summary.reports[1].is_success());
    assert!(summary.reports[2].is_success());
    // Every command reached the store, the failed one included
    assert_eq!(runner.store().calls().len(), 3);
}
