//! Commit failures: clean compensation, failed compensation, single commit.

use crate::common::{FaultyEngine, doc, sorted_ids};
use std::sync::Arc;
use txindex::config::TransactionConfig;
use txindex::{
    ApplyMode, CacheTransactionStrategy, DocumentId, OperationKind, TxError,
    TransactionDefinition,
};

fn engine() -> Arc<FaultyEngine> {
    Arc::new(FaultyEngine::with_documents([
        doc("1", "one"),
        doc("2", "two"),
        doc("3", "three"),
    ]))
}

fn strategy_with(
    engine: &Arc<FaultyEngine>,
    apply_mode: ApplyMode,
) -> CacheTransactionStrategy<FaultyEngine> {
    let config = TransactionConfig {
        apply_mode,
        ..TransactionConfig::default()
    };
    CacheTransactionStrategy::new(Arc::clone(engine), &config)
}

#[test]
fn test_second_delete_failure_restores_first() {
    let engine = engine();
    let strategy = strategy_with(&engine, ApplyMode::PerOperation);
    engine.fail_remove_of("2");

    let mut holder = strategy.begin(TransactionDefinition::new()).unwrap();
    let mut reader = holder.reader();
    reader.delete_document(&DocumentId::from("1")).unwrap();
    reader.delete_document(&DocumentId::from("2")).unwrap();

    let error = strategy.commit(holder).unwrap_err();
    assert!(!error.is_fatal());
    match error {
        TxError::ApplyOperation {
            index,
            kind,
            compensated,
            ..
        } => {
            assert_eq!(index, 1);
            assert_eq!(kind, OperationKind::Delete);
            assert_eq!(compensated, 1);
        }
        other => panic!("expected ApplyOperation, got {other:?}"),
    }

    assert_eq!(sorted_ids(engine.inner()), vec!["1", "2", "3"]);
    let restored = engine.inner().documents();
    let one = restored.iter().find(|d| d.id.as_str() == "1").unwrap();
    assert_eq!(one.get("title"), Some("one"));
}

#[test]
fn test_compensation_runs_newest_first_past_failures() {
    let engine = engine();
    let strategy = strategy_with(&engine, ApplyMode::PerOperation);

    let mut holder = strategy.begin(TransactionDefinition::new()).unwrap();
    holder.reader().delete_document(&DocumentId::from("1")).unwrap();
    holder.writer().unwrap().add_document(doc("4", "four")).unwrap();
    holder.reader().delete_document(&DocumentId::from("2")).unwrap();

    // Forward delete of 2 fails, and so does re-adding the snapshot of 1
    engine.fail_remove_of("2");
    engine.fail_insert_of("1");

    let error = strategy.commit(holder).unwrap_err();
    assert!(error.is_fatal());
    assert_eq!(error.status_code(), "COMPENSATION_ERROR");
    match error {
        TxError::Compensation {
            index, failures, ..
        } => {
            assert_eq!(index, 2);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].index, 0);
            assert_eq!(failures[0].kind, OperationKind::Delete);
        }
        other => panic!("expected Compensation, got {other:?}"),
    }

    // The add of 4 was still undone; only the delete of 1 could not be
    assert_eq!(sorted_ids(engine.inner()), vec!["2", "3"]);
}

#[test]
fn test_failed_commit_is_compensated() {
    let engine = engine();
    let strategy = strategy_with(&engine, ApplyMode::PerOperation);

    let mut holder = strategy.begin(TransactionDefinition::new()).unwrap();
    holder.writer().unwrap().add_document(doc("4", "four")).unwrap();
    holder.writer().unwrap().add_document(doc("5", "five")).unwrap();

    engine.fail_commit_at(2);
    let error = strategy.commit(holder).unwrap_err();
    assert!(matches!(error, TxError::ApplyOperation { index: 1, .. }));
    assert_eq!(sorted_ids(engine.inner()), vec!["1", "2", "3"]);
}

#[test]
fn test_single_commit_failure_needs_no_compensation() {
    let engine = engine();
    let strategy = strategy_with(&engine, ApplyMode::SingleCommit);
    engine.fail_remove_of("2");

    let mut holder = strategy.begin(TransactionDefinition::new()).unwrap();
    holder.reader().delete_document(&DocumentId::from("1")).unwrap();
    holder.writer().unwrap().add_document(doc("4", "four")).unwrap();
    holder.reader().delete_document(&DocumentId::from("2")).unwrap();

    let commits_before = engine.commits();
    let error = strategy.commit(holder).unwrap_err();
    assert!(matches!(
        error,
        TxError::ApplyOperation {
            index: 2,
            compensated: 2,
            ..
        }
    ));
    assert_eq!(engine.commits(), commits_before);
    assert_eq!(sorted_ids(engine.inner()), vec!["1", "2", "3"]);
}

#[test]
fn test_single_commit_applies_once_in_order() {
    let engine = engine();
    let strategy = strategy_with(&engine, ApplyMode::SingleCommit);

    let mut holder = strategy.begin(TransactionDefinition::new()).unwrap();
    holder.reader().delete_document(&DocumentId::from("1")).unwrap();
    holder.writer().unwrap().add_document(doc("1", "replaced")).unwrap();
    holder.reader().delete_document(&DocumentId::from("3")).unwrap();

    let commits_before = engine.commits();
    let report = strategy.commit(holder).unwrap();
    assert_eq!(report.applied, 3);
    assert_eq!(report.mode, ApplyMode::SingleCommit);
    assert_eq!(engine.commits(), commits_before + 1);

    assert_eq!(sorted_ids(engine.inner()), vec!["1", "2"]);
    let documents = engine.inner().documents();
    let one = documents.iter().find(|d| d.id.as_str() == "1").unwrap();
    assert_eq!(one.get("title"), Some("replaced"));
}

#[test]
fn test_final_commit_failure_is_resource_error() {
    let engine = engine();
    let strategy = strategy_with(&engine, ApplyMode::SingleCommit);

    let mut holder = strategy.begin(TransactionDefinition::new()).unwrap();
    holder.writer().unwrap().add_document(doc("4", "four")).unwrap();

    engine.fail_commit_at(1);
    let error = strategy.commit(holder).unwrap_err();
    assert!(matches!(error, TxError::ResourceAccess { .. }));
    assert_eq!(sorted_ids(engine.inner()), vec!["1", "2", "3"]);
}
