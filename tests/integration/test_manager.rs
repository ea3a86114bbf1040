//! Manager front end over a configured Tantivy index.

use crate::common::{committed, doc, test_settings};
use std::fs;
use txindex::config::Settings;
use txindex::{
    ApplyMode, DocumentId, EngineReader, IndexEngine, IsolationLevel, Term, TransactionContext,
    TransactionDefinition, TransactionManager, TuningSetting, TxError,
};

#[test]
fn test_manager_from_settings_file() {
    let (settings, temp_dir) = test_settings();
    let config_path = temp_dir.path().join(".txindex").join("settings.toml");

    let mut file_settings = settings.clone();
    file_settings.transaction.apply_mode = ApplyMode::SingleCommit;
    file_settings.save(&config_path).unwrap();

    let loaded = Settings::load_from(&config_path).unwrap();
    assert_eq!(loaded.index.path, settings.index.path);
    assert_eq!(loaded.index.fields, settings.index.fields);

    let manager = TransactionManager::open(&loaded).unwrap();
    assert_eq!(manager.strategy().processor().mode(), ApplyMode::SingleCommit);

    let mut context = TransactionContext::new();
    manager.begin(&mut context, TransactionDefinition::new()).unwrap();
    context
        .holder()
        .unwrap()
        .writer()
        .unwrap()
        .add_documents(vec![doc("1", "one"), doc("2", "two")], None)
        .unwrap();
    let report = manager.commit(&mut context).unwrap();
    assert_eq!(report.mode, ApplyMode::SingleCommit);
    assert!(committed(manager.engine().as_ref(), "2"));
}

#[test]
fn test_tune_guard_and_read_only() {
    let (settings, _temp_dir) = test_settings();
    let manager = TransactionManager::open(&settings).unwrap();
    let mut context = TransactionContext::new();

    manager.begin(&mut context, TransactionDefinition::new()).unwrap();
    context
        .holder()
        .unwrap()
        .writer()
        .unwrap()
        .add_document(doc("1", "one"))
        .unwrap();
    assert!(matches!(
        manager.tune(TuningSetting::MergeFactor(4)),
        Err(TxError::UnsupportedInTransaction { .. })
    ));
    manager.commit(&mut context).unwrap();

    manager.tune(TuningSetting::MergeFactor(4)).unwrap();
    assert_eq!(manager.engine().tuning().merge_factor, Some(4));

    manager
        .begin(
            &mut context,
            TransactionDefinition::named("audit")
                .read_only()
                .with_isolation(IsolationLevel::ReadCommitted),
        )
        .unwrap();
    let holder = context.holder().unwrap();
    assert!(holder.writer().is_err());
    {
        let mut reader = holder.reader();
        assert!(reader.get_document(&DocumentId::from("1")).unwrap().is_some());
        assert!(matches!(
            reader.delete_documents(&Term::id("1")),
            Err(TxError::UnsupportedInTransaction { .. })
        ));
    }
    manager.tune(TuningSetting::NoMerge).unwrap();
    manager.commit(&mut context).unwrap();
    assert!(committed(manager.engine().as_ref(), "1"));
}

#[test]
fn test_rollback_only_and_nesting() {
    let (settings, _temp_dir) = test_settings();
    let manager = TransactionManager::open(&settings).unwrap();
    let mut context = TransactionContext::new();

    let id = manager.begin(&mut context, TransactionDefinition::new()).unwrap();
    assert!(matches!(
        manager.begin(&mut context, TransactionDefinition::new()),
        Err(TxError::AlreadyBound { existing }) if existing == id
    ));

    let holder = context.holder().unwrap();
    holder.writer().unwrap().add_document(doc("1", "one")).unwrap();
    holder.set_rollback_only();

    let report = manager.commit(&mut context).unwrap();
    assert!(report.rolled_back);
    assert!(!committed(manager.engine().as_ref(), "1"));
    assert!(!context.is_active());
}

#[test]
fn test_unknown_field_fails_at_commit_and_is_compensated() {
    let (settings, _temp_dir) = test_settings();
    let manager = TransactionManager::open(&settings).unwrap();
    let mut context = TransactionContext::new();

    manager.begin(&mut context, TransactionDefinition::new()).unwrap();
    context
        .holder()
        .unwrap()
        .writer()
        .unwrap()
        .add_document(doc("1", "one"))
        .unwrap();
    manager.commit(&mut context).unwrap();

    manager.begin(&mut context, TransactionDefinition::new()).unwrap();
    let holder = context.holder().unwrap();
    assert!(holder.reader().delete_document(&DocumentId::from("1")).unwrap());
    holder
        .writer()
        .unwrap()
        .add_document(doc("2", "two").with_field("unknown", "x"))
        .unwrap();

    let error = manager.commit(&mut context).unwrap_err();
    assert!(matches!(error, TxError::ApplyOperation { index: 1, .. }));
    assert!(!error.recovery_suggestions().is_empty());

    // The delete of 1 was committed, then undone from its snapshot
    let engine = manager.engine();
    let reader = engine.open_reader().unwrap();
    let restored = reader.document(&DocumentId::from("1")).unwrap().unwrap();
    assert_eq!(restored.get("title"), Some("one"));
    assert!(!committed(engine.as_ref(), "2"));
}

#[test]
fn test_closed_engine() {
    let (settings, _temp_dir) = test_settings();
    let manager = TransactionManager::open(&settings).unwrap();
    let mut context = TransactionContext::new();

    manager.begin(&mut context, TransactionDefinition::new()).unwrap();
    manager.engine().close();

    let holder = context.holder().unwrap();
    assert!(matches!(
        holder.reader().num_docs(),
        Err(TxError::ResourceAccess { .. })
    ));
    holder.writer().unwrap().add_document(doc("1", "one")).unwrap();
    assert!(matches!(
        manager.commit(&mut context),
        Err(TxError::ResourceAccess { .. })
    ));
    assert!(matches!(
        manager.begin(&mut context, TransactionDefinition::new()),
        Err(TxError::ResourceAccess { .. })
    ));
}

#[test]
fn test_invalid_settings_file() {
    let (_, temp_dir) = test_settings();
    let config_path = temp_dir.path().join("settings.toml");
    fs::write(&config_path, "[transaction]\napply_mode = \"sometimes\"\n").unwrap();

    assert!(Settings::load_from(&config_path).is_err());
}
