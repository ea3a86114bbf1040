//! End-to-end scenarios on an on-disk Tantivy index, reopened after commit.

use crate::common::{committed, open_tantivy, test_settings};
use txindex::{
    DeleteResolution, Document, DocumentId, Term, TransactionContext, TransactionDefinition,
    TransactionManager,
};

#[test]
fn test_scenario_delete_by_term_then_reopen() {
    let (settings, _temp_dir) = test_settings();
    {
        let manager = TransactionManager::open(&settings).unwrap();
        let mut context = TransactionContext::new();
        manager.begin(&mut context, TransactionDefinition::new()).unwrap();
        {
            let mut writer = context.holder().unwrap().writer().unwrap();
            writer
                .add_documents(
                    vec![
                        Document::new("1").with_field("title", "first"),
                        Document::new("2").with_field("title", "second"),
                    ],
                    None,
                )
                .unwrap();
        }
        manager.commit(&mut context).unwrap();

        manager.begin(&mut context, TransactionDefinition::new()).unwrap();
        let term: Term = "id:1".parse().unwrap();
        let mut reader = context.holder().unwrap().reader();
        assert_eq!(reader.delete_documents(&term).unwrap(), 1);
        assert!(reader.get_document(&DocumentId::from("1")).unwrap().is_none());
        manager.commit(&mut context).unwrap();
    }

    let engine = open_tantivy(&settings);
    assert!(!committed(&engine, "1"));
    assert!(committed(&engine, "2"));
}

#[test]
fn test_scenario_delete_of_staged_add_keeps_document() {
    let (settings, _temp_dir) = test_settings();
    {
        let manager = TransactionManager::open(&settings).unwrap();
        let mut context = TransactionContext::new();
        manager.begin(&mut context, TransactionDefinition::new()).unwrap();

        let holder = context.holder().unwrap();
        holder
            .writer()
            .unwrap()
            .add_document(Document::new("3").with_field("title", "staged"))
            .unwrap();
        // Resolved against the committed index, where 3 does not exist yet
        assert_eq!(holder.reader().delete_documents(&Term::id("3")).unwrap(), 0);
        // One add and one delete operation on an empty index
        assert_eq!(holder.reader().num_docs().unwrap(), 0);

        let report = manager.commit(&mut context).unwrap();
        assert_eq!(report.applied, 2);
    }

    let engine = open_tantivy(&settings);
    assert!(committed(&engine, "3"));
}

#[test]
fn test_term_resolution_removes_staged_add() {
    let (mut settings, _temp_dir) = test_settings();
    settings.transaction.delete_resolution = DeleteResolution::Term;
    {
        let manager = TransactionManager::open(&settings).unwrap();
        let mut context = TransactionContext::new();
        manager.begin(&mut context, TransactionDefinition::new()).unwrap();

        let holder = context.holder().unwrap();
        holder
            .writer()
            .unwrap()
            .add_document(Document::new("3").with_field("title", "staged"))
            .unwrap();
        holder.reader().delete_documents(&Term::id("3")).unwrap();
        manager.commit(&mut context).unwrap();
    }

    let engine = open_tantivy(&settings);
    assert!(!committed(&engine, "3"));
}
