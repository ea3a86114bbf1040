//! Write view of a transaction.
//!
//! Has no engine handle at all: every call only stages. Engine-global tuning
//! is not part of this type, so it cannot be reached from inside a
//! transaction.

use super::operation::Operation;
use super::pending::PendingOperationLog;
use super::rollback::RollbackSegment;
use super::stage;
use crate::error::TxResult;
use crate::types::{Analyzer, Document};
use tracing::debug;

pub struct TransactionalWriter<'tx> {
    pending: &'tx mut PendingOperationLog,
    rollback: &'tx mut RollbackSegment,
}

impl<'tx> TransactionalWriter<'tx> {
    pub(crate) fn new(
        pending: &'tx mut PendingOperationLog,
        rollback: &'tx mut RollbackSegment,
    ) -> Self {
        Self { pending, rollback }
    }

    /// Stage the insertion of a batch. `analyzer` overrides the strategy
    /// default for this batch only.
    pub fn add_documents(
        &mut self,
        documents: Vec<Document>,
        analyzer: Option<Analyzer>,
    ) -> TxResult<()> {
        let operation = Operation::add(documents, analyzer)?;
        debug!(%operation, "Staged add");
        stage(self.pending, self.rollback, operation);
        Ok(())
    }

    pub fn add_document(&mut self, document: Document) -> TxResult<()> {
        self.add_documents(vec![document], None)
    }

    /// Number of operations staged so far in this transaction
    pub fn staged(&self) -> usize {
        self.pending.len()
    }
}
